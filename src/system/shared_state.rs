//! State shared between the fusion worker and its readers.
//!
//! The worker is the only writer. After each command it swaps in a fresh,
//! immutable snapshot of every track; readers clone the `Arc` and never see
//! a track halfway through an update.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::tracking::TrackSnapshot;

pub struct SharedState {
    snapshot: RwLock<Arc<Vec<TrackSnapshot>>>,

    /// Commands applied so far, including flushes.
    commands_applied: AtomicU64,

    /// Measurements and detections that entered a track.
    measurements_incorporated: AtomicU64,

    /// Timer-driven prediction steps run by the worker.
    predict_ticks: AtomicU64,
}

impl SharedState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Current snapshot of all tracks, in creation order.
    pub fn snapshot(&self) -> Arc<Vec<TrackSnapshot>> {
        Arc::clone(&self.snapshot.read())
    }

    pub(crate) fn publish(&self, tracks: Vec<TrackSnapshot>) {
        *self.snapshot.write() = Arc::new(tracks);
    }

    pub fn commands_applied(&self) -> u64 {
        self.commands_applied.load(Ordering::SeqCst)
    }

    pub(crate) fn record_command(&self) {
        self.commands_applied.fetch_add(1, Ordering::SeqCst);
    }

    pub fn measurements_incorporated(&self) -> u64 {
        self.measurements_incorporated.load(Ordering::SeqCst)
    }

    pub(crate) fn record_incorporated(&self, count: usize) {
        self.measurements_incorporated
            .fetch_add(count as u64, Ordering::SeqCst);
    }

    pub fn predict_ticks(&self) -> u64 {
        self.predict_ticks.load(Ordering::SeqCst)
    }

    pub(crate) fn record_tick(&self) {
        self.predict_ticks.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for SharedState {
    fn default() -> Self {
        Self {
            snapshot: RwLock::new(Arc::new(Vec::new())),
            commands_applied: AtomicU64::new(0),
            measurements_incorporated: AtomicU64::new(0),
            predict_ticks: AtomicU64::new(0),
        }
    }
}
