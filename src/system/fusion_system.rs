//! Fusion System - single-writer service around the track manager.
//!
//! The `FusionSystem` owns the shared snapshot and spawns one worker thread
//! that owns the [`TrackManager`]. Producers submit commands through a bounded
//! channel; readers query the latest published snapshot.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, bounded};
use tracing::{debug, info, warn};

use crate::config::{FusionConfig, MAX_PREDICT_INTERVAL_S};
use crate::geometry::CameraPose;
use crate::target::{CertainTargetDescriptor, Detection2D, Measurement3D};
use crate::tracking::manager::best_match;
use crate::tracking::{TrackManager, TrackSnapshot, UpdateReport};

use super::messages::FusionCommand;
use super::shared_state::SharedState;

/// Fusion service: one worker thread applies every command in order.
pub struct FusionSystem {
    /// Shared snapshot and counters, readable from any thread.
    shared: Arc<SharedState>,

    /// Command queue into the worker. `None` once shut down.
    sender: Option<Sender<FusionCommand>>,

    tie_epsilon: f64,

    worker_handle: Option<JoinHandle<()>>,
}

impl FusionSystem {
    /// Validate the configuration and spawn the worker thread.
    pub fn start(config: FusionConfig) -> Result<Self> {
        config.validate()?;
        let shared = SharedState::new();
        let (sender, receiver) = bounded::<FusionCommand>(config.service.queue_capacity);
        let tie_epsilon = config.association.tie_epsilon;

        let worker = FusionWorker::new(config, Arc::clone(&shared));
        let worker_handle = thread::Builder::new()
            .name("fusion-worker".to_string())
            .spawn(move || worker.run(receiver))
            .context("Failed to spawn fusion worker")?;

        Ok(Self {
            shared,
            sender: Some(sender),
            tie_epsilon,
            worker_handle: Some(worker_handle),
        })
    }

    /// Queue localized measurements. Blocks while the queue is full.
    pub fn submit_measurements(&self, measurements: Vec<Measurement3D>) -> Result<()> {
        self.send(FusionCommand::Measurements(measurements))
    }

    /// Queue one camera frame of detections for localization and static association.
    pub fn submit_detections(
        &self,
        pose: CameraPose,
        detections: Vec<Detection2D>,
        timestamp_ns: u64,
    ) -> Result<()> {
        self.send(FusionCommand::Detections {
            pose,
            detections,
            timestamp_ns,
        })
    }

    /// Queue bounding boxes for the particle-filter tracks.
    pub fn submit_dynamic(&self, pose: CameraPose, detections: Vec<Detection2D>) -> Result<()> {
        self.send(FusionCommand::DynamicObservation { pose, detections })
    }

    pub fn submit_predict(&self, dt: f64) -> Result<()> {
        self.send(FusionCommand::Predict(dt))
    }

    /// Block until every command submitted before this call has been applied
    /// and its result published.
    pub fn flush(&self) -> Result<()> {
        let (ack_tx, ack_rx) = bounded(1);
        self.send(FusionCommand::Flush(ack_tx))?;
        ack_rx
            .recv()
            .context("Fusion worker stopped before acknowledging flush")
    }

    /// Best track for each catalog entry, from the latest snapshot.
    ///
    /// Equal scores resolve to the oldest track; `None` when no track exists.
    pub fn locate(&self, catalog: &[CertainTargetDescriptor]) -> Vec<Option<TrackSnapshot>> {
        let tracks = self.shared.snapshot();
        catalog
            .iter()
            .map(|query| {
                best_match(tracks.iter().map(|t| t.match_score(query)), self.tie_epsilon)
                    .map(|i| tracks[i].clone())
            })
            .collect()
    }

    /// Every live track with provenance, as of the last applied command.
    pub fn all_tracks(&self) -> Arc<Vec<TrackSnapshot>> {
        self.shared.snapshot()
    }

    pub fn shared_state(&self) -> &Arc<SharedState> {
        &self.shared
    }

    pub fn is_running(&self) -> bool {
        self.sender.is_some()
    }

    /// Apply all queued commands, then stop the worker and wait for it.
    pub fn shutdown(&mut self) {
        if let Some(sender) = self.sender.take() {
            // Queued after everything already submitted, so nothing is lost.
            if sender.send(FusionCommand::Shutdown).is_err() {
                warn!("Fusion worker already stopped");
            }
        }
        if let Some(handle) = self.worker_handle.take() {
            if handle.join().is_err() {
                warn!("Fusion worker panicked");
            }
        }
    }

    fn send(&self, command: FusionCommand) -> Result<()> {
        let sender = self
            .sender
            .as_ref()
            .ok_or_else(|| anyhow!("Fusion system has been shut down"))?;
        sender
            .send(command)
            .map_err(|_| anyhow!("Fusion worker is no longer receiving commands"))
    }
}

impl Drop for FusionSystem {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ============================================================================
// Worker
// ============================================================================

struct FusionWorker {
    manager: TrackManager,
    shared: Arc<SharedState>,
    interval: Duration,
}

impl FusionWorker {
    fn new(config: FusionConfig, shared: Arc<SharedState>) -> Self {
        let interval = Duration::try_from_secs_f64(config.service.predict_interval_s)
            .unwrap_or(Duration::from_secs_f64(MAX_PREDICT_INTERVAL_S));
        Self {
            manager: TrackManager::new(config),
            shared,
            interval,
        }
    }

    /// Main loop: apply commands as they arrive and run prediction ticks on
    /// a fixed cadence in between.
    fn run(mut self, receiver: Receiver<FusionCommand>) {
        info!("Fusion worker started (tick every {:?})", self.interval);
        let mut next_tick = Instant::now() + self.interval;

        loop {
            let timeout = next_tick.saturating_duration_since(Instant::now());
            match receiver.recv_timeout(timeout) {
                Ok(FusionCommand::Shutdown) => break,
                Ok(command) => {
                    self.apply(command);
                    self.shared.record_command();
                }
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => break,
            }
            self.run_due_ticks(&mut next_tick);
        }

        info!("Fusion worker stopped with {} tracks", self.manager.len());
    }

    fn apply(&mut self, command: FusionCommand) {
        let report = match command {
            FusionCommand::Measurements(measurements) => self.manager.update(&measurements),
            FusionCommand::Detections {
                pose,
                detections,
                timestamp_ns,
            } => self
                .manager
                .localize_and_update(&pose, &detections, timestamp_ns),
            FusionCommand::DynamicObservation { pose, detections } => {
                self.manager.update_dynamic(&pose, &detections)
            }
            FusionCommand::Predict(dt) => self.manager.predict(dt),
            FusionCommand::Flush(ack) => {
                self.publish(&UpdateReport::new());
                if ack.send(()).is_err() {
                    debug!("Flush requester went away");
                }
                return;
            }
            FusionCommand::Shutdown => return,
        };
        self.publish(&report);
    }

    /// Catch up on every tick that fell due, as one prediction step.
    fn run_due_ticks(&mut self, next_tick: &mut Instant) {
        let now = Instant::now();
        if now < *next_tick {
            return;
        }
        let mut dt = 0.0;
        while *next_tick <= now {
            dt += self.interval.as_secs_f64();
            *next_tick += self.interval;
        }
        let report = self.manager.predict(dt);
        self.shared.record_tick();
        self.publish(&report);
    }

    fn publish(&self, report: &UpdateReport) {
        self.shared.record_incorporated(report.incorporated());
        self.shared.publish(self.manager.snapshots());
    }
}
