//! Freshest-value access to the camera pose stream.

use std::time::Duration;

use anyhow::Result;

use crate::geometry::TimedPose;

use super::buffer::FreshestBuffer;
use super::pubsub::{Broadcaster, Subscription};

/// Keeps the latest poses for lookup and notifies subscribers of each new one.
#[derive(Debug)]
pub struct PoseProvider {
    buffer: FreshestBuffer<TimedPose>,
    updates: Broadcaster<TimedPose>,
}

impl PoseProvider {
    pub fn new(capacity: usize) -> Result<Self> {
        Ok(Self {
            buffer: FreshestBuffer::new(capacity)?,
            updates: Broadcaster::new(),
        })
    }

    /// Store a pose sample and notify subscribers.
    pub fn push(&self, pose: TimedPose) {
        self.buffer.put(pose);
        self.updates.publish(pose);
    }

    pub fn latest(&self) -> Option<TimedPose> {
        self.buffer.freshest(0)
    }

    /// First pose ever received.
    pub fn home(&self) -> Option<TimedPose> {
        self.buffer.first()
    }

    /// Buffered pose whose timestamp is nearest to `timestamp_ns`.
    pub fn closest_to(&self, timestamp_ns: u64) -> Option<TimedPose> {
        self.buffer
            .all_freshest_first()
            .into_iter()
            .min_by_key(|p| p.timestamp_ns.abs_diff(timestamp_ns))
    }

    pub fn subscribe(&self) -> Subscription<TimedPose> {
        self.updates.subscribe()
    }

    /// Latest pose, waiting up to `timeout` for the first one to arrive.
    pub fn wait_for_pose(&self, timeout: Duration) -> Option<TimedPose> {
        // Subscribe before checking the buffer so a pose pushed in between is not missed.
        let subscription = self.subscribe();
        if let Some(pose) = self.latest() {
            return Some(pose);
        }
        subscription.wait(timeout)
    }
}
