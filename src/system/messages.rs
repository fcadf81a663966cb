//! Commands sent from producers to the fusion worker.

use crossbeam_channel::Sender;

use crate::geometry::CameraPose;
use crate::target::{Detection2D, Measurement3D};

/// One unit of work for the fusion worker, applied in submission order.
#[derive(Debug)]
pub enum FusionCommand {
    /// Already-localized measurements for static association.
    Measurements(Vec<Measurement3D>),

    /// A frame of detections to localize against the support plane.
    Detections {
        pose: CameraPose,
        detections: Vec<Detection2D>,
        timestamp_ns: u64,
    },

    /// Bounding boxes for particle-filter tracks.
    DynamicObservation {
        pose: CameraPose,
        detections: Vec<Detection2D>,
    },

    /// Explicit prediction step of `dt` seconds, on top of the timer ticks.
    Predict(f64),

    /// Replied to once every earlier command has been applied.
    Flush(Sender<()>),

    Shutdown,
}
