//! Target data model: descriptors, detections, measurements and ids.

pub mod descriptor;
pub mod detection;
pub mod types;

pub use descriptor::{
    ALPHANUMERICS, Alphanumeric, CertainTargetDescriptor, Color, NUM_ALPHANUMERICS, NUM_COLORS,
    NUM_SHAPES, ProbabilisticTargetDescriptor, Shape,
};
pub use detection::{BoundingBox, Detection2D, Measurement3D};
pub use types::{MeasurementId, TrackId};
