//! Per-frame detections and the 3D measurements derived from them.

use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

use super::descriptor::ProbabilisticTargetDescriptor;
use super::types::MeasurementId;

/// Pixel-space bounding box. `x`, `y` is the box centre.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Square box enclosing a circle of `radius` pixels.
    pub fn from_circle(center: Point2<f64>, radius: f64) -> Self {
        Self::new(center.x, center.y, 2.0 * radius, 2.0 * radius)
    }

    pub fn center(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    /// Apparent radius, taken as half the mean side length.
    pub fn radius(&self) -> f64 {
        0.25 * (self.width + self.height)
    }

    /// Corners as `[x_min, y_min, x_max, y_max]`.
    pub fn to_xyxy(&self) -> [f64; 4] {
        [
            self.x - 0.5 * self.width,
            self.y - 0.5 * self.height,
            self.x + 0.5 * self.width,
            self.y + 0.5 * self.height,
        ]
    }
}

/// A 2D detection produced by the external classification pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection2D {
    pub bbox: BoundingBox,
    pub descriptor: ProbabilisticTargetDescriptor,
    pub id: MeasurementId,
}

/// World-frame measurement of one target, derived from one detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Measurement3D {
    pub position: Vector3<f64>,
    pub descriptor: ProbabilisticTargetDescriptor,
    pub id: MeasurementId,
    /// Capture time of the source frame.
    #[serde(default)]
    pub timestamp_ns: u64,
    /// Relative weight in position fusion.
    #[serde(default = "default_confidence")]
    pub confidence: f64,
}

fn default_confidence() -> f64 {
    1.0
}

impl Measurement3D {
    pub fn new(
        position: Vector3<f64>,
        descriptor: ProbabilisticTargetDescriptor,
        id: MeasurementId,
    ) -> Self {
        Self {
            position,
            descriptor,
            id,
            timestamp_ns: 0,
            confidence: default_confidence(),
        }
    }

    pub fn with_timestamp(mut self, timestamp_ns: u64) -> Self {
        self.timestamp_ns = timestamp_ns;
        self
    }

    pub fn with_confidence(mut self, confidence: f64) -> Self {
        self.confidence = confidence;
        self
    }
}
