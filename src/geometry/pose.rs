//! Camera pose in the world frame.

use nalgebra::{Quaternion, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Position and orientation of the camera mount in the world frame.
///
/// `rotation` takes body-frame vectors to world-frame vectors (R_wb), so
/// `p_world = rotation * p_body + position`. Immutable once captured.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraPose {
    pub position: Vector3<f64>,
    pub rotation: UnitQuaternion<f64>,
}

impl CameraPose {
    pub fn new(position: Vector3<f64>, rotation: UnitQuaternion<f64>) -> Self {
        Self { position, rotation }
    }

    /// Pose from a w-first quaternion, as logged by the flight controller.
    pub fn from_quaternion(qw: f64, qx: f64, qy: f64, qz: f64, position: Vector3<f64>) -> Self {
        let rotation = UnitQuaternion::from_quaternion(Quaternion::new(qw, qx, qy, qz));
        Self { position, rotation }
    }

    pub fn identity() -> Self {
        Self {
            position: Vector3::zeros(),
            rotation: UnitQuaternion::identity(),
        }
    }

    /// Express a world point in the body frame: R_wb⁻¹ (p - t).
    pub fn world_to_body(&self, p_world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.inverse_transform_vector(&(p_world - self.position))
    }

    /// Rotate a body-frame direction into the world frame.
    pub fn body_to_world_direction(&self, d_body: &Vector3<f64>) -> Vector3<f64> {
        self.rotation.transform_vector(d_body)
    }
}

impl Default for CameraPose {
    fn default() -> Self {
        Self::identity()
    }
}

/// A pose sample from the pose stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimedPose {
    pub timestamp_ns: u64,
    pub pose: CameraPose,
}
