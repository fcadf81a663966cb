//! Coordinate frame conventions for the camera mount.
//!
//! Three frames are involved when a detection is turned into a world position:
//!
//! ## World frame
//! Local frame of the flight controller. One axis is "altitude"; the support
//! plane (ground) is a constant value on that axis.
//!
//! ## Body frame
//! Frame of the camera mount, rotated into the world by the vehicle attitude
//! composed with the gimbal angles. Its axes depend on the platform.
//!
//! ## Optical frame (RDF - computer vision convention)
//! ```text
//!        +Y (down)
//!         |
//!         |
//!         +------ +X (right)
//!        /
//!       /
//!      +Z (forward, optical axis)
//! ```
//!
//! # Mounting convention
//!
//! Platforms disagree on which body axis the lens looks down when the mount
//! rotation is identity. [`AxisConvention`] records the body-frame `forward`
//! and image-`up` directions and derives the fixed body → optical rotation:
//!
//! ```text
//! right   = forward × up
//! R_cam_body rows = [ right ; -up ; forward ]
//! ```
//!
//! # Transformation pipeline
//! ```text
//! p_world ──R_wb⁻¹ (p - t)──▶ p_body ──R_cam_body──▶ p_cam ──K──▶ pixel
//! ```

use nalgebra::{Matrix3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};

/// Tolerance below which two mount directions are treated as parallel.
const PARALLEL_THRESHOLD: f64 = 1e-6;

/// Body-frame directions of the optical axis and the image "up" direction
/// when the camera rotation is identity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawAxisConvention", into = "RawAxisConvention")]
pub struct AxisConvention {
    forward: Vector3<f64>,
    up: Vector3<f64>,
}

impl AxisConvention {
    /// Build a convention from possibly non-unit, non-orthogonal vectors.
    ///
    /// `up` is orthogonalised against `forward`. Returns `None` when either
    /// vector is zero or the two are parallel.
    pub fn new(forward: Vector3<f64>, up: Vector3<f64>) -> Option<Self> {
        let forward = forward.try_normalize(PARALLEL_THRESHOLD)?;
        let up = (up - forward * forward.dot(&up)).try_normalize(PARALLEL_THRESHOLD)?;
        Some(Self { forward, up })
    }

    /// Gimbal camera on a FLU airframe: lens along body +X, image up along body +Z.
    pub fn drone() -> Self {
        Self {
            forward: Vector3::x(),
            up: Vector3::z(),
        }
    }

    /// Simulator camera in a Y-up world: lens along -Z, image up along +Y.
    pub fn y_up_simulator() -> Self {
        Self {
            forward: -Vector3::z(),
            up: Vector3::y(),
        }
    }

    pub fn forward(&self) -> Vector3<f64> {
        self.forward
    }

    pub fn up(&self) -> Vector3<f64> {
        self.up
    }

    pub fn right(&self) -> Vector3<f64> {
        self.forward.cross(&self.up)
    }

    /// Fixed rotation taking body-frame vectors into the optical frame (RDF).
    #[rustfmt::skip]
    pub fn rotation_cam_body(&self) -> Matrix3<f64> {
        let r = self.right();
        let d = -self.up;
        let f = self.forward;
        Matrix3::new(
            r.x, r.y, r.z,  // Camera X = right
            d.x, d.y, d.z,  // Camera Y = down
            f.x, f.y, f.z,  // Camera Z = forward
        )
    }

    /// Inverse of [`rotation_cam_body`](Self::rotation_cam_body).
    pub fn rotation_body_cam(&self) -> Matrix3<f64> {
        self.rotation_cam_body().transpose()
    }
}

impl Default for AxisConvention {
    fn default() -> Self {
        Self::drone()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
struct RawAxisConvention {
    forward: [f64; 3],
    up: [f64; 3],
}

impl TryFrom<RawAxisConvention> for AxisConvention {
    type Error = String;

    fn try_from(raw: RawAxisConvention) -> Result<Self, Self::Error> {
        AxisConvention::new(Vector3::from(raw.forward), Vector3::from(raw.up))
            .ok_or_else(|| "camera forward and up directions must be non-zero and not parallel".to_string())
    }
}

impl From<AxisConvention> for RawAxisConvention {
    fn from(c: AxisConvention) -> Self {
        Self {
            forward: c.forward.into(),
            up: c.up.into(),
        }
    }
}

/// Gimbal attitude relative to the vehicle, in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GimbalAngles {
    pub yaw: f64,
    pub pitch: f64,
    pub roll: f64,
}

impl GimbalAngles {
    pub fn new(yaw: f64, pitch: f64, roll: f64) -> Self {
        Self { yaw, pitch, roll }
    }

    /// Element-wise mean, used for the attitude halfway through an exposure.
    pub fn midpoint(&self, other: &GimbalAngles) -> GimbalAngles {
        GimbalAngles {
            yaw: 0.5 * (self.yaw + other.yaw),
            pitch: 0.5 * (self.pitch + other.pitch),
            roll: 0.5 * (self.roll + other.roll),
        }
    }

    /// Rotation of the camera mount relative to the vehicle: Rz(yaw) Ry(pitch) Rx(roll).
    pub fn rotation(&self) -> UnitQuaternion<f64> {
        UnitQuaternion::from_euler_angles(
            self.roll.to_radians(),
            self.pitch.to_radians(),
            self.yaw.to_radians(),
        )
    }
}

/// Camera mount orientation in the world frame: R_world_vehicle · R_vehicle_gimbal.
pub fn camera_orientation_in_world(
    vehicle: &UnitQuaternion<f64>,
    gimbal: &GimbalAngles,
) -> UnitQuaternion<f64> {
    vehicle * gimbal.rotation()
}
