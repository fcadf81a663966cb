//! Monocular localization: pixels ↔ world positions on a support plane.
//!
//! A single bounding box does not determine range, so unprojection casts the
//! viewing ray through the box centre and intersects it with the ground plane
//! at a known altitude. Projection goes the other way through the same camera
//! model, which makes the two exact inverses for points on the plane.

use std::fmt;

use nalgebra::{Matrix3, Point2, Vector3};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::geometry::camera::{CameraIntrinsics, MIN_DEPTH};
use crate::geometry::frames::AxisConvention;
use crate::geometry::pose::CameraPose;
use crate::target::{BoundingBox, Detection2D, Measurement3D, MeasurementId};

/// Rays whose component along the plane normal is smaller than this are
/// treated as parallel to the plane.
const PARALLEL_EPS: f64 = 1e-9;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    /// The viewing ray is parallel to or points away from the support plane.
    NoIntersection,
    /// The world point is not in front of the camera.
    BehindCamera,
    /// A localized position has a NaN or infinite coordinate.
    NonFinite,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::NoIntersection => {
                write!(f, "viewing ray does not intersect the support plane")
            }
            GeometryError::BehindCamera => write!(f, "point is behind the camera"),
            GeometryError::NonFinite => write!(f, "position is not finite"),
        }
    }
}

impl std::error::Error for GeometryError {}

// ============================================================================
// Support plane
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorldAxis {
    X,
    Y,
    Z,
}

impl WorldAxis {
    pub fn index(self) -> usize {
        match self {
            WorldAxis::X => 0,
            WorldAxis::Y => 1,
            WorldAxis::Z => 2,
        }
    }
}

/// Ground plane `world[axis] == altitude` on which targets are assumed to rest.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SupportPlane {
    pub axis: WorldAxis,
    pub altitude: f64,
}

impl SupportPlane {
    pub fn new(axis: WorldAxis, altitude: f64) -> Self {
        Self { axis, altitude }
    }

    /// Ray-plane intersection. `t` must be strictly positive.
    pub fn intersect(
        &self,
        origin: &Vector3<f64>,
        direction: &Vector3<f64>,
    ) -> Result<Vector3<f64>, GeometryError> {
        let i = self.axis.index();
        if direction[i].abs() < PARALLEL_EPS {
            return Err(GeometryError::NoIntersection);
        }
        let t = (self.altitude - origin[i]) / direction[i];
        if t <= 0.0 || !t.is_finite() {
            return Err(GeometryError::NoIntersection);
        }
        let mut hit = origin + direction * t;
        // Pin the plane coordinate exactly.
        hit[i] = self.altitude;
        Ok(hit)
    }
}

impl Default for SupportPlane {
    fn default() -> Self {
        Self::new(WorldAxis::Z, 0.0)
    }
}

// ============================================================================
// Camera view (one pose, reused across many projections)
// ============================================================================

/// World → image mapping for one camera pose.
///
/// Building the view composes the mount rotation once; the particle filter
/// projects hundreds of hypotheses through the same view per update.
#[derive(Debug, Clone, Copy)]
pub struct CameraView {
    rotation_cam_world: Matrix3<f64>,
    origin: Vector3<f64>,
    intrinsics: CameraIntrinsics,
}

impl CameraView {
    pub fn to_camera(&self, p_world: &Vector3<f64>) -> Vector3<f64> {
        self.rotation_cam_world * (p_world - self.origin)
    }

    pub fn origin(&self) -> Vector3<f64> {
        self.origin
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    pub fn project(&self, p_world: &Vector3<f64>) -> Result<Point2<f64>, GeometryError> {
        self.intrinsics
            .project(&self.to_camera(p_world))
            .ok_or(GeometryError::BehindCamera)
    }

    /// World-frame direction of the viewing ray through `pixel` (not normalized).
    pub fn ray_direction(&self, pixel: &Point2<f64>) -> Vector3<f64> {
        self.rotation_cam_world.transpose() * self.intrinsics.ray(pixel)
    }

    /// Bounding box a sphere would produce: projected centre, radius `f·r/depth`.
    pub fn project_sphere(
        &self,
        center: &Vector3<f64>,
        radius: f64,
    ) -> Result<BoundingBox, GeometryError> {
        let p_cam = self.to_camera(center);
        let depth = p_cam.z;
        let pixel = self
            .intrinsics
            .project(&p_cam)
            .ok_or(GeometryError::BehindCamera)?;
        debug_assert!(depth > MIN_DEPTH);
        Ok(BoundingBox::from_circle(
            pixel,
            self.intrinsics.focal_px * radius / depth,
        ))
    }
}

// ============================================================================
// Localizer
// ============================================================================

/// Stateless converter between detections and world-frame measurements.
#[derive(Debug, Clone, Copy)]
pub struct Localizer {
    intrinsics: CameraIntrinsics,
    convention: AxisConvention,
    plane: SupportPlane,
    rotation_cam_body: Matrix3<f64>,
}

impl Localizer {
    pub fn new(intrinsics: CameraIntrinsics, convention: AxisConvention, plane: SupportPlane) -> Self {
        Self {
            intrinsics,
            convention,
            plane,
            rotation_cam_body: convention.rotation_cam_body(),
        }
    }

    pub fn intrinsics(&self) -> &CameraIntrinsics {
        &self.intrinsics
    }

    pub fn convention(&self) -> &AxisConvention {
        &self.convention
    }

    pub fn plane(&self) -> &SupportPlane {
        &self.plane
    }

    /// Replace the intrinsics, e.g. after a zoom change.
    pub fn set_intrinsics(&mut self, intrinsics: CameraIntrinsics) {
        self.intrinsics = intrinsics;
    }

    pub fn view(&self, pose: &CameraPose) -> CameraView {
        let rotation_body_world = pose.rotation.to_rotation_matrix().matrix().transpose();
        CameraView {
            rotation_cam_world: self.rotation_cam_body * rotation_body_world,
            origin: pose.position,
            intrinsics: self.intrinsics,
        }
    }

    /// Pixel coordinates of a world point.
    pub fn project_to_2d(
        &self,
        world_position: &Vector3<f64>,
        pose: &CameraPose,
    ) -> Result<Point2<f64>, GeometryError> {
        self.view(pose).project(world_position)
    }

    /// Intersection of the ray through `pixel` with the support plane.
    pub fn unproject_pixel(
        &self,
        pixel: &Point2<f64>,
        pose: &CameraPose,
    ) -> Result<Vector3<f64>, GeometryError> {
        let view = self.view(pose);
        self.plane.intersect(&view.origin, &view.ray_direction(pixel))
    }

    /// World-frame measurement for the detection's box centre.
    pub fn unproject_to_3d(
        &self,
        detection: &Detection2D,
        pose: &CameraPose,
    ) -> Result<Measurement3D, GeometryError> {
        let position = self.unproject_pixel(&detection.bbox.center(), pose)?;
        Ok(Measurement3D::new(
            position,
            detection.descriptor.clone(),
            detection.id,
        ))
    }

    pub fn project_sphere(
        &self,
        center: &Vector3<f64>,
        radius: f64,
        pose: &CameraPose,
    ) -> Result<BoundingBox, GeometryError> {
        self.view(pose).project_sphere(center, radius)
    }

    /// Convert every detection of one frame. Failures are collected, not fatal.
    pub fn localize_frame(
        &self,
        pose: &CameraPose,
        detections: &[Detection2D],
        timestamp_ns: u64,
    ) -> FrameLocalization {
        let mut out = FrameLocalization::default();
        for det in detections {
            match self.unproject_to_3d(det, pose) {
                Ok(m) => out.measurements.push(m.with_timestamp(timestamp_ns)),
                Err(e) => {
                    debug!("Detection {} dropped: {}", det.id, e);
                    out.failures.push((det.id, e));
                }
            }
        }
        out
    }
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new(
            CameraIntrinsics::default(),
            AxisConvention::default(),
            SupportPlane::default(),
        )
    }
}

/// Result of localizing one frame of detections.
#[derive(Debug, Clone, Default)]
pub struct FrameLocalization {
    pub measurements: Vec<Measurement3D>,
    pub failures: Vec<(MeasurementId, GeometryError)>,
}
