//! Pinhole camera intrinsics.
//!
//! Square pixels, no skew and no distortion; the principal point sits at the
//! image centre. The focal length is either given directly in pixels or derived
//! from the horizontal field of view (optionally scaled by a zoom level).

use nalgebra::{Point2, Vector3};
use serde::{Deserialize, Serialize};

/// Points closer than this along the optical axis do not project.
pub const MIN_DEPTH: f64 = 1e-9;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub width: u32,
    pub height: u32,
    /// Focal length in pixels (fx = fy).
    pub focal_px: f64,
}

impl CameraIntrinsics {
    pub fn from_focal_length(focal_px: f64, width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            focal_px,
        }
    }

    /// `f = W / (2 tan(fov / 2))`.
    pub fn from_horizontal_fov(hfov_deg: f64, width: u32, height: u32) -> Self {
        let focal_px = width as f64 / (2.0 * (0.5 * hfov_deg.to_radians()).tan());
        Self::from_focal_length(focal_px, width, height)
    }

    /// Zoomed lens whose 1x field of view is `base_hfov_deg`.
    pub fn from_zoom_level(zoom: f64, base_hfov_deg: f64, width: u32, height: u32) -> Self {
        let base = Self::from_horizontal_fov(base_hfov_deg, width, height);
        Self::from_focal_length(zoom * base.focal_px, width, height)
    }

    pub fn cx(&self) -> f64 {
        self.width as f64 / 2.0
    }

    pub fn cy(&self) -> f64 {
        self.height as f64 / 2.0
    }

    pub fn principal_point(&self) -> Point2<f64> {
        Point2::new(self.cx(), self.cy())
    }

    pub fn horizontal_fov_deg(&self) -> f64 {
        (2.0 * (self.width as f64 / (2.0 * self.focal_px)).atan()).to_degrees()
    }

    /// Project a point in the optical frame. `None` when it is not in front of the lens.
    pub fn project(&self, p_cam: &Vector3<f64>) -> Option<Point2<f64>> {
        if p_cam.z <= MIN_DEPTH {
            return None;
        }
        let inv_z = 1.0 / p_cam.z;
        Some(Point2::new(
            self.focal_px * p_cam.x * inv_z + self.cx(),
            self.focal_px * p_cam.y * inv_z + self.cy(),
        ))
    }

    /// Viewing ray through a pixel, in the optical frame, with z = 1.
    pub fn ray(&self, pixel: &Point2<f64>) -> Vector3<f64> {
        Vector3::new(
            (pixel.x - self.cx()) / self.focal_px,
            (pixel.y - self.cy()) / self.focal_px,
            1.0,
        )
    }

    pub fn contains(&self, pixel: &Point2<f64>) -> bool {
        pixel.x >= 0.0
            && pixel.y >= 0.0
            && pixel.x < self.width as f64
            && pixel.y < self.height as f64
    }
}

impl Default for CameraIntrinsics {
    /// 1920x1080 with a 90° horizontal field of view.
    fn default() -> Self {
        Self::from_horizontal_fov(90.0, 1920, 1080)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_focal_from_fov() {
        let k = CameraIntrinsics::from_horizontal_fov(90.0, 1920, 1080);
        assert_relative_eq!(k.focal_px, 960.0, epsilon = 1e-9);
        assert_relative_eq!(k.horizontal_fov_deg(), 90.0, epsilon = 1e-9);
        assert_eq!(k.principal_point(), Point2::new(960.0, 540.0));
    }

    #[test]
    fn test_zoom_scales_focal() {
        let k = CameraIntrinsics::from_zoom_level(2.5, 90.0, 1920, 1080);
        assert_relative_eq!(k.focal_px, 2400.0, epsilon = 1e-9);
    }

    #[test]
    fn test_project_ray_round_trip() {
        let k = CameraIntrinsics::default();
        let p = Vector3::new(0.4, -0.2, 3.0);

        let pixel = k.project(&p).unwrap();
        let ray = k.ray(&pixel);
        assert_relative_eq!(ray * p.z, p, epsilon = 1e-12);
    }

    #[test]
    fn test_behind_lens_does_not_project() {
        let k = CameraIntrinsics::default();
        assert!(k.project(&Vector3::new(0.0, 0.0, -1.0)).is_none());
        assert!(k.project(&Vector3::new(1.0, 0.0, 0.0)).is_none());
    }

    #[test]
    fn test_contains() {
        let k = CameraIntrinsics::default();
        assert!(k.contains(&Point2::new(0.0, 0.0)));
        assert!(!k.contains(&Point2::new(1920.0, 10.0)));
        assert!(!k.contains(&Point2::new(10.0, -0.5)));
    }
}
