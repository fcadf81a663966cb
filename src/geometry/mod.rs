//! Geometry: camera model, mounting conventions and monocular localization.

pub mod camera;
pub mod frames;
pub mod localizer;
pub mod pose;

pub use camera::CameraIntrinsics;
pub use frames::{AxisConvention, GimbalAngles, camera_orientation_in_world};
pub use localizer::{
    CameraView, FrameLocalization, GeometryError, Localizer, SupportPlane, WorldAxis,
};
pub use pose::{CameraPose, TimedPose};
