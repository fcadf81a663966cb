//! Logs for offline inspection and deterministic replay.

pub mod frame_log;
pub mod pose_log;

pub use frame_log::{FrameLogWriter, FrameRecord, parse_frame_log, read_frame_log, replay};
pub use pose_log::{PoseLogWriter, parse_pose_log, read_pose_log};
