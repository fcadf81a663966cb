//! Fusion service orchestration and thread management.
//!
//! This module contains the `FusionSystem` that owns the single writer thread
//! around the track manager, along with the shared snapshot, inter-thread
//! messages and the freshest-value pose plumbing used by producers.

pub mod buffer;
pub mod messages;
pub mod pose_provider;
pub mod pubsub;
pub mod shared_state;
mod fusion_system;

pub use buffer::FreshestBuffer;
pub use fusion_system::FusionSystem;
pub use messages::FusionCommand;
pub use pose_provider::PoseProvider;
pub use pubsub::{Broadcaster, Subscription};
pub use shared_state::SharedState;
