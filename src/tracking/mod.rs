//! Track management: turns measurements into persistent, queryable tracks.
//!
//! - [`TrackManager`] associates measurements with tracks (or spawns new
//!   ones), runs prediction ticks and answers catalog queries.
//! - [`Track`] holds one target's estimator, fused descriptor and provenance.
//! - [`UpdateReport`] lists what each call did, including recovered errors.

pub mod manager;
pub mod result;
pub mod track;

pub use manager::TrackManager;
pub use result::{FusionEvent, UpdateReport};
pub use track::{Track, TrackKind, TrackSnapshot};
