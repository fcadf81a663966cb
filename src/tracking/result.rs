//! Per-call results and diagnostics of the track manager.
//!
//! Nothing the manager does is fatal. Dropped measurements, ambiguous
//! associations and collapsed particle weights are recovered on the spot and
//! reported here, so the caller decides what to log or ignore.

use crate::geometry::GeometryError;
use crate::target::{MeasurementId, TrackId};

/// Something noteworthy that happened while processing one call.
#[derive(Debug, Clone, PartialEq)]
pub enum FusionEvent {
    /// The measurement joined an existing track.
    Associated {
        measurement: MeasurementId,
        track: TrackId,
    },
    /// The measurement seeded a new track.
    TrackCreated {
        measurement: MeasurementId,
        track: TrackId,
    },
    /// The detection could not be localized and was dropped for this frame.
    GeometryDropped {
        measurement: MeasurementId,
        error: GeometryError,
    },
    /// Several tracks were equally close; `chosen` is the oldest of them.
    AssociationAmbiguous {
        measurement: MeasurementId,
        candidates: Vec<TrackId>,
        chosen: TrackId,
    },
    /// A particle filter lost all weight and was reset to uniform weights.
    FilterDegenerate { track: TrackId },
    TrackPruned { track: TrackId },
}

/// Events of one manager call, in the order they happened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateReport {
    pub events: Vec<FusionEvent>,
}

impl UpdateReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: FusionEvent) {
        self.events.push(event);
    }

    pub fn extend(&mut self, other: UpdateReport) {
        self.events.extend(other.events);
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn created_tracks(&self) -> Vec<TrackId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                FusionEvent::TrackCreated { track, .. } => Some(*track),
                _ => None,
            })
            .collect()
    }

    pub fn pruned_tracks(&self) -> Vec<TrackId> {
        self.events
            .iter()
            .filter_map(|e| match e {
                FusionEvent::TrackPruned { track } => Some(*track),
                _ => None,
            })
            .collect()
    }

    /// Number of measurements that ended up in a track (new or existing).
    pub fn incorporated(&self) -> usize {
        self.events
            .iter()
            .filter(|e| {
                matches!(
                    e,
                    FusionEvent::Associated { .. } | FusionEvent::TrackCreated { .. }
                )
            })
            .count()
    }

    pub fn dropped(&self) -> Vec<(MeasurementId, GeometryError)> {
        self.events
            .iter()
            .filter_map(|e| match e {
                FusionEvent::GeometryDropped { measurement, error } => Some((*measurement, *error)),
                _ => None,
            })
            .collect()
    }

    pub fn ambiguous_count(&self) -> usize {
        self.events
            .iter()
            .filter(|e| matches!(e, FusionEvent::AssociationAmbiguous { .. }))
            .count()
    }

    pub fn has_degenerate_filter(&self) -> bool {
        self.events
            .iter()
            .any(|e| matches!(e, FusionEvent::FilterDegenerate { .. }))
    }
}
