//! A persistent target estimate built from many measurements.

use nalgebra::{Matrix3, Vector3};
use serde::{Deserialize, Serialize};

use crate::estimator::{DescriptorFusion, Estimator, ParticleFilter, StaticFusion, TrackEstimator};
use crate::target::{CertainTargetDescriptor, Measurement3D, MeasurementId, ProbabilisticTargetDescriptor, TrackId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrackKind {
    Static,
    Dynamic,
}

/// One target: kinematic estimate, fused class evidence and provenance.
///
/// Only the [`TrackManager`](super::TrackManager) creates and mutates tracks.
#[derive(Debug, Clone)]
pub struct Track {
    id: TrackId,
    estimator: Estimator,
    descriptors: DescriptorFusion,
    /// Contributing measurements, in the order they were fused.
    contributing: Vec<MeasurementId>,
    /// Manager clock (seconds) at creation and at the last fused measurement.
    created_at: f64,
    last_update: f64,
}

impl Track {
    pub(crate) fn new_static(id: TrackId, measurement: &Measurement3D, now: f64) -> Self {
        let mut descriptors = DescriptorFusion::new();
        descriptors.add(&measurement.descriptor);
        Self {
            id,
            estimator: Estimator::Static(StaticFusion::new(
                measurement.position,
                measurement.confidence,
            )),
            descriptors,
            contributing: vec![measurement.id],
            created_at: now,
            last_update: now,
        }
    }

    pub(crate) fn new_dynamic(id: TrackId, filter: ParticleFilter, now: f64) -> Self {
        Self {
            id,
            estimator: Estimator::Dynamic(Box::new(filter)),
            descriptors: DescriptorFusion::new(),
            contributing: Vec::new(),
            created_at: now,
            last_update: now,
        }
    }

    /// Fuse a localized measurement into a static track.
    pub(crate) fn ingest(&mut self, measurement: &Measurement3D, now: f64) {
        if let Estimator::Static(fusion) = &mut self.estimator {
            fusion.ingest(&measurement.position, measurement.confidence);
        }
        self.record(measurement.id, &measurement.descriptor, now);
    }

    /// Record class evidence and provenance without touching kinematics.
    pub(crate) fn record(
        &mut self,
        id: MeasurementId,
        descriptor: &ProbabilisticTargetDescriptor,
        now: f64,
    ) {
        self.descriptors.add(descriptor);
        self.contributing.push(id);
        self.last_update = now;
    }

    pub(crate) fn estimator_mut(&mut self) -> &mut Estimator {
        &mut self.estimator
    }

    pub fn id(&self) -> TrackId {
        self.id
    }

    pub fn kind(&self) -> TrackKind {
        if self.estimator.is_dynamic() {
            TrackKind::Dynamic
        } else {
            TrackKind::Static
        }
    }

    pub fn estimator(&self) -> &Estimator {
        &self.estimator
    }

    pub fn position(&self) -> Vector3<f64> {
        self.estimator.position()
    }

    pub fn position_covariance(&self) -> Matrix3<f64> {
        self.estimator.position_covariance()
    }

    pub fn velocity(&self) -> Option<Vector3<f64>> {
        self.estimator.velocity()
    }

    pub fn size(&self) -> Option<f64> {
        self.estimator.size()
    }

    /// Normalized mean of all contributed descriptors.
    pub fn fused_descriptor(&self) -> ProbabilisticTargetDescriptor {
        self.descriptors.fused()
    }

    pub fn contributing_ids(&self) -> &[MeasurementId] {
        &self.contributing
    }

    pub fn measurement_count(&self) -> usize {
        self.contributing.len()
    }

    pub fn created_at(&self) -> f64 {
        self.created_at
    }

    pub fn last_update(&self) -> f64 {
        self.last_update
    }

    pub fn current_estimate(&self) -> (Vector3<f64>, ProbabilisticTargetDescriptor, &[MeasurementId]) {
        (self.position(), self.fused_descriptor(), &self.contributing)
    }

    pub fn match_score(&self, query: &CertainTargetDescriptor) -> f64 {
        self.descriptors.sum().match_score(query)
    }

    pub fn snapshot(&self) -> TrackSnapshot {
        TrackSnapshot {
            id: self.id,
            kind: self.kind(),
            position: self.position(),
            position_covariance: self.position_covariance(),
            velocity: self.velocity(),
            size: self.size(),
            descriptor: self.fused_descriptor(),
            contributing: self.contributing.clone(),
            created_at: self.created_at,
            last_update: self.last_update,
        }
    }
}

/// Immutable copy of a track, safe to hand to readers on other threads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub id: TrackId,
    pub kind: TrackKind,
    pub position: Vector3<f64>,
    pub position_covariance: Matrix3<f64>,
    pub velocity: Option<Vector3<f64>>,
    pub size: Option<f64>,
    pub descriptor: ProbabilisticTargetDescriptor,
    pub contributing: Vec<MeasurementId>,
    pub created_at: f64,
    pub last_update: f64,
}

impl TrackSnapshot {
    pub fn match_score(&self, query: &CertainTargetDescriptor) -> f64 {
        self.descriptor.match_score(query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::target::{Alphanumeric, Color, Shape};
    use approx::assert_relative_eq;

    fn measurement(frame: u64, x: f64, descriptor: ProbabilisticTargetDescriptor) -> Measurement3D {
        Measurement3D::new(Vector3::new(x, 0.0, 0.0), descriptor, MeasurementId::new(frame, 0))
    }

    #[test]
    fn test_static_track_estimate() {
        let query = CertainTargetDescriptor::new(
            Color::Blue,
            Shape::Star,
            Color::Black,
            Alphanumeric::new('7').unwrap(),
        );
        let mut track = Track::new_static(TrackId::new(3), &measurement(0, 1.0, query.as_probabilistic()), 0.0);
        track.ingest(&measurement(1, 2.0, ProbabilisticTargetDescriptor::uniform()), 0.5);

        let (position, descriptor, ids) = track.current_estimate();
        assert_relative_eq!(position.x, 1.5, epsilon = 1e-12);
        assert_eq!(descriptor.collapse_to_certain(), query);
        assert_eq!(ids, &[MeasurementId::new(0, 0), MeasurementId::new(1, 0)]);
        assert_eq!(track.kind(), TrackKind::Static);
        assert_relative_eq!(track.last_update(), 0.5);
        assert!(track.velocity().is_none());
    }

    #[test]
    fn test_snapshot_matches_track() {
        let track = Track::new_static(
            TrackId::new(1),
            &measurement(4, -2.0, ProbabilisticTargetDescriptor::uniform()),
            1.0,
        );
        let snap = track.snapshot();

        assert_eq!(snap.id, track.id());
        assert_eq!(snap.position, track.position());
        assert_eq!(snap.contributing, track.contributing_ids());
        assert_eq!(snap.kind, TrackKind::Static);

        let json = serde_json::to_string(&snap).unwrap();
        let back: TrackSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, snap.id);
        assert_eq!(back.contributing, snap.contributing);
    }
}
