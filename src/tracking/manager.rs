//! Track manager: association, track lifecycle and descriptor queries.
//!
//! The manager exclusively owns every track. Calls are processed one at a
//! time; concurrent producers go through [`FusionSystem`](crate::system::FusionSystem),
//! which serializes them onto a single worker.
//!
//! Association is greedy nearest-neighbour, one measurement at a time in
//! arrival order. Measurements in the same batch may land in the same track.

use nalgebra::Point2;
use tracing::{debug, info, warn};

use crate::config::{FusionConfig, PruningPolicy};
use crate::estimator::{Estimator, ParticleFilter, TrackEstimator};
use crate::geometry::{CameraPose, GeometryError, Localizer};
use crate::target::{CertainTargetDescriptor, Detection2D, Measurement3D, TrackId};

use super::result::{FusionEvent, UpdateReport};
use super::track::{Track, TrackSnapshot};

/// Mixes the track id into the configured seed so each dynamic track draws
/// its own, reproducible random stream.
const SEED_MIX: u64 = 0x9E37_79B9_7F4A_7C15;

pub struct TrackManager {
    config: FusionConfig,
    localizer: Localizer,
    /// Live tracks in creation order.
    tracks: Vec<Track>,
    next_track_id: u64,
    /// Seconds of prediction applied so far.
    clock: f64,
}

impl TrackManager {
    pub fn new(config: FusionConfig) -> Self {
        let localizer = config.camera.localizer();
        Self {
            config,
            localizer,
            tracks: Vec::new(),
            next_track_id: 0,
            clock: 0.0,
        }
    }

    pub fn config(&self) -> &FusionConfig {
        &self.config
    }

    pub fn localizer(&self) -> &Localizer {
        &self.localizer
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Read access
    // ─────────────────────────────────────────────────────────────────────────

    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id() == id)
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn snapshots(&self) -> Vec<TrackSnapshot> {
        self.tracks.iter().map(Track::snapshot).collect()
    }

    /// Best-scoring track for each query descriptor; `None` when there are no tracks.
    ///
    /// Equal scores resolve to the oldest track.
    pub fn estimate_positions(&self, catalog: &[CertainTargetDescriptor]) -> Vec<Option<&Track>> {
        let eps = self.config.association.tie_epsilon;
        catalog
            .iter()
            .map(|query| {
                best_match(self.tracks.iter().map(|t| t.match_score(query)), eps)
                    .map(|i| &self.tracks[i])
            })
            .collect()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Static tracks
    // ─────────────────────────────────────────────────────────────────────────

    /// Associate each localized measurement with the nearest static track
    /// inside the gate, or seed a new track with it.
    pub fn update(&mut self, measurements: &[Measurement3D]) -> UpdateReport {
        let mut report = UpdateReport::new();
        for m in measurements {
            if !m.position.iter().all(|c| c.is_finite()) {
                warn!("Dropping measurement {}: non-finite position", m.id);
                report.push(FusionEvent::GeometryDropped {
                    measurement: m.id,
                    error: GeometryError::NonFinite,
                });
                continue;
            }
            self.associate_measurement(m, &mut report);
        }
        report
    }

    /// Localize one frame of detections, then [`update`](Self::update) with the result.
    pub fn localize_and_update(
        &mut self,
        pose: &CameraPose,
        detections: &[Detection2D],
        timestamp_ns: u64,
    ) -> UpdateReport {
        let frame = self.localizer.localize_frame(pose, detections, timestamp_ns);
        let mut report = UpdateReport::new();
        for (measurement, error) in frame.failures {
            warn!("Dropping detection {}: {}", measurement, error);
            report.push(FusionEvent::GeometryDropped { measurement, error });
        }
        report.extend(self.update(&frame.measurements));
        report
    }

    fn associate_measurement(&mut self, m: &Measurement3D, report: &mut UpdateReport) {
        let gate = self.config.association.gating_distance;
        let eps = self.config.association.tie_epsilon;

        let candidates: Vec<(usize, f64)> = self
            .tracks
            .iter()
            .enumerate()
            .filter(|(_, t)| !t.estimator().is_dynamic())
            .map(|(i, t)| (i, (t.position() - m.position).norm()))
            .filter(|(_, d)| *d <= gate)
            .collect();

        let Some(&(nearest, best)) = candidates.iter().min_by(|a, b| a.1.total_cmp(&b.1)) else {
            let id = self.next_track_id();
            info!("Track {} created from measurement {}", id, m.id);
            self.tracks.push(Track::new_static(id, m, self.clock));
            report.push(FusionEvent::TrackCreated {
                measurement: m.id,
                track: id,
            });
            return;
        };

        // Candidates are in creation order, so the first tie is the oldest track.
        let tied: Vec<usize> = candidates
            .iter()
            .filter(|(_, d)| *d <= best + eps)
            .map(|(i, _)| *i)
            .collect();
        let chosen = tied.first().copied().unwrap_or(nearest);
        let chosen_id = self.tracks[chosen].id();

        if tied.len() > 1 {
            let ids: Vec<TrackId> = tied.iter().map(|i| self.tracks[*i].id()).collect();
            warn!(
                "Measurement {} equally close to {} tracks, assigning to {}",
                m.id,
                ids.len(),
                chosen_id
            );
            report.push(FusionEvent::AssociationAmbiguous {
                measurement: m.id,
                candidates: ids,
                chosen: chosen_id,
            });
        }

        debug!("Measurement {} -> track {} (d = {:.3})", m.id, chosen_id, best);
        let now = self.clock;
        self.tracks[chosen].ingest(m, now);
        report.push(FusionEvent::Associated {
            measurement: m.id,
            track: chosen_id,
        });
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dynamic tracks
    // ─────────────────────────────────────────────────────────────────────────

    /// Feed bounding-box detections to particle-filter tracks.
    ///
    /// Each box goes to the dynamic track whose projected mean is nearest in
    /// pixels, within the pixel gate. Unmatched boxes each start a new track
    /// from the configured prior.
    pub fn update_dynamic(&mut self, pose: &CameraPose, detections: &[Detection2D]) -> UpdateReport {
        let mut report = UpdateReport::new();
        if detections.is_empty() {
            return report;
        }

        let view = self.localizer.view(pose);
        let gate = self.config.association.pixel_gate;
        let eps = self.config.association.tie_epsilon;

        // Projected centres before any of this frame's boxes are applied.
        let projected: Vec<(usize, Point2<f64>)> = self
            .tracks
            .iter()
            .enumerate()
            .filter_map(|(i, t)| match t.estimator() {
                Estimator::Dynamic(pf) => {
                    pf.expected_box(&view).ok().map(|b| (i, b.center()))
                }
                _ => None,
            })
            .collect();

        let mut assigned: Vec<(usize, Vec<&Detection2D>)> = Vec::new();
        for det in detections {
            let center = det.bbox.center();
            let candidates: Vec<(usize, f64)> = projected
                .iter()
                .map(|(i, p)| (*i, (p - center).norm()))
                .filter(|(_, d)| *d <= gate)
                .collect();

            let track_index = match candidates.iter().min_by(|a, b| a.1.total_cmp(&b.1)) {
                Some(&(nearest, best)) => {
                    let tied: Vec<usize> = candidates
                        .iter()
                        .filter(|(_, d)| *d <= best + eps)
                        .map(|(i, _)| *i)
                        .collect();
                    let chosen = tied.first().copied().unwrap_or(nearest);
                    if tied.len() > 1 {
                        let ids: Vec<TrackId> = tied.iter().map(|i| self.tracks[*i].id()).collect();
                        warn!("Detection {} equally close to {} dynamic tracks", det.id, ids.len());
                        report.push(FusionEvent::AssociationAmbiguous {
                            measurement: det.id,
                            candidates: ids,
                            chosen: self.tracks[chosen].id(),
                        });
                    }
                    report.push(FusionEvent::Associated {
                        measurement: det.id,
                        track: self.tracks[chosen].id(),
                    });
                    chosen
                }
                None => {
                    let id = self.next_track_id();
                    let seed = self.config.particle_filter.seed ^ id.0.wrapping_mul(SEED_MIX);
                    let filter = ParticleFilter::from_prior(&self.config.particle_filter, seed);
                    info!("Dynamic track {} created from detection {}", id, det.id);
                    self.tracks.push(Track::new_dynamic(id, filter, self.clock));
                    report.push(FusionEvent::TrackCreated {
                        measurement: det.id,
                        track: id,
                    });
                    self.tracks.len() - 1
                }
            };

            match assigned.iter_mut().find(|(i, _)| *i == track_index) {
                Some((_, dets)) => dets.push(det),
                None => assigned.push((track_index, vec![det])),
            }
        }

        let now = self.clock;
        for (index, dets) in assigned {
            let boxes: Vec<_> = dets.iter().map(|d| d.bbox).collect();
            let track = &mut self.tracks[index];
            let outcome = match track.estimator_mut() {
                Estimator::Dynamic(pf) => pf.update_view(&view, &boxes),
                Estimator::Static(_) => continue,
            };
            if outcome.degenerate {
                report.push(FusionEvent::FilterDegenerate { track: track.id() });
            }
            for det in dets {
                track.record(det.id, &det.descriptor, now);
            }
        }

        report
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Time
    // ─────────────────────────────────────────────────────────────────────────

    /// Advance every dynamic track by `dt` seconds, then apply the pruning policy.
    pub fn predict(&mut self, dt: f64) -> UpdateReport {
        if !(dt > 0.0 && dt.is_finite()) {
            debug!("Ignoring prediction step of {} s", dt);
            return UpdateReport::new();
        }
        for track in self.tracks.iter_mut() {
            if track.estimator().is_dynamic() {
                track.estimator_mut().predict(dt);
            }
        }
        self.clock += dt;
        self.prune()
    }

    /// Remove tracks the pruning policy considers stale.
    pub fn prune(&mut self) -> UpdateReport {
        let mut report = UpdateReport::new();
        let PruningPolicy::IdleFor { seconds } = self.config.association.pruning else {
            return report;
        };
        let clock = self.clock;
        self.tracks.retain(|t| {
            let keep = clock - t.last_update() <= seconds;
            if !keep {
                info!("Pruning track {} idle for {:.1} s", t.id(), clock - t.last_update());
                report.push(FusionEvent::TrackPruned { track: t.id() });
            }
            keep
        });
        report
    }

    fn next_track_id(&mut self) -> TrackId {
        let id = TrackId::new(self.next_track_id);
        self.next_track_id += 1;
        id
    }
}

/// Index of the highest score. Scores within `eps` of the best count as equal
/// and resolve to the earliest index.
pub(crate) fn best_match<I>(scores: I, eps: f64) -> Option<usize>
where
    I: IntoIterator<Item = f64>,
{
    let scores: Vec<f64> = scores.into_iter().collect();
    // NaN or negative tolerance means exact ties only.
    let eps = eps.max(0.0);
    let best = scores.iter().cloned().filter(|s| !s.is_nan()).reduce(f64::max)?;
    scores.iter().position(|s| *s >= best - eps)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AssociationConfig;
    use crate::geometry::{AxisConvention, GimbalAngles, camera_orientation_in_world};
    use crate::target::{
        Alphanumeric, BoundingBox, Color, MeasurementId, ProbabilisticTargetDescriptor, Shape,
    };
    use crate::tracking::TrackKind;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::{UnitQuaternion, Vector3};
    use std::f64::consts::PI;

    fn measurement(frame: u64, x: f64, y: f64) -> Measurement3D {
        Measurement3D::new(
            Vector3::new(x, y, 0.0),
            ProbabilisticTargetDescriptor::uniform(),
            MeasurementId::new(frame, 0),
        )
    }

    fn with_descriptor(mut m: Measurement3D, d: &CertainTargetDescriptor) -> Measurement3D {
        m.descriptor = d.as_probabilistic();
        m
    }

    fn red_triangle_b() -> CertainTargetDescriptor {
        CertainTargetDescriptor::new(Color::Red, Shape::Triangle, Color::White, Alphanumeric::new('B').unwrap())
    }

    fn blue_cross_q() -> CertainTargetDescriptor {
        CertainTargetDescriptor::new(Color::Blue, Shape::Cross, Color::Black, Alphanumeric::new('Q').unwrap())
    }

    fn scenario_measurements() -> Vec<Measurement3D> {
        vec![
            measurement(0, 0.0, 0.0),
            measurement(1, 0.1, 0.0),
            measurement(2, 0.0, 0.1),
            measurement(3, 10.0, 10.0),
            measurement(4, 10.1, 10.0),
        ]
    }

    #[test]
    fn test_gating_scenario_produces_two_tracks() {
        let mut manager = TrackManager::new(FusionConfig::default());
        let report = manager.update(&scenario_measurements());

        assert_eq!(manager.len(), 2);
        assert_eq!(report.incorporated(), 5);
        assert_eq!(report.created_tracks(), vec![TrackId::new(0), TrackId::new(1)]);

        let first = &manager.tracks()[0];
        let second = &manager.tracks()[1];
        assert_eq!(first.measurement_count(), 3);
        assert_eq!(second.measurement_count(), 2);
        assert_eq!(
            first.contributing_ids(),
            &[MeasurementId::new(0, 0), MeasurementId::new(1, 0), MeasurementId::new(2, 0)]
        );
        assert_relative_eq!(first.position(), Vector3::new(0.1 / 3.0, 0.1 / 3.0, 0.0), epsilon = 1e-12);
        assert_relative_eq!(second.position(), Vector3::new(10.05, 10.0, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn test_same_input_same_tracks() {
        let input: Vec<Measurement3D> = scenario_measurements()
            .into_iter()
            .enumerate()
            .map(|(i, m)| {
                if i % 2 == 0 {
                    with_descriptor(m, &red_triangle_b())
                } else {
                    with_descriptor(m, &blue_cross_q())
                }
            })
            .collect();

        let mut a = TrackManager::new(FusionConfig::default());
        let mut b = TrackManager::new(FusionConfig::default());
        for chunk in input.chunks(2) {
            a.update(chunk);
            b.update(chunk);
        }

        assert_eq!(a.len(), 2);
        assert_eq!(a.snapshots(), b.snapshots());
    }

    #[test]
    fn test_query_returns_matching_track() {
        let mut manager = TrackManager::new(FusionConfig::default());
        manager.update(&[
            with_descriptor(measurement(0, 0.0, 0.0), &blue_cross_q()),
            with_descriptor(measurement(1, 20.0, 0.0), &red_triangle_b()),
        ]);

        let found = manager.estimate_positions(&[red_triangle_b(), blue_cross_q()]);
        assert_eq!(found[0].map(Track::id), Some(TrackId::new(1)));
        assert_eq!(found[1].map(Track::id), Some(TrackId::new(0)));
    }

    #[test]
    fn test_query_without_tracks_returns_none() {
        let manager = TrackManager::new(FusionConfig::default());
        let found = manager.estimate_positions(&[red_triangle_b()]);
        assert_eq!(found.len(), 1);
        assert!(found[0].is_none());
    }

    #[test]
    fn test_query_tie_picks_oldest_track() {
        let mut manager = TrackManager::new(FusionConfig::default());
        manager.update(&[measurement(0, 0.0, 0.0), measurement(1, 5.0, 0.0)]);

        let found = manager.estimate_positions(&[red_triangle_b()]);
        assert_eq!(found[0].map(Track::id), Some(TrackId::new(0)));
    }

    #[test]
    fn test_uniform_descriptor_moves_position_not_ranking() {
        let mut manager = TrackManager::new(FusionConfig::default());
        manager.update(&[with_descriptor(measurement(0, 0.0, 0.0), &red_triangle_b())]);
        let before = manager.tracks()[0].fused_descriptor().collapse_to_certain();

        manager.update(&[measurement(1, 0.5, 0.0)]);

        let track = &manager.tracks()[0];
        assert_eq!(track.fused_descriptor().collapse_to_certain(), before);
        assert_relative_eq!(track.position().x, 0.25, epsilon = 1e-12);
    }

    #[test]
    fn test_invalid_descriptor_is_position_only_evidence() {
        let mut manager = TrackManager::new(FusionConfig::default());
        manager.update(&[with_descriptor(measurement(0, 0.0, 0.0), &red_triangle_b())]);

        let mut broken = measurement(1, 0.2, 0.0);
        broken.descriptor.shape.fill(f64::NAN);
        broken.descriptor.alphanumeric.fill(-1.0);
        manager.update(&[broken]);

        let track = &manager.tracks()[0];
        assert!(track.fused_descriptor().is_valid());
        assert_eq!(track.fused_descriptor().collapse_to_certain(), red_triangle_b());
        assert_eq!(track.measurement_count(), 2);
    }

    #[test]
    fn test_equidistant_measurement_is_ambiguous() {
        let mut manager = TrackManager::new(FusionConfig::default());
        manager.update(&[measurement(0, -0.8, 0.0), measurement(1, 0.8, 0.0)]);
        assert_eq!(manager.len(), 2);

        let report = manager.update(&[measurement(2, 0.0, 0.0)]);

        assert_eq!(report.ambiguous_count(), 1);
        assert_eq!(
            report.events[0],
            FusionEvent::AssociationAmbiguous {
                measurement: MeasurementId::new(2, 0),
                candidates: vec![TrackId::new(0), TrackId::new(1)],
                chosen: TrackId::new(0),
            }
        );
        assert_eq!(manager.tracks()[0].measurement_count(), 2);
        assert_eq!(manager.tracks()[1].measurement_count(), 1);
    }

    #[test]
    fn test_gating_distance_is_configurable() {
        let config = FusionConfig {
            association: AssociationConfig {
                gating_distance: 20.0,
                ..Default::default()
            },
            ..Default::default()
        };
        let mut manager = TrackManager::new(config);
        manager.update(&scenario_measurements());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_tracks_never_pruned_by_default() {
        let mut manager = TrackManager::new(FusionConfig::default());
        manager.update(&[measurement(0, 0.0, 0.0)]);

        let report = manager.predict(1.0e6);
        assert!(report.is_empty());
        assert_eq!(manager.len(), 1);
    }

    #[test]
    fn test_idle_tracks_pruned() {
        let config = FusionConfig {
            association: AssociationConfig {
                pruning: PruningPolicy::IdleFor { seconds: 1.5 },
                ..Default::default()
            },
            ..Default::default()
        };
        let mut manager = TrackManager::new(config);
        manager.update(&[measurement(0, 0.0, 0.0), measurement(1, 5.0, 0.0)]);

        manager.predict(1.0);
        manager.update(&[measurement(2, 5.0, 0.1)]);
        let report = manager.predict(1.0);

        assert_eq!(report.pruned_tracks(), vec![TrackId::new(0)]);
        assert_eq!(manager.len(), 1);
        assert_eq!(manager.tracks()[0].id(), TrackId::new(1));
        assert_relative_eq!(manager.clock(), 2.0);

        // Ids are never reused.
        manager.update(&[measurement(3, 0.0, 0.0)]);
        assert_eq!(manager.tracks()[1].id(), TrackId::new(2));
    }

    #[test]
    fn test_non_positive_predict_is_ignored() {
        let mut manager = TrackManager::new(FusionConfig::default());
        manager.predict(-1.0);
        manager.predict(f64::NAN);
        assert_relative_eq!(manager.clock(), 0.0);
    }

    #[test]
    fn test_localize_and_update_drops_unlocalizable() {
        let mut manager = TrackManager::new(FusionConfig::default());
        // Nadir camera 30 m up.
        let rotation = camera_orientation_in_world(
            &UnitQuaternion::identity(),
            &GimbalAngles::new(0.0, 90.0, 0.0),
        );
        let nadir = CameraPose::new(Vector3::new(2.0, 3.0, 30.0), rotation);
        let level = CameraPose::new(Vector3::new(0.0, 0.0, 30.0), UnitQuaternion::identity());
        let det = Detection2D {
            bbox: BoundingBox::new(960.0, 540.0, 30.0, 30.0),
            descriptor: red_triangle_b().as_probabilistic(),
            id: MeasurementId::new(9, 0),
        };

        let dropped = manager.localize_and_update(&level, std::slice::from_ref(&det), 0);
        assert_eq!(dropped.dropped().len(), 1);
        assert!(manager.is_empty());

        let report = manager.localize_and_update(&nadir, &[det], 0);
        assert_eq!(report.created_tracks(), vec![TrackId::new(0)]);
        assert_relative_eq!(manager.tracks()[0].position(), Vector3::new(2.0, 3.0, 0.0), epsilon = 1e-9);
    }

    #[test]
    fn test_best_match_ties() {
        assert_eq!(best_match(Vec::<f64>::new(), 0.0), None);
        assert_eq!(best_match(vec![0.5, 2.0, 2.0], 0.0), Some(1));
        assert_eq!(best_match(vec![1.0, 1.0 + 1e-12], 1e-9), Some(0));
        assert_eq!(best_match(vec![f64::NAN, 0.1], 0.0), Some(1));
        assert_eq!(best_match(vec![0.5, 2.0], -1.0), Some(1));
        assert_eq!(best_match(vec![0.5, 2.0], f64::NAN), Some(1));
    }

    #[test]
    fn test_non_finite_measurement_is_dropped() {
        let mut manager = TrackManager::new(FusionConfig::default());
        let mut bad = measurement(0, f64::NAN, 0.0);
        bad.position.z = f64::INFINITY;
        let report = manager.update(&[bad, measurement(1, 0.0, 0.0)]);

        assert_eq!(manager.len(), 1);
        assert_eq!(report.dropped(), vec![(MeasurementId::new(0, 0), GeometryError::NonFinite)]);
        assert_eq!(report.incorporated(), 1);
        assert_eq!(manager.tracks()[0].contributing_ids(), &[MeasurementId::new(1, 0)]);
        assert_relative_eq!(manager.tracks()[0].position(), Vector3::zeros());
    }

    #[test]
    fn test_unvalidated_tie_epsilon_does_not_panic() {
        for eps in [-1.0, f64::NAN] {
            let config = FusionConfig {
                association: AssociationConfig {
                    tie_epsilon: eps,
                    ..Default::default()
                },
                ..Default::default()
            };
            let mut manager = TrackManager::new(config);
            manager.update(&scenario_measurements());
            assert_eq!(manager.len(), 2);
            assert!(manager.estimate_positions(&[red_triangle_b()])[0].is_some());
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Dynamic tracks
    // ─────────────────────────────────────────────────────────────────────────

    /// Camera whose body axes are the optical axes.
    fn optical_config() -> FusionConfig {
        let mut config = FusionConfig::default();
        config.camera.convention = AxisConvention::new(Vector3::z(), -Vector3::y()).unwrap();
        config
    }

    fn circling_pose(i: usize, n: usize) -> CameraPose {
        let phi = 2.0 * PI * i as f64 / n as f64;
        CameraPose::new(
            Vector3::new(10.0 * phi.sin(), 0.0, -10.0 * phi.cos()),
            UnitQuaternion::from_euler_angles(0.0, -phi, 0.0),
        )
    }

    #[test]
    fn test_dynamic_target_tracked_through_manager() {
        let mut manager = TrackManager::new(optical_config());
        let descriptor = blue_cross_q();

        for i in 0..20 {
            manager.predict(0.5);
            let pose = circling_pose(i, 20);
            let bbox = manager
                .localizer()
                .project_sphere(&Vector3::zeros(), 0.35, &pose)
                .unwrap();
            let det = Detection2D {
                bbox,
                descriptor: descriptor.as_probabilistic(),
                id: MeasurementId::new(i as u64, 0),
            };
            let report = manager.update_dynamic(&pose, &[det]);
            assert!(!report.has_degenerate_filter());
        }

        assert_eq!(manager.len(), 1);
        let track = &manager.tracks()[0];
        assert_eq!(track.kind(), TrackKind::Dynamic);
        assert_eq!(track.measurement_count(), 20);
        assert_abs_diff_eq!(track.position(), Vector3::zeros(), epsilon = 0.1);
        assert!(track.velocity().is_some());
        assert_eq!(manager.estimate_positions(&[descriptor])[0].map(Track::id), Some(track.id()));
    }

    #[test]
    fn test_far_box_spawns_second_dynamic_track() {
        let mut manager = TrackManager::new(optical_config());
        let pose = circling_pose(0, 20);
        let det = |x: f64, frame: u64| Detection2D {
            bbox: BoundingBox::new(x, 540.0, 60.0, 60.0),
            descriptor: ProbabilisticTargetDescriptor::uniform(),
            id: MeasurementId::new(frame, 0),
        };

        manager.update_dynamic(&pose, &[det(960.0, 0)]);
        let report = manager.update_dynamic(&pose, &[det(1800.0, 1), det(965.0, 2)]);

        assert_eq!(manager.len(), 2);
        assert_eq!(report.created_tracks(), vec![TrackId::new(1)]);
        assert_eq!(
            manager.tracks()[0].contributing_ids(),
            &[MeasurementId::new(0, 0), MeasurementId::new(2, 0)]
        );
    }

    #[test]
    fn test_static_update_ignores_dynamic_tracks() {
        let mut manager = TrackManager::new(optical_config());
        let pose = circling_pose(0, 20);
        manager.update_dynamic(
            &pose,
            &[Detection2D {
                bbox: BoundingBox::new(960.0, 540.0, 60.0, 60.0),
                descriptor: ProbabilisticTargetDescriptor::uniform(),
                id: MeasurementId::new(0, 0),
            }],
        );
        let dynamic_position = manager.tracks()[0].position();

        let report = manager.update(&[Measurement3D::new(
            dynamic_position,
            ProbabilisticTargetDescriptor::uniform(),
            MeasurementId::new(1, 0),
        )]);

        assert_eq!(report.created_tracks(), vec![TrackId::new(1)]);
        assert_eq!(manager.len(), 2);
    }
}
