//! Particle filter for maneuvering targets seen only through bounding boxes.
//!
//! Each particle hypothesizes a target position, velocity and physical radius.
//! The observation model projects the hypothesized sphere through the camera
//! and compares the expected box with the observed one:
//!
//! ```text
//! ln L = -½ [ (Δu² + Δv²) / σ_c²  +  Δr² / σ_r² ]
//! ```
//!
//! With several boxes the likelihood is the mixture over boxes.
//!
//! # Progressive correction
//!
//! A single box pins a hypothesis to a narrow cone, so from a broad prior
//! almost no particle lands inside the likelihood. The correction is therefore
//! applied in tempered stages `L^Δβ` with `Σ Δβ = 1`, each `Δβ` chosen by
//! bisection so the effective sample size stays at the resample threshold.
//! Between stages the ensemble is resampled and regularized with a Gaussian
//! kernel whose covariance is the ensemble covariance (shrunk towards the mean
//! so the spread is preserved).

use nalgebra::{Matrix3, SMatrix, Vector3};
use rand::distributions::{Distribution, WeightedIndex};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use tracing::{debug, warn};

use super::TrackEstimator;
use super::motion_model::{MIN_SIZE, MotionModel, StateVector, TargetState, gaussian_vector};
use super::weights::{effective_sample_size, normalize_log_weights};
use crate::config::ParticleFilterConfig;
use crate::geometry::{CameraPose, CameraView, GeometryError, Localizer};
use crate::target::BoundingBox;

pub type StateCovariance = SMatrix<f64, 7, 7>;

const BISECTION_ITERS: usize = 50;
/// Smallest tempering step, as a fraction of what is left.
const MIN_STEP_FRACTION: f64 = 1e-6;
/// Variance added to the kernel covariance before factorizing it.
const KERNEL_VARIANCE_FLOOR: f64 = 1e-12;

// ============================================================================
// Observation model
// ============================================================================

/// Gaussian likelihood of an observed box given the expected one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxLikelihood {
    pub center_sigma_px: f64,
    pub radius_sigma_px: f64,
}

impl BoxLikelihood {
    pub fn new(center_sigma_px: f64, radius_sigma_px: f64) -> Self {
        Self {
            center_sigma_px,
            radius_sigma_px,
        }
    }

    pub fn log_likelihood(&self, expected: &BoundingBox, observed: &BoundingBox) -> f64 {
        let du = (observed.x - expected.x) / self.center_sigma_px;
        let dv = (observed.y - expected.y) / self.center_sigma_px;
        let dr = (observed.radius() - expected.radius()) / self.radius_sigma_px;
        -0.5 * (du * du + dv * dv + dr * dr)
    }

    /// `ln Σ_j L(observed_j | expected)`.
    pub fn mixture_log_likelihood(&self, expected: &BoundingBox, observed: &[BoundingBox]) -> f64 {
        let max = observed
            .iter()
            .map(|b| self.log_likelihood(expected, b))
            .fold(f64::NEG_INFINITY, f64::max);
        if !max.is_finite() {
            return f64::NEG_INFINITY;
        }
        let sum: f64 = observed
            .iter()
            .map(|b| (self.log_likelihood(expected, b) - max).exp())
            .sum();
        max + sum.ln()
    }
}

/// What one call to [`ParticleFilter::update`] did.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FilterUpdate {
    /// Tempering stages used (0 when there was nothing to correct with).
    pub stages: usize,
    pub resampled: bool,
    /// Every particle had zero likelihood; weights were reset to uniform.
    pub degenerate: bool,
    /// Effective sample size after the update.
    pub ess: f64,
}

// ============================================================================
// Filter
// ============================================================================

#[derive(Debug, Clone)]
pub struct ParticleFilter {
    particles: Vec<TargetState>,
    weights: Vec<f64>,
    motion: MotionModel,
    likelihood: BoxLikelihood,
    resample_threshold: f64,
    max_stages: usize,
    rng: StdRng,
}

impl ParticleFilter {
    /// Draw `num_particles` hypotheses from the configured prior: uniform over
    /// the prior box and the size range, zero-mean Gaussian velocity.
    pub fn from_prior(config: &ParticleFilterConfig, seed: u64) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let center = config.prior_center();
        let half = config.prior_half_extent();
        let n = config.num_particles.max(1);

        let mut particles = Vec::with_capacity(n);
        for _ in 0..n {
            let offset = Vector3::new(
                symmetric_uniform(&mut rng, half.x),
                symmetric_uniform(&mut rng, half.y),
                symmetric_uniform(&mut rng, half.z),
            );
            let u: f64 = rng.gen();
            let size = config.size_min + u * (config.size_max - config.size_min);
            particles.push(TargetState::new(
                center + offset,
                gaussian_vector(&mut rng) * config.initial_velocity_std,
                size.max(MIN_SIZE),
            ));
        }

        Self::with_particles(particles, config, rng)
    }

    /// Start from explicit hypotheses with equal weights. `None` if empty.
    pub fn from_particles(
        particles: Vec<TargetState>,
        config: &ParticleFilterConfig,
        seed: u64,
    ) -> Option<Self> {
        if particles.is_empty() {
            return None;
        }
        Some(Self::with_particles(particles, config, StdRng::seed_from_u64(seed)))
    }

    fn with_particles(particles: Vec<TargetState>, config: &ParticleFilterConfig, rng: StdRng) -> Self {
        let n = particles.len();
        Self {
            particles,
            weights: vec![1.0 / n as f64; n],
            motion: MotionModel::from_config(config),
            likelihood: BoxLikelihood::new(config.center_sigma_px, config.radius_sigma_px),
            resample_threshold: config.resample_threshold,
            max_stages: config.max_annealing_stages.max(1),
            rng,
        }
    }

    /// Particle count. Fixed for the lifetime of the filter.
    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }

    pub fn particles(&self) -> &[TargetState] {
        &self.particles
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn effective_sample_size(&self) -> f64 {
        effective_sample_size(&self.weights)
    }

    /// Propagate every particle through the motion model. Never resamples.
    pub fn predict(&mut self, dt: f64) {
        for p in self.particles.iter_mut() {
            self.motion.propagate(p, dt, &mut self.rng);
        }
    }

    pub fn update(
        &mut self,
        localizer: &Localizer,
        pose: &CameraPose,
        boxes: &[BoundingBox],
    ) -> FilterUpdate {
        self.update_view(&localizer.view(pose), boxes)
    }

    /// Correct with the boxes seen from `view`. No boxes leaves the filter untouched.
    pub fn update_view(&mut self, view: &CameraView, boxes: &[BoundingBox]) -> FilterUpdate {
        let mut outcome = FilterUpdate {
            ess: self.effective_sample_size(),
            ..Default::default()
        };
        if boxes.is_empty() {
            return outcome;
        }

        let target_ess = self.resample_threshold * self.len() as f64;
        let mut loglik = self.log_likelihoods(view, boxes);
        let mut remaining = 1.0;

        while remaining > 0.0 {
            outcome.stages += 1;
            let (step, weights) = if outcome.stages >= self.max_stages {
                (remaining, self.tempered_weights(&loglik, remaining))
            } else {
                self.choose_step(&loglik, remaining, target_ess)
            };

            let Some(weights) = weights else {
                warn!(
                    "Particle weights collapsed at stage {}, reweighting uniformly",
                    outcome.stages
                );
                self.reset_weights();
                outcome.degenerate = true;
                break;
            };
            self.weights = weights;
            remaining -= step;

            if remaining <= 0.0 {
                if self.effective_sample_size() < target_ess {
                    self.resample();
                    outcome.resampled = true;
                }
                break;
            }

            self.resample();
            outcome.resampled = true;
            loglik = self.log_likelihoods(view, boxes);
        }

        outcome.ess = self.effective_sample_size();
        debug!(
            "Particle update: {} box(es), {} stage(s), ESS {:.1}/{}",
            boxes.len(),
            outcome.stages,
            outcome.ess,
            self.len()
        );
        outcome
    }

    /// Weighted mean state.
    pub fn mean(&self) -> TargetState {
        TargetState::from_vector(&self.mean_vector())
    }

    /// Weighted covariance over `[x, y, z, vx, vy, vz, r]`.
    pub fn covariance(&self) -> StateCovariance {
        let mean = self.mean_vector();
        let mut cov = StateCovariance::zeros();
        for (p, w) in self.particles.iter().zip(&self.weights) {
            let d = p.to_vector() - mean;
            cov += d * d.transpose() * *w;
        }
        cov
    }

    /// Box the mean hypothesis would produce.
    pub fn expected_box(&self, view: &CameraView) -> Result<BoundingBox, GeometryError> {
        let mean = self.mean();
        view.project_sphere(&mean.position, mean.size)
    }

    fn mean_vector(&self) -> StateVector {
        self.particles
            .iter()
            .zip(&self.weights)
            .fold(StateVector::zeros(), |acc, (p, w)| acc + p.to_vector() * *w)
    }

    fn log_likelihoods(&self, view: &CameraView, boxes: &[BoundingBox]) -> Vec<f64> {
        self.particles
            .iter()
            .map(|p| match view.project_sphere(&p.position, p.size) {
                Ok(expected) => self.likelihood.mixture_log_likelihood(&expected, boxes),
                Err(_) => f64::NEG_INFINITY,
            })
            .collect()
    }

    /// Current weights times `L^step`, normalized. `None` if nothing survives.
    fn tempered_weights(&self, loglik: &[f64], step: f64) -> Option<Vec<f64>> {
        let log_w: Vec<f64> = self
            .weights
            .iter()
            .zip(loglik)
            .map(|(w, l)| {
                if *w <= 0.0 || !l.is_finite() {
                    f64::NEG_INFINITY
                } else {
                    w.ln() + step * l
                }
            })
            .collect();
        normalize_log_weights(&log_w)
    }

    /// Largest step (up to `remaining`) keeping the ESS at or above `target_ess`.
    fn choose_step(
        &self,
        loglik: &[f64],
        remaining: f64,
        target_ess: f64,
    ) -> (f64, Option<Vec<f64>>) {
        let full = match self.tempered_weights(loglik, remaining) {
            Some(w) => w,
            None => return (remaining, None),
        };
        if effective_sample_size(&full) >= target_ess {
            return (remaining, Some(full));
        }

        let mut lo = 0.0;
        let mut hi = remaining;
        for _ in 0..BISECTION_ITERS {
            let mid = 0.5 * (lo + hi);
            let keeps_ess = self
                .tempered_weights(loglik, mid)
                .is_some_and(|w| effective_sample_size(&w) >= target_ess);
            if keeps_ess {
                lo = mid;
            } else {
                hi = mid;
            }
        }

        let step = f64::max(lo, remaining * MIN_STEP_FRACTION);
        (step, self.tempered_weights(loglik, step))
    }

    /// Multinomial resampling followed by kernel regularization.
    fn resample(&mut self) {
        let n = self.particles.len();
        let mean = self.mean_vector();
        let kernel = kernel_factor(&self.covariance());

        let index = match WeightedIndex::new(&self.weights) {
            Ok(index) => index,
            Err(e) => {
                warn!("Cannot resample particles: {}", e);
                self.reset_weights();
                return;
            }
        };

        let h = kernel_bandwidth(n);
        let shrink = (1.0 - h * h).sqrt();
        let mut resampled = Vec::with_capacity(n);
        for _ in 0..n {
            let ancestor = self.particles[index.sample(&mut self.rng)].to_vector();
            let eps = StateVector::from_fn(|_, _| self.rng.sample(StandardNormal));
            let x = ancestor * shrink + mean * (1.0 - shrink) + kernel * eps * h;
            let mut state = TargetState::from_vector(&x);
            state.size = state.size.max(MIN_SIZE);
            resampled.push(state);
        }

        self.particles = resampled;
        self.reset_weights();
    }

    fn reset_weights(&mut self) {
        let n = self.particles.len();
        self.weights = vec![1.0 / n as f64; n];
    }
}

impl TrackEstimator for ParticleFilter {
    fn predict(&mut self, dt: f64) {
        ParticleFilter::predict(self, dt);
    }

    fn position(&self) -> Vector3<f64> {
        self.mean().position
    }

    fn position_covariance(&self) -> Matrix3<f64> {
        self.covariance().fixed_view::<3, 3>(0, 0).into_owned()
    }

    fn velocity(&self) -> Option<Vector3<f64>> {
        Some(self.mean().velocity)
    }

    fn size(&self) -> Option<f64> {
        Some(self.mean().size)
    }
}

fn symmetric_uniform<R: Rng + ?Sized>(rng: &mut R, half_width: f64) -> f64 {
    let u: f64 = rng.gen();
    (2.0 * u - 1.0) * half_width
}

/// Optimal Gaussian kernel bandwidth for `n` samples in the state dimension.
fn kernel_bandwidth(n: usize) -> f64 {
    let d = TargetState::DIM as f64;
    (4.0 / (n as f64 * (d + 2.0))).powf(1.0 / (d + 4.0))
}

/// Lower Cholesky factor of the (floored) ensemble covariance.
fn kernel_factor(cov: &StateCovariance) -> StateCovariance {
    let sym = (cov + cov.transpose()) * 0.5 + StateCovariance::identity() * KERNEL_VARIANCE_FLOOR;
    match sym.cholesky() {
        Some(chol) => chol.l(),
        None => StateCovariance::from_diagonal(&sym.diagonal().map(|v| v.max(0.0).sqrt())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{AxisConvention, CameraIntrinsics, SupportPlane};
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use nalgebra::{Point2, UnitQuaternion};
    use std::f64::consts::PI;

    const TARGET_RADIUS: f64 = 0.35;

    /// Optical axes aligned with body axes, 90° horizontal FOV at 1920x1080.
    fn optical_localizer() -> Localizer {
        let convention = AxisConvention::new(Vector3::z(), -Vector3::y()).unwrap();
        Localizer::new(
            CameraIntrinsics::from_horizontal_fov(90.0, 1920, 1080),
            convention,
            SupportPlane::default(),
        )
    }

    /// `n` poses on a circle of `radius` in the XZ plane, all looking at the origin.
    fn circling_poses(n: usize, radius: f64) -> Vec<CameraPose> {
        (0..n)
            .map(|i| {
                let phi = 2.0 * PI * i as f64 / n as f64;
                CameraPose::new(
                    Vector3::new(radius * phi.sin(), 0.0, -radius * phi.cos()),
                    UnitQuaternion::from_euler_angles(0.0, -phi, 0.0),
                )
            })
            .collect()
    }

    #[test]
    fn test_circling_poses_look_at_origin() {
        let localizer = optical_localizer();
        for pose in circling_poses(20, 10.0) {
            let bbox = localizer
                .project_sphere(&Vector3::zeros(), TARGET_RADIUS, &pose)
                .unwrap();
            assert_relative_eq!(bbox.center(), Point2::new(960.0, 540.0), epsilon = 1e-6);
            assert_relative_eq!(bbox.radius(), 960.0 * TARGET_RADIUS / 10.0, epsilon = 1e-6);
        }
    }

    /// Observe a stationary target from 20 circling poses, returning the
    /// filter and its positional covariance trace after each update.
    fn observe_stationary(seed: u64) -> (ParticleFilter, f64, Vec<f64>) {
        let localizer = optical_localizer();
        let config = ParticleFilterConfig::default();
        let mut pf = ParticleFilter::from_prior(&config, seed);
        assert_eq!(pf.len(), 500);

        let prior_trace = pf.position_covariance().trace();
        let mut traces = Vec::new();
        for pose in circling_poses(20, 10.0) {
            pf.predict(0.5);
            let observed = localizer
                .project_sphere(&Vector3::zeros(), TARGET_RADIUS, &pose)
                .unwrap();
            let outcome = pf.update(&localizer, &pose, &[observed]);
            assert!(!outcome.degenerate);
            assert_eq!(pf.len(), 500);
            traces.push(pf.position_covariance().trace());
        }
        (pf, prior_trace, traces)
    }

    #[test]
    fn test_stationary_target_converges() {
        let (pf, prior_trace, traces) = observe_stationary(42);

        let mean = pf.mean();
        assert_abs_diff_eq!(mean.position, Vector3::zeros(), epsilon = 0.1);
        assert_abs_diff_eq!(mean.velocity, Vector3::zeros(), epsilon = 0.05);
        assert_abs_diff_eq!(mean.size, TARGET_RADIUS, epsilon = 0.1);

        assert!(traces[0] < prior_trace);
        assert!(traces[traces.len() - 1] < traces[0]);
    }

    #[test]
    fn test_covariance_trace_never_grows_much_between_updates() {
        // Resampling noise lets the trace wobble, but no single update may
        // blow it up.
        const STEP_SLACK: f64 = 1.6;
        for seed in [0, 1, 2, 3, 42] {
            let (_, prior_trace, traces) = observe_stationary(seed);
            assert!(traces[0] <= prior_trace, "seed {}: first update widened the prior", seed);
            for k in 1..traces.len() {
                assert!(
                    traces[k] <= traces[k - 1] * STEP_SLACK,
                    "seed {}: trace rose from {} to {} at step {}",
                    seed,
                    traces[k - 1],
                    traces[k],
                    k
                );
            }
            assert!(traces[traces.len() - 1] < traces[0], "seed {}: no net contraction", seed);
        }
    }

    #[test]
    fn test_same_seed_is_deterministic() {
        let localizer = optical_localizer();
        let config = ParticleFilterConfig {
            num_particles: 200,
            ..Default::default()
        };
        let run = || {
            let mut pf = ParticleFilter::from_prior(&config, 7);
            for pose in circling_poses(20, 10.0).iter().take(3) {
                pf.predict(0.5);
                let observed = localizer
                    .project_sphere(&Vector3::zeros(), TARGET_RADIUS, pose)
                    .unwrap();
                pf.update(&localizer, pose, &[observed]);
            }
            pf
        };

        let a = run();
        let b = run();
        assert_eq!(a.particles(), b.particles());
        assert_eq!(a.weights(), b.weights());
    }

    #[test]
    fn test_predict_keeps_weights() {
        let config = ParticleFilterConfig {
            num_particles: 50,
            ..Default::default()
        };
        let mut pf = ParticleFilter::from_prior(&config, 1);
        let before = pf.particles().to_vec();
        let weights = pf.weights().to_vec();

        pf.predict(1.0);

        assert_eq!(pf.weights(), weights.as_slice());
        assert_ne!(pf.particles(), before.as_slice());
        assert_eq!(pf.len(), 50);
    }

    #[test]
    fn test_update_without_boxes_is_noop() {
        let localizer = optical_localizer();
        let config = ParticleFilterConfig {
            num_particles: 50,
            ..Default::default()
        };
        let mut pf = ParticleFilter::from_prior(&config, 1);
        let before = pf.particles().to_vec();

        let outcome = pf.update(&localizer, &circling_poses(1, 10.0)[0], &[]);

        assert_eq!(outcome.stages, 0);
        assert!(!outcome.resampled);
        assert_eq!(pf.particles(), before.as_slice());
    }

    #[test]
    fn test_empty_update_after_predict_equals_predict() {
        let localizer = optical_localizer();
        let config = ParticleFilterConfig {
            num_particles: 50,
            ..Default::default()
        };
        let mut predicted = ParticleFilter::from_prior(&config, 3);
        let mut updated = ParticleFilter::from_prior(&config, 3);

        predicted.predict(0.5);
        updated.predict(0.5);
        updated.update(&localizer, &circling_poses(1, 10.0)[0], &[]);

        assert_eq!(updated.particles(), predicted.particles());
        assert_eq!(updated.weights(), predicted.weights());
    }

    #[test]
    fn test_all_particles_behind_camera_falls_back_to_uniform() {
        let localizer = optical_localizer();
        let config = ParticleFilterConfig {
            num_particles: 100,
            ..Default::default()
        };
        let mut pf = ParticleFilter::from_prior(&config, 3);
        // Far below the prior box, looking away from it.
        let pose = CameraPose::new(
            Vector3::new(0.0, 0.0, -50.0),
            UnitQuaternion::from_euler_angles(0.0, PI, 0.0),
        );

        let outcome = pf.update(&localizer, &pose, &[BoundingBox::new(960.0, 540.0, 20.0, 20.0)]);

        assert!(outcome.degenerate);
        for w in pf.weights() {
            assert_relative_eq!(*w, 0.01, epsilon = 1e-12);
        }
        assert!(pf.mean().position.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_mixture_picks_matching_box() {
        let likelihood = BoxLikelihood::new(4.0, 2.0);
        let expected = BoundingBox::new(100.0, 100.0, 20.0, 20.0);
        let far = BoundingBox::new(900.0, 900.0, 20.0, 20.0);

        assert_relative_eq!(likelihood.log_likelihood(&expected, &expected), 0.0);
        assert_relative_eq!(
            likelihood.mixture_log_likelihood(&expected, &[far, expected]),
            0.0,
            epsilon = 1e-12
        );
        assert_eq!(likelihood.mixture_log_likelihood(&expected, &[]), f64::NEG_INFINITY);
    }

    #[test]
    fn test_concentrated_prior_moves_to_observation() {
        let localizer = optical_localizer();
        let config = ParticleFilterConfig {
            num_particles: 300,
            prior_center: [0.5, 0.0, 0.0],
            prior_half_extent: [0.5, 0.5, 0.5],
            size_min: 0.3,
            size_max: 0.4,
            ..Default::default()
        };
        let mut pf = ParticleFilter::from_prior(&config, 11);
        let poses = circling_poses(4, 10.0);

        for pose in &poses {
            let observed = localizer
                .project_sphere(&Vector3::new(0.2, 0.1, 0.0), TARGET_RADIUS, pose)
                .unwrap();
            pf.update(&localizer, pose, &[observed]);
        }

        assert_abs_diff_eq!(pf.mean().position, Vector3::new(0.2, 0.1, 0.0), epsilon = 0.05);
        let cov = pf.covariance();
        assert_relative_eq!(cov, cov.transpose(), epsilon = 1e-12);
    }

    #[test]
    fn test_kernel_bandwidth_shrinks_with_count() {
        assert!(kernel_bandwidth(100) > kernel_bandwidth(1000));
        assert!(kernel_bandwidth(1) < 1.0);
    }
}
