//! Constant-velocity motion model with additive Gaussian process noise.

use nalgebra::{SVector, Vector3};
use rand::Rng;
use rand_distr::StandardNormal;

use crate::config::ParticleFilterConfig;

/// Smallest target radius a hypothesis may shrink to.
pub const MIN_SIZE: f64 = 1e-3;

pub type StateVector = SVector<f64, 7>;

/// One hypothesis of a maneuvering target: where it is, where it is going,
/// and how big it is.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TargetState {
    pub position: Vector3<f64>,
    pub velocity: Vector3<f64>,
    /// Physical radius, world units.
    pub size: f64,
}

impl TargetState {
    pub const DIM: usize = 7;

    pub fn new(position: Vector3<f64>, velocity: Vector3<f64>, size: f64) -> Self {
        Self {
            position,
            velocity,
            size,
        }
    }

    /// `[x, y, z, vx, vy, vz, r]`.
    pub fn to_vector(&self) -> StateVector {
        StateVector::from_column_slice(&[
            self.position.x,
            self.position.y,
            self.position.z,
            self.velocity.x,
            self.velocity.y,
            self.velocity.z,
            self.size,
        ])
    }

    pub fn from_vector(v: &StateVector) -> Self {
        Self {
            position: Vector3::new(v[0], v[1], v[2]),
            velocity: Vector3::new(v[3], v[4], v[5]),
            size: v[6],
        }
    }
}

/// Constant velocity model.
///
/// Position integrates velocity over `dt`; position, velocity and size each
/// receive independent noise with standard deviation `sigma * sqrt(dt)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotionModel {
    pub position_noise: f64,
    pub velocity_noise: f64,
    pub size_noise: f64,
}

impl MotionModel {
    pub fn new(position_noise: f64, velocity_noise: f64, size_noise: f64) -> Self {
        Self {
            position_noise,
            velocity_noise,
            size_noise,
        }
    }

    pub fn from_config(config: &ParticleFilterConfig) -> Self {
        Self::new(config.position_noise, config.velocity_noise, config.size_noise)
    }

    /// Deterministic part of the transition.
    pub fn predict_mean(&self, state: &TargetState, dt: f64) -> TargetState {
        TargetState {
            position: state.position + state.velocity * dt,
            ..*state
        }
    }

    /// Advance one hypothesis by `dt` seconds, sampling process noise.
    pub fn propagate<R: Rng + ?Sized>(&self, state: &mut TargetState, dt: f64, rng: &mut R) {
        let scale = dt.abs().sqrt();
        state.position += state.velocity * dt + gaussian_vector(rng) * (self.position_noise * scale);
        state.velocity += gaussian_vector(rng) * (self.velocity_noise * scale);
        let ds: f64 = rng.sample(StandardNormal);
        state.size = (state.size + ds * self.size_noise * scale).max(MIN_SIZE);
    }
}

impl Default for MotionModel {
    fn default() -> Self {
        Self::from_config(&ParticleFilterConfig::default())
    }
}

pub(crate) fn gaussian_vector<R: Rng + ?Sized>(rng: &mut R) -> Vector3<f64> {
    Vector3::new(
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
        rng.sample(StandardNormal),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn test_noise_free_is_constant_velocity() {
        let model = MotionModel::new(0.0, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(1);
        let mut state = TargetState::new(Vector3::new(1.0, 0.0, 0.0), Vector3::new(0.0, 2.0, -1.0), 0.4);

        model.propagate(&mut state, 0.5, &mut rng);

        assert_relative_eq!(state.position, Vector3::new(1.0, 1.0, -0.5), epsilon = 1e-12);
        assert_relative_eq!(state.velocity, Vector3::new(0.0, 2.0, -1.0));
        assert_relative_eq!(state.size, 0.4);
        assert_eq!(model.predict_mean(&state, 0.0), state);
    }

    #[test]
    fn test_noise_spread_grows_with_dt() {
        let model = MotionModel::new(1.0, 0.0, 0.0);
        let mut rng = StdRng::seed_from_u64(7);
        let spread = |dt: f64, rng: &mut StdRng| {
            let n = 4000;
            let mut sum_sq = 0.0;
            for _ in 0..n {
                let mut s = TargetState::new(Vector3::zeros(), Vector3::zeros(), 1.0);
                model.propagate(&mut s, dt, rng);
                sum_sq += s.position.x * s.position.x;
            }
            (sum_sq / n as f64).sqrt()
        };

        let short = spread(0.25, &mut rng);
        let long = spread(4.0, &mut rng);
        assert_relative_eq!(short, 0.5, epsilon = 0.05);
        assert_relative_eq!(long, 2.0, epsilon = 0.2);
    }

    #[test]
    fn test_size_stays_positive() {
        let model = MotionModel::new(0.0, 0.0, 10.0);
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = TargetState::new(Vector3::zeros(), Vector3::zeros(), 0.01);
        for _ in 0..100 {
            model.propagate(&mut state, 1.0, &mut rng);
            assert!(state.size >= MIN_SIZE);
        }
    }
}
