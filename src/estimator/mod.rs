//! Per-track state estimators.
//!
//! Two strategies share the [`TrackEstimator`] contract:
//! - [`StaticFusion`]: weighted average of localized measurements, for
//!   ground targets that do not move during the observation window.
//! - [`ParticleFilter`]: recursive Bayesian estimate of position, velocity and
//!   size, for maneuvering targets seen only as bounding boxes.

pub mod descriptor_fusion;
pub mod motion_model;
pub mod particle_filter;
pub mod static_fusion;
pub mod weights;

pub use descriptor_fusion::DescriptorFusion;
pub use motion_model::{MotionModel, StateVector, TargetState};
pub use particle_filter::{BoxLikelihood, FilterUpdate, ParticleFilter, StateCovariance};
pub use static_fusion::StaticFusion;

use nalgebra::{Matrix3, Vector3};

/// Kinematic state of one track.
pub trait TrackEstimator {
    /// Advance the estimate by `dt` seconds without new evidence.
    fn predict(&mut self, dt: f64);

    /// Point estimate of the target position.
    fn position(&self) -> Vector3<f64>;

    fn position_covariance(&self) -> Matrix3<f64>;

    /// `None` for estimators without a motion model.
    fn velocity(&self) -> Option<Vector3<f64>>;

    /// Physical radius, when the estimator tracks one.
    fn size(&self) -> Option<f64>;
}

/// The estimator a track was created with.
#[derive(Debug, Clone)]
pub enum Estimator {
    Static(StaticFusion),
    Dynamic(Box<ParticleFilter>),
}

impl Estimator {
    pub fn is_dynamic(&self) -> bool {
        matches!(self, Estimator::Dynamic(_))
    }

    fn inner(&self) -> &dyn TrackEstimator {
        match self {
            Estimator::Static(s) => s,
            Estimator::Dynamic(pf) => pf.as_ref(),
        }
    }

    fn inner_mut(&mut self) -> &mut dyn TrackEstimator {
        match self {
            Estimator::Static(s) => s,
            Estimator::Dynamic(pf) => pf.as_mut(),
        }
    }
}

impl TrackEstimator for Estimator {
    fn predict(&mut self, dt: f64) {
        self.inner_mut().predict(dt);
    }

    fn position(&self) -> Vector3<f64> {
        self.inner().position()
    }

    fn position_covariance(&self) -> Matrix3<f64> {
        self.inner().position_covariance()
    }

    fn velocity(&self) -> Option<Vector3<f64>> {
        self.inner().velocity()
    }

    fn size(&self) -> Option<f64> {
        self.inner().size()
    }
}
