//! Weighted-average position estimator for stationary targets.

use nalgebra::{Matrix3, Vector3};

use super::TrackEstimator;

/// Incremental weighted mean (West's algorithm) of measured positions.
///
/// Each measurement carries a confidence weight; equal weights give the
/// plain running average. There is no motion model, so `predict` does nothing.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticFusion {
    mean: Vector3<f64>,
    /// Weighted sum of squared deviations from the mean.
    m2: Matrix3<f64>,
    total_weight: f64,
    count: usize,
}

impl StaticFusion {
    pub fn new(position: Vector3<f64>, weight: f64) -> Self {
        Self {
            mean: position,
            m2: Matrix3::zeros(),
            total_weight: sanitize_weight(weight),
            count: 1,
        }
    }

    pub fn ingest(&mut self, position: &Vector3<f64>, weight: f64) {
        let w = sanitize_weight(weight);
        let new_total = self.total_weight + w;
        let delta = position - self.mean;
        self.mean += delta * (w / new_total);
        let delta_after = position - self.mean;
        self.m2 += delta * delta_after.transpose() * w;
        self.total_weight = new_total;
        self.count += 1;
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn total_weight(&self) -> f64 {
        self.total_weight
    }
}

/// Non-finite or non-positive confidences fall back to unit weight.
fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_finite() && weight > 0.0 {
        weight
    } else {
        1.0
    }
}

impl TrackEstimator for StaticFusion {
    fn predict(&mut self, _dt: f64) {}

    fn position(&self) -> Vector3<f64> {
        self.mean
    }

    /// Spread of the contributing measurements (weighted sample covariance).
    fn position_covariance(&self) -> Matrix3<f64> {
        if self.count < 2 {
            return Matrix3::zeros();
        }
        self.m2 / self.total_weight
    }

    fn velocity(&self) -> Option<Vector3<f64>> {
        None
    }

    fn size(&self) -> Option<f64> {
        None
    }
}
