//! Log-domain weight arithmetic shared by the particle filter.

/// Computes `ln Σ exp(x_i)` without overflow. Empty or all `-inf` input gives `-inf`.
pub fn log_sum_exp(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NEG_INFINITY;
    }

    let max_val = values.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    if max_val.is_infinite() {
        return max_val;
    }

    let sum: f64 = values.iter().map(|v| (v - max_val).exp()).sum();
    max_val + sum.ln()
}

/// Convert log weights to linear weights summing to one.
///
/// Returns `None` when no weight is finite (including NaN input), so the
/// caller can decide how to recover.
pub fn normalize_log_weights(log_weights: &[f64]) -> Option<Vec<f64>> {
    if log_weights.iter().any(|w| w.is_nan()) {
        return None;
    }
    let log_sum = log_sum_exp(log_weights);
    if !log_sum.is_finite() {
        return None;
    }
    Some(log_weights.iter().map(|w| (w - log_sum).exp()).collect())
}

/// Kish effective sample size `1 / Σ w²` of normalized weights.
pub fn effective_sample_size(weights: &[f64]) -> f64 {
    let sum_sq: f64 = weights.iter().map(|w| w * w).sum();
    if sum_sq > 0.0 { 1.0 / sum_sq } else { 0.0 }
}
