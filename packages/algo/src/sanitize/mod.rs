//! Data Sanitization
//!
//! Numerical stability utilities for sampling weights.
//!
//! Functions:
//! - Weight clamping (NaN, infinite, zero and negative values)
//! - Quality score normalization

use crate::types::{MAX_WEIGHT, MIN_WEIGHT};

/// Clamp a weight into `[MIN_WEIGHT, MAX_WEIGHT]` so every candidate keeps a
/// nonzero selection probability.
pub fn sanitize_weight(weight: f64) -> f64 {
    if weight.is_nan() || weight <= 0.0 {
        MIN_WEIGHT
    } else if weight.is_infinite() || weight > MAX_WEIGHT {
        MAX_WEIGHT
    } else {
        weight.max(MIN_WEIGHT)
    }
}

/// Quality factor for a question; missing or invalid scores count as 1.0
pub fn sanitize_quality(score: Option<f64>) -> f64 {
    match score {
        Some(value) if value.is_finite() => value.clamp(0.0, 1.0),
        _ => 1.0,
    }
}
