//! Distance metrics for vector similarity calculation.
//!
//! All functions accumulate in `f64` and round once to `f32`, so the same pair
//! of vectors always yields the same bits no matter which index structure asks.

use serde::{Deserialize, Serialize};

/// Distance metrics supported by the query engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DistanceMetric {
    /// Euclidean (L2) distance
    #[default]
    Euclidean,
    /// Cosine similarity
    Cosine,
}

impl DistanceMetric {
    /// Get the name of this distance metric.
    pub fn name(&self) -> &'static str {
        match self {
            DistanceMetric::Euclidean => "euclidean",
            DistanceMetric::Cosine => "cosine",
        }
    }
}

/// Euclidean distance between two equal-length slices.
///
/// Lengths are not checked; callers validate dimensions first.
#[inline]
pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(&x, &y)| {
            let d = f64::from(x) - f64::from(y);
            d * d
        })
        .sum::<f64>()
        .sqrt() as f32
}

/// Dot product of two equal-length slices.
#[inline]
pub fn dot(a: &[f32], b: &[f32]) -> f64 {
    a.iter()
        .zip(b)
        .map(|(&x, &y)| f64::from(x) * f64::from(y))
        .sum()
}

/// L2 norm of a vector.
#[inline]
pub fn norm(a: &[f32]) -> f64 {
    dot(a, a).sqrt()
}

/// Cosine similarity in `[-1, 1]`; zero if either vector has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let norm_a = norm(a);
    let norm_b = norm(b);
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    // Adding zero folds -0.0 into 0.0 so orthogonal vectors tie with zero-norm ones.
    (dot(a, b) / (norm_a * norm_b)).clamp(-1.0, 1.0) as f32 + 0.0
}
