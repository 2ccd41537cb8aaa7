//! Embedding validation and normalization helpers.

use rayon::prelude::*;

use crate::error::{LancetError, Result};
use crate::vector::core::distance::norm;

/// Check that an embedding is non-empty and contains only finite values.
pub fn validate_embedding(data: &[f32]) -> Result<()> {
    if data.is_empty() {
        return Err(LancetError::invalid_vector("embedding is empty"));
    }

    if let Some(position) = data.iter().position(|x| !x.is_finite()) {
        return Err(LancetError::invalid_vector(format!(
            "non-finite value {} at index {position}",
            data[position]
        )));
    }

    Ok(())
}

/// Check that an embedding has the expected dimension.
pub fn validate_dimension(data: &[f32], expected: usize) -> Result<()> {
    if data.len() != expected {
        return Err(LancetError::dimension_mismatch(expected, data.len()));
    }
    Ok(())
}

/// Unit-length copy of `data`, or `None` when its norm is zero.
pub fn normalized(data: &[f32]) -> Option<Vec<f32>> {
    let norm = norm(data);
    if norm == 0.0 {
        return None;
    }
    Some(data.iter().map(|&x| (f64::from(x) / norm) as f32).collect())
}

/// Normalize many vectors, in parallel once the batch reaches `parallel_threshold`.
pub fn normalized_batch(vectors: &[&[f32]], parallel_threshold: usize) -> Vec<Option<Vec<f32>>> {
    if vectors.len() < parallel_threshold {
        vectors.iter().map(|v| normalized(v)).collect()
    } else {
        vectors.par_iter().map(|v| normalized(v)).collect()
    }
}
