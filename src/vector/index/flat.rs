//! Flat (brute force) index for exact search.

use rayon::prelude::*;

use crate::vector::core::distance::euclidean_distance;
use crate::vector::index::{Neighbor, PointSet};

/// Exhaustive-scan index. Building only stores the points.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    points: PointSet,
    parallel_threshold: usize,
}

impl FlatIndex {
    /// Store the points; O(n).
    pub fn build(points: PointSet, parallel_threshold: usize) -> Self {
        Self {
            points,
            parallel_threshold,
        }
    }

    pub fn points(&self) -> &PointSet {
        &self.points
    }

    /// Distance to every point, then partial selection of the `k` smallest.
    pub fn query(&self, query: &[f32], k: usize) -> Vec<Neighbor> {
        let n = self.points.len();
        if n == 0 || k == 0 {
            return Vec::new();
        }

        let mut ranked: Vec<(f32, u32)> = if n >= self.parallel_threshold {
            (0..n as u32)
                .into_par_iter()
                .map(|i| (euclidean_distance(query, self.points.point(i)), i))
                .collect()
        } else {
            (0..n as u32)
                .map(|i| (euclidean_distance(query, self.points.point(i)), i))
                .collect()
        };

        let cmp = |a: &(f32, u32), b: &(f32, u32)| self.points.cmp_ranked(*a, *b);
        if k < n {
            ranked.select_nth_unstable_by(k - 1, cmp);
            ranked.truncate(k);
        }
        ranked.sort_unstable_by(cmp);

        ranked
            .into_iter()
            .map(|(distance, i)| Neighbor {
                key: self.points.key(i).clone(),
                distance,
            })
            .collect()
    }
}
