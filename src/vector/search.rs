//! Similarity search over a library's bound index.
//!
//! - `engine`: request validation, metric dispatch and result ordering

pub mod engine;

use serde::{Deserialize, Serialize};

use crate::vector::core::distance::DistanceMetric;
use crate::vector::index::{IndexAlgorithm, Neighbor};

/// A search to run against one library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchRequest {
    /// Query embedding.
    pub query: Vec<f32>,
    /// Number of results to return.
    pub k: usize,
    /// Euclidean ranks ascending by distance, cosine descending by similarity.
    #[serde(default)]
    pub metric: DistanceMetric,
}

impl SearchRequest {
    pub fn new(query: Vec<f32>, k: usize) -> Self {
        Self {
            query,
            k,
            metric: DistanceMetric::Euclidean,
        }
    }

    pub fn metric(mut self, metric: DistanceMetric) -> Self {
        self.metric = metric;
        self
    }
}

/// A single ranked chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub document_id: String,
    pub chunk_id: String,
    /// Euclidean distance or cosine similarity, depending on the metric.
    pub score: f32,
}

impl From<Neighbor> for SearchHit {
    fn from(neighbor: Neighbor) -> Self {
        Self {
            document_id: neighbor.key.document_id,
            chunk_id: neighbor.key.chunk_id,
            score: neighbor.distance,
        }
    }
}

/// Ranked hits plus details about how they were produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResults {
    pub library_id: String,
    pub metric: DistanceMetric,
    /// Algorithm of the structure that answered, `None` for an empty library.
    pub algorithm: Option<IndexAlgorithm>,
    pub hits: Vec<SearchHit>,
    /// Search execution time in milliseconds.
    pub search_time_ms: f64,
}
