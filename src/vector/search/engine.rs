//! Query engine: validates requests and ranks results.

use std::time::Instant;

use log::debug;

use crate::corpus::model::Library;
use crate::corpus::store::CorpusStore;
use crate::error::{LancetError, Result};
use crate::vector::core::distance::{DistanceMetric, cosine_similarity};
use crate::vector::core::vector::{normalized, validate_dimension, validate_embedding};
use crate::vector::index::manager::{IndexManager, RankingSpace};
use crate::vector::index::{BuildOptions, IndexAlgorithm, IndexStructure, Neighbor};
use crate::vector::search::{SearchHit, SearchRequest, SearchResults};

/// Bound, in cosine units, on the rounding error of unit vectors and of the
/// distances a structure reports between them.
const COSINE_SLACK: f64 = 1e-5;

/// Answers k-NN and cosine queries against libraries of a [`CorpusStore`].
#[derive(Debug, Clone, Default)]
pub struct QueryEngine {
    manager: IndexManager,
}

impl QueryEngine {
    pub fn new(options: BuildOptions) -> Self {
        Self {
            manager: IndexManager::new(options),
        }
    }

    pub fn manager(&self) -> &IndexManager {
        &self.manager
    }

    /// The `k` chunks nearest to `query` by Euclidean distance, ascending.
    pub fn search_knn(
        &self,
        store: &CorpusStore,
        library_id: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.knn(store, library_id, query, k).map(|(hits, _)| hits)
    }

    /// The `k` chunks most similar to `query` by cosine similarity, descending.
    pub fn search_cosine(
        &self,
        store: &CorpusStore,
        library_id: &str,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<SearchHit>> {
        self.cosine(store, library_id, query, k).map(|(hits, _)| hits)
    }

    /// Run a request and report timing and the answering algorithm.
    pub fn search(
        &self,
        store: &CorpusStore,
        library_id: &str,
        request: &SearchRequest,
    ) -> Result<SearchResults> {
        let start = Instant::now();
        let (hits, algorithm) = match request.metric {
            DistanceMetric::Euclidean => self.knn(store, library_id, &request.query, request.k)?,
            DistanceMetric::Cosine => self.cosine(store, library_id, &request.query, request.k)?,
        };
        let search_time_ms = start.elapsed().as_secs_f64() * 1000.0;

        debug!(
            "{} search in library '{library_id}' returned {} hits in {search_time_ms:.3}ms",
            request.metric.name(),
            hits.len()
        );

        Ok(SearchResults {
            library_id: library_id.to_string(),
            metric: request.metric,
            algorithm,
            hits,
            search_time_ms,
        })
    }

    fn knn(
        &self,
        store: &CorpusStore,
        library_id: &str,
        query: &[f32],
        k: usize,
    ) -> Result<(Vec<SearchHit>, Option<IndexAlgorithm>)> {
        validate_request(query, k)?;
        let entry = store.entry(library_id)?;

        self.manager
            .with_index(&entry, RankingSpace::Euclidean, |library, built| {
                if !check_query(library, query)? {
                    return Ok((Vec::new(), None));
                }
                let hits = built
                    .structure
                    .query(query, k)?
                    .into_iter()
                    .map(SearchHit::from)
                    .collect();
                Ok((hits, Some(built.structure.algorithm())))
            })
    }

    /// Candidates come from the normalized structure, where Euclidean order
    /// equals cosine order up to rounding. Every candidate near the k-th one is
    /// scored against the stored vectors, and the exact scores decide the
    /// ranking. Zero-norm chunks score 0.
    fn cosine(
        &self,
        store: &CorpusStore,
        library_id: &str,
        query: &[f32],
        k: usize,
    ) -> Result<(Vec<SearchHit>, Option<IndexAlgorithm>)> {
        validate_request(query, k)?;
        let unit = normalized(query)
            .ok_or_else(|| LancetError::invalid_vector("cosine query has zero norm"))?;
        let entry = store.entry(library_id)?;

        self.manager
            .with_index(&entry, RankingSpace::Cosine, |library, built| {
                if !check_query(library, query)? {
                    return Ok((Vec::new(), None));
                }

                let candidates = unit_candidates(&built.structure, &unit, k)?;
                let mut scored =
                    Vec::with_capacity(candidates.len() + k.min(built.zero_norm.len()));
                for neighbor in candidates {
                    let embedding = library.embedding(&neighbor.key).ok_or_else(|| {
                        LancetError::index(format!(
                            "indexed chunk {} is missing from library '{}'",
                            neighbor.key, library.id
                        ))
                    })?;
                    scored.push((cosine_similarity(query, embedding), neighbor.key));
                }
                scored.extend(built.zero_norm.iter().take(k).map(|key| (0.0, key.clone())));

                scored.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
                scored.truncate(k);

                let hits = scored
                    .into_iter()
                    .map(|(score, key)| SearchHit {
                        document_id: key.document_id,
                        chunk_id: key.chunk_id,
                        score,
                    })
                    .collect();
                Ok((hits, Some(built.structure.algorithm())))
            })
    }
}

fn validate_request(query: &[f32], k: usize) -> Result<()> {
    if k == 0 {
        return Err(LancetError::invalid_argument("k must be at least 1"));
    }
    validate_embedding(query)
}

/// Every point of a unit-space structure whose exact cosine score could still
/// place it in the top `k`.
///
/// Unit-space distance `d` maps to similarity `1 - d²/2`, so anything farther
/// than the k-th candidate by more than [`COSINE_SLACK`] in those units is
/// strictly beaten by `k` other points. The fetch doubles until the last
/// returned point lies past that radius.
fn unit_candidates(structure: &IndexStructure, unit: &[f32], k: usize) -> Result<Vec<Neighbor>> {
    let total = structure.len();
    let mut fetch = k.min(total);
    loop {
        let mut neighbors = structure.query(unit, fetch)?;
        let Some(kth) = neighbors.get(k.min(neighbors.len()).saturating_sub(1)) else {
            return Ok(neighbors);
        };
        let kth = f64::from(kth.distance);
        let radius = (kth * kth + 2.0 * COSINE_SLACK).sqrt();
        let within = |n: &Neighbor| f64::from(n.distance) <= radius;

        let exhausted = neighbors.len() >= total;
        if exhausted || neighbors.last().is_some_and(|n| !within(n)) {
            neighbors.retain(within);
            return Ok(neighbors);
        }
        fetch = fetch.saturating_mul(2).min(total);
    }
}

/// `Ok(false)` when the library has nothing to search.
fn check_query(library: &Library, query: &[f32]) -> Result<bool> {
    match library.dimension {
        Some(dimension) if library.chunk_count() > 0 => {
            validate_dimension(query, dimension)?;
            Ok(true)
        }
        _ => Ok(false),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::model::{Chunk, Metadata, NewDocument};

    fn store(algorithm: IndexAlgorithm, chunks: Vec<Chunk>) -> CorpusStore {
        let store = CorpusStore::default();
        store
            .create_library("lib", Metadata::new(), Some(algorithm))
            .unwrap();
        let mut document = NewDocument::with_id("doc");
        document.chunks = chunks;
        store.create_document("lib", document).unwrap();
        store
    }

    fn ids(hits: &[SearchHit]) -> Vec<&str> {
        hits.iter().map(|h| h.chunk_id.as_str()).collect()
    }

    #[test]
    fn test_validation_order() {
        let engine = QueryEngine::default();
        let store = store(IndexAlgorithm::KdTree, vec![Chunk::new("a", "", vec![1.0, 0.0])]);

        assert!(matches!(
            engine.search_knn(&store, "missing", &[f32::NAN], 0),
            Err(LancetError::InvalidArgument(_))
        ));
        assert!(matches!(
            engine.search_knn(&store, "missing", &[f32::NAN], 1),
            Err(LancetError::InvalidVector(_))
        ));
        assert!(matches!(
            engine.search_knn(&store, "missing", &[1.0, 0.0], 1),
            Err(LancetError::NotFound(_))
        ));
        assert!(matches!(
            engine.search_knn(&store, "lib", &[1.0], 1),
            Err(LancetError::DimensionMismatch {
                expected: 2,
                actual: 1
            })
        ));
    }

    #[test]
    fn test_empty_library_returns_no_hits() {
        let engine = QueryEngine::default();
        let store = CorpusStore::default();
        store.create_library("lib", Metadata::new(), None).unwrap();

        assert!(engine.search_knn(&store, "lib", &[1.0, 2.0], 3).unwrap().is_empty());
        assert!(engine.search_cosine(&store, "lib", &[1.0, 2.0], 3).unwrap().is_empty());
    }

    #[test]
    fn test_cosine_ranks_by_similarity() {
        let engine = QueryEngine::default();
        for algorithm in IndexAlgorithm::ALL {
            let store = store(
                algorithm,
                vec![
                    Chunk::new("same", "", vec![2.0, 0.0]),
                    Chunk::new("diag", "", vec![1.0, 1.0]),
                    Chunk::new("ortho", "", vec![0.0, 3.0]),
                    Chunk::new("opposite", "", vec![-1.0, 0.0]),
                    Chunk::new("zero", "", vec![0.0, 0.0]),
                ],
            );

            let hits = engine.search_cosine(&store, "lib", &[1.0, 0.0], 5).unwrap();
            assert_eq!(
                ids(&hits),
                vec!["same", "diag", "ortho", "zero", "opposite"],
                "{algorithm}"
            );
            assert!((hits[0].score - 1.0).abs() < 1e-6);
            assert!((hits[1].score - std::f32::consts::FRAC_1_SQRT_2).abs() < 1e-6);
            assert_eq!(hits[3].score, 0.0);
            assert!((hits[4].score + 1.0).abs() < 1e-6);
        }
    }

    #[test]
    fn test_cosine_cutoff_uses_exact_scores() {
        // Same direction at many scales: exact scores tie, while the rounded
        // unit vectors differ in the last bits.
        let direction = [0.3_f32, 0.7, -0.2, 0.5];
        let chunks: Vec<Chunk> = (0..200)
            .map(|i| {
                let scale = 0.37 + i as f32 * 1.713;
                let embedding = direction.iter().map(|x| x * scale).collect();
                Chunk::new(format!("c{:03}", 199 - i), "", embedding)
            })
            .collect();
        let query = [0.5, -0.2, 0.9, 0.4];

        let mut expected: Vec<(f32, String)> = chunks
            .iter()
            .map(|c| (cosine_similarity(&query, &c.embedding), c.id.clone()))
            .collect();
        expected.sort_by(|a, b| b.0.total_cmp(&a.0).then_with(|| a.1.cmp(&b.1)));

        let engine = QueryEngine::default();
        for algorithm in IndexAlgorithm::ALL {
            let store = store(algorithm, chunks.clone());
            for k in [1, 10, 64] {
                let hits = engine.search_cosine(&store, "lib", &query, k).unwrap();
                let actual: Vec<(f32, String)> =
                    hits.into_iter().map(|h| (h.score, h.chunk_id)).collect();
                assert_eq!(actual, expected[..k], "{algorithm} k={k}");
            }
        }
    }

    #[test]
    fn test_cosine_rejects_zero_query() {
        let engine = QueryEngine::default();
        let store = store(IndexAlgorithm::BallTree, vec![Chunk::new("a", "", vec![1.0, 0.0])]);
        assert!(matches!(
            engine.search_cosine(&store, "lib", &[0.0, 0.0], 1),
            Err(LancetError::InvalidVector(_))
        ));
    }

    #[test]
    fn test_search_reports_algorithm() {
        let engine = QueryEngine::default();
        let store = store(IndexAlgorithm::BallTree, vec![Chunk::new("a", "", vec![1.0, 0.0])]);
        let results = engine
            .search(&store, "lib", &SearchRequest::new(vec![0.0, 0.0], 1))
            .unwrap();
        assert_eq!(results.algorithm, Some(IndexAlgorithm::BallTree));
        assert_eq!(ids(&results.hits), vec!["a"]);
        assert_eq!(results.hits[0].score, 1.0);
    }
}
