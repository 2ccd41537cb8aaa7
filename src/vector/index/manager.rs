//! Per-library index bindings and lazy rebuild.
//!
//! Each library owns an [`IndexBinding`] with one slot per ranking space:
//! the Euclidean slot indexes raw embeddings, the cosine slot indexes
//! unit-normalized ones. Mutations only mark slots dirty. The first query
//! that finds its slot dirty rebuilds it from the full chunk set while
//! holding the library's write lock, then downgrades to a read lock to run
//! the query, so readers never observe a half-built structure.

use chrono::{DateTime, Utc};
use log::{debug, warn};
use parking_lot::RwLockWriteGuard;
use serde::{Deserialize, Serialize};

use crate::corpus::model::Library;
use crate::corpus::store::LibraryEntry;
use crate::error::{LancetError, Result};
use crate::vector::core::distance::DistanceMetric;
use crate::vector::core::vector::normalized_batch;
use crate::vector::index::{BuildOptions, ChunkKey, IndexAlgorithm, IndexStructure, PointSet};

/// Geometry a structure is built in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankingSpace {
    /// Raw embeddings, ranked by Euclidean distance.
    Euclidean,
    /// Unit-normalized embeddings, ranked by cosine similarity.
    Cosine,
}

impl From<DistanceMetric> for RankingSpace {
    fn from(metric: DistanceMetric) -> Self {
        match metric {
            DistanceMetric::Euclidean => RankingSpace::Euclidean,
            DistanceMetric::Cosine => RankingSpace::Cosine,
        }
    }
}

impl RankingSpace {
    pub fn name(&self) -> &'static str {
        match self {
            RankingSpace::Euclidean => "euclidean",
            RankingSpace::Cosine => "cosine",
        }
    }
}

/// A structure together with the chunks that could not be placed in it.
#[derive(Debug, Clone)]
pub struct BuiltIndex {
    pub structure: IndexStructure,
    /// Zero-norm chunks, sorted. Only populated in the cosine space.
    pub zero_norm: Vec<ChunkKey>,
}

#[derive(Debug)]
struct IndexSlot {
    built: Option<BuiltIndex>,
    dirty: bool,
    build_count: u64,
    last_built_at: Option<DateTime<Utc>>,
}

impl Default for IndexSlot {
    fn default() -> Self {
        Self {
            built: None,
            dirty: true,
            build_count: 0,
            last_built_at: None,
        }
    }
}

/// The index state bound to one library.
#[derive(Debug)]
pub struct IndexBinding {
    algorithm: IndexAlgorithm,
    euclidean: IndexSlot,
    cosine: IndexSlot,
}

impl IndexBinding {
    pub fn new(algorithm: IndexAlgorithm) -> Self {
        Self {
            algorithm,
            euclidean: IndexSlot::default(),
            cosine: IndexSlot::default(),
        }
    }

    pub fn algorithm(&self) -> IndexAlgorithm {
        self.algorithm
    }

    /// Switch algorithms. Both slots are rebuilt on their next query.
    pub fn set_algorithm(&mut self, algorithm: IndexAlgorithm) {
        self.algorithm = algorithm;
        self.invalidate();
    }

    /// Mark both slots stale.
    pub fn invalidate(&mut self) {
        self.euclidean.dirty = true;
        self.cosine.dirty = true;
    }

    /// Drop built structures; used when the library is deleted.
    pub fn clear(&mut self) {
        self.euclidean = IndexSlot::default();
        self.cosine = IndexSlot::default();
    }

    pub fn is_dirty(&self, space: RankingSpace) -> bool {
        self.slot(space).dirty
    }

    /// The built index of `space` if it reflects the current chunk set.
    pub fn fresh(&self, space: RankingSpace) -> Option<&BuiltIndex> {
        let slot = self.slot(space);
        if slot.dirty { None } else { slot.built.as_ref() }
    }

    /// Rebuild the slot of `space` from `library`.
    ///
    /// On failure the slot is left empty and dirty so the next query retries.
    pub fn rebuild(
        &mut self,
        library: &Library,
        space: RankingSpace,
        options: &BuildOptions,
    ) -> Result<&BuiltIndex> {
        let algorithm = self.algorithm;
        let slot = self.slot_mut(space);
        slot.built = None;
        slot.dirty = true;

        let built = match build_index(library, algorithm, space, options) {
            Ok(built) => built,
            Err(e) => {
                warn!(
                    "Failed to build {} {} index for library '{}': {e}",
                    algorithm,
                    space.name(),
                    library.id
                );
                return Err(e);
            }
        };

        debug!(
            "Built {} {} index for library '{}' ({} vectors, {} zero-norm)",
            algorithm,
            space.name(),
            library.id,
            built.structure.len(),
            built.zero_norm.len()
        );

        slot.dirty = false;
        slot.build_count += 1;
        slot.last_built_at = Some(Utc::now());
        Ok(slot.built.insert(built))
    }

    fn slot(&self, space: RankingSpace) -> &IndexSlot {
        match space {
            RankingSpace::Euclidean => &self.euclidean,
            RankingSpace::Cosine => &self.cosine,
        }
    }

    fn slot_mut(&mut self, space: RankingSpace) -> &mut IndexSlot {
        match space {
            RankingSpace::Euclidean => &mut self.euclidean,
            RankingSpace::Cosine => &mut self.cosine,
        }
    }
}

/// Flatten the library into points of the requested space and build.
fn build_index(
    library: &Library,
    algorithm: IndexAlgorithm,
    space: RankingSpace,
    options: &BuildOptions,
) -> Result<BuiltIndex> {
    let dimension = library.dimension.unwrap_or(0);
    let entries: Vec<(ChunkKey, &[f32])> = library.embeddings().collect();
    let mut points = PointSet::with_capacity(dimension, entries.len());
    let mut zero_norm = Vec::new();

    match space {
        RankingSpace::Euclidean => {
            for (key, embedding) in entries {
                points.push(key, embedding)?;
            }
        }
        RankingSpace::Cosine => {
            let vectors: Vec<&[f32]> = entries.iter().map(|(_, e)| *e).collect();
            let units = normalized_batch(&vectors, options.parallel_threshold);
            for ((key, _), unit) in entries.into_iter().zip(units) {
                match unit {
                    Some(unit) => points.push(key, &unit)?,
                    None => zero_norm.push(key),
                }
            }
            zero_norm.sort();
        }
    }

    Ok(BuiltIndex {
        structure: IndexStructure::build(algorithm, points, options)?,
        zero_norm,
    })
}

/// Snapshot of a library's index state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexStats {
    pub library_id: String,
    pub algorithm: IndexAlgorithm,
    pub dimension: Option<usize>,
    pub chunk_count: usize,
    /// Vectors in the Euclidean structure, if one is built.
    pub indexed_vectors: Option<usize>,
    /// Whether the Euclidean structure is stale.
    pub dirty: bool,
    /// Completed builds across both spaces.
    pub build_count: u64,
    pub last_built_at: Option<DateTime<Utc>>,
}

/// Runs queries against fresh structures, rebuilding stale ones on demand.
#[derive(Debug, Clone, Default)]
pub struct IndexManager {
    options: BuildOptions,
}

impl IndexManager {
    pub fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Run `f` against a fresh structure of `space`.
    ///
    /// The common path holds only the read lock. A stale slot is rebuilt
    /// under the write lock (re-checking first, another writer may have won),
    /// which is then downgraded so `f` runs alongside other readers.
    pub fn with_index<R>(
        &self,
        entry: &LibraryEntry,
        space: RankingSpace,
        f: impl FnOnce(&Library, &BuiltIndex) -> Result<R>,
    ) -> Result<R> {
        {
            let state = entry.read();
            state.ensure_live()?;
            if let Some(built) = state.index.fresh(space) {
                return f(&state.library, built);
            }
        }

        let mut state = entry.write();
        state.ensure_live()?;
        if state.index.fresh(space).is_none() {
            let state = &mut *state;
            state.index.rebuild(&state.library, space, &self.options)?;
        }

        let state = RwLockWriteGuard::downgrade(state);
        match state.index.fresh(space) {
            Some(built) => f(&state.library, built),
            None => Err(LancetError::index(format!(
                "{} index for library '{}' is unavailable",
                space.name(),
                state.library.id
            ))),
        }
    }

    /// Rebuild both spaces immediately.
    pub fn rebuild(&self, entry: &LibraryEntry) -> Result<IndexStats> {
        let mut state = entry.write();
        state.ensure_live()?;
        let state = &mut *state;
        for space in [RankingSpace::Euclidean, RankingSpace::Cosine] {
            state.index.rebuild(&state.library, space, &self.options)?;
        }
        Ok(stats_of(&state.library, &state.index))
    }

    pub fn stats(&self, entry: &LibraryEntry) -> Result<IndexStats> {
        let state = entry.read();
        state.ensure_live()?;
        Ok(stats_of(&state.library, &state.index))
    }
}

fn stats_of(library: &Library, binding: &IndexBinding) -> IndexStats {
    let euclidean = &binding.euclidean;
    let last_built_at = euclidean.last_built_at.max(binding.cosine.last_built_at);
    IndexStats {
        library_id: library.id.clone(),
        algorithm: binding.algorithm,
        dimension: library.dimension,
        chunk_count: library.chunk_count(),
        indexed_vectors: euclidean.built.as_ref().map(|b| b.structure.len()),
        dirty: euclidean.dirty,
        build_count: euclidean.build_count + binding.cosine.build_count,
        last_built_at,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::model::{Chunk, Metadata};

    fn library(chunks: &[(&str, Vec<f32>)]) -> Library {
        let mut library = Library::new("lib", Metadata::new(), IndexAlgorithm::KdTree);
        let chunks = chunks
            .iter()
            .map(|(id, embedding)| Chunk::new(*id, "", embedding.clone()))
            .collect();
        library
            .insert_document("doc".into(), Metadata::new(), chunks)
            .unwrap();
        library
    }

    #[test]
    fn test_binding_starts_dirty() {
        let binding = IndexBinding::new(IndexAlgorithm::BallTree);
        assert!(binding.is_dirty(RankingSpace::Euclidean));
        assert!(binding.is_dirty(RankingSpace::Cosine));
        assert!(binding.fresh(RankingSpace::Euclidean).is_none());
    }

    #[test]
    fn test_rebuild_then_invalidate() {
        let library = library(&[("a", vec![0.0, 0.0]), ("b", vec![1.0, 1.0])]);
        let mut binding = IndexBinding::new(IndexAlgorithm::KdTree);

        let built = binding
            .rebuild(&library, RankingSpace::Euclidean, &BuildOptions::default())
            .unwrap();
        assert_eq!(built.structure.len(), 2);
        assert!(binding.fresh(RankingSpace::Euclidean).is_some());
        assert!(binding.is_dirty(RankingSpace::Cosine));

        binding.invalidate();
        assert!(binding.fresh(RankingSpace::Euclidean).is_none());
    }

    #[test]
    fn test_set_algorithm_marks_dirty() {
        let library = library(&[("a", vec![0.0, 0.0])]);
        let mut binding = IndexBinding::new(IndexAlgorithm::KdTree);
        binding
            .rebuild(&library, RankingSpace::Euclidean, &BuildOptions::default())
            .unwrap();

        binding.set_algorithm(IndexAlgorithm::KdTree);
        assert!(binding.is_dirty(RankingSpace::Euclidean));

        binding.set_algorithm(IndexAlgorithm::BallTree);
        let built = binding
            .rebuild(&library, RankingSpace::Euclidean, &BuildOptions::default())
            .unwrap();
        assert_eq!(built.structure.algorithm(), IndexAlgorithm::BallTree);
    }

    #[test]
    fn test_cosine_space_separates_zero_norm_chunks() {
        let library = library(&[
            ("a", vec![3.0, 4.0]),
            ("z2", vec![0.0, 0.0]),
            ("z1", vec![0.0, 0.0]),
        ]);
        let mut binding = IndexBinding::new(IndexAlgorithm::BruteForce);
        let built = binding
            .rebuild(&library, RankingSpace::Cosine, &BuildOptions::default())
            .unwrap();

        assert_eq!(built.structure.len(), 1);
        assert_eq!(
            built.zero_norm,
            vec![ChunkKey::new("doc", "z1"), ChunkKey::new("doc", "z2")]
        );
        let neighbors = built.structure.query(&[1.0, 0.0], 1).unwrap();
        // (0.6, 0.8) lies sqrt(0.8) away from (1, 0).
        assert!((neighbors[0].distance - 0.894_427_2).abs() < 1e-6);
    }

    #[test]
    fn test_empty_library_builds_empty_structure() {
        let library = Library::new("empty", Metadata::new(), IndexAlgorithm::BallTree);
        let mut binding = IndexBinding::new(IndexAlgorithm::BallTree);
        let built = binding
            .rebuild(&library, RankingSpace::Euclidean, &BuildOptions::default())
            .unwrap();
        assert!(built.structure.is_empty());
    }
}
