//! Exact nearest-neighbor index structures.
//!
//! Three interchangeable algorithms build a queryable structure over the
//! flattened `(ChunkKey, embedding)` pairs of one library:
//!
//! - [`flat::FlatIndex`]: exhaustive scan (brute force)
//! - [`kdtree::KdTree`]: axis-aligned binary space partitioning
//! - [`balltree::BallTree`]: nested hyperspheres with triangle-inequality pruning
//!
//! They are wrapped in the closed sum type [`IndexStructure`]. Every variant
//! returns neighbors ascending by Euclidean distance, ties broken by
//! ascending [`ChunkKey`], so all three produce identical output for the
//! same input.

pub mod balltree;
pub mod flat;
pub mod kdtree;
pub mod manager;

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{LancetError, Result};

pub use self::balltree::BallTree;
pub use self::flat::FlatIndex;
pub use self::kdtree::KdTree;

/// Identity of an indexed chunk within a library.
///
/// Ordered by `chunk_id` first and `document_id` second; this is the
/// tie-break order for equal distances.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkKey {
    pub document_id: String,
    pub chunk_id: String,
}

impl ChunkKey {
    pub fn new(document_id: impl Into<String>, chunk_id: impl Into<String>) -> Self {
        Self {
            document_id: document_id.into(),
            chunk_id: chunk_id.into(),
        }
    }
}

impl Ord for ChunkKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.chunk_id
            .cmp(&other.chunk_id)
            .then_with(|| self.document_id.cmp(&other.document_id))
    }
}

impl PartialOrd for ChunkKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.document_id, self.chunk_id)
    }
}

/// A single query result: a chunk and its distance to the query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Neighbor {
    pub key: ChunkKey,
    pub distance: f32,
}

/// Points stored row-major in one flat buffer.
#[derive(Debug, Clone, Default)]
pub struct PointSet {
    keys: Vec<ChunkKey>,
    data: Vec<f32>,
    dimension: usize,
}

impl PointSet {
    pub fn new(dimension: usize) -> Self {
        Self {
            keys: Vec::new(),
            data: Vec::new(),
            dimension,
        }
    }

    pub fn with_capacity(dimension: usize, capacity: usize) -> Self {
        Self {
            keys: Vec::with_capacity(capacity),
            data: Vec::with_capacity(capacity * dimension),
            dimension,
        }
    }

    /// Append a point. A length disagreeing with the set's dimension means the
    /// source data is corrupt and is reported as an index error.
    pub fn push(&mut self, key: ChunkKey, vector: &[f32]) -> Result<()> {
        if vector.len() != self.dimension {
            return Err(LancetError::index(format!(
                "point {key} has dimension {}, index expects {}",
                vector.len(),
                self.dimension
            )));
        }
        self.keys.push(key);
        self.data.extend_from_slice(vector);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    #[inline]
    pub fn point(&self, index: u32) -> &[f32] {
        let start = index as usize * self.dimension;
        &self.data[start..start + self.dimension]
    }

    #[inline]
    pub fn key(&self, index: u32) -> &ChunkKey {
        &self.keys[index as usize]
    }

    /// Order two points by `(distance, key)`.
    #[inline]
    pub(crate) fn cmp_ranked(&self, a: (f32, u32), b: (f32, u32)) -> Ordering {
        a.0.total_cmp(&b.0)
            .then_with(|| self.key(a.1).cmp(self.key(b.1)))
    }

    fn indices(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.keys.len()).map(|i| i as u32)
    }
}

/// Selector for the index algorithm bound to a library.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IndexAlgorithm {
    /// Exhaustive linear scan.
    BruteForce,
    /// KD-Tree with round-robin split axis.
    #[default]
    KdTree,
    /// Ball-Tree with farthest-point seeding.
    BallTree,
}

/// Static description of an index algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AlgorithmInfo {
    pub algorithm: IndexAlgorithm,
    pub name: &'static str,
    pub description: &'static str,
    pub build_complexity: &'static str,
    pub query_complexity: &'static str,
}

impl IndexAlgorithm {
    /// All algorithms, in listing order.
    pub const ALL: [IndexAlgorithm; 3] = [
        IndexAlgorithm::BruteForce,
        IndexAlgorithm::KdTree,
        IndexAlgorithm::BallTree,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            IndexAlgorithm::BruteForce => "brute_force",
            IndexAlgorithm::KdTree => "kd_tree",
            IndexAlgorithm::BallTree => "ball_tree",
        }
    }

    /// Parse an algorithm from its name or a common alias.
    pub fn parse_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().replace('-', "_").as_str() {
            "brute_force" | "bruteforce" | "linear" | "flat" => Ok(IndexAlgorithm::BruteForce),
            "kd_tree" | "kdtree" => Ok(IndexAlgorithm::KdTree),
            "ball_tree" | "balltree" => Ok(IndexAlgorithm::BallTree),
            _ => Err(LancetError::invalid_argument(format!(
                "Unknown index algorithm: {s}"
            ))),
        }
    }

    pub fn info(&self) -> AlgorithmInfo {
        match self {
            IndexAlgorithm::BruteForce => AlgorithmInfo {
                algorithm: *self,
                name: self.name(),
                description: "Exhaustive scan over every stored vector; the exactness baseline.",
                build_complexity: "O(n)",
                query_complexity: "O(n) per query",
            },
            IndexAlgorithm::KdTree => AlgorithmInfo {
                algorithm: *self,
                name: self.name(),
                description: "Median splits on one coordinate axis per level (round-robin); \
                              best for low to medium dimensionality.",
                build_complexity: "O(n log n)",
                query_complexity: "O(log n) average, O(n) worst case",
            },
            IndexAlgorithm::BallTree => AlgorithmInfo {
                algorithm: *self,
                name: self.name(),
                description: "Nested hyperspheres (centroid + radius) pruned by the triangle \
                              inequality; holds up better in higher dimensions.",
                build_complexity: "O(n log n)",
                query_complexity: "O(log n) average, O(n) worst case",
            },
        }
    }

    /// Descriptions of every available algorithm.
    pub fn all() -> Vec<AlgorithmInfo> {
        Self::ALL.iter().map(|a| a.info()).collect()
    }
}

impl fmt::Display for IndexAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for IndexAlgorithm {
    type Err = LancetError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

/// Tuning knobs for building structures. They change speed, never results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Maximum number of points in a Ball-Tree leaf.
    pub leaf_size: usize,
    /// Point count from which brute-force scans run on the rayon pool.
    pub parallel_threshold: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            leaf_size: 16,
            parallel_threshold: 1024,
        }
    }
}

/// A built index structure of one of the three algorithms.
#[derive(Debug, Clone)]
pub enum IndexStructure {
    BruteForce(FlatIndex),
    KdTree(KdTree),
    BallTree(BallTree),
}

impl IndexStructure {
    /// Build a structure of the given algorithm over `points`.
    pub fn build(
        algorithm: IndexAlgorithm,
        points: PointSet,
        options: &BuildOptions,
    ) -> Result<Self> {
        if points.dimension() == 0 && !points.is_empty() {
            return Err(LancetError::index("cannot index zero-dimensional points"));
        }

        let structure = match algorithm {
            IndexAlgorithm::BruteForce => {
                IndexStructure::BruteForce(FlatIndex::build(points, options.parallel_threshold))
            }
            IndexAlgorithm::KdTree => IndexStructure::KdTree(KdTree::build(points)),
            IndexAlgorithm::BallTree => {
                IndexStructure::BallTree(BallTree::build(points, options.leaf_size.max(1)))
            }
        };
        Ok(structure)
    }

    /// The `k` nearest points to `query`, ascending by `(distance, key)`.
    ///
    /// An empty structure yields an empty result; `k` larger than the number
    /// of points yields every point.
    pub fn query(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        let points = self.points();
        if points.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        if query.len() != points.dimension() {
            return Err(LancetError::dimension_mismatch(
                points.dimension(),
                query.len(),
            ));
        }

        let neighbors = match self {
            IndexStructure::BruteForce(index) => index.query(query, k),
            IndexStructure::KdTree(index) => index.query(query, k),
            IndexStructure::BallTree(index) => index.query(query, k),
        };
        Ok(neighbors)
    }

    pub fn algorithm(&self) -> IndexAlgorithm {
        match self {
            IndexStructure::BruteForce(_) => IndexAlgorithm::BruteForce,
            IndexStructure::KdTree(_) => IndexAlgorithm::KdTree,
            IndexStructure::BallTree(_) => IndexAlgorithm::BallTree,
        }
    }

    pub fn len(&self) -> usize {
        self.points().len()
    }

    pub fn is_empty(&self) -> bool {
        self.points().is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.points().dimension()
    }

    fn points(&self) -> &PointSet {
        match self {
            IndexStructure::BruteForce(index) => index.points(),
            IndexStructure::KdTree(index) => index.points(),
            IndexStructure::BallTree(index) => index.points(),
        }
    }
}

/// Relative slack applied to pruning bounds so float rounding in the bound
/// never discards a point that ties the current k-th best distance.
const PRUNE_SLACK: f32 = 1e-5;

/// Heap entry; the max-heap top is the current worst of the best `k`.
#[derive(Debug, Clone, Copy)]
struct Candidate<'a> {
    distance: f32,
    index: u32,
    key: &'a ChunkKey,
}

impl PartialEq for Candidate<'_> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Candidate<'_> {}

impl PartialOrd for Candidate<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Candidate<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.key.cmp(other.key))
    }
}

/// Bounded collector of the `k` best points seen so far during a tree walk.
pub(crate) struct NeighborHeap<'a> {
    points: &'a PointSet,
    heap: BinaryHeap<Candidate<'a>>,
    k: usize,
}

impl<'a> NeighborHeap<'a> {
    pub(crate) fn new(points: &'a PointSet, k: usize) -> Self {
        Self {
            points,
            heap: BinaryHeap::with_capacity(k.min(points.len()) + 1),
            k,
        }
    }

    /// Consider point `index` at `distance`.
    pub(crate) fn offer(&mut self, distance: f32, index: u32) {
        let candidate = Candidate {
            distance,
            index,
            key: self.points.key(index),
        };

        if self.heap.len() < self.k {
            self.heap.push(candidate);
        } else if let Some(worst) = self.heap.peek()
            && candidate < *worst
        {
            self.heap.pop();
            self.heap.push(candidate);
        }
    }

    /// Whether a region whose points are all at least `bound` away could
    /// still contribute a result.
    pub(crate) fn admits(&self, bound: f32) -> bool {
        if self.heap.len() < self.k {
            return true;
        }
        match self.heap.peek() {
            Some(worst) => bound <= worst.distance + PRUNE_SLACK * (1.0 + worst.distance),
            None => true,
        }
    }

    pub(crate) fn into_neighbors(self) -> Vec<Neighbor> {
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|candidate| Neighbor {
                key: self.points.key(candidate.index).clone(),
                distance: candidate.distance,
            })
            .collect()
    }
}
