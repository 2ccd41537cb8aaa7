//! Exact vector search.
//!
//! # Module Structure
//!
//! - `core`: distance functions, embedding validation and normalization
//! - `index`: brute force, KD-Tree and Ball-Tree structures plus the
//!   per-library index manager
//! - `search`: query engine and result types

pub mod core;
pub mod index;
pub mod search;

pub use self::core::distance::DistanceMetric;
pub use self::index::{ChunkKey, IndexAlgorithm, IndexStructure, Neighbor};
pub use self::search::{SearchHit, SearchRequest, SearchResults};
