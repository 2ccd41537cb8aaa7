//! Core vector math shared by the index structures and the query engine.
//!
//! Contains the metric library (Euclidean and cosine) and embedding
//! validation/normalization helpers. Nothing here holds state.

pub mod distance;
pub mod vector;
