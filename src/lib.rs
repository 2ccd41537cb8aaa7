//! # Lancet
//!
//! An embedded, exact similarity-search engine for chunked text embeddings.
//!
//! ## Features
//!
//! - Library → Document → Chunk corpus with enforced invariants
//! - Three exact index structures: brute force, KD-Tree and Ball-Tree
//! - Lazy index rebuild under per-library reader/writer locks
//! - k-NN (Euclidean) and cosine similarity queries with deterministic ties
//! - JSON snapshots of the whole corpus

pub mod cli;
pub mod config;
pub mod corpus;
pub mod database;
pub mod error;
pub mod vector;

pub mod prelude {
    pub use crate::config::EngineConfig;
    pub use crate::corpus::{
        Chunk, ChunkUpdate, CorpusSnapshot, Document, DocumentUpdate, Library, LibraryUpdate,
        Metadata, NewDocument,
    };
    pub use crate::database::Database;
    pub use crate::error::{LancetError, Result};
    pub use crate::vector::{DistanceMetric, IndexAlgorithm, SearchHit, SearchRequest};
}

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
