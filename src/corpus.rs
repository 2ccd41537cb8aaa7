//! The Library → Document → Chunk corpus.
//!
//! - `model`: data types and their structural invariants
//! - `store`: thread-safe registry with per-library locks
//! - `snapshot`: serializable copy of the whole hierarchy

pub mod model;
pub mod snapshot;
pub mod store;

pub use self::model::{
    Chunk, ChunkUpdate, Document, DocumentUpdate, Library, LibraryUpdate, Metadata, NewDocument,
};
pub use self::snapshot::CorpusSnapshot;
pub use self::store::CorpusStore;
