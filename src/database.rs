//! The [`Database`] context object.
//!
//! A `Database` owns the corpus and the query engine and is the single entry
//! point of the crate. It is `Send + Sync`; share it between threads with an
//! `Arc`.
//!
//! # Example
//!
//! ```
//! use lancet::corpus::{Chunk, Metadata, NewDocument};
//! use lancet::database::Database;
//!
//! let db = Database::default();
//! db.create_library("notes", Metadata::new(), None).unwrap();
//! db.create_document(
//!     "notes",
//!     NewDocument::with_id("todo")
//!         .chunk(Chunk::new("a", "buy milk", vec![0.0, 0.0]))
//!         .chunk(Chunk::new("b", "call bob", vec![1.0, 1.0])),
//! )
//! .unwrap();
//!
//! let hits = db.search_knn("notes", &[0.0, 1.0], 1).unwrap();
//! assert_eq!(hits[0].chunk_id, "a");
//! ```

use log::info;

use crate::config::EngineConfig;
use crate::corpus::model::{
    Chunk, ChunkUpdate, Document, DocumentUpdate, Library, LibraryUpdate, Metadata, NewDocument,
};
use crate::corpus::snapshot::CorpusSnapshot;
use crate::corpus::store::CorpusStore;
use crate::error::Result;
use crate::vector::index::manager::IndexStats;
use crate::vector::index::{AlgorithmInfo, IndexAlgorithm};
use crate::vector::search::engine::QueryEngine;
use crate::vector::search::{SearchHit, SearchRequest, SearchResults};

/// Embedded similarity-search database.
#[derive(Debug)]
pub struct Database {
    config: EngineConfig,
    store: CorpusStore,
    engine: QueryEngine,
}

impl Default for Database {
    fn default() -> Self {
        let config = EngineConfig::default();
        Self {
            store: CorpusStore::new(config.default_algorithm),
            engine: QueryEngine::new(config.build_options()),
            config,
        }
    }
}

impl Database {
    pub fn new(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            store: CorpusStore::new(config.default_algorithm),
            engine: QueryEngine::new(config.build_options()),
            config,
        })
    }

    /// Restore a database from a snapshot, re-checking every invariant.
    pub fn from_snapshot(config: EngineConfig, snapshot: CorpusSnapshot) -> Result<Self> {
        let database = Self::new(config)?;
        let count = snapshot.libraries.len();
        for library in snapshot.libraries {
            database.store.insert_library(library.validated()?)?;
        }
        info!("Restored {count} libraries from snapshot");
        Ok(database)
    }

    /// Copy of the whole corpus, libraries ordered by id.
    pub fn snapshot(&self) -> CorpusSnapshot {
        CorpusSnapshot::new(self.store.libraries())
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn store(&self) -> &CorpusStore {
        &self.store
    }

    // Libraries

    /// Create an empty library. `algorithm` defaults to the configured one.
    pub fn create_library(
        &self,
        library_id: &str,
        metadata: Metadata,
        algorithm: Option<IndexAlgorithm>,
    ) -> Result<Library> {
        self.store.create_library(library_id, metadata, algorithm)
    }

    pub fn get_library(&self, library_id: &str) -> Result<Library> {
        self.store.get_library(library_id)
    }

    pub fn library_exists(&self, library_id: &str) -> bool {
        self.store.library_exists(library_id)
    }

    pub fn list_libraries(&self) -> Vec<String> {
        self.store.list_libraries()
    }

    pub fn update_library(&self, library_id: &str, update: LibraryUpdate) -> Result<Library> {
        self.store.update_library(library_id, update)
    }

    pub fn delete_library(&self, library_id: &str) -> Result<()> {
        self.store.delete_library(library_id)
    }

    // Documents

    pub fn create_document(&self, library_id: &str, document: NewDocument) -> Result<Document> {
        self.store.create_document(library_id, document)
    }

    pub fn get_document(&self, library_id: &str, document_id: &str) -> Result<Document> {
        self.store.get_document(library_id, document_id)
    }

    pub fn list_documents(&self, library_id: &str) -> Result<Vec<Document>> {
        self.store.list_documents(library_id)
    }

    pub fn update_document(
        &self,
        library_id: &str,
        document_id: &str,
        update: DocumentUpdate,
    ) -> Result<Document> {
        self.store.update_document(library_id, document_id, update)
    }

    pub fn delete_document(&self, library_id: &str, document_id: &str) -> Result<()> {
        self.store.delete_document(library_id, document_id)
    }

    // Chunks

    pub fn create_chunk(&self, library_id: &str, document_id: &str, chunk: Chunk) -> Result<Chunk> {
        self.store.create_chunk(library_id, document_id, chunk)
    }

    pub fn get_chunk(&self, library_id: &str, document_id: &str, chunk_id: &str) -> Result<Chunk> {
        self.store.get_chunk(library_id, document_id, chunk_id)
    }

    pub fn list_chunks(&self, library_id: &str, document_id: &str) -> Result<Vec<Chunk>> {
        self.store.list_chunks(library_id, document_id)
    }

    pub fn update_chunk(
        &self,
        library_id: &str,
        document_id: &str,
        chunk_id: &str,
        update: ChunkUpdate,
    ) -> Result<Chunk> {
        self.store
            .update_chunk(library_id, document_id, chunk_id, update)
    }

    pub fn delete_chunk(&self, library_id: &str, document_id: &str, chunk_id: &str) -> Result<()> {
        self.store.delete_chunk(library_id, document_id, chunk_id)
    }

    // Search

    /// The `k` nearest chunks by Euclidean distance, ascending.
    pub fn search_knn(&self, library_id: &str, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.engine.search_knn(&self.store, library_id, query, k)
    }

    /// The `k` most similar chunks by cosine similarity, descending.
    pub fn search_cosine(&self, library_id: &str, query: &[f32], k: usize) -> Result<Vec<SearchHit>> {
        self.engine.search_cosine(&self.store, library_id, query, k)
    }

    pub fn search(&self, library_id: &str, request: &SearchRequest) -> Result<SearchResults> {
        self.engine.search(&self.store, library_id, request)
    }

    // Indexes

    pub fn algorithms(&self) -> Vec<AlgorithmInfo> {
        IndexAlgorithm::all()
    }

    pub fn index_stats(&self, library_id: &str) -> Result<IndexStats> {
        let entry = self.store.entry(library_id)?;
        self.engine.manager().stats(&entry)
    }

    /// Rebuild both index structures of a library now instead of on the
    /// next query.
    pub fn rebuild_index(&self, library_id: &str) -> Result<IndexStats> {
        let entry = self.store.entry(library_id)?;
        self.engine.manager().rebuild(&entry)
    }
}
