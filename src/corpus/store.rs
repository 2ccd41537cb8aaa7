//! Thread-safe registry of libraries.
//!
//! Lock layout: the registry map is guarded by its own `RwLock`, held only
//! while looking up, inserting or removing an entry. Each library sits
//! behind its own `RwLock` together with its index binding, so mutations of
//! one library never block another. The registry lock is never held while a
//! library lock is taken.

use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::corpus::model::{
    Chunk, ChunkUpdate, Document, DocumentUpdate, Library, LibraryUpdate, Metadata, NewDocument,
    validate_id,
};
use crate::error::{LancetError, Result};
use crate::vector::index::IndexAlgorithm;
use crate::vector::index::manager::IndexBinding;

/// A library plus its derived index state.
#[derive(Debug)]
pub struct LibraryState {
    pub(crate) library: Library,
    pub(crate) index: IndexBinding,
    deleted: bool,
}

impl LibraryState {
    fn new(library: Library) -> Self {
        let index = IndexBinding::new(library.index_algorithm);
        Self {
            library,
            index,
            deleted: false,
        }
    }

    /// Fail with `NotFound` once the library has been deleted. An operation
    /// that fetched the entry before the delete can still reach it.
    pub(crate) fn ensure_live(&self) -> Result<()> {
        if self.deleted {
            return Err(LancetError::not_found(format!(
                "library '{}'",
                self.library.id
            )));
        }
        Ok(())
    }
}

/// Registry slot of one library.
#[derive(Debug)]
pub struct LibraryEntry {
    state: RwLock<LibraryState>,
}

impl LibraryEntry {
    fn new(library: Library) -> Self {
        Self {
            state: RwLock::new(LibraryState::new(library)),
        }
    }

    pub(crate) fn read(&self) -> RwLockReadGuard<'_, LibraryState> {
        self.state.read()
    }

    pub(crate) fn write(&self) -> RwLockWriteGuard<'_, LibraryState> {
        self.state.write()
    }
}

/// Owner of every library, document and chunk.
#[derive(Debug)]
pub struct CorpusStore {
    libraries: RwLock<HashMap<String, Arc<LibraryEntry>>>,
    default_algorithm: IndexAlgorithm,
}

impl Default for CorpusStore {
    fn default() -> Self {
        Self::new(IndexAlgorithm::default())
    }
}

impl CorpusStore {
    pub fn new(default_algorithm: IndexAlgorithm) -> Self {
        Self {
            libraries: RwLock::new(HashMap::new()),
            default_algorithm,
        }
    }

    pub fn default_algorithm(&self) -> IndexAlgorithm {
        self.default_algorithm
    }

    /// Registry lookup. The registry lock is released before returning.
    pub(crate) fn entry(&self, library_id: &str) -> Result<Arc<LibraryEntry>> {
        self.libraries
            .read()
            .get(library_id)
            .cloned()
            .ok_or_else(|| LancetError::not_found(format!("library '{library_id}'")))
    }

    fn read<R>(&self, library_id: &str, f: impl FnOnce(&Library) -> Result<R>) -> Result<R> {
        let entry = self.entry(library_id)?;
        let state = entry.read();
        state.ensure_live()?;
        f(&state.library)
    }

    fn write<R>(&self, library_id: &str, f: impl FnOnce(&mut LibraryState) -> Result<R>) -> Result<R> {
        let entry = self.entry(library_id)?;
        let mut state = entry.write();
        state.ensure_live()?;
        f(&mut *state)
    }

    // Libraries

    pub fn create_library(
        &self,
        library_id: &str,
        metadata: Metadata,
        algorithm: Option<IndexAlgorithm>,
    ) -> Result<Library> {
        validate_id("library", library_id)?;
        let algorithm = algorithm.unwrap_or(self.default_algorithm);
        let library = Library::new(library_id, metadata, algorithm);

        let mut libraries = self.libraries.write();
        if libraries.contains_key(library_id) {
            return Err(LancetError::already_exists(format!(
                "library '{library_id}'"
            )));
        }
        libraries.insert(
            library_id.to_string(),
            Arc::new(LibraryEntry::new(library.clone())),
        );
        info!("Created library '{library_id}' with {algorithm} index");
        Ok(library)
    }

    /// Register a fully validated library, as restored from a snapshot.
    pub(crate) fn insert_library(&self, library: Library) -> Result<()> {
        let mut libraries = self.libraries.write();
        if libraries.contains_key(&library.id) {
            return Err(LancetError::already_exists(format!(
                "library '{}'",
                library.id
            )));
        }
        libraries.insert(library.id.clone(), Arc::new(LibraryEntry::new(library)));
        Ok(())
    }

    pub fn get_library(&self, library_id: &str) -> Result<Library> {
        self.read(library_id, |library| Ok(library.clone()))
    }

    pub fn library_exists(&self, library_id: &str) -> bool {
        self.libraries.read().contains_key(library_id)
    }

    /// Library ids in ascending order.
    pub fn list_libraries(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.libraries.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Clones of every library, ordered by id.
    pub fn libraries(&self) -> Vec<Library> {
        let entries: Vec<Arc<LibraryEntry>> = self.libraries.read().values().cloned().collect();
        let mut libraries: Vec<Library> = entries
            .into_iter()
            .filter_map(|entry| {
                let state = entry.read();
                state.ensure_live().ok().map(|_| state.library.clone())
            })
            .collect();
        libraries.sort_by(|a, b| a.id.cmp(&b.id));
        libraries
    }

    pub fn update_library(&self, library_id: &str, update: LibraryUpdate) -> Result<Library> {
        self.write(library_id, |state| {
            if let Some(metadata) = update.metadata {
                state.library.metadata = metadata;
            }
            if let Some(algorithm) = update.index_algorithm {
                state.library.index_algorithm = algorithm;
                state.index.set_algorithm(algorithm);
                info!("Library '{library_id}' now uses {algorithm} index");
            }
            Ok(state.library.clone())
        })
    }

    /// Remove a library and everything in it.
    pub fn delete_library(&self, library_id: &str) -> Result<()> {
        let entry = self
            .libraries
            .write()
            .remove(library_id)
            .ok_or_else(|| LancetError::not_found(format!("library '{library_id}'")))?;

        let mut state = entry.write();
        state.deleted = true;
        state.index.clear();
        info!("Deleted library '{library_id}'");
        Ok(())
    }

    // Documents

    /// Create a document, optionally with initial chunks. The id defaults to
    /// a random UUID.
    pub fn create_document(&self, library_id: &str, document: NewDocument) -> Result<Document> {
        let document_id = document
            .id
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        self.write(library_id, |state| {
            let created =
                state
                    .library
                    .insert_document(document_id, document.metadata, document.chunks)?;
            if created.chunk_count() > 0 {
                state.index.invalidate();
            }
            debug!(
                "Created document '{}' in library '{library_id}' with {} chunks",
                created.id,
                created.chunk_count()
            );
            Ok(created)
        })
    }

    pub fn get_document(&self, library_id: &str, document_id: &str) -> Result<Document> {
        self.read(library_id, |library| library.document(document_id).cloned())
    }

    /// Documents of a library, ordered by id.
    pub fn list_documents(&self, library_id: &str) -> Result<Vec<Document>> {
        self.read(library_id, |library| {
            Ok(library.sorted_documents().into_iter().cloned().collect())
        })
    }

    pub fn update_document(
        &self,
        library_id: &str,
        document_id: &str,
        update: DocumentUpdate,
    ) -> Result<Document> {
        self.write(library_id, |state| {
            let (document, structural) = state.library.update_document(document_id, update)?;
            if structural {
                state.index.invalidate();
                debug!(
                    "Replaced chunks of document '{document_id}' in library '{library_id}'"
                );
            }
            Ok(document)
        })
    }

    pub fn delete_document(&self, library_id: &str, document_id: &str) -> Result<()> {
        self.write(library_id, |state| {
            let removed = state.library.remove_document(document_id)?;
            if removed.chunk_count() > 0 {
                state.index.invalidate();
            }
            debug!("Deleted document '{document_id}' from library '{library_id}'");
            Ok(())
        })
    }

    // Chunks

    pub fn create_chunk(&self, library_id: &str, document_id: &str, chunk: Chunk) -> Result<Chunk> {
        self.write(library_id, |state| {
            let chunk = state.library.insert_chunk(document_id, chunk)?;
            state.index.invalidate();
            Ok(chunk)
        })
    }

    pub fn get_chunk(&self, library_id: &str, document_id: &str, chunk_id: &str) -> Result<Chunk> {
        self.read(library_id, |library| {
            library.chunk(document_id, chunk_id).cloned()
        })
    }

    /// Chunks of a document, ordered by id.
    pub fn list_chunks(&self, library_id: &str, document_id: &str) -> Result<Vec<Chunk>> {
        self.read(library_id, |library| {
            Ok(library
                .document(document_id)?
                .sorted_chunks()
                .into_iter()
                .cloned()
                .collect())
        })
    }

    pub fn update_chunk(
        &self,
        library_id: &str,
        document_id: &str,
        chunk_id: &str,
        update: ChunkUpdate,
    ) -> Result<Chunk> {
        self.write(library_id, |state| {
            let structural = update.is_structural();
            let chunk = state.library.update_chunk(document_id, chunk_id, update)?;
            if structural {
                state.index.invalidate();
            }
            Ok(chunk)
        })
    }

    pub fn delete_chunk(&self, library_id: &str, document_id: &str, chunk_id: &str) -> Result<()> {
        self.write(library_id, |state| {
            state.library.remove_chunk(document_id, chunk_id)?;
            state.index.invalidate();
            Ok(())
        })
    }
}
