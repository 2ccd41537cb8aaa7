//! Library → Document → Chunk data model.
//!
//! The mutation methods here are the single place where structural
//! invariants are checked. Every method validates completely before it
//! touches `self`, so a rejected call leaves the library unchanged.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use serde::{Deserialize, Serialize};

use crate::error::{LancetError, Result};
use crate::vector::core::vector::{validate_dimension, validate_embedding};
use crate::vector::index::{ChunkKey, IndexAlgorithm};

/// Opaque key-value metadata attached to libraries, documents and chunks.
pub type Metadata = HashMap<String, serde_json::Value>;

/// Smallest indexed unit: text plus its embedding and metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: String,
    #[serde(default)]
    pub text: String,
    pub embedding: Vec<f32>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Chunk {
    pub fn new(id: impl Into<String>, text: impl Into<String>, embedding: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            embedding,
            metadata: Metadata::new(),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }
}

/// A document: a set of chunks keyed by chunk id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub id: String,
    #[serde(default)]
    pub chunks: HashMap<String, Chunk>,
    #[serde(default)]
    pub metadata: Metadata,
}

impl Document {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            chunks: HashMap::new(),
            metadata: Metadata::new(),
        }
    }

    pub fn chunk(&self, chunk_id: &str) -> Result<&Chunk> {
        self.chunks.get(chunk_id).ok_or_else(|| {
            LancetError::not_found(format!(
                "chunk '{chunk_id}' in document '{}'",
                self.id
            ))
        })
    }

    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Chunks ordered by id.
    pub fn sorted_chunks(&self) -> Vec<&Chunk> {
        let mut chunks: Vec<&Chunk> = self.chunks.values().collect();
        chunks.sort_by(|a, b| a.id.cmp(&b.id));
        chunks
    }
}

/// Top-level owner of a document hierarchy and the unit of index binding.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Library {
    pub id: String,
    #[serde(default)]
    pub documents: HashMap<String, Document>,
    #[serde(default)]
    pub metadata: Metadata,
    /// Set by the first chunk insertion and immutable afterwards.
    #[serde(default)]
    pub dimension: Option<usize>,
    #[serde(default)]
    pub index_algorithm: IndexAlgorithm,
}

/// Fields of a library that can be replaced after creation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LibraryUpdate {
    pub metadata: Option<Metadata>,
    pub index_algorithm: Option<IndexAlgorithm>,
}

/// Input for document creation. A missing id is replaced by a random UUID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NewDocument {
    pub id: Option<String>,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub chunks: Vec<Chunk>,
}

impl NewDocument {
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            ..Default::default()
        }
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn chunk(mut self, chunk: Chunk) -> Self {
        self.chunks.push(chunk);
        self
    }
}

/// Fields of a document that can be replaced. `chunks` swaps the whole set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DocumentUpdate {
    pub metadata: Option<Metadata>,
    pub chunks: Option<Vec<Chunk>>,
}

/// Fields of a chunk that can be replaced.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChunkUpdate {
    pub text: Option<String>,
    pub metadata: Option<Metadata>,
    pub embedding: Option<Vec<f32>>,
}

impl ChunkUpdate {
    pub fn text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn embedding(mut self, embedding: Vec<f32>) -> Self {
        self.embedding = Some(embedding);
        self
    }

    /// Whether applying this update changes the indexed chunk set.
    pub fn is_structural(&self) -> bool {
        self.embedding.is_some()
    }
}

pub(crate) fn validate_id(kind: &str, id: &str) -> Result<()> {
    if id.trim().is_empty() {
        return Err(LancetError::invalid_argument(format!(
            "{kind} id must not be empty"
        )));
    }
    Ok(())
}

impl Library {
    pub fn new(id: impl Into<String>, metadata: Metadata, index_algorithm: IndexAlgorithm) -> Self {
        Self {
            id: id.into(),
            documents: HashMap::new(),
            metadata,
            dimension: None,
            index_algorithm,
        }
    }

    pub fn document(&self, document_id: &str) -> Result<&Document> {
        self.documents.get(document_id).ok_or_else(|| {
            LancetError::not_found(format!(
                "document '{document_id}' in library '{}'",
                self.id
            ))
        })
    }

    fn document_mut(&mut self, document_id: &str) -> Result<&mut Document> {
        let library_id = &self.id;
        self.documents.get_mut(document_id).ok_or_else(|| {
            LancetError::not_found(format!(
                "document '{document_id}' in library '{library_id}'"
            ))
        })
    }

    pub fn chunk(&self, document_id: &str, chunk_id: &str) -> Result<&Chunk> {
        self.document(document_id)?.chunk(chunk_id)
    }

    pub fn chunk_count(&self) -> usize {
        self.documents.values().map(Document::chunk_count).sum()
    }

    /// Documents ordered by id.
    pub fn sorted_documents(&self) -> Vec<&Document> {
        let mut documents: Vec<&Document> = self.documents.values().collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        documents
    }

    /// Every `(key, embedding)` pair of the library, in no particular order.
    pub fn embeddings(&self) -> impl Iterator<Item = (ChunkKey, &[f32])> + '_ {
        self.documents.values().flat_map(|document| {
            document.chunks.values().map(move |chunk| {
                (
                    ChunkKey::new(document.id.clone(), chunk.id.clone()),
                    chunk.embedding.as_slice(),
                )
            })
        })
    }

    /// Embedding of the chunk identified by `key`, if it exists.
    pub fn embedding(&self, key: &ChunkKey) -> Option<&[f32]> {
        self.documents
            .get(&key.document_id)
            .and_then(|document| document.chunks.get(&key.chunk_id))
            .map(|chunk| chunk.embedding.as_slice())
    }

    /// Validate one embedding against this library.
    pub fn check_embedding(&self, embedding: &[f32]) -> Result<()> {
        validate_embedding(embedding)?;
        if let Some(dimension) = self.dimension {
            validate_dimension(embedding, dimension)?;
        }
        Ok(())
    }

    /// Validate a batch of chunks and return the dimension the library would
    /// have after inserting them.
    fn check_chunks<'a>(&self, chunks: impl IntoIterator<Item = &'a Chunk>) -> Result<Option<usize>> {
        let mut dimension = self.dimension;
        for chunk in chunks {
            validate_id("chunk", &chunk.id)?;
            validate_embedding(&chunk.embedding)?;
            match dimension {
                Some(expected) => validate_dimension(&chunk.embedding, expected)?,
                None => dimension = Some(chunk.embedding.len()),
            }
        }
        Ok(dimension)
    }

    /// Key a list of chunks by id, rejecting duplicates.
    fn index_chunks(document_id: &str, chunks: Vec<Chunk>) -> Result<HashMap<String, Chunk>> {
        let mut keyed = HashMap::with_capacity(chunks.len());
        for chunk in chunks {
            match keyed.entry(chunk.id.clone()) {
                Entry::Occupied(_) => {
                    return Err(LancetError::already_exists(format!(
                        "chunk '{}' in document '{document_id}'",
                        chunk.id
                    )));
                }
                Entry::Vacant(slot) => {
                    slot.insert(chunk);
                }
            }
        }
        Ok(keyed)
    }

    pub(crate) fn insert_document(&mut self, id: String, metadata: Metadata, chunks: Vec<Chunk>) -> Result<Document> {
        validate_id("document", &id)?;
        if self.documents.contains_key(&id) {
            return Err(LancetError::already_exists(format!(
                "document '{id}' in library '{}'",
                self.id
            )));
        }
        let dimension = self.check_chunks(&chunks)?;
        let chunks = Self::index_chunks(&id, chunks)?;

        let document = Document {
            id: id.clone(),
            chunks,
            metadata,
        };
        self.dimension = dimension;
        self.documents.insert(id, document.clone());
        Ok(document)
    }

    /// Replace a document's metadata and/or chunk set. Returns the updated
    /// document and whether the chunk set changed.
    pub(crate) fn update_document(&mut self, document_id: &str, update: DocumentUpdate) -> Result<(Document, bool)> {
        self.document(document_id)?;
        let replacement = match update.chunks {
            Some(chunks) => {
                let dimension = self.check_chunks(&chunks)?;
                Some((dimension, Self::index_chunks(document_id, chunks)?))
            }
            None => None,
        };

        let structural = replacement.is_some();
        if let Some((dimension, _)) = &replacement {
            self.dimension = *dimension;
        }
        let document = self.document_mut(document_id)?;
        if let Some(metadata) = update.metadata {
            document.metadata = metadata;
        }
        if let Some((_, chunks)) = replacement {
            document.chunks = chunks;
        }
        Ok((document.clone(), structural))
    }

    pub(crate) fn remove_document(&mut self, document_id: &str) -> Result<Document> {
        self.documents.remove(document_id).ok_or_else(|| {
            LancetError::not_found(format!(
                "document '{document_id}' in library '{}'",
                self.id
            ))
        })
    }

    pub(crate) fn insert_chunk(&mut self, document_id: &str, chunk: Chunk) -> Result<Chunk> {
        self.document(document_id)?;
        let dimension = self.check_chunks([&chunk])?;
        if self.document(document_id)?.chunks.contains_key(&chunk.id) {
            return Err(LancetError::already_exists(format!(
                "chunk '{}' in document '{document_id}'",
                chunk.id
            )));
        }

        self.dimension = dimension;
        self.document_mut(document_id)?
            .chunks
            .insert(chunk.id.clone(), chunk.clone());
        Ok(chunk)
    }

    pub(crate) fn update_chunk(&mut self, document_id: &str, chunk_id: &str, update: ChunkUpdate) -> Result<Chunk> {
        self.chunk(document_id, chunk_id)?;
        if let Some(embedding) = &update.embedding {
            self.check_embedding(embedding)?;
        }
        let chunk = self
            .document_mut(document_id)?
            .chunks
            .get_mut(chunk_id)
            .ok_or_else(|| LancetError::not_found(format!("chunk '{chunk_id}' in document '{document_id}'")))?;

        if let Some(text) = update.text {
            chunk.text = text;
        }
        if let Some(metadata) = update.metadata {
            chunk.metadata = metadata;
        }
        if let Some(embedding) = update.embedding {
            chunk.embedding = embedding;
        }
        Ok(chunk.clone())
    }

    pub(crate) fn remove_chunk(&mut self, document_id: &str, chunk_id: &str) -> Result<Chunk> {
        self.document_mut(document_id)?
            .chunks
            .remove(chunk_id)
            .ok_or_else(|| LancetError::not_found(format!("chunk '{chunk_id}' in document '{document_id}'")))
    }

    /// Re-check every invariant of a library obtained from outside (for
    /// example a deserialized snapshot) by replaying it into an empty one.
    pub fn validated(self) -> Result<Library> {
        validate_id("library", &self.id)?;
        let mut library = Library::new(self.id, self.metadata, self.index_algorithm);
        library.dimension = self.dimension;

        let mut documents: Vec<Document> = self.documents.into_values().collect();
        documents.sort_by(|a, b| a.id.cmp(&b.id));
        for document in documents {
            let mut chunks: Vec<Chunk> = document.chunks.into_values().collect();
            chunks.sort_by(|a, b| a.id.cmp(&b.id));
            library.insert_document(document.id, document.metadata, chunks)?;
        }
        Ok(library)
    }
}
