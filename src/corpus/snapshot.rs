//! Serializable copy of the whole corpus.
//!
//! A snapshot holds the Library → Document → Chunk hierarchy only; index
//! structures are derived state and are rebuilt lazily after a restore.

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::corpus::model::Library;
use crate::error::{LancetError, Result};

/// Current snapshot format version.
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusSnapshot {
    pub version: u32,
    /// Libraries ordered by id.
    pub libraries: Vec<Library>,
}

impl Default for CorpusSnapshot {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl CorpusSnapshot {
    pub fn new(libraries: Vec<Library>) -> Self {
        Self {
            version: SNAPSHOT_VERSION,
            libraries,
        }
    }

    pub fn chunk_count(&self) -> usize {
        self.libraries.iter().map(Library::chunk_count).sum()
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let snapshot: CorpusSnapshot = serde_json::from_str(json)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let reader = BufReader::new(File::open(path)?);
        let snapshot: CorpusSnapshot = serde_json::from_reader(reader)?;
        snapshot.check_version()?;
        Ok(snapshot)
    }

    pub fn write_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut writer = BufWriter::new(File::create(path)?);
        serde_json::to_writer(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }

    fn check_version(&self) -> Result<()> {
        if self.version != SNAPSHOT_VERSION {
            return Err(LancetError::invalid_argument(format!(
                "unsupported snapshot version {} (expected {SNAPSHOT_VERSION})",
                self.version
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejects_unknown_version() {
        let err = CorpusSnapshot::from_json(r#"{"version": 7, "libraries": []}"#).unwrap_err();
        assert!(matches!(err, LancetError::InvalidArgument(_)));
    }

    #[test]
    fn test_library_defaults_when_fields_missing() {
        let snapshot = CorpusSnapshot::from_json(
            r#"{"version": 1, "libraries": [{"id": "books"}]}"#,
        )
        .unwrap();
        let library = &snapshot.libraries[0];
        assert_eq!(library.id, "books");
        assert_eq!(library.dimension, None);
        assert!(library.documents.is_empty());
        assert_eq!(snapshot.chunk_count(), 0);
    }
}
