use std::fs;

use lancet::config::EngineConfig;
use lancet::corpus::{Chunk, CorpusSnapshot, DocumentUpdate, Metadata, NewDocument};
use lancet::database::Database;
use lancet::error::{LancetError, Result};
use lancet::vector::index::IndexAlgorithm;
use serde_json::json;
use tempfile::TempDir;

fn sample_database(config: EngineConfig) -> Result<Database> {
    let db = Database::new(config)?;

    let mut metadata = Metadata::new();
    metadata.insert("topic".into(), json!("cooking"));
    db.create_library("recipes", metadata, None)?;
    db.create_document(
        "recipes",
        NewDocument::with_id("pasta")
            .chunk(
                Chunk::new("boil", "Boil the water", vec![0.1, 0.9, 0.0])
                    .with_metadata(Metadata::from_iter([("step".to_string(), json!(1))])),
            )
            .chunk(Chunk::new("salt", "Salt generously", vec![0.2, 0.8, 0.1])),
    )?;
    db.create_document(
        "recipes",
        NewDocument::with_id("salad").chunk(Chunk::new("wash", "Wash leaves", vec![0.9, 0.0, 0.3])),
    )?;

    db.create_library("empty", Metadata::new(), Some(IndexAlgorithm::BruteForce))?;
    Ok(db)
}

#[test]
fn snapshot_file_round_trip() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("corpus.json");

    let db = sample_database(EngineConfig::default())?;
    db.snapshot().write_file(&path)?;

    let restored = Database::from_snapshot(EngineConfig::default(), CorpusSnapshot::from_file(&path)?)?;
    assert_eq!(restored.list_libraries(), vec!["empty", "recipes"]);
    assert_eq!(restored.get_library("recipes")?, db.get_library("recipes")?);
    let boil = restored.get_chunk("recipes", "pasta", "boil")?;
    assert_eq!(boil.text, "Boil the water");
    assert_eq!(boil.metadata.get("step"), Some(&json!(1)));
    assert_eq!(
        restored.search_cosine("recipes", &[0.0, 1.0, 0.0], 3)?,
        db.search_cosine("recipes", &[0.0, 1.0, 0.0], 3)?
    );
    Ok(())
}

#[test]
fn corrupt_snapshot_is_rejected() -> Result<()> {
    let db = sample_database(EngineConfig::default())?;
    let mut snapshot = db.snapshot();
    let recipes = snapshot
        .libraries
        .iter_mut()
        .find(|l| l.id == "recipes")
        .expect("recipes library");
    recipes
        .documents
        .get_mut("salad")
        .expect("salad document")
        .chunks
        .insert("bad".into(), Chunk::new("bad", "", vec![1.0]));

    let err = Database::from_snapshot(EngineConfig::default(), snapshot).unwrap_err();
    assert!(matches!(err, LancetError::DimensionMismatch { .. }));

    let err = CorpusSnapshot::from_json("{not json").unwrap_err();
    assert!(matches!(err, LancetError::Json(_)));
    Ok(())
}

#[test]
fn config_file_drives_default_algorithm() -> Result<()> {
    let dir = TempDir::new()?;
    let path = dir.path().join("lancet.json");
    fs::write(
        &path,
        r#"{ "default_algorithm": "ball_tree", "ball_tree_leaf_size": 2 }"#,
    )?;

    let config = EngineConfig::from_file(&path)?;
    let db = sample_database(config)?;
    assert_eq!(
        db.get_library("recipes")?.index_algorithm,
        IndexAlgorithm::BallTree
    );
    assert_eq!(db.config().ball_tree_leaf_size, 2);

    let stats = db.rebuild_index("recipes")?;
    assert_eq!(stats.indexed_vectors, Some(3));
    assert_eq!(stats.dimension, Some(3));
    Ok(())
}

#[test]
fn missing_config_file_is_an_io_error() {
    let dir = TempDir::new().unwrap();
    let err = EngineConfig::from_file(dir.path().join("absent.json")).unwrap_err();
    assert!(matches!(err, LancetError::Io(_)));
}

#[test]
fn document_chunk_replacement_is_validated() -> Result<()> {
    let db = sample_database(EngineConfig::default())?;

    let err = db
        .update_document(
            "recipes",
            "salad",
            DocumentUpdate {
                metadata: None,
                chunks: Some(vec![
                    Chunk::new("a", "", vec![1.0, 0.0, 0.0]),
                    Chunk::new("a", "", vec![0.0, 1.0, 0.0]),
                ]),
            },
        )
        .unwrap_err();
    assert!(matches!(err, LancetError::AlreadyExists(_)));
    assert_eq!(db.list_chunks("recipes", "salad")?.len(), 1);

    db.update_document(
        "recipes",
        "salad",
        DocumentUpdate {
            metadata: None,
            chunks: Some(vec![Chunk::new("dress", "", vec![1.0, 0.0, 0.0])]),
        },
    )?;
    let hits = db.search_knn("recipes", &[1.0, 0.0, 0.0], 1)?;
    assert_eq!(hits[0].chunk_id, "dress");
    assert!(db.get_chunk("recipes", "salad", "wash").is_err());
    Ok(())
}
