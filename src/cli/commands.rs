//! Command implementations for the Lancet CLI.

use std::path::Path;

use log::info;

use crate::cli::args::*;
use crate::cli::output::*;
use crate::config::EngineConfig;
use crate::corpus::model::LibraryUpdate;
use crate::corpus::snapshot::CorpusSnapshot;
use crate::database::Database;
use crate::error::Result;
use crate::vector::core::distance::DistanceMetric;
use crate::vector::index::IndexAlgorithm;
use crate::vector::search::SearchRequest;

/// Execute a CLI command.
pub fn execute_command(args: LancetArgs) -> Result<()> {
    match &args.command {
        Command::Algorithms => list_algorithms(&args),
        Command::Search(search_args) => search_corpus(search_args, &args),
        Command::Stats(stats_args) => show_stats(stats_args, &args),
        Command::Validate(validate_args) => validate_corpus(validate_args, &args),
    }
}

/// Configuration from `--config` (if any) with environment overrides.
pub fn load_config(args: &LancetArgs) -> Result<EngineConfig> {
    let config = match &args.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    let config = config.with_env_overrides()?;
    config.validate()?;
    Ok(config)
}

/// Load a snapshot file into a fresh database.
pub fn open_corpus(path: &Path, config: EngineConfig) -> Result<Database> {
    let snapshot = CorpusSnapshot::from_file(path)?;
    info!(
        "Loaded {} libraries ({} chunks) from {}",
        snapshot.libraries.len(),
        snapshot.chunk_count(),
        path.display()
    );
    Database::from_snapshot(config, snapshot)
}

fn list_algorithms(cli_args: &LancetArgs) -> Result<()> {
    let algorithms = IndexAlgorithm::all();
    output_result("Available index algorithms", algorithms.as_slice(), cli_args)
}

fn search_corpus(args: &SearchArgs, cli_args: &LancetArgs) -> Result<()> {
    let query = args.query_vector()?;
    let database = open_corpus(&args.corpus, load_config(cli_args)?)?;

    if let Some(name) = &args.algorithm {
        let algorithm = IndexAlgorithm::parse_str(name)?;
        database.update_library(
            &args.library,
            LibraryUpdate {
                metadata: None,
                index_algorithm: Some(algorithm),
            },
        )?;
    }

    let metric = if args.cosine {
        DistanceMetric::Cosine
    } else {
        DistanceMetric::Euclidean
    };
    let request = SearchRequest::new(query, args.k).metric(metric);
    let results = database.search(&args.library, &request)?;

    output_result(
        &format!("Searching library '{}'", args.library),
        &results,
        cli_args,
    )
}

fn show_stats(args: &StatsArgs, cli_args: &LancetArgs) -> Result<()> {
    let database = open_corpus(&args.corpus, load_config(cli_args)?)?;

    let mut libraries = Vec::new();
    for library in database.snapshot().libraries {
        let index = if args.build {
            Some(database.rebuild_index(&library.id)?)
        } else {
            None
        };
        libraries.push(LibrarySummary {
            algorithm: library.index_algorithm.name().to_string(),
            dimension: library.dimension,
            documents: library.documents.len(),
            chunks: library.chunk_count(),
            id: library.id,
            index,
        });
    }

    let stats = CorpusStats {
        path: args.corpus.display().to_string(),
        total_chunks: libraries.iter().map(|l| l.chunks).sum(),
        libraries,
    };
    output_result("Corpus statistics", &stats, cli_args)
}

fn validate_corpus(args: &ValidateArgs, cli_args: &LancetArgs) -> Result<()> {
    let database = open_corpus(&args.corpus, load_config(cli_args)?)?;
    let snapshot = database.snapshot();

    let result = ValidationResult {
        path: args.corpus.display().to_string(),
        libraries: snapshot.libraries.len(),
        documents: snapshot.libraries.iter().map(|l| l.documents.len()).sum(),
        chunks: snapshot.chunk_count(),
    };
    output_result("Validation complete", &result, cli_args)
}
