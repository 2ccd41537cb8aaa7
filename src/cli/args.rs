//! Command line argument parsing for the Lancet CLI using clap.

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use serde::{Deserialize, Serialize};

use crate::error::{LancetError, Result};

/// Lancet - exact similarity search over embedded text chunks
#[derive(Parser, Debug, Clone)]
#[command(name = "lancet")]
#[command(about = "Exact k-NN and cosine search over a JSON corpus snapshot")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_about = None)]
pub struct LancetArgs {
    /// Verbosity level (0=quiet, 1=normal, 2=verbose, 3=debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (overrides verbose)
    #[arg(short, long)]
    pub quiet: bool,

    /// Output format
    #[arg(short = 'f', long = "format", default_value = "human")]
    pub output_format: OutputFormat,

    /// Pretty-print JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Engine configuration file (JSON)
    #[arg(short, long, value_name = "CONFIG_FILE", global = true)]
    pub config: Option<PathBuf>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl LancetArgs {
    /// Get the effective verbosity level
    pub fn verbosity(&self) -> u8 {
        if self.quiet {
            0
        } else {
            match self.verbose {
                0 => 1,
                n => n,
            }
        }
    }
}

/// Available CLI commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// List the available index algorithms
    Algorithms,

    /// Search one library of a corpus snapshot
    Search(SearchArgs),

    /// Show per-library statistics of a corpus snapshot
    Stats(StatsArgs),

    /// Load a corpus snapshot and verify its invariants
    Validate(ValidateArgs),
}

/// Arguments for searching
#[derive(Parser, Debug, Clone)]
pub struct SearchArgs {
    /// Path to the corpus snapshot (JSON)
    #[arg(value_name = "CORPUS")]
    pub corpus: PathBuf,

    /// Library to search
    #[arg(value_name = "LIBRARY")]
    pub library: String,

    /// Query embedding as comma-separated numbers
    #[arg(long, value_name = "VECTOR", allow_hyphen_values = true)]
    pub vector: String,

    /// Number of results to return
    #[arg(short, default_value = "10")]
    pub k: usize,

    /// Rank by cosine similarity instead of Euclidean distance
    #[arg(long)]
    pub cosine: bool,

    /// Index algorithm to use instead of the library's own
    #[arg(long, value_name = "NAME")]
    pub algorithm: Option<String>,
}

impl SearchArgs {
    /// Parse the `--vector` argument.
    pub fn query_vector(&self) -> Result<Vec<f32>> {
        self.vector
            .split(',')
            .map(|part| {
                part.trim().parse::<f32>().map_err(|e| {
                    LancetError::invalid_argument(format!("invalid vector component '{part}': {e}"))
                })
            })
            .collect()
    }
}

/// Arguments for showing statistics
#[derive(Parser, Debug, Clone)]
pub struct StatsArgs {
    /// Path to the corpus snapshot (JSON)
    #[arg(value_name = "CORPUS")]
    pub corpus: PathBuf,

    /// Build every index and include its statistics
    #[arg(long)]
    pub build: bool,
}

/// Arguments for validation
#[derive(Parser, Debug, Clone)]
pub struct ValidateArgs {
    /// Path to the corpus snapshot (JSON)
    #[arg(value_name = "CORPUS")]
    pub corpus: PathBuf,
}

/// Output formats for CLI
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable output
    Human,
    /// JSON output
    Json,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_command() {
        let args = LancetArgs::try_parse_from([
            "lancet",
            "search",
            "corpus.json",
            "books",
            "--vector",
            "-0.5, 1,2e-1",
            "-k",
            "3",
            "--cosine",
            "--algorithm",
            "ball_tree",
        ])
        .unwrap();

        if let Command::Search(search_args) = args.command {
            assert_eq!(search_args.corpus, PathBuf::from("corpus.json"));
            assert_eq!(search_args.library, "books");
            assert_eq!(search_args.k, 3);
            assert!(search_args.cosine);
            assert_eq!(search_args.algorithm.as_deref(), Some("ball_tree"));
            assert_eq!(search_args.query_vector().unwrap(), vec![-0.5, 1.0, 0.2]);
        } else {
            panic!("Expected Search command");
        }
    }

    #[test]
    fn test_bad_vector_is_rejected() {
        let args = LancetArgs::try_parse_from([
            "lancet", "search", "c.json", "lib", "--vector", "1,x",
        ])
        .unwrap();

        if let Command::Search(search_args) = args.command {
            assert!(matches!(
                search_args.query_vector(),
                Err(LancetError::InvalidArgument(_))
            ));
        } else {
            panic!("Expected Search command");
        }
    }

    #[test]
    fn test_verbosity_levels() {
        let args = LancetArgs::try_parse_from(["lancet", "algorithms"]).unwrap();
        assert_eq!(args.verbosity(), 1);

        let args = LancetArgs::try_parse_from(["lancet", "-vv", "algorithms"]).unwrap();
        assert_eq!(args.verbosity(), 2);

        let args = LancetArgs::try_parse_from(["lancet", "--quiet", "algorithms"]).unwrap();
        assert_eq!(args.verbosity(), 0);
    }

    #[test]
    fn test_output_format_and_config() {
        let args = LancetArgs::try_parse_from([
            "lancet",
            "--format",
            "json",
            "stats",
            "corpus.json",
            "--config",
            "lancet.json",
        ])
        .unwrap();
        assert_eq!(args.output_format, OutputFormat::Json);
        assert_eq!(args.config, Some(PathBuf::from("lancet.json")));
    }
}
