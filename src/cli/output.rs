//! Output formatting for CLI commands.

use serde::{Deserialize, Serialize};

use crate::cli::args::{LancetArgs, OutputFormat};
use crate::error::Result;
use crate::vector::index::AlgorithmInfo;
use crate::vector::index::manager::IndexStats;
use crate::vector::search::SearchResults;

/// Per-library summary for `lancet stats`.
#[derive(Debug, Serialize, Deserialize)]
pub struct LibrarySummary {
    pub id: String,
    pub algorithm: String,
    pub dimension: Option<usize>,
    pub documents: usize,
    pub chunks: usize,
    pub index: Option<IndexStats>,
}

/// Result structure for `lancet stats`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CorpusStats {
    pub path: String,
    pub libraries: Vec<LibrarySummary>,
    pub total_chunks: usize,
}

/// Result structure for `lancet validate`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidationResult {
    pub path: String,
    pub libraries: usize,
    pub documents: usize,
    pub chunks: usize,
}

/// Human-readable rendering of a command result.
pub trait HumanOutput {
    fn print_human(&self);
}

/// Output a result in the specified format.
pub fn output_result<T>(message: &str, result: &T, args: &LancetArgs) -> Result<()>
where
    T: Serialize + HumanOutput + ?Sized,
{
    match args.output_format {
        OutputFormat::Human => {
            if args.verbosity() > 1 {
                println!("{message}");
                println!();
            }
            result.print_human();
            Ok(())
        }
        OutputFormat::Json => output_json(result, args),
    }
}

/// Output in JSON format.
fn output_json<T: Serialize + ?Sized>(result: &T, args: &LancetArgs) -> Result<()> {
    let json = if args.pretty {
        serde_json::to_string_pretty(result)?
    } else {
        serde_json::to_string(result)?
    };

    println!("{json}");
    Ok(())
}

impl HumanOutput for [AlgorithmInfo] {
    fn print_human(&self) {
        println!("Index Algorithms:");
        println!("═════════════════");
        for info in self {
            println!();
            println!("{}", info.name);
            println!("  {}", info.description);
            println!("  Build: {}", info.build_complexity);
            println!("  Query: {}", info.query_complexity);
        }
    }
}

impl HumanOutput for SearchResults {
    fn print_human(&self) {
        let algorithm = self.algorithm.map(|a| a.name()).unwrap_or("none");
        println!(
            "Search Results ({} in '{}', {}):",
            self.metric.name(),
            self.library_id,
            algorithm
        );
        println!("═══════════════");

        if self.hits.is_empty() {
            println!("No results.");
        }
        for (i, hit) in self.hits.iter().enumerate() {
            println!(
                "{:>3}. {}/{}  score={:.6}",
                i + 1,
                hit.document_id,
                hit.chunk_id,
                hit.score
            );
        }
        println!();
        println!("Search time: {:.3}ms", self.search_time_ms);
    }
}

impl HumanOutput for CorpusStats {
    fn print_human(&self) {
        println!("Corpus Statistics: {}", self.path);
        println!("══════════════════");
        println!("Libraries: {}", self.libraries.len());
        println!("Total chunks: {}", self.total_chunks);

        for library in &self.libraries {
            println!();
            println!("Library: {}", library.id);
            println!("  Algorithm: {}", library.algorithm);
            println!("  Dimension: {}", format_dimension(library.dimension));
            println!("  Documents: {}", library.documents);
            println!("  Chunks: {}", library.chunks);
            if let Some(index) = &library.index {
                println!("  Indexed vectors: {}", index.indexed_vectors.unwrap_or(0));
                println!("  Builds: {}", index.build_count);
                if let Some(at) = index.last_built_at {
                    println!("  Last built: {}", at.to_rfc3339());
                }
            }
        }
    }
}

impl HumanOutput for ValidationResult {
    fn print_human(&self) {
        println!(
            "{} is valid: {} libraries, {} documents, {} chunks",
            self.path, self.libraries, self.documents, self.chunks
        );
    }
}

fn format_dimension(dimension: Option<usize>) -> String {
    match dimension {
        Some(d) => d.to_string(),
        None => "unset".to_string(),
    }
}
