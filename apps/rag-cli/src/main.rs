//! `rag`: build the chunk store and both indexes, query them, and evaluate
//! retrieval quality.
//!
//! ```bash
//! rag ingest ./txt
//! rag query "how to purify water" --mode hybrid -k 5
//! rag query "reflector wall" --fusion rrf --json
//! rag eval -k 3
//! ```

mod eval;
mod ingest;
mod query;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use rag_core::config::Settings;
use rag_hybrid::SearchMode;

#[derive(Parser)]
#[command(name = "rag", version, about = "Hybrid semantic + lexical retrieval")]
struct Cli {
    /// Override `paths.data_dir` from configuration
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Enable verbose logging (otherwise RUST_LOG, default warn)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chunk a directory of .txt files and build both indexes
    Ingest {
        /// Source directory (default: `paths.raw_txt_dir`)
        dir: Option<PathBuf>,
        /// Only ingest the first N files
        #[arg(long)]
        limit: Option<usize>,
        /// Skip IVF-PQ training even on large tables
        #[arg(long)]
        no_ann: bool,
    },
    /// Search the indexes
    Query {
        query: String,
        #[arg(short, long)]
        k: Option<usize>,
        #[arg(short, long, default_value = "hybrid")]
        mode: SearchMode,
        /// Semantic weight for weighted fusion, in [0, 1]
        #[arg(short, long)]
        weight: Option<f32>,
        #[arg(long, value_enum)]
        fusion: Option<FusionArg>,
        /// Output results as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare semantic, lexical and hybrid search against ground truth
    Eval {
        #[arg(short, long, default_value = "3")]
        k: usize,
        /// Results fetched per query before taking the top k
        #[arg(long, default_value = "10")]
        retrieve: usize,
        /// Ground-truth file (default: `paths.ground_truth`)
        #[arg(long)]
        ground_truth: Option<PathBuf>,
        /// Synthetic queries to generate when no ground truth exists
        #[arg(long, default_value = "10")]
        synthetic: usize,
        /// Write the synthesized set here for later curation
        #[arg(long)]
        write_synthetic: Option<PathBuf>,
        #[arg(long)]
        json: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum FusionArg {
    Weighted,
    Rrf,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut settings = Settings::load()?;
    if let Some(dir) = &cli.data_dir {
        settings.paths.data_dir = dir.to_string_lossy().to_string();
    }

    match cli.command {
        Command::Ingest { dir, limit, no_ann } => ingest::run(&settings, dir, limit, !no_ann).await,
        Command::Query { query, k, mode, weight, fusion, json } => {
            let strategy = query::strategy(&settings, weight, fusion);
            query::run(&settings, &query, k, mode, strategy, json).await
        }
        Command::Eval { k, retrieve, ground_truth, synthetic, write_synthetic, json } => {
            let opts = eval::EvalArgs { k, retrieve, ground_truth, synthetic, write_synthetic, json };
            eval::run(&settings, opts).await
        }
    }
}
