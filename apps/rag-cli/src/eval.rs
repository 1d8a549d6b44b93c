use anyhow::Result;
use std::path::PathBuf;

use rag_core::config::Settings;
use rag_core::ChunkStore;
use rag_eval::{compare_modes, GroundTruth, GroundTruthSource};
use rag_hybrid::open_searcher;

pub struct EvalArgs {
    pub k: usize,
    pub retrieve: usize,
    pub ground_truth: Option<PathBuf>,
    pub synthetic: usize,
    pub write_synthetic: Option<PathBuf>,
    pub json: bool,
}

pub async fn run(settings: &Settings, args: EvalArgs) -> Result<()> {
    let store = ChunkStore::load(&settings.chunk_store_path())?;
    let path = args.ground_truth.unwrap_or_else(|| settings.ground_truth_path());
    let truth = GroundTruth::load_or_synthesize(&path, &store, args.synthetic)?;
    if truth.source == GroundTruthSource::Synthetic {
        if let Some(out) = &args.write_synthetic {
            truth.save(out)?;
            tracing::info!(path = %out.display(), queries = truth.len(), "wrote synthetic ground truth");
        }
    }

    if truth.source == GroundTruthSource::Synthetic {
        tracing::warn!("no curated ground truth at {}; scoring against synthetic queries", path.display());
    }
    let searcher = open_searcher(settings, &store).await?;
    let reports = compare_modes(&searcher, &truth, args.k, args.retrieve).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&reports)?);
        return Ok(());
    }

    match truth.source {
        GroundTruthSource::Curated => println!("Ground truth: {} curated queries ({})", truth.len(), path.display()),
        GroundTruthSource::Synthetic => println!(
            "Ground truth: {} SYNTHETIC queries (frequent terms; relevance = term containment, not curated)",
            truth.len()
        ),
    }
    println!("{:<10} {:>8} {:>12}", "method", format!("hit@{}", args.k), format!("recall@{}", args.k));
    for r in &reports {
        println!("{:<10} {:>8.3} {:>12.3}", r.method, r.mean_hit, r.mean_recall);
    }
    Ok(())
}
