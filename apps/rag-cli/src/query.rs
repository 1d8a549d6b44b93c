use anyhow::Result;
use serde_json::json;

use rag_core::config::Settings;
use rag_core::{ChunkStore, SourceKind};
use rag_hybrid::{open_searcher, Degradation, FusionStrategy, SearchMode};

use crate::FusionArg;

/// `--fusion rrf` wins over `--weight`; neither means the configured default.
pub fn strategy(settings: &Settings, weight: Option<f32>, fusion: Option<FusionArg>) -> Option<FusionStrategy> {
    match (fusion, weight) {
        (Some(FusionArg::Rrf), _) => Some(FusionStrategy::Rrf { c: settings.retrieval.rrf_c }),
        (Some(FusionArg::Weighted), w) => Some(FusionStrategy::Weighted { weight: w.unwrap_or(settings.retrieval.weight) }),
        (None, Some(w)) => Some(FusionStrategy::Weighted { weight: w }),
        (None, None) => None,
    }
}

pub async fn run(settings: &Settings, query: &str, k: Option<usize>, mode: SearchMode, strategy: Option<FusionStrategy>, json: bool) -> Result<()> {
    let store = ChunkStore::load(&settings.chunk_store_path())?;
    let searcher = open_searcher(settings, &store).await?;
    let k = k.unwrap_or(settings.retrieval.default_k);
    let response = searcher.search(query, k, mode, strategy).await?;

    if let Some(d) = &response.degraded {
        tracing::warn!("{}", degradation_notice(d));
    }

    if json {
        let results: Vec<_> = response
            .results
            .iter()
            .map(|r| {
                json!({
                    "doc": r.key.doc,
                    "ordinal": r.key.ordinal,
                    "semantic": r.semantic,
                    "lexical": r.lexical,
                    "combined": r.combined,
                    "text": store.text(&r.key),
                })
            })
            .collect();
        let out = json!({
            "query": query,
            "mode": mode.to_string(),
            "degraded": response.degraded.as_ref().map(|d| format!("{:?}", d.failed).to_lowercase()),
            "results": results,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if response.results.is_empty() {
        println!("No results for \"{query}\"");
        return Ok(());
    }
    println!("Top {} results for \"{query}\" ({mode}):", response.results.len());
    for (i, r) in response.results.iter().enumerate() {
        println!(
            "{:>2}. {}  combined={:.3} semantic={:.3} lexical={:.3}",
            i + 1,
            r.key,
            r.combined,
            r.semantic,
            r.lexical
        );
        if let Some(text) = store.text(&r.key) {
            println!("    {}", snippet(text, 200));
        }
    }
    Ok(())
}

fn degradation_notice(d: &Degradation) -> String {
    let (failed, served) = match d.failed {
        SourceKind::Semantic => ("semantic", "lexical"),
        SourceKind::Lexical => ("lexical", "semantic"),
    };
    format!("{failed} search failed ({}); showing {served} results only", d.reason)
}

fn snippet(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}
