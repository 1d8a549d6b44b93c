use anyhow::Result;
use serde::Serialize;
use std::collections::HashSet;
use std::future::Future;

use rag_core::traits::{LexicalBackend, VectorBackend};
use rag_core::ChunkKey;
use rag_hybrid::{HybridSearcher, SearchMode};

use crate::ground_truth::{GroundTruth, GroundTruthSource, Relevant};
use crate::metrics::{found_at_k, hit_at_k, recall_at_k_strict};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryEval {
    pub query: String,
    pub hit: f64,
    pub found: usize,
    pub recall: f64,
    /// Top-k in the case's granularity (doc paths or `doc#ordinal`).
    pub retrieved: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvalReport {
    pub method: String,
    pub k: usize,
    pub source: GroundTruthSource,
    pub per_query: Vec<QueryEval>,
    /// Mean hit@k across queries.
    pub mean_hit: f64,
    pub mean_recall: f64,
}

/// Score `retrieve` against every case. `retrieve` returns chunk keys best
/// first; it may return more than `k`, only the deduplicated top `k` count.
pub async fn evaluate<F, Fut>(truth: &GroundTruth, method: &str, k: usize, mut retrieve: F) -> Result<EvalReport>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = Result<Vec<ChunkKey>>>,
{
    let mut per_query = Vec::with_capacity(truth.len());
    for case in &truth.cases {
        let ranked = retrieve(case.query.clone()).await?;
        let eval = match &case.relevant {
            Relevant::Documents(docs) => {
                let relevant: HashSet<String> = docs.iter().cloned().collect();
                let projected: Vec<String> = ranked.into_iter().map(|key| key.doc).collect();
                score(&case.query, &projected, &relevant, k, |d| d.clone())
            }
            Relevant::Chunks(keys) => {
                let relevant: HashSet<ChunkKey> = keys.iter().cloned().collect();
                score(&case.query, &ranked, &relevant, k, |key| key.to_string())
            }
        };
        tracing::debug!(method, query = %eval.query, hit = eval.hit, found = eval.found, "evaluated");
        per_query.push(eval);
    }
    let n = per_query.len().max(1) as f64;
    let mean_hit = per_query.iter().map(|q| q.hit).sum::<f64>() / n;
    let mean_recall = per_query.iter().map(|q| q.recall).sum::<f64>() / n;
    Ok(EvalReport { method: method.to_string(), k, source: truth.source, per_query, mean_hit, mean_recall })
}

fn score<T: Eq + std::hash::Hash + Clone>(
    query: &str,
    ranked: &[T],
    relevant: &HashSet<T>,
    k: usize,
    label: impl Fn(&T) -> String,
) -> QueryEval {
    QueryEval {
        query: query.to_string(),
        hit: hit_at_k(ranked, relevant, k),
        found: found_at_k(ranked, relevant, k),
        recall: recall_at_k_strict(ranked, relevant, k),
        retrieved: crate::metrics::dedup_keep_order(ranked).iter().take(k).map(label).collect(),
    }
}

/// Evaluate semantic, lexical and hybrid search side by side. Each query
/// fetches `retrieve_k` chunks; metrics use the top `k` after deduplication.
pub async fn compare_modes<L, V>(searcher: &HybridSearcher<L, V>, truth: &GroundTruth, k: usize, retrieve_k: usize) -> Result<Vec<EvalReport>>
where
    L: LexicalBackend + 'static,
    V: VectorBackend,
{
    let mut reports = Vec::new();
    for mode in [SearchMode::Semantic, SearchMode::Lexical, SearchMode::Hybrid] {
        let report = evaluate(truth, &mode.to_string(), k, |query| async move {
            let response = searcher.search(&query, retrieve_k.max(k), mode, None).await?;
            if let Some(d) = &response.degraded {
                tracing::warn!(%mode, query = %query, failed = ?d.failed, "degraded result counted as-is");
            }
            Ok::<_, anyhow::Error>(response.results.into_iter().map(|r| r.key).collect())
        })
        .await?;
        reports.push(report);
    }
    Ok(reports)
}
