use anyhow::Result;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use rag_core::config::RetrievalConfig;
use rag_core::error::is_fatal;
use rag_core::traits::{LexicalBackend, VectorBackend};
use rag_core::{Error, FusedResult, IdentityMap, RetrievalResult, SourceKind};

use crate::fusion::{single_source, FusionStrategy};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Semantic,
    Lexical,
    Hybrid,
}

impl FromStr for SearchMode {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "semantic" | "vector" => Ok(Self::Semantic),
            "lexical" | "keyword" => Ok(Self::Lexical),
            "hybrid" => Ok(Self::Hybrid),
            other => Err(Error::Config(format!("unknown search mode '{other}'"))),
        }
    }
}

impl fmt::Display for SearchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Semantic => "semantic",
            Self::Lexical => "lexical",
            Self::Hybrid => "hybrid",
        })
    }
}

/// One back-end failed during a hybrid query; results come from the other alone.
#[derive(Debug, Clone, PartialEq)]
pub struct Degradation {
    pub failed: SourceKind,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResponse {
    pub results: Vec<FusedResult>,
    pub degraded: Option<Degradation>,
}

/// Query handle over a lexical and a vector back-end plus the identity map
/// that reconciles their addressing. Built once, shared across queries.
pub struct HybridSearcher<L, V> {
    lexical: Arc<L>,
    vector: V,
    identity: Arc<IdentityMap>,
    config: RetrievalConfig,
}

impl<L, V> HybridSearcher<L, V>
where
    L: LexicalBackend + 'static,
    V: VectorBackend,
{
    pub fn new(lexical: L, vector: V, identity: IdentityMap, config: RetrievalConfig) -> Self {
        Self { lexical: Arc::new(lexical), vector, identity: Arc::new(identity), config }
    }

    pub fn config(&self) -> &RetrievalConfig {
        &self.config
    }

    pub fn identity(&self) -> &IdentityMap {
        &self.identity
    }

    /// Top `k` chunks for `query`. `strategy` overrides the configured fusion
    /// for hybrid mode and is ignored otherwise.
    pub async fn search(&self, query: &str, k: usize, mode: SearchMode, strategy: Option<FusionStrategy>) -> Result<SearchResponse> {
        let strategy = strategy.unwrap_or_else(|| FusionStrategy::from_config(&self.config));
        strategy.validate()?;
        let k = if k > self.config.max_k {
            tracing::warn!(k, max_k = self.config.max_k, "k capped");
            self.config.max_k
        } else {
            k
        };
        if k == 0 {
            return Ok(SearchResponse { results: Vec::new(), degraded: None });
        }

        let response = match mode {
            SearchMode::Semantic => {
                let hits = self.semantic(query, k).await?;
                SearchResponse { results: single_source(&hits, SourceKind::Semantic, k), degraded: None }
            }
            SearchMode::Lexical => {
                let hits = self.lexical(query, k).await?;
                SearchResponse { results: single_source(&hits, SourceKind::Lexical, k), degraded: None }
            }
            SearchMode::Hybrid => {
                let fetch = k.saturating_mul(self.config.overfetch.max(1));
                let (semantic, lexical) = tokio::join!(self.semantic(query, fetch), self.lexical(query, fetch));
                match (semantic, lexical) {
                    (Ok(s), Ok(l)) => SearchResponse { results: strategy.fuse(&s, &l, k), degraded: None },
                    (Err(e), Ok(l)) => degrade(e, SourceKind::Semantic, &l, SourceKind::Lexical, k)?,
                    (Ok(s), Err(e)) => degrade(e, SourceKind::Lexical, &s, SourceKind::Semantic, k)?,
                    (Err(se), Err(le)) => {
                        if is_fatal(&le) && !is_fatal(&se) {
                            return Err(le);
                        }
                        tracing::error!(lexical = %le, "both back-ends failed");
                        return Err(se.context("semantic and lexical search both failed"));
                    }
                }
            }
        };
        tracing::debug!(query, k, %mode, results = response.results.len(), degraded = response.degraded.is_some(), "search complete");
        Ok(response)
    }

    async fn semantic(&self, query: &str, fetch: usize) -> Result<Vec<RetrievalResult>> {
        let hits = self.bounded(SourceKind::Semantic, self.vector.search(query, fetch)).await?;
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.identity.resolve_vector(hit.row) {
                Some(key) => out.push(RetrievalResult::semantic(key.clone(), hit.distance)),
                None => tracing::warn!(row = hit.row.0, "vector row does not resolve to a chunk; dropped"),
            }
        }
        Ok(out)
    }

    async fn lexical(&self, query: &str, fetch: usize) -> Result<Vec<RetrievalResult>> {
        let backend = Arc::clone(&self.lexical);
        let text = query.to_string();
        let task = async move {
            match tokio::task::spawn_blocking(move || backend.search(&text, fetch)).await {
                Ok(res) => res,
                Err(join) => Err(anyhow::Error::from(join)),
            }
        };
        let hits = self.bounded(SourceKind::Lexical, task).await?;
        let mut out = Vec::with_capacity(hits.len());
        for hit in hits {
            match self.identity.resolve_lexical(hit.id) {
                Some(key) => out.push(RetrievalResult::lexical(key.clone(), hit.score)),
                None => tracing::warn!(id = hit.id.0, "lexical id does not resolve to a chunk; dropped"),
            }
        }
        Ok(out)
    }

    async fn bounded<T>(&self, source: SourceKind, fut: impl Future<Output = Result<T>>) -> Result<T> {
        let limit = Duration::from_millis(self.config.timeout_ms);
        match tokio::time::timeout(limit, fut).await {
            Ok(res) => res,
            Err(_) => Err(Error::Backend(format!("{source:?} search timed out after {}ms", self.config.timeout_ms)).into()),
        }
    }
}

fn degrade(err: anyhow::Error, failed: SourceKind, other: &[RetrievalResult], other_kind: SourceKind, k: usize) -> Result<SearchResponse> {
    if is_fatal(&err) {
        return Err(err);
    }
    tracing::warn!(failed = ?failed, error = %err, "back-end failed; serving single-source results");
    Ok(SearchResponse {
        results: single_source(other, other_kind, k),
        degraded: Some(Degradation { failed, reason: format!("{err:#}") }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modes_parse_case_insensitively() {
        assert_eq!("Hybrid".parse::<SearchMode>().unwrap(), SearchMode::Hybrid);
        assert_eq!("vector".parse::<SearchMode>().unwrap(), SearchMode::Semantic);
        assert_eq!("keyword".parse::<SearchMode>().unwrap(), SearchMode::Lexical);
        assert!("fuzzy".parse::<SearchMode>().is_err());
        assert_eq!(SearchMode::Lexical.to_string(), "lexical");
    }
}
