use std::future::Future;

use crate::types::{ChunkId, VectorRow};

/// External embedding provider. Every vector it returns has length `dim()`.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the provider/model (e.g. `bert:all-MiniLM-L6-v2:d384`).
    fn id(&self) -> &str;
    fn dim(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// One lexical hit, addressed by the lexical row id.
#[derive(Debug, Clone, PartialEq)]
pub struct LexicalHit {
    pub id: ChunkId,
    /// Relevance, higher is better.
    pub score: f32,
    pub text: String,
}

/// One vector hit, addressed by the vector row number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorHit {
    pub row: VectorRow,
    /// L2 distance, lower is better.
    pub distance: f32,
}

/// Term-based back-end. Read-only at query time; safe to share across threads.
pub trait LexicalBackend: Send + Sync {
    /// At most `k` hits, best first. A query with no indexable terms yields an empty list.
    fn search(&self, query: &str, k: usize) -> anyhow::Result<Vec<LexicalHit>>;
}

/// Nearest-neighbour back-end. Embeds the query itself.
pub trait VectorBackend: Send + Sync {
    /// At most `k` hits, ascending by distance.
    fn search(&self, query: &str, k: usize) -> impl Future<Output = anyhow::Result<Vec<VectorHit>>> + Send;
}
