//! Domain types shared by the lexical and vector back-ends and the fusion layer.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lexical back-end row id. Assigned by the [`ChunkStore`](crate::ChunkStore),
/// starting at 1 and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(pub u64);

/// Vector back-end row number: position of the chunk's embedding in the vector table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VectorRow(pub u32);

/// Logical chunk identity: the owning document and the chunk's 0-based ordinal.
///
/// Both back-ends resolve their local addresses to this key before fusion
/// compares anything, so it is the only deduplication key in the system.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkKey {
    pub doc: String,
    pub ordinal: u32,
}

impl ChunkKey {
    pub fn new(doc: impl Into<String>, ordinal: u32) -> Self {
        Self { doc: doc.into(), ordinal }
    }
}

impl fmt::Display for ChunkKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.doc, self.ordinal)
    }
}

/// A logical source artifact. Immutable once added to the store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keywords: Option<String>,
}

impl Document {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into(), ..Self::default() }
    }
}

/// A contiguous span of a document's text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub key: ChunkKey,
    pub text: String,
}

/// Which back-end produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Semantic,
    Lexical,
}

/// One back-end result after identity resolution. `score` is the back-end's
/// raw score in its native direction (distance for semantic, relevance for lexical).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub key: ChunkKey,
    pub score: f32,
    pub source: SourceKind,
}

impl RetrievalResult {
    pub fn semantic(key: ChunkKey, distance: f32) -> Self {
        Self { key, score: distance, source: SourceKind::Semantic }
    }

    pub fn lexical(key: ChunkKey, relevance: f32) -> Self {
        Self { key, score: relevance, source: SourceKind::Lexical }
    }
}

/// A fused, ranked result. `semantic` and `lexical` are batch-normalized to
/// [0,1]; a side that did not retrieve the chunk is 0.0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FusedResult {
    pub key: ChunkKey,
    pub semantic: f32,
    pub lexical: f32,
    pub combined: f32,
}
