//! rag-text
//!
//! Tantivy-based lexical index over chunk text. `index` builds the index from a
//! chunk store (offline, exclusive); `search` opens it read-only and answers
//! BM25-ranked queries, falling back to presence-only ranking when the index
//! was built without term frequencies.

pub mod tantivy_utils;
pub mod index;
pub mod search;

pub use index::LexicalIndexBuilder;
pub use search::{normalize_query, LexicalIndex, ScoringMode};
