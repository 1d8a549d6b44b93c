//! rag-vector
//!
//! LanceDB-backed vector index. One table of `(row, vector)` pairs, where `row`
//! is the position in the [`VectorRowMap`](rag_core::VectorRowMap), plus a small
//! key/value `meta` table describing how the vectors were produced.
//!
//! - [`VectorIndexBuilder`]: offline build from a [`ChunkStore`](rag_core::ChunkStore).
//! - [`VectorIndex`]: read-only L2 search, implements [`VectorBackend`](rag_core::traits::VectorBackend).
//! - [`index_build`]: optional IVF-PQ index for larger tables.

pub mod index_build;
pub mod schema;
pub mod search;
pub mod table;
pub mod writer;

pub use search::VectorIndex;
pub use writer::VectorIndexBuilder;
