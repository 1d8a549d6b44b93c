//! rag-core
//!
//! Shared domain types, the chunk store, the identity map that reconciles the
//! lexical and vector addressing schemes, ingestion chunking, configuration and
//! the error taxonomy used by every other crate in the workspace.

pub mod chunker;
pub mod config;
pub mod error;
pub mod identity;
pub mod store;
pub mod traits;
pub mod types;

pub use error::Error;
pub use identity::{IdentityMap, VectorRowMap};
pub use store::ChunkStore;
pub use types::{Chunk, ChunkId, ChunkKey, Document, FusedResult, RetrievalResult, SourceKind, VectorRow};
