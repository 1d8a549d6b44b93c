//! rag-hybrid
//!
//! Score normalization, fusion of the semantic and lexical rankings, and the
//! [`HybridSearcher`] query handle that drives both back-ends concurrently.

pub mod engine;
pub mod fusion;
pub mod loader;
pub mod normalize;

pub use engine::{Degradation, HybridSearcher, SearchMode, SearchResponse};
pub use fusion::{reciprocal_rank_fusion, weighted_fusion, FusionStrategy, DEFAULT_RRF_C, DEFAULT_WEIGHT};
pub use loader::open_searcher;
pub use normalize::{min_max, normalize, ScoreDirection};
