//! rag-eval
//!
//! Retrieval-quality evaluation: hit@k, found@k and strict recall@k over a
//! ground-truth set, either curated (JSON) or synthesized from frequent corpus
//! terms. Synthetic sets are always reported as such.

pub mod ground_truth;
pub mod harness;
pub mod metrics;

pub use ground_truth::{synthesize_ground_truth, GroundTruth, GroundTruthCase, GroundTruthSource, Relevant};
pub use harness::{compare_modes, evaluate, EvalReport, QueryEval};
pub use metrics::{dedup_keep_order, found_at_k, hit_at_k, recall_at_k_strict};
