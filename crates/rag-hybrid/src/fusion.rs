//! Merging the semantic and lexical batches into one ranking.
//!
//! Both strategies key candidates by [`ChunkKey`], never by a back-end row id,
//! and break ties by first appearance (semantic batch before lexical batch).

use std::cmp::Ordering;
use std::collections::HashMap;

use rag_core::config::{FusionKind, RetrievalConfig};
use rag_core::{ChunkKey, Error, FusedResult, RetrievalResult, SourceKind};

use crate::normalize::{normalize, ScoreDirection};

/// Smoothing constant for reciprocal rank fusion.
pub const DEFAULT_RRF_C: f32 = 60.0;
/// Semantic weight for weighted linear fusion.
pub const DEFAULT_WEIGHT: f32 = 0.5;

/// How the two batches are combined. Defaults to weighted linear fusion with
/// an even split.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FusionStrategy {
    /// `combined = weight * semantic + (1 - weight) * lexical` over normalized scores.
    Weighted { weight: f32 },
    /// `combined = Σ 1 / (c + rank)` over the back-ends that returned the chunk.
    Rrf { c: f32 },
}

impl Default for FusionStrategy {
    fn default() -> Self {
        Self::Weighted { weight: DEFAULT_WEIGHT }
    }
}

impl FusionStrategy {
    pub fn from_config(config: &RetrievalConfig) -> Self {
        match config.fusion {
            FusionKind::Weighted => Self::Weighted { weight: config.weight },
            FusionKind::Rrf => Self::Rrf { c: config.rrf_c },
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        match *self {
            Self::Weighted { weight } if !(0.0..=1.0).contains(&weight) => {
                Err(Error::Config(format!("fusion weight must be within [0, 1], got {weight}")).into())
            }
            Self::Rrf { c } if !(c.is_finite() && c > 0.0) => {
                Err(Error::Config(format!("rrf constant must be positive, got {c}")).into())
            }
            _ => Ok(()),
        }
    }

    pub fn fuse(&self, semantic: &[RetrievalResult], lexical: &[RetrievalResult], k: usize) -> Vec<FusedResult> {
        match *self {
            Self::Weighted { weight } => weighted_fusion(semantic, lexical, weight, k),
            Self::Rrf { c } => reciprocal_rank_fusion(semantic, lexical, c, k),
        }
    }
}

/// One back-end's batch after normalization: unique keys in best-rank order.
/// A key repeated within the batch keeps its first rank and its highest score.
fn collapse(batch: &[RetrievalResult], source: SourceKind) -> Vec<(ChunkKey, f32)> {
    let raw: Vec<f32> = batch.iter().map(|r| r.score).collect();
    let normalized = normalize(&raw, ScoreDirection::of(source));
    let mut out: Vec<(ChunkKey, f32)> = Vec::with_capacity(batch.len());
    let mut seen: HashMap<&ChunkKey, usize> = HashMap::new();
    for (result, score) in batch.iter().zip(normalized) {
        match seen.get(&result.key) {
            Some(&i) => out[i].1 = out[i].1.max(score),
            None => {
                seen.insert(&result.key, out.len());
                out.push((result.key.clone(), score));
            }
        }
    }
    out
}

/// Union of both batches in first-appearance order, each entry carrying its
/// normalized score per side (0.0 where absent) and its 1-based rank per side.
struct Candidates {
    entries: Vec<Candidate>,
}

struct Candidate {
    key: ChunkKey,
    semantic: f32,
    lexical: f32,
    semantic_rank: Option<usize>,
    lexical_rank: Option<usize>,
}

impl Candidates {
    fn gather(semantic: &[RetrievalResult], lexical: &[RetrievalResult]) -> Self {
        let mut entries: Vec<Candidate> = Vec::new();
        let mut index: HashMap<ChunkKey, usize> = HashMap::new();
        for (source, batch) in [(SourceKind::Semantic, semantic), (SourceKind::Lexical, lexical)] {
            for (rank0, (key, score)) in collapse(batch, source).into_iter().enumerate() {
                let i = *index.entry(key.clone()).or_insert_with(|| {
                    entries.push(Candidate { key, semantic: 0.0, lexical: 0.0, semantic_rank: None, lexical_rank: None });
                    entries.len() - 1
                });
                let entry = &mut entries[i];
                match source {
                    SourceKind::Semantic => {
                        entry.semantic = score;
                        entry.semantic_rank = Some(rank0 + 1);
                    }
                    SourceKind::Lexical => {
                        entry.lexical = score;
                        entry.lexical_rank = Some(rank0 + 1);
                    }
                }
            }
        }
        Self { entries }
    }

    /// Sort by combined score. On equal scores a candidate ranked by the
    /// `favored` side goes first, in that side's rank order; remaining ties keep
    /// first-appearance order.
    fn rank(self, k: usize, favored: Option<SourceKind>, combine: impl Fn(&Candidate) -> f32) -> Vec<FusedResult> {
        let mut fused: Vec<(Option<usize>, FusedResult)> = self
            .entries
            .into_iter()
            .map(|c| {
                let tiebreak = match favored {
                    Some(SourceKind::Semantic) => c.semantic_rank,
                    Some(SourceKind::Lexical) => c.lexical_rank,
                    None => None,
                };
                (tiebreak, FusedResult { combined: combine(&c), key: c.key, semantic: c.semantic, lexical: c.lexical })
            })
            .collect();
        fused.sort_by(|(ra, a), (rb, b)| {
            b.combined.total_cmp(&a.combined).then_with(|| match (ra, rb) {
                (Some(x), Some(y)) => x.cmp(y),
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            })
        });
        fused.into_iter().take(k).map(|(_, r)| r).collect()
    }
}

/// Weighted linear fusion. `weight` is the semantic share and is clamped to [0, 1].
///
/// At the extremes the ranking equals the weighted side's own ranking, with
/// chunks only the other side found appended after it.
pub fn weighted_fusion(semantic: &[RetrievalResult], lexical: &[RetrievalResult], weight: f32, k: usize) -> Vec<FusedResult> {
    let w = if weight.is_nan() { DEFAULT_WEIGHT } else { weight.clamp(0.0, 1.0) };
    let favored = if w == 0.0 {
        Some(SourceKind::Lexical)
    } else if w == 1.0 {
        Some(SourceKind::Semantic)
    } else {
        None
    };
    Candidates::gather(semantic, lexical).rank(k, favored, |c| w * c.semantic + (1.0 - w) * c.lexical)
}

/// Reciprocal rank fusion over the deduplicated batches. `semantic` and
/// `lexical` on the output still carry the normalized scores for display.
pub fn reciprocal_rank_fusion(semantic: &[RetrievalResult], lexical: &[RetrievalResult], c: f32, k: usize) -> Vec<FusedResult> {
    let contribution = |rank: Option<usize>| rank.map_or(0.0, |r| 1.0 / (c + r as f32));
    Candidates::gather(semantic, lexical).rank(k, None, |cand| contribution(cand.semantic_rank) + contribution(cand.lexical_rank))
}

/// Ranking from one back-end alone: native order, deduplicated, the other side 0.0.
pub fn single_source(batch: &[RetrievalResult], source: SourceKind, k: usize) -> Vec<FusedResult> {
    collapse(batch, source)
        .into_iter()
        .take(k)
        .map(|(key, score)| match source {
            SourceKind::Semantic => FusedResult { key, semantic: score, lexical: 0.0, combined: score },
            SourceKind::Lexical => FusedResult { key, semantic: 0.0, lexical: score, combined: score },
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(doc: &str) -> ChunkKey {
        ChunkKey::new(doc, 0)
    }

    fn sem(items: &[(&str, f32)]) -> Vec<RetrievalResult> {
        items.iter().map(|(d, s)| RetrievalResult::semantic(key(d), *s)).collect()
    }

    fn lex(items: &[(&str, f32)]) -> Vec<RetrievalResult> {
        items.iter().map(|(d, s)| RetrievalResult::lexical(key(d), *s)).collect()
    }

    fn docs(results: &[FusedResult]) -> Vec<&str> {
        results.iter().map(|r| r.key.doc.as_str()).collect()
    }

    #[test]
    fn three_chunk_scenario_puts_shared_chunk_first() {
        let fused = weighted_fusion(&sem(&[("A", 0.1), ("B", 0.5)]), &lex(&[("C", 2.0), ("A", 1.0)]), 0.5, 10);
        assert_eq!(docs(&fused), vec!["A", "C", "B"]);
        assert_eq!(fused[0].semantic, 1.0);
        assert_eq!(fused[0].lexical, 0.0);
        assert_eq!(fused[0].combined, 0.5);
        assert_eq!(fused[1].combined, 0.5);
        assert_eq!(fused[2].combined, 0.0);
    }

    #[test]
    fn missing_side_scores_zero_but_is_kept() {
        let fused = weighted_fusion(&sem(&[("A", 0.1), ("B", 0.2)]), &[], 0.5, 10);
        assert_eq!(docs(&fused), vec!["A", "B"]);
        assert!(fused.iter().all(|r| r.lexical == 0.0));
    }

    #[test]
    fn duplicates_inside_a_batch_keep_best_rank_and_score() {
        let fused = weighted_fusion(&[], &lex(&[("A", 1.0), ("B", 3.0), ("A", 5.0)]), 0.0, 10);
        assert_eq!(fused.len(), 2);
        let a = fused.iter().find(|r| r.key.doc == "A").unwrap();
        assert_eq!(a.lexical, 1.0);
        assert_eq!(docs(&fused), vec!["A", "B"]);
    }

    #[test]
    fn weight_zero_reproduces_lexical_ranking_before_semantic_only_chunks() {
        let semantic = sem(&[("A", 0.1), ("B", 0.5)]);
        let lexical = lex(&[("C", 2.0), ("D", 1.0)]);
        let fused = weighted_fusion(&semantic, &lexical, 0.0, 2);
        assert_eq!(docs(&fused), docs(&single_source(&lexical, SourceKind::Lexical, 2)));
        assert_eq!(docs(&weighted_fusion(&semantic, &lexical, 0.0, 10)), vec!["C", "D", "A", "B"]);
    }

    #[test]
    fn weight_one_reproduces_semantic_ranking_before_lexical_only_chunks() {
        let semantic = sem(&[("A", 0.1), ("B", 0.5)]);
        let lexical = lex(&[("C", 2.0), ("D", 1.0)]);
        let fused = weighted_fusion(&semantic, &lexical, 1.0, 2);
        assert_eq!(docs(&fused), docs(&single_source(&semantic, SourceKind::Semantic, 2)));
        assert_eq!(docs(&weighted_fusion(&semantic, &lexical, 1.0, 10)), vec!["A", "B", "C", "D"]);
    }

    #[test]
    fn weight_zero_orders_equal_lexical_scores_by_lexical_rank() {
        // A reaches the candidate list first through the semantic batch
        let fused = weighted_fusion(&sem(&[("A", 0.1)]), &lex(&[("C", 2.0), ("D", 1.0), ("A", 1.0)]), 0.0, 10);
        assert_eq!(docs(&fused), vec!["C", "D", "A"]);
    }

    #[test]
    fn output_is_truncated_to_k() {
        let fused = weighted_fusion(&sem(&[("A", 0.1), ("B", 0.2), ("C", 0.3)]), &lex(&[("D", 1.0)]), 0.5, 2);
        assert_eq!(fused.len(), 2);
        assert!(weighted_fusion(&sem(&[("A", 0.1)]), &[], 0.5, 0).is_empty());
    }

    #[test]
    fn both_empty_fuse_to_empty() {
        assert!(weighted_fusion(&[], &[], 0.5, 5).is_empty());
        assert!(reciprocal_rank_fusion(&[], &[], DEFAULT_RRF_C, 5).is_empty());
    }

    #[test]
    fn rrf_sums_reciprocal_ranks() {
        let fused = reciprocal_rank_fusion(&sem(&[("A", 0.1), ("B", 0.2)]), &lex(&[("B", 9.0), ("C", 1.0)]), 60.0, 10);
        assert_eq!(docs(&fused), vec!["B", "A", "C"]);
        let b = 1.0 / 62.0 + 1.0 / 61.0;
        assert!((fused[0].combined - b).abs() < 1e-6);
        assert!((fused[1].combined - 1.0 / 61.0).abs() < 1e-6);
    }

    #[test]
    fn rrf_ignores_raw_score_magnitude() {
        let a = reciprocal_rank_fusion(&sem(&[("A", 0.0), ("B", 100.0)]), &lex(&[("B", 0.02), ("A", 0.01)]), 60.0, 10);
        assert!((a[0].combined - a[1].combined).abs() < 1e-6);
        assert_eq!(docs(&a), vec!["A", "B"], "symmetric ranks tie; semantic order wins");
    }

    #[test]
    fn single_source_keeps_native_order() {
        let fused = single_source(&sem(&[("A", 0.1), ("B", 0.3), ("A", 0.5)]), SourceKind::Semantic, 5);
        assert_eq!(docs(&fused), vec!["A", "B"]);
        assert!(fused.iter().all(|r| r.lexical == 0.0 && r.combined == r.semantic));
    }

    #[test]
    fn strategy_defaults_and_validation() {
        assert_eq!(FusionStrategy::default(), FusionStrategy::Weighted { weight: 0.5 });
        assert!(FusionStrategy::Weighted { weight: 1.5 }.validate().is_err());
        assert!(FusionStrategy::Rrf { c: 0.0 }.validate().is_err());
        assert!(FusionStrategy::Rrf { c: DEFAULT_RRF_C }.validate().is_ok());
        let config = RetrievalConfig { fusion: FusionKind::Rrf, ..RetrievalConfig::default() };
        assert_eq!(FusionStrategy::from_config(&config), FusionStrategy::Rrf { c: 60.0 });
    }
}
