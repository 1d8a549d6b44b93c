//! Batch-relative min-max normalization.
//!
//! Scores are only comparable within one result batch: the same query at a
//! different `k` yields different normalized values.

use rag_core::SourceKind;

/// Spread below which a batch counts as degenerate.
pub const EPSILON: f64 = 1e-12;
/// Score given to every member of a degenerate batch.
pub const NEUTRAL: f32 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreDirection {
    /// Distance-like (L2): inverted after min-max.
    LowerIsBetter,
    /// Relevance-like (BM25): used as is.
    HigherIsBetter,
}

impl ScoreDirection {
    /// Native convention of each back-end.
    pub fn of(source: SourceKind) -> Self {
        match source {
            SourceKind::Semantic => Self::LowerIsBetter,
            SourceKind::Lexical => Self::HigherIsBetter,
        }
    }
}

/// Map `scores` onto [0,1] by min-max over the batch. Degenerate batches map to
/// [`NEUTRAL`]; non-finite scores map to 0.0.
pub fn min_max(scores: &[f32]) -> Vec<f32> {
    let finite = scores.iter().copied().filter(|s| s.is_finite()).map(f64::from);
    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), s| (lo.min(s), hi.max(s)));
    let span = hi - lo;
    scores
        .iter()
        .map(|&s| {
            if !s.is_finite() {
                0.0
            } else if span < EPSILON {
                NEUTRAL
            } else {
                ((f64::from(s) - lo) / span).clamp(0.0, 1.0) as f32
            }
        })
        .collect()
}

/// Normalize so that 1.0 is the best score in the batch.
pub fn normalize(scores: &[f32], direction: ScoreDirection) -> Vec<f32> {
    let mut out = min_max(scores);
    if direction == ScoreDirection::LowerIsBetter {
        for s in &mut out {
            *s = 1.0 - *s;
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn best_is_one_worst_is_zero() {
        assert_eq!(normalize(&[2.0, 1.0, 1.5], ScoreDirection::HigherIsBetter), vec![1.0, 0.0, 0.5]);
        assert_eq!(normalize(&[0.1, 0.5], ScoreDirection::LowerIsBetter), vec![1.0, 0.0]);
    }

    #[test]
    fn degenerate_batch_is_neutral_in_both_directions() {
        assert_eq!(min_max(&[3.0, 3.0, 3.0]), vec![0.5, 0.5, 0.5]);
        assert_eq!(normalize(&[0.0, 0.0], ScoreDirection::LowerIsBetter), vec![0.5, 0.5]);
        assert_eq!(normalize(&[7.0], ScoreDirection::HigherIsBetter), vec![0.5]);
    }

    #[test]
    fn empty_batch_stays_empty() {
        assert!(normalize(&[], ScoreDirection::HigherIsBetter).is_empty());
    }

    #[test]
    fn values_stay_in_unit_range() {
        let raw = [-4.0, 12.5, 0.0, 3.3, 1e6, -1e-3];
        for dir in [ScoreDirection::LowerIsBetter, ScoreDirection::HigherIsBetter] {
            assert!(normalize(&raw, dir).iter().all(|s| (0.0..=1.0).contains(s)));
        }
    }

    #[test]
    fn non_finite_scores_do_not_poison_the_batch() {
        let out = min_max(&[1.0, f32::NAN, 3.0]);
        assert_eq!(out, vec![0.0, 0.0, 1.0]);
    }

    #[test]
    fn direction_follows_back_end() {
        assert_eq!(ScoreDirection::of(SourceKind::Semantic), ScoreDirection::LowerIsBetter);
        assert_eq!(ScoreDirection::of(SourceKind::Lexical), ScoreDirection::HigherIsBetter);
    }
}
