//! Set-based metrics over the top-k *deduplicated* results.

use std::collections::HashSet;
use std::hash::Hash;

/// First occurrence of each item, order preserved.
pub fn dedup_keep_order<T: Eq + Hash + Clone>(items: &[T]) -> Vec<T> {
    let mut seen = HashSet::new();
    items.iter().filter(|x| seen.insert((*x).clone())).cloned().collect()
}

fn top_k<T: Eq + Hash + Clone>(ranked: &[T], k: usize) -> Vec<T> {
    let mut top = dedup_keep_order(ranked);
    top.truncate(k);
    top
}

/// 1.0 if any relevant item is in the top k, else 0.0.
pub fn hit_at_k<T: Eq + Hash + Clone>(ranked: &[T], relevant: &HashSet<T>, k: usize) -> f64 {
    if top_k(ranked, k).iter().any(|x| relevant.contains(x)) { 1.0 } else { 0.0 }
}

/// Number of distinct relevant items in the top k.
pub fn found_at_k<T: Eq + Hash + Clone>(ranked: &[T], relevant: &HashSet<T>, k: usize) -> usize {
    top_k(ranked, k).iter().filter(|x| relevant.contains(*x)).count()
}

/// `found@k / max(1, min(k, |relevant|))`, in [0, 1].
pub fn recall_at_k_strict<T: Eq + Hash + Clone>(ranked: &[T], relevant: &HashSet<T>, k: usize) -> f64 {
    let denom = k.min(relevant.len()).max(1);
    found_at_k(ranked, relevant, k) as f64 / denom as f64
}
