//! Ground-truth sets: curated JSON files or a synthetic fallback.
//!
//! Curated format, one object per query:
//!
//! ```json
//! [
//!   {"query": "water purification", "relevant_doc_paths": ["txt/water.txt"]},
//!   {"query": "reflector wall", "relevant_chunks": [{"doc": "txt/fire.txt", "ordinal": 1}]}
//! ]
//! ```

use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use std::path::Path;

use rag_core::{ChunkKey, ChunkStore, Error};

/// Terms too common to make useful synthetic queries.
const STOP_WORDS: &[&str] = &[
    "the", "and", "for", "that", "with", "from", "this", "these", "those", "into", "onto", "your", "have", "has",
    "had", "are", "was", "were", "their", "there", "where", "been", "also", "between", "using", "used", "such",
];
const TERM_PATTERN: &str = r"[A-Za-z][A-Za-z0-9\-]{2,}";
const CANDIDATE_TERMS: usize = 200;
const MAX_RELEVANT_DOCS: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GroundTruthSource {
    Curated,
    /// Frequent-term queries; relevance is mere term containment.
    Synthetic,
}

/// What counts as relevant for one query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Relevant {
    /// Document paths; results are projected to their document and deduplicated.
    Documents(BTreeSet<String>),
    Chunks(BTreeSet<ChunkKey>),
}

impl Relevant {
    pub fn len(&self) -> usize {
        match self {
            Self::Documents(d) => d.len(),
            Self::Chunks(c) => c.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroundTruthCase {
    pub query: String,
    pub relevant: Relevant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct GroundTruth {
    pub cases: Vec<GroundTruthCase>,
    pub source: GroundTruthSource,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawCase {
    query: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relevant_doc_paths: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    relevant_chunks: Option<Vec<RawChunk>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct RawChunk {
    doc: String,
    ordinal: u32,
}

impl GroundTruth {
    /// Load a curated set. Unreadable or malformed files are [`Error::GroundTruth`].
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)
            .map_err(|e| Error::GroundTruth(format!("cannot read {}: {e}", path.display())))?;
        Self::from_json(&data)
    }

    pub fn from_json(data: &str) -> Result<Self> {
        let raw: Vec<RawCase> = serde_json::from_str(data).map_err(|e| Error::GroundTruth(e.to_string()))?;
        let cases = raw
            .into_iter()
            .enumerate()
            .map(|(i, case)| parse_case(i, case))
            .collect::<Result<Vec<_>>>()?;
        Ok(Self { cases, source: GroundTruthSource::Curated })
    }

    /// Curated set at `path` if present, otherwise a synthetic one from `store`.
    pub fn load_or_synthesize(path: &Path, store: &ChunkStore, n: usize) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        tracing::warn!(path = %path.display(), "no curated ground truth; synthesizing from frequent terms");
        synthesize_ground_truth(store, n)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let raw: Vec<RawCase> = self
            .cases
            .iter()
            .map(|c| match &c.relevant {
                Relevant::Documents(docs) => RawCase {
                    query: c.query.clone(),
                    relevant_doc_paths: Some(docs.iter().cloned().collect()),
                    relevant_chunks: None,
                },
                Relevant::Chunks(keys) => RawCase {
                    query: c.query.clone(),
                    relevant_doc_paths: None,
                    relevant_chunks: Some(keys.iter().map(|k| RawChunk { doc: k.doc.clone(), ordinal: k.ordinal }).collect()),
                },
            })
            .collect();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(&raw)?)?;
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.cases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cases.is_empty()
    }
}

fn parse_case(index: usize, case: RawCase) -> Result<GroundTruthCase> {
    if case.query.trim().is_empty() {
        return Err(Error::GroundTruth(format!("case {index}: empty query")).into());
    }
    let relevant = match (case.relevant_doc_paths, case.relevant_chunks) {
        (Some(docs), None) => Relevant::Documents(docs.into_iter().collect()),
        (None, Some(chunks)) => Relevant::Chunks(chunks.into_iter().map(|c| ChunkKey::new(c.doc, c.ordinal)).collect()),
        (Some(_), Some(_)) => {
            return Err(Error::GroundTruth(format!("case {index}: both relevant_doc_paths and relevant_chunks given")).into())
        }
        (None, None) => {
            return Err(Error::GroundTruth(format!("case {index}: no relevant_doc_paths or relevant_chunks")).into())
        }
    };
    Ok(GroundTruthCase { query: case.query, relevant })
}

/// Up to `n` single-term queries from the most frequent non-stop-word terms.
/// A document is relevant when any of its chunks contains the term
/// (case-insensitive substring match).
pub fn synthesize_ground_truth(store: &ChunkStore, n: usize) -> Result<GroundTruth> {
    let pattern = Regex::new(TERM_PATTERN)?;
    // count, first-seen position
    let mut vocab: HashMap<String, (usize, usize)> = HashMap::new();
    for chunk in store.chunks() {
        for m in pattern.find_iter(&chunk.text) {
            let term = m.as_str().to_lowercase();
            if STOP_WORDS.contains(&term.as_str()) {
                continue;
            }
            let next = vocab.len();
            vocab.entry(term).or_insert((0, next)).0 += 1;
        }
    }
    let mut terms: Vec<(String, (usize, usize))> = vocab.into_iter().collect();
    terms.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));
    terms.truncate(CANDIDATE_TERMS);

    let lowered: Vec<(String, String)> = store.chunks().map(|c| (c.key.doc, c.text.to_lowercase())).collect();
    let mut cases = Vec::new();
    for (term, _) in terms {
        if cases.len() >= n {
            break;
        }
        // cap distinct documents, not matching chunks
        let mut docs: BTreeSet<String> = BTreeSet::new();
        for (doc, text) in &lowered {
            if docs.len() >= MAX_RELEVANT_DOCS {
                break;
            }
            if !docs.contains(doc) && text.contains(&term) {
                docs.insert(doc.clone());
            }
        }
        if !docs.is_empty() {
            cases.push(GroundTruthCase { query: term, relevant: Relevant::Documents(docs) });
        }
    }
    if cases.is_empty() {
        return Err(Error::GroundTruth("could not synthesize ground truth from an empty corpus; supply a curated file".into()).into());
    }
    tracing::info!(queries = cases.len(), "synthetic ground truth");
    Ok(GroundTruth { cases, source: GroundTruthSource::Synthetic })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_relevance_granularities_parse() {
        let gt = GroundTruth::from_json(
            r#"[
                {"query": "fire", "relevant_doc_paths": ["a.txt", "b.txt"]},
                {"query": "wall", "relevant_chunks": [{"doc": "a.txt", "ordinal": 1}]}
            ]"#,
        )
        .unwrap();
        assert_eq!(gt.source, GroundTruthSource::Curated);
        assert_eq!(gt.len(), 2);
        assert_eq!(gt.cases[0].relevant.len(), 2);
        assert_eq!(gt.cases[1].relevant, Relevant::Chunks([ChunkKey::new("a.txt", 1)].into_iter().collect()));
    }

    #[test]
    fn malformed_ground_truth_is_fatal() {
        for bad in [
            "not json",
            r#"{"query": "x"}"#,
            r#"[{"query": "x"}]"#,
            r#"[{"query": " ", "relevant_doc_paths": []}]"#,
            r#"[{"relevant_doc_paths": ["a"]}]"#,
        ] {
            let err = GroundTruth::from_json(bad).unwrap_err();
            assert!(rag_core::error::is_fatal(&err), "{bad}");
        }
    }
}
