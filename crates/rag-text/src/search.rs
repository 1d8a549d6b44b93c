use anyhow::Result;
use std::collections::BTreeSet;
use std::path::Path;
use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, Occur, Query, TermQuery};
use tantivy::schema::{Field, IndexRecordOption, Value};
use tantivy::{DocAddress, Index, IndexReader, Order, ReloadPolicy, Searcher, TantivyDocument, Term};

use rag_core::traits::{LexicalBackend, LexicalHit};
use rag_core::{ChunkId, Error};

use crate::tantivy_utils::{has_term_freqs, register_tokenizer, CHUNK_ID_FIELD, TEXT_FIELD};

/// Score reported for every hit in presence-only mode.
pub const PRESENCE_SCORE: f32 = 0.0;

/// How hits are ranked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoringMode {
	/// BM25 relevance, higher is better.
	Bm25,
	/// Ranking function unavailable: every match scores [`PRESENCE_SCORE`],
	/// ordered by ascending chunk id.
	PresenceOnly,
}

/// Extract lowercase alphanumeric tokens of at least two characters, deduplicated,
/// in first-seen order.
pub fn normalize_query(query: &str) -> Vec<String> {
	let mut seen = BTreeSet::new();
	query
		.split(|c: char| !c.is_alphanumeric())
		.map(str::to_lowercase)
		.filter(|t| t.chars().count() >= 2)
		.filter(|t| seen.insert(t.clone()))
		.collect()
}

/// Read-only lexical index handle. Cheap to share behind an `Arc`.
pub struct LexicalIndex {
	reader: IndexReader,
	chunk_id_field: Field,
	text_field: Field,
	scoring: ScoringMode,
}

impl LexicalIndex {
	pub fn open(index_dir: &Path) -> Result<Self> {
		if !index_dir.exists() {
			return Err(Error::Config(format!("lexical index not found at {}", index_dir.display())).into());
		}
		let index = Index::open_in_dir(index_dir)
			.map_err(|e| Error::Config(format!("cannot open lexical index {}: {e}", index_dir.display())))?;
		register_tokenizer(&index);
		let schema = index.schema();
		let chunk_id_field = schema.get_field(CHUNK_ID_FIELD)?;
		let text_field = schema.get_field(TEXT_FIELD)?;
		let scoring = if has_term_freqs(&schema) {
			ScoringMode::Bm25
		} else {
			tracing::warn!(dir = %index_dir.display(), "lexical index has no term frequencies; BM25 unavailable, using presence-only ranking");
			ScoringMode::PresenceOnly
		};
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into()?;
		Ok(Self { reader, chunk_id_field, text_field, scoring })
	}

	pub fn scoring(&self) -> ScoringMode {
		self.scoring
	}

	/// Force a scoring mode. Downgrading to presence-only is always possible;
	/// BM25 cannot be forced onto an index without frequencies.
	pub fn with_scoring(mut self, scoring: ScoringMode) -> Self {
		if scoring == ScoringMode::PresenceOnly {
			self.scoring = scoring;
		}
		self
	}

	pub fn num_chunks(&self) -> u64 {
		self.reader.searcher().num_docs()
	}

	fn build_query(&self, tokens: &[String]) -> BooleanQuery {
		let record = match self.scoring {
			ScoringMode::Bm25 => IndexRecordOption::WithFreqs,
			ScoringMode::PresenceOnly => IndexRecordOption::Basic,
		};
		let clauses: Vec<(Occur, Box<dyn Query>)> = tokens
			.iter()
			.map(|t| {
				let term = Term::from_field_text(self.text_field, t);
				(Occur::Should, Box::new(TermQuery::new(term, record)) as Box<dyn Query>)
			})
			.collect();
		BooleanQuery::new(clauses)
	}

	fn load_hit(&self, searcher: &Searcher, addr: DocAddress, score: f32) -> Result<LexicalHit> {
		let doc: TantivyDocument = searcher.doc(addr)?;
		let id = doc
			.get_first(self.chunk_id_field)
			.and_then(|v| v.as_u64())
			.ok_or_else(|| Error::Backend("lexical document without chunk_id".into()))?;
		let text = doc.get_first(self.text_field).and_then(|v| v.as_str()).unwrap_or_default().to_string();
		Ok(LexicalHit { id: ChunkId(id), score, text })
	}
}

impl LexicalBackend for LexicalIndex {
	fn search(&self, query: &str, k: usize) -> Result<Vec<LexicalHit>> {
		let tokens = normalize_query(query);
		if tokens.is_empty() || k == 0 {
			return Ok(Vec::new());
		}
		let q = self.build_query(&tokens);
		let searcher = self.reader.searcher();
		let mut hits = Vec::new();
		match self.scoring {
			ScoringMode::Bm25 => {
				for (score, addr) in searcher.search(&q, &TopDocs::with_limit(k))? {
					hits.push(self.load_hit(&searcher, addr, score)?);
				}
			}
			ScoringMode::PresenceOnly => {
				let collector = TopDocs::with_limit(k).order_by_u64_field(CHUNK_ID_FIELD, Order::Asc);
				for (_id, addr) in searcher.search(&q, &collector)? {
					hits.push(self.load_hit(&searcher, addr, PRESENCE_SCORE)?);
				}
			}
		}
		tracing::debug!(query, tokens = tokens.len(), hits = hits.len(), "lexical search");
		Ok(hits)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalization_drops_short_and_symbol_tokens() {
		assert_eq!(normalize_query("What is a B-tree? Fire!!"), vec!["what", "is", "tree", "fire"]);
		assert_eq!(normalize_query("Fire fire FIRE"), vec!["fire"]);
	}

	#[test]
	fn queries_without_terms_normalize_to_nothing() {
		assert!(normalize_query("").is_empty());
		assert!(normalize_query("a ? ! -").is_empty());
	}
}
