use anyhow::Result;
use std::path::{Path, PathBuf};
use tantivy::schema::Field;
use tantivy::{doc, Index, IndexWriter};

use rag_core::ChunkStore;

use crate::tantivy_utils::{build_schema, register_tokenizer, CHUNK_ID_FIELD, TEXT_FIELD};

/// Offline, exclusive builder. Replaces whatever index lives in `index_dir`.
pub struct LexicalIndexBuilder {
	index_dir: PathBuf,
	writer: IndexWriter,
	chunk_id_field: Field,
	text_field: Field,
	added: usize,
}

impl LexicalIndexBuilder {
	pub fn create(index_dir: &Path) -> Result<Self> {
		Self::create_with(index_dir, true)
	}

	/// `with_freqs = false` builds a presence-only index (no BM25 at query time).
	pub fn create_with(index_dir: &Path, with_freqs: bool) -> Result<Self> {
		let schema = build_schema(with_freqs);
		if index_dir.exists() { std::fs::remove_dir_all(index_dir)?; }
		std::fs::create_dir_all(index_dir)?;
		let index = Index::create_in_dir(index_dir, schema.clone())?;
		register_tokenizer(&index);
		let chunk_id_field = schema.get_field(CHUNK_ID_FIELD)?;
		let text_field = schema.get_field(TEXT_FIELD)?;
		let writer = index.writer(50_000_000)?;
		Ok(Self { index_dir: index_dir.to_path_buf(), writer, chunk_id_field, text_field, added: 0 })
	}

	/// Index every chunk of the store under its [`ChunkId`](rag_core::ChunkId).
	pub fn add_chunks(&mut self, store: &ChunkStore) -> Result<usize> {
		let mut count = 0usize;
		for chunk in store.chunks() {
			self.writer.add_document(doc!(
				self.chunk_id_field => chunk.id.0,
				self.text_field => chunk.text,
			))?;
			count += 1;
		}
		self.added += count;
		Ok(count)
	}

	pub fn commit(mut self) -> Result<usize> {
		self.writer.commit()?;
		self.writer.wait_merging_threads()?;
		tracing::info!(dir = %self.index_dir.display(), chunks = self.added, "lexical index committed");
		Ok(self.added)
	}
}
