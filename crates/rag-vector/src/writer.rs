use anyhow::Result;
use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, RecordBatchIterator, UInt32Array};
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rag_core::traits::Embedder;
use rag_core::{ChunkStore, Error, VectorRowMap};

use crate::schema::{build_vector_schema, META_TABLE};
use crate::table::{ensure_table, open_db, set_meta, META_DIM, META_EMBEDDER_ID, META_FINGERPRINT, META_ROWS};

/// Offline, exclusive builder. Replaces whatever database lives in `db_dir`.
pub struct VectorIndexBuilder {
	db_dir: PathBuf,
	db: Connection,
	table_name: String,
	batch_size: usize,
}

impl VectorIndexBuilder {
	pub async fn create(db_dir: &Path, table_name: &str) -> Result<Self> {
		if db_dir.exists() { std::fs::remove_dir_all(db_dir)?; }
		std::fs::create_dir_all(db_dir)?;
		let db = open_db(&db_dir.to_string_lossy()).await?;
		Ok(Self { db_dir: db_dir.to_path_buf(), db, table_name: table_name.to_string(), batch_size: 256 })
	}

	/// Chunks embedded per provider call (and rows per write).
	pub fn with_batch_size(mut self, batch_size: usize) -> Self {
		self.batch_size = batch_size.max(1);
		self
	}

	pub fn connection(&self) -> &Connection {
		&self.db
	}

	/// Embed every chunk of `store` in (doc, ordinal) order, write the vectors,
	/// save the row map to `row_map_path` and record build metadata.
	pub async fn build(&self, store: &ChunkStore, embedder: &dyn Embedder, row_map_path: &Path) -> Result<VectorRowMap> {
		let dim = embedder.dim();
		let row_map = VectorRowMap::from_store(store);
		let texts: Vec<String> = store.chunks().map(|c| c.text).collect();
		tracing::info!(chunks = texts.len(), table = %self.table_name, embedder = embedder.id(), "building vector index");

		let pb = ProgressBar::new(texts.len() as u64);
		pb.set_style(ProgressStyle::default_bar().template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}")?.progress_chars("#>-"));
		let mut next_row = 0u32;
		for batch in texts.chunks(self.batch_size) {
			let vectors = embedder.embed_batch(batch)?;
			if vectors.len() != batch.len() {
				return Err(Error::Backend(format!("embedder returned {} vectors for {} texts", vectors.len(), batch.len())).into());
			}
			if let Some(bad) = vectors.iter().find(|v| v.len() != dim) {
				return Err(Error::DimensionMismatch { expected: dim, actual: bad.len() }.into());
			}
			let rb = to_record_batch(next_row, &vectors, dim)?;
			next_row += batch.len() as u32;
			self.insert_batch(rb).await?;
			pb.set_position(u64::from(next_row));
		}
		pb.finish_with_message("vector index written");
		// an empty corpus still gets a queryable table
		ensure_table(&self.db, &self.table_name, build_vector_schema(dim)).await?;

		row_map.save(row_map_path)?;
		set_meta(&self.db, META_TABLE, META_DIM, &dim.to_string()).await?;
		set_meta(&self.db, META_TABLE, META_EMBEDDER_ID, embedder.id()).await?;
		set_meta(&self.db, META_TABLE, META_FINGERPRINT, &store.fingerprint()).await?;
		set_meta(&self.db, META_TABLE, META_ROWS, &row_map.len().to_string()).await?;
		tracing::info!(dir = %self.db_dir.display(), rows = row_map.len(), dim, "vector index committed");
		Ok(row_map)
	}

	async fn insert_batch(&self, rb: RecordBatch) -> Result<()> {
		let schema = rb.schema();
		let reader = Box::new(RecordBatchIterator::new(vec![Ok(rb)].into_iter(), schema));
		if self.db.table_names().execute().await?.contains(&self.table_name) {
			self.db.open_table(&self.table_name).execute().await?.add(reader).execute().await?;
		} else {
			self.db.create_table(&self.table_name, reader).execute().await?;
		}
		Ok(())
	}
}

fn to_record_batch(first_row: u32, vectors: &[Vec<f32>], dim: usize) -> Result<RecordBatch> {
	let rows: Vec<u32> = (first_row..).take(vectors.len()).collect();
	let values = vectors.iter().map(|v| Some(v.iter().copied().map(Some).collect::<Vec<_>>()));
	let record_batch = RecordBatch::try_new(build_vector_schema(dim), vec![
		Arc::new(UInt32Array::from(rows)),
		Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(values, dim as i32)),
	])?;
	Ok(record_batch)
}
