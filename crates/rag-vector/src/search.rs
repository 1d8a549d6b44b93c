use anyhow::Result;
use arrow_array::cast::AsArray;
use arrow_array::types::{Float32Type, UInt32Type};
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase, Select};
use lancedb::{DistanceType, Table};
use std::path::Path;
use std::sync::Arc;

use rag_core::config::VectorConfig;
use rag_core::traits::{Embedder, VectorBackend, VectorHit};
use rag_core::{ChunkStore, Error, VectorRow};

use crate::schema::{vector_dim, DISTANCE_COLUMN, META_TABLE, ROW_COLUMN};
use crate::table::{get_meta, open_db, table_exists, META_EMBEDDER_ID, META_FINGERPRINT};

/// Read-only handle over a built vector table. Distances are L2, lower is better.
pub struct VectorIndex {
	table: Table,
	embedder: Arc<dyn Embedder>,
	dim: usize,
	exact: bool,
	nprobes: usize,
	rows: usize,
	fingerprint: Option<String>,
}

impl VectorIndex {
	/// Open `table_name` in `db_dir`. The embedder must produce vectors of the
	/// table's width; anything else is a [`Error::DimensionMismatch`].
	pub async fn open(db_dir: &Path, table_name: &str, embedder: Arc<dyn Embedder>, config: &VectorConfig) -> Result<Self> {
		if !db_dir.exists() {
			return Err(Error::Config(format!("vector index not found at {}", db_dir.display())).into());
		}
		let conn = open_db(&db_dir.to_string_lossy()).await?;
		if !table_exists(&conn, table_name).await? {
			return Err(Error::Config(format!("vector table '{table_name}' missing in {}", db_dir.display())).into());
		}
		let table = conn.open_table(table_name).execute().await?;
		let schema = table.schema().await?;
		let dim = vector_dim(&schema)
			.ok_or_else(|| Error::Config(format!("vector table '{table_name}' has no fixed-size vector column")))?;
		if embedder.dim() != dim {
			return Err(Error::DimensionMismatch { expected: dim, actual: embedder.dim() }.into());
		}
		if let Some(built_with) = get_meta(&conn, META_TABLE, META_EMBEDDER_ID).await? {
			if built_with != embedder.id() {
				tracing::warn!(built_with = %built_with, current = embedder.id(), "vector index was built with a different embedder");
			}
		}
		let fingerprint = get_meta(&conn, META_TABLE, META_FINGERPRINT).await?;
		let rows = table.count_rows(None).await?;
		tracing::debug!(table = table_name, dim, rows, exact = config.exact, "vector index opened");
		Ok(Self { table, embedder, dim, exact: config.exact, nprobes: config.nprobes, rows, fingerprint })
	}

	pub fn dim(&self) -> usize {
		self.dim
	}

	/// Fails unless the index was built from exactly this store snapshot; a
	/// stale row map would resolve rows to the wrong chunks.
	pub fn ensure_built_from(&self, store: &ChunkStore) -> Result<()> {
		match &self.fingerprint {
			Some(fp) if *fp == store.fingerprint() => Ok(()),
			Some(_) => Err(Error::Config("vector index was built from a different chunk store; re-run ingest".into()).into()),
			None => Err(Error::Config("vector index has no recorded fingerprint".into()).into()),
		}
	}

	pub fn num_rows(&self) -> usize {
		self.rows
	}

	async fn embed_query(&self, query: &str) -> Result<Vec<f32>> {
		let embedder = Arc::clone(&self.embedder);
		let text = query.to_string();
		let mut vectors = tokio::task::spawn_blocking(move || embedder.embed_batch(&[text])).await??;
		let vector = vectors.pop().ok_or_else(|| Error::Backend("embedder returned no vector".into()))?;
		if vector.len() != self.dim {
			return Err(Error::DimensionMismatch { expected: self.dim, actual: vector.len() }.into());
		}
		Ok(vector)
	}

	/// Nearest rows to an already-embedded query vector.
	pub async fn search_vector(&self, vector: Vec<f32>, k: usize) -> Result<Vec<VectorHit>> {
		if k == 0 || self.rows == 0 {
			return Ok(Vec::new());
		}
		let mut query = self
			.table
			.vector_search(vector)?
			.distance_type(DistanceType::L2)
			.select(Select::columns(&[ROW_COLUMN]))
			.limit(k);
		query = if self.exact { query.bypass_vector_index() } else { query.nprobes(self.nprobes) };
		let mut stream = query.execute().await?;
		let mut hits = Vec::new();
		while let Some(batch) = stream.try_next().await? {
			let rows = batch
				.column_by_name(ROW_COLUMN)
				.and_then(|c| c.as_primitive_opt::<UInt32Type>())
				.ok_or_else(|| Error::Backend("vector result without row column".into()))?;
			let distances = batch
				.column_by_name(DISTANCE_COLUMN)
				.and_then(|c| c.as_primitive_opt::<Float32Type>())
				.ok_or_else(|| Error::Backend("vector result without distance column".into()))?;
			for i in 0..batch.num_rows() {
				hits.push(VectorHit { row: VectorRow(rows.value(i)), distance: distances.value(i) });
			}
		}
		hits.sort_by(|a, b| a.distance.total_cmp(&b.distance));
		hits.truncate(k);
		Ok(hits)
	}
}

impl VectorBackend for VectorIndex {
	async fn search(&self, query: &str, k: usize) -> Result<Vec<VectorHit>> {
		if k == 0 {
			return Ok(Vec::new());
		}
		let vector = self.embed_query(query).await?;
		let hits = self.search_vector(vector, k).await?;
		tracing::debug!(query, hits = hits.len(), "vector search");
		Ok(hits)
	}
}
