use anyhow::{Context, Result};

use rag_core::config::Settings;
use rag_core::{ChunkStore, IdentityMap, VectorRowMap};
use rag_embed::default_embedder;
use rag_text::LexicalIndex;
use rag_vector::VectorIndex;

use crate::engine::HybridSearcher;

/// Searcher over the on-disk indexes named by `settings`.
///
/// Loads the vector row map, checks that the vector index was built from
/// `store`, and builds the identity map once.
pub async fn open_searcher(settings: &Settings, store: &ChunkStore) -> Result<HybridSearcher<LexicalIndex, VectorIndex>> {
    let lexical = LexicalIndex::open(&settings.lexical_index_dir()).context("opening lexical index")?;
    let embedder = default_embedder(&settings.embedding)?;
    let vector = VectorIndex::open(&settings.vector_db_dir(), &settings.vector.table, embedder, &settings.vector)
        .await
        .context("opening vector index")?;
    vector.ensure_built_from(store)?;
    let rows = VectorRowMap::load(&settings.vector_row_map_path())?;
    if rows.len() != vector.num_rows() {
        return Err(rag_core::Error::Config(format!(
            "row map has {} entries but the vector table has {} rows",
            rows.len(),
            vector.num_rows()
        ))
        .into());
    }
    let identity = IdentityMap::new(store, rows);
    tracing::info!(
        lexical_rows = identity.lexical_rows(),
        vector_rows = identity.vector_rows(),
        scoring = ?lexical.scoring(),
        "searcher ready"
    );
    Ok(HybridSearcher::new(lexical, vector, identity, settings.retrieval.clone()))
}
