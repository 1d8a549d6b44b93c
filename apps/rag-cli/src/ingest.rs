use anyhow::{Context, Result};
use std::path::PathBuf;

use rag_core::chunker::{Chunker, ChunkingConfig};
use rag_core::config::Settings;
use rag_core::ChunkStore;
use rag_embed::default_embedder;
use rag_text::LexicalIndexBuilder;
use rag_vector::index_build::maybe_build_ann_index;
use rag_vector::VectorIndexBuilder;

pub async fn run(settings: &Settings, dir: Option<PathBuf>, limit: Option<usize>, ann: bool) -> Result<()> {
    let source = dir.unwrap_or_else(|| settings.raw_txt_dir());
    println!("Ingesting {}", source.display());

    let chunker = Chunker::new(ChunkingConfig {
        max_words: settings.chunking.max_words,
        overlap: settings.chunking.overlap,
    })?;
    let mut store = ChunkStore::new();
    let files = match limit {
        Some(n) => chunker.process_directory_limited(&source, n, &mut store)?,
        None => chunker.process_directory(&source, &mut store)?,
    };
    let store_path = settings.chunk_store_path();
    store.save(&store_path).with_context(|| format!("saving chunk store to {}", store_path.display()))?;
    println!("Chunked {files} files into {} chunks ({} documents)", store.len(), store.document_count());

    let lexical_dir = settings.lexical_index_dir();
    let mut lexical = LexicalIndexBuilder::create(&lexical_dir)?;
    lexical.add_chunks(&store)?;
    let indexed = lexical.commit()?;
    println!("Lexical index: {indexed} chunks at {}", lexical_dir.display());

    let embedder = default_embedder(&settings.embedding)?;
    let vector_dir = settings.vector_db_dir();
    let builder = VectorIndexBuilder::create(&vector_dir, &settings.vector.table)
        .await?
        .with_batch_size(settings.embedding.batch_size);
    let rows = builder.build(&store, embedder.as_ref(), &settings.vector_row_map_path()).await?;
    println!("Vector index: {} rows (dim {}, {}) at {}", rows.len(), embedder.dim(), embedder.id(), vector_dir.display());

    if ann {
        if let Some(name) =
            maybe_build_ann_index(builder.connection(), &settings.vector.table, embedder.dim(), settings.vector.ann_min_rows).await?
        {
            println!("ANN index: {name} (set vector.exact = false to use it)");
        }
    }
    Ok(())
}
