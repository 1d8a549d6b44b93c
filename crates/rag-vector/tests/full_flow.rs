use std::sync::Arc;

use rag_core::config::VectorConfig;
use rag_core::traits::{Embedder, VectorBackend};
use rag_core::{ChunkStore, Document, IdentityMap, VectorRowMap};
use rag_embed::HashingEmbedder;
use rag_vector::schema::META_TABLE;
use rag_vector::table::{get_meta, META_DIM, META_FINGERPRINT};
use rag_vector::{VectorIndex, VectorIndexBuilder};

fn corpus() -> ChunkStore {
    let mut store = ChunkStore::new();
    store
        .add_document(
            Document::new("survival/fire.txt"),
            vec!["build a fire with dry tinder and kindling".into(), "a reflector wall keeps fire heat near the shelter".into()],
        )
        .unwrap();
    store
        .add_document(Document::new("tech/network.txt"), vec!["routers forward packets between networks".into()])
        .unwrap();
    store
        .add_document(Document::new("misc/water.txt"), vec!["boil water before drinking".into()])
        .unwrap();
    store
}

async fn build(store: &ChunkStore, dim: usize) -> anyhow::Result<(tempfile::TempDir, VectorRowMap)> {
    let tmp = tempfile::tempdir()?;
    let builder = VectorIndexBuilder::create(&tmp.path().join("lancedb"), "chunks").await?.with_batch_size(2);
    let embedder = HashingEmbedder::new(dim);
    let rows = builder.build(store, &embedder, &tmp.path().join("id_mapping.json")).await?;
    Ok((tmp, rows))
}

#[tokio::test]
async fn nearest_row_resolves_to_the_matching_chunk() -> anyhow::Result<()> {
    let store = corpus();
    let (tmp, rows) = build(&store, 64).await?;
    assert_eq!(rows.len(), store.len());
    assert_eq!(VectorRowMap::load(&tmp.path().join("id_mapping.json"))?, rows);

    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(64));
    let index = VectorIndex::open(&tmp.path().join("lancedb"), "chunks", embedder, &VectorConfig::default()).await?;
    assert_eq!(index.num_rows(), store.len());
    index.ensure_built_from(&store)?;

    let hits = index.search("routers forward packets between networks", 3).await?;
    assert_eq!(hits.len(), 3);
    assert!(hits.windows(2).all(|w| w[0].distance <= w[1].distance), "ascending distance");
    assert!(hits[0].distance < 1e-4, "identical text sits at distance ~0");

    let identity = IdentityMap::new(&store, rows);
    let top = identity.resolve_vector(hits[0].row).expect("row resolves");
    assert_eq!(top.doc, "tech/network.txt");
    assert_eq!(top.ordinal, 0);
    Ok(())
}

#[tokio::test]
async fn build_records_metadata() -> anyhow::Result<()> {
    let store = corpus();
    let (tmp, _rows) = build(&store, 32).await?;
    let conn = rag_vector::table::open_db(&tmp.path().join("lancedb").to_string_lossy()).await?;
    assert_eq!(get_meta(&conn, META_TABLE, META_DIM).await?.as_deref(), Some("32"));
    assert_eq!(get_meta(&conn, META_TABLE, META_FINGERPRINT).await?, Some(store.fingerprint()));
    assert_eq!(get_meta(&conn, META_TABLE, "missing").await?, None);
    Ok(())
}

#[tokio::test]
async fn k_bounds_results_and_zero_is_empty() -> anyhow::Result<()> {
    let store = corpus();
    let (tmp, _rows) = build(&store, 32).await?;
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(32));
    let index = VectorIndex::open(&tmp.path().join("lancedb"), "chunks", embedder, &VectorConfig::default()).await?;
    assert_eq!(index.search("fire", 2).await?.len(), 2);
    assert_eq!(index.search("fire", 50).await?.len(), store.len());
    assert!(index.search("fire", 0).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn embedder_dimension_mismatch_is_fatal() -> anyhow::Result<()> {
    let store = corpus();
    let (tmp, _rows) = build(&store, 32).await?;
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(48));
    let err = VectorIndex::open(&tmp.path().join("lancedb"), "chunks", embedder, &VectorConfig::default())
        .await
        .err()
        .expect("dimension mismatch");
    assert!(matches!(
        err.downcast_ref::<rag_core::Error>(),
        Some(rag_core::Error::DimensionMismatch { expected: 32, actual: 48 })
    ));
    assert!(rag_core::error::is_fatal(&err));
    Ok(())
}

#[tokio::test]
async fn index_from_another_store_is_rejected() -> anyhow::Result<()> {
    let store = corpus();
    let (tmp, _rows) = build(&store, 32).await?;
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(32));
    let index = VectorIndex::open(&tmp.path().join("lancedb"), "chunks", embedder, &VectorConfig::default()).await?;

    let mut changed = corpus();
    changed.add_document(Document::new("misc/new.txt"), vec!["a new chunk".into()])?;
    let err = index.ensure_built_from(&changed).err().expect("stale index");
    assert!(rag_core::error::is_fatal(&err));
    Ok(())
}

#[tokio::test]
async fn missing_database_is_a_config_error() -> anyhow::Result<()> {
    let tmp = tempfile::tempdir()?;
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(32));
    let err = VectorIndex::open(&tmp.path().join("nope"), "chunks", embedder, &VectorConfig::default())
        .await
        .err()
        .expect("missing");
    assert!(rag_core::error::is_fatal(&err));
    Ok(())
}

#[tokio::test]
async fn empty_store_builds_an_empty_table() -> anyhow::Result<()> {
    let store = ChunkStore::new();
    let (tmp, rows) = build(&store, 16).await?;
    assert!(rows.is_empty());
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(16));
    let index = VectorIndex::open(&tmp.path().join("lancedb"), "chunks", embedder, &VectorConfig::default()).await?;
    assert!(index.search("anything", 5).await?.is_empty());
    Ok(())
}

/// Slow: trains an IVF-PQ index. Run with `cargo test -p rag-vector -- --ignored`.
#[ignore]
#[tokio::test]
async fn ann_index_trains_and_serves_queries() -> anyhow::Result<()> {
    let mut store = ChunkStore::new();
    let texts: Vec<String> = (0..300).map(|i| format!("hello world note {i} about topic {}", i % 17)).collect();
    store.add_document(Document::new("bulk.txt"), texts)?;
    let (tmp, _rows) = build(&store, 32).await?;
    let conn = rag_vector::table::open_db(&tmp.path().join("lancedb").to_string_lossy()).await?;

    let built = rag_vector::index_build::maybe_build_ann_index(&conn, "chunks", 32, 256).await?;
    let name = built.expect("300 rows is above the threshold");
    assert!(rag_vector::index_build::validate_index(&conn, "chunks", 5, 5).await?);
    assert_eq!(get_meta(&conn, META_TABLE, rag_vector::table::META_ANN_INDEX).await?, Some(name));

    let config = VectorConfig { exact: false, ..VectorConfig::default() };
    let embedder: Arc<dyn Embedder> = Arc::new(HashingEmbedder::new(32));
    let index = VectorIndex::open(&tmp.path().join("lancedb"), "chunks", embedder, &config).await?;
    assert_eq!(index.search("hello world note 7", 5).await?.len(), 5);
    Ok(())
}
