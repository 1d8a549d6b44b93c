use rag_core::config::EmbeddingConfig;
use rag_core::traits::Embedder;
use rag_embed::{default_embedder, HashingEmbedder};

fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[test]
fn hashing_embedder_shapes_and_determinism() {
    let embedder = HashingEmbedder::new(384);
    let texts = vec!["hello world".to_string(), "hello world".to_string()];
    let embs = embedder.embed_batch(&texts).expect("embed_batch");
    assert_eq!(embs.len(), 2);
    let v1 = &embs[0];
    let v2 = &embs[1];

    assert_eq!(v1.len(), 384, "embedding dim is 384");

    let norm: f32 = v1.iter().map(|x| x * x).sum::<f32>().sqrt();
    assert!((norm - 1.0).abs() <= 1e-3, "vector is L2-normalized (norm={norm})");

    for (a, b) in v1.iter().zip(v2.iter()) { assert!((a - b).abs() <= 1e-6); }
}

#[test]
fn shared_words_are_closer_than_unrelated_text() {
    let embedder = HashingEmbedder::new(256);
    let texts = vec![
        "build a fire with dry tinder".to_string(),
        "dry tinder makes a fire easy".to_string(),
        "routers forward network packets".to_string(),
    ];
    let e = embedder.embed_batch(&texts).expect("embed");
    assert!(dot(&e[0], &e[1]) > dot(&e[0], &e[2]));
}

#[test]
fn empty_text_still_has_the_declared_dimension() {
    let embedder = HashingEmbedder::new(16);
    let e = embedder.embed_batch(&[String::new()]).expect("embed");
    assert_eq!(e[0].len(), 16);
    assert!(e[0].iter().all(|x| *x == 0.0));
}

#[test]
fn provider_hashing_needs_no_model_files() {
    let config = EmbeddingConfig { provider: "hashing".into(), dim: 64, ..EmbeddingConfig::default() };
    let embedder = default_embedder(&config).expect("embedder");
    assert_eq!(embedder.dim(), 64);
    assert!(embedder.id().starts_with("hashing:"));
}

#[test]
fn unknown_provider_is_a_config_error() {
    let config = EmbeddingConfig { provider: "word2vec".into(), ..EmbeddingConfig::default() };
    let err = default_embedder(&config).err().expect("error");
    assert!(rag_core::error::is_fatal(&err));
}
