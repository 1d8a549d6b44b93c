use rag_core::traits::LexicalBackend;
use rag_core::{ChunkStore, Document};
use rag_text::search::PRESENCE_SCORE;
use rag_text::{LexicalIndex, LexicalIndexBuilder, ScoringMode};
use tempfile::TempDir;

fn corpus() -> ChunkStore {
    let mut store = ChunkStore::new();
    store
        .add_document(
            Document::new("survival/fire.txt"),
            vec![
                "Build a fire with dry tinder, kindling and fuel wood. Fire needs oxygen.".into(),
                "A fire reflector wall keeps heat near the shelter.".into(),
            ],
        )
        .unwrap();
    store
        .add_document(Document::new("tech/network.txt"), vec!["Computer networking uses routers and switches.".into()])
        .unwrap();
    store
        .add_document(Document::new("misc/water.txt"), vec!["Boil water before drinking it.".into()])
        .unwrap();
    store
}

fn build(store: &ChunkStore, with_freqs: bool) -> (TempDir, LexicalIndex) {
    let tmp = TempDir::new().expect("tmp");
    let dir = tmp.path().join("tantivy");
    let mut builder = LexicalIndexBuilder::create_with(&dir, with_freqs).expect("builder");
    assert_eq!(builder.add_chunks(store).expect("add"), store.len());
    builder.commit().expect("commit");
    let index = LexicalIndex::open(&dir).expect("open");
    (tmp, index)
}

#[test]
fn bm25_ranks_by_relevance_and_maps_to_store_ids() {
    let store = corpus();
    let (_tmp, index) = build(&store, true);
    assert_eq!(index.scoring(), ScoringMode::Bm25);
    assert_eq!(index.num_chunks(), store.len() as u64);

    let hits = index.search("fire", 10).expect("search");
    assert_eq!(hits.len(), 2);
    assert!(hits[0].score >= hits[1].score);
    for hit in &hits {
        let chunk = store.chunk_by_id(hit.id).expect("id resolves through the store");
        assert_eq!(chunk.key.doc, "survival/fire.txt");
        assert_eq!(chunk.text, hit.text);
    }
}

#[test]
fn any_matching_term_qualifies_and_k_bounds_results() {
    let store = corpus();
    let (_tmp, index) = build(&store, true);
    let hits = index.search("fire water routers", 10).expect("search");
    assert_eq!(hits.len(), 4);
    let hits = index.search("fire water routers", 2).expect("search");
    assert_eq!(hits.len(), 2);
}

#[test]
fn query_without_indexable_terms_is_empty_not_an_error() {
    let store = corpus();
    let (_tmp, index) = build(&store, true);
    assert!(index.search("", 5).expect("empty").is_empty());
    assert!(index.search("a ? !", 5).expect("symbols").is_empty());
    assert!(index.search("zebra", 5).expect("no match").is_empty());
}

#[test]
fn index_without_frequencies_degrades_to_presence_only() {
    let store = corpus();
    let (_tmp, index) = build(&store, false);
    assert_eq!(index.scoring(), ScoringMode::PresenceOnly);
    let hits = index.search("fire", 10).expect("search");
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|h| h.score == PRESENCE_SCORE));
    assert!(hits[0].id < hits[1].id, "presence-only ranking follows chunk id order");
}

#[test]
fn presence_only_can_be_forced() {
    let store = corpus();
    let (_tmp, index) = build(&store, true);
    let index = index.with_scoring(ScoringMode::PresenceOnly);
    let hits = index.search("fire oxygen", 10).expect("search");
    assert!(hits.iter().all(|h| h.score == PRESENCE_SCORE));
}

#[test]
fn missing_index_is_a_config_error() {
    let tmp = TempDir::new().expect("tmp");
    let err = LexicalIndex::open(&tmp.path().join("nope")).err().expect("error");
    assert!(rag_core::error::is_fatal(&err));
}
