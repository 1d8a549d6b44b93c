//! Durable record of documents and their ordered chunks.
//!
//! The store owns the (document, ordinal) -> [`ChunkId`] assignment. Chunk ids
//! are the lexical index's row ids; the vector index keeps its own row order
//! (see [`VectorRowMap`](crate::VectorRowMap)). Both resolve back here.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use crate::error::Error;
use crate::types::{Chunk, ChunkId, ChunkKey, Document};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct DocumentEntry {
    document: Document,
    chunks: Vec<StoredChunk>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoredChunk {
    id: ChunkId,
    text: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreFile {
    next_id: u64,
    documents: BTreeMap<String, DocumentEntry>,
}

/// In-memory chunk store with JSON persistence.
#[derive(Debug, Default)]
pub struct ChunkStore {
    next_id: u64,
    documents: BTreeMap<String, DocumentEntry>,
    by_id: HashMap<ChunkId, ChunkKey>,
}

impl ChunkStore {
    pub fn new() -> Self {
        Self { next_id: 1, ..Self::default() }
    }

    /// Add a document with its chunk texts in order. Ordinals are 0..texts.len().
    ///
    /// Documents are write-once: adding a path that is already present fails.
    pub fn add_document(&mut self, document: Document, texts: Vec<String>) -> Result<Vec<ChunkKey>> {
        if document.path.is_empty() {
            return Err(Error::Config("document path must not be empty".into()).into());
        }
        if self.documents.contains_key(&document.path) {
            anyhow::bail!("document '{}' is already ingested", document.path);
        }
        let path = document.path.clone();
        let mut keys = Vec::with_capacity(texts.len());
        let mut chunks = Vec::with_capacity(texts.len());
        for (ordinal, text) in texts.into_iter().enumerate() {
            let ordinal = u32::try_from(ordinal).context("too many chunks in one document")?;
            let id = ChunkId(self.next_id);
            self.next_id += 1;
            let key = ChunkKey::new(path.clone(), ordinal);
            self.by_id.insert(id, key.clone());
            keys.push(key);
            chunks.push(StoredChunk { id, text });
        }
        self.documents.insert(path, DocumentEntry { document, chunks });
        Ok(keys)
    }

    pub fn document(&self, path: &str) -> Option<&Document> {
        self.documents.get(path).map(|e| &e.document)
    }

    pub fn documents(&self) -> impl Iterator<Item = &Document> {
        self.documents.values().map(|e| &e.document)
    }

    pub fn chunk(&self, key: &ChunkKey) -> Option<Chunk> {
        let entry = self.documents.get(&key.doc)?;
        let stored = entry.chunks.get(key.ordinal as usize)?;
        Some(Chunk { id: stored.id, key: key.clone(), text: stored.text.clone() })
    }

    pub fn text(&self, key: &ChunkKey) -> Option<&str> {
        let entry = self.documents.get(&key.doc)?;
        entry.chunks.get(key.ordinal as usize).map(|c| c.text.as_str())
    }

    pub fn chunk_by_id(&self, id: ChunkId) -> Option<Chunk> {
        self.by_id.get(&id).and_then(|key| self.chunk(key))
    }

    pub fn key_for_id(&self, id: ChunkId) -> Option<&ChunkKey> {
        self.by_id.get(&id)
    }

    /// All chunks in (document path, ordinal) order.
    pub fn chunks(&self) -> impl Iterator<Item = Chunk> + '_ {
        self.documents.iter().flat_map(|(path, entry)| {
            entry.chunks.iter().enumerate().map(move |(ordinal, c)| Chunk {
                id: c.id,
                // ordinals were range-checked on insert
                key: ChunkKey::new(path.clone(), ordinal as u32),
                text: c.text.clone(),
            })
        })
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    /// Digest of every (doc, ordinal, id, text) in order. Identifies a corpus snapshot.
    pub fn fingerprint(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        for chunk in self.chunks() {
            hasher.update(chunk.key.doc.as_bytes());
            hasher.update(&[0]);
            hasher.update(&chunk.key.ordinal.to_le_bytes());
            hasher.update(&chunk.id.0.to_le_bytes());
            hasher.update(chunk.text.as_bytes());
            hasher.update(&[0]);
        }
        hasher.finalize().to_hex().to_string()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = StoreFile { next_id: self.next_id, documents: self.documents.clone() };
        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(path, json).with_context(|| format!("writing chunk store {}", path.display()))?;
        tracing::debug!(path = %path.display(), chunks = self.len(), "chunk store saved");
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read chunk store {}: {e}", path.display())))?;
        let file: StoreFile = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("malformed chunk store {}: {e}", path.display())))?;
        let mut by_id = HashMap::new();
        for (doc_path, entry) in &file.documents {
            if entry.document.path != *doc_path {
                return Err(Error::Config(format!("chunk store entry '{doc_path}' names document '{}'", entry.document.path)).into());
            }
            for (ordinal, c) in entry.chunks.iter().enumerate() {
                let ordinal = u32::try_from(ordinal).context("too many chunks in one document")?;
                if by_id.insert(c.id, ChunkKey::new(doc_path.clone(), ordinal)).is_some() {
                    return Err(Error::Config(format!("duplicate chunk id {} in {}", c.id.0, path.display())).into());
                }
            }
        }
        let max_id = by_id.keys().map(|id| id.0).max().unwrap_or(0);
        let store = Self { next_id: file.next_id.max(max_id + 1), documents: file.documents, by_id };
        tracing::debug!(path = %path.display(), chunks = store.len(), "chunk store loaded");
        Ok(store)
    }
}
