//! Bidirectional mapping between back-end-local addresses and [`ChunkKey`].
//!
//! The lexical index addresses chunks by [`ChunkId`], the vector index by
//! [`VectorRow`]. Neither is assumed equal to the other; everything is resolved
//! to the shared (document, ordinal) key here before fusion.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::Path;

use crate::error::Error;
use crate::store::ChunkStore;
use crate::types::{ChunkId, ChunkKey, VectorRow};

/// Vector row order: row `i` holds the embedding of `keys[i]`.
///
/// Persisted as a JSON array of `[doc, ordinal]` pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorRowMap {
    keys: Vec<ChunkKey>,
}

impl VectorRowMap {
    pub fn new(keys: Vec<ChunkKey>) -> Self {
        Self { keys }
    }

    pub fn from_store(store: &ChunkStore) -> Self {
        Self { keys: store.chunks().map(|c| c.key).collect() }
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn get(&self, row: VectorRow) -> Option<&ChunkKey> {
        self.keys.get(row.0 as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = (VectorRow, &ChunkKey)> {
        // row count is bounded by u32 on build
        self.keys.iter().enumerate().map(|(i, k)| (VectorRow(i as u32), k))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let pairs: Vec<(&str, u32)> = self.keys.iter().map(|k| (k.doc.as_str(), k.ordinal)).collect();
        std::fs::write(path, serde_json::to_string(&pairs)?)
            .with_context(|| format!("writing vector row map {}", path.display()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read vector row map {}: {e}", path.display())))?;
        let pairs: Vec<(String, u32)> = serde_json::from_str(&raw)
            .map_err(|e| Error::Config(format!("malformed vector row map {}: {e}", path.display())))?;
        Ok(Self { keys: pairs.into_iter().map(|(doc, ordinal)| ChunkKey { doc, ordinal }).collect() })
    }
}

/// Read-only identity table built once at load time.
#[derive(Debug, Clone, Default)]
pub struct IdentityMap {
    lexical: HashMap<ChunkId, ChunkKey>,
    lexical_rev: HashMap<ChunkKey, ChunkId>,
    vector: VectorRowMap,
    vector_rev: HashMap<ChunkKey, VectorRow>,
}

impl IdentityMap {
    /// Build from the store (lexical ids) and the vector row order.
    ///
    /// Vector rows naming chunks the store does not know never resolve; the
    /// searcher drops them with a warning.
    pub fn new(store: &ChunkStore, vector: VectorRowMap) -> Self {
        let mut lexical = HashMap::with_capacity(store.len());
        let mut lexical_rev = HashMap::with_capacity(store.len());
        for chunk in store.chunks() {
            lexical.insert(chunk.id, chunk.key.clone());
            lexical_rev.insert(chunk.key, chunk.id);
        }
        let mut vector_rev = HashMap::with_capacity(vector.len());
        let mut orphaned = 0usize;
        for (row, key) in vector.iter() {
            if lexical_rev.contains_key(key) {
                vector_rev.entry(key.clone()).or_insert(row);
            } else {
                orphaned += 1;
            }
        }
        if orphaned > 0 {
            tracing::warn!(orphaned, "vector row map names chunks missing from the chunk store");
        }
        Self { lexical, lexical_rev, vector, vector_rev }
    }

    pub fn resolve_lexical(&self, id: ChunkId) -> Option<&ChunkKey> {
        self.lexical.get(&id)
    }

    pub fn resolve_vector(&self, row: VectorRow) -> Option<&ChunkKey> {
        self.vector.get(row).filter(|key| self.lexical_rev.contains_key(*key))
    }

    pub fn lexical_id(&self, key: &ChunkKey) -> Option<ChunkId> {
        self.lexical_rev.get(key).copied()
    }

    pub fn vector_row(&self, key: &ChunkKey) -> Option<VectorRow> {
        self.vector_rev.get(key).copied()
    }

    pub fn vector_rows(&self) -> usize {
        self.vector.len()
    }

    pub fn lexical_rows(&self) -> usize {
        self.lexical.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Document;

    fn store() -> ChunkStore {
        let mut s = ChunkStore::new();
        s.add_document(Document::new("b.txt"), vec!["b0".into(), "b1".into()]).unwrap();
        s.add_document(Document::new("a.txt"), vec!["a0".into()]).unwrap();
        s
    }

    #[test]
    fn both_address_spaces_resolve_to_the_same_key() {
        let s = store();
        // ids follow insertion order (b first), rows follow (doc, ordinal) order (a first)
        let map = IdentityMap::new(&s, VectorRowMap::from_store(&s));
        let key = ChunkKey::new("a.txt", 0);
        assert_eq!(map.resolve_vector(VectorRow(0)), Some(&key));
        assert_eq!(map.resolve_lexical(ChunkId(3)), Some(&key));
        assert_eq!(map.lexical_id(&key), Some(ChunkId(3)));
        assert_eq!(map.vector_row(&key), Some(VectorRow(0)));
    }

    #[test]
    fn stale_rows_do_not_resolve() {
        let s = store();
        let map = IdentityMap::new(&s, VectorRowMap::new(vec![ChunkKey::new("a.txt", 0)]));
        assert!(map.resolve_vector(VectorRow(5)).is_none());
        assert!(map.resolve_lexical(ChunkId(42)).is_none());
    }

    #[test]
    fn rows_naming_unknown_chunks_do_not_resolve() {
        let s = store();
        let gone = ChunkKey::new("deleted.txt", 0);
        let map = IdentityMap::new(&s, VectorRowMap::new(vec![gone.clone(), ChunkKey::new("a.txt", 0)]));
        assert!(map.resolve_vector(VectorRow(0)).is_none());
        assert!(map.vector_row(&gone).is_none());
        assert_eq!(map.resolve_vector(VectorRow(1)), Some(&ChunkKey::new("a.txt", 0)));
    }

    #[test]
    fn row_map_persists_as_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        let rows = VectorRowMap::new(vec![ChunkKey::new("x.txt", 2), ChunkKey::new("y.txt", 0)]);
        rows.save(&path).unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), r#"[["x.txt",2],["y.txt",0]]"#);
        assert_eq!(VectorRowMap::load(&path).unwrap(), rows);
    }

    #[test]
    fn missing_row_map_is_a_config_error() {
        let err = VectorRowMap::load(Path::new("/definitely/not/here.json")).unwrap_err();
        assert!(crate::error::is_fatal(&err));
    }
}
