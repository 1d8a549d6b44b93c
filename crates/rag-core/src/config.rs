//! Configuration loader and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys separated by `__`, e.g. `APP_RETRIEVAL__WEIGHT=0.7`). Every
//! field has a default, so a missing config file still yields usable settings.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::Error;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub paths: PathsConfig,
    pub retrieval: RetrievalConfig,
    pub embedding: EmbeddingConfig,
    pub vector: VectorConfig,
    pub chunking: ChunkingSettings,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// Base directory for every relative path below.
    pub data_dir: String,
    pub raw_txt_dir: String,
    pub chunk_store: String,
    pub lexical_index_dir: String,
    pub vector_db_dir: String,
    pub vector_row_map: String,
    pub ground_truth: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FusionKind {
    Weighted,
    Rrf,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_k: usize,
    pub max_k: usize,
    /// Semantic weight for weighted linear fusion.
    pub weight: f32,
    /// Each back-end is queried for `k * overfetch` candidates.
    pub overfetch: usize,
    pub fusion: FusionKind,
    pub rrf_c: f32,
    pub timeout_ms: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// `bert` or `hashing`.
    pub provider: String,
    pub model_dir: String,
    pub dim: usize,
    pub max_len: usize,
    pub batch_size: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VectorConfig {
    pub table: String,
    /// Bypass any ANN index and scan exactly.
    pub exact: bool,
    pub nprobes: usize,
    /// Build an IVF-PQ index at ingest once the table holds this many rows.
    pub ann_min_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingSettings {
    pub max_words: usize,
    pub overlap: usize,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: "./rag_data".to_string(),
            raw_txt_dir: "txt".to_string(),
            chunk_store: "chunk_store.json".to_string(),
            lexical_index_dir: "indexes/tantivy".to_string(),
            vector_db_dir: "indexes/lancedb".to_string(),
            vector_row_map: "id_mapping.json".to_string(),
            ground_truth: "ground_truth.json".to_string(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { default_k: 5, max_k: 100, weight: 0.5, overfetch: 2, fusion: FusionKind::Weighted, rrf_c: 60.0, timeout_ms: 10_000 }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self { provider: "bert".to_string(), model_dir: "models/all-MiniLM-L6-v2".to_string(), dim: 384, max_len: 256, batch_size: 32 }
    }
}

impl Default for VectorConfig {
    fn default() -> Self {
        Self { table: "chunks".to_string(), exact: true, nprobes: 20, ann_min_rows: 4096 }
    }
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        let c = crate::chunker::ChunkingConfig::default();
        Self { max_words: c.max_words, overlap: c.overlap }
    }
}

impl Settings {
    /// Load using `RUST_ENV` (default `dev`) to pick the overlay file.
    pub fn load() -> anyhow::Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        Self::from_figment(Self::figment(&env_name))
    }

    pub fn figment(env_name: &str) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Settings::default())).merge(Toml::file("config.toml"));
        match env_name {
            "dev" | "development" => figment = figment.merge(Toml::file("config.dev.toml")),
            "prod" | "production" => figment = figment.merge(Toml::file("config.prod.toml")),
            "test" | "testing" => figment = figment.merge(Toml::file("config.test.toml")),
            _ => {}
        }
        figment.merge(Env::prefixed("APP_").split("__"))
    }

    pub fn from_figment(figment: Figment) -> anyhow::Result<Self> {
        let settings: Settings = figment
            .extract()
            .map_err(|e| Error::Config(format!("cannot extract settings: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        let r = &self.retrieval;
        if !(0.0..=1.0).contains(&r.weight) {
            return Err(Error::Config(format!("retrieval.weight must lie in [0,1], got {}", r.weight)).into());
        }
        if r.overfetch == 0 {
            return Err(Error::Config("retrieval.overfetch must be at least 1".into()).into());
        }
        if r.default_k == 0 || r.max_k < r.default_k {
            return Err(Error::Config(format!("retrieval.default_k must be in 1..=max_k ({})", r.max_k)).into());
        }
        if r.rrf_c.is_nan() || r.rrf_c <= 0.0 {
            return Err(Error::Config(format!("retrieval.rrf_c must be positive, got {}", r.rrf_c)).into());
        }
        if self.embedding.dim == 0 {
            return Err(Error::Config("embedding.dim must be positive".into()).into());
        }
        if self.chunking.overlap >= self.chunking.max_words {
            return Err(Error::Config("chunking.overlap must be smaller than chunking.max_words".into()).into());
        }
        Ok(())
    }

    /// Resolve one of the `paths.*` entries against `paths.data_dir`.
    pub fn path(&self, relative: &str) -> PathBuf {
        let base = expand_path(&self.paths.data_dir);
        resolve_with_base(&base, relative)
    }

    pub fn chunk_store_path(&self) -> PathBuf {
        self.path(&self.paths.chunk_store)
    }

    pub fn lexical_index_dir(&self) -> PathBuf {
        self.path(&self.paths.lexical_index_dir)
    }

    pub fn vector_db_dir(&self) -> PathBuf {
        self.path(&self.paths.vector_db_dir)
    }

    pub fn vector_row_map_path(&self) -> PathBuf {
        self.path(&self.paths.vector_row_map)
    }

    pub fn ground_truth_path(&self) -> PathBuf {
        self.path(&self.paths.ground_truth)
    }

    pub fn raw_txt_dir(&self) -> PathBuf {
        self.path(&self.paths.raw_txt_dir)
    }
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}
