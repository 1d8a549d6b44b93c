//! rag-embed
//!
//! Embedding providers behind [`rag_core::traits::Embedder`]:
//! - [`BertEmbedder`]: sentence-transformers style BERT (e.g. all-MiniLM-L6-v2)
//!   on candle, masked mean pooling, L2-normalised.
//! - [`HashingEmbedder`]: deterministic bag-of-words hashing, no model files.
//!   Selected with `APP_USE_FAKE_EMBEDDINGS=1` or `embedding.provider = "hashing"`.

pub mod device;
pub mod pool;
pub mod tokenize;

use anyhow::{anyhow, Context, Result};
use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokenizers::Tokenizer;

use rag_core::config::{expand_path, EmbeddingConfig};
use rag_core::traits::Embedder;

pub use pool::masked_mean_l2;

pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
    batch_size: usize,
    pad_id: u32,
}

impl BertEmbedder {
    pub fn load(model_dir: &Path, max_len: usize, batch_size: usize) -> Result<Self> {
        let device = device::select_device();
        tracing::info!(dir = %model_dir.display(), "loading embedding model");
        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let config_path = model_dir.join("config.json");
        let config: BertConfig = serde_json::from_str(
            &std::fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?,
        )?;
        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);
        let name = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| "bert".into());
        let dim = config.hidden_size;
        tracing::info!(model = %name, dim, "embedding model loaded");
        Ok(Self {
            model,
            tokenizer,
            device,
            id: format!("bert:{name}:d{dim}"),
            dim,
            max_len,
            batch_size: batch_size.max(1),
            pad_id,
        })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let batch = tokenize::encode_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let hidden = self.model.forward(&batch.input_ids, &batch.token_type_ids, Some(&batch.attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &batch.attention_mask)?;
        Ok(pooled.to_device(&Device::Cpu)?.to_dtype(DType::F32)?.to_vec2()?)
    }
}

impl Embedder for BertEmbedder {
    fn id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            out.extend(self.embed_chunk(chunk)?);
        }
        Ok(out)
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let weights = candle_core::pickle::read_all(&pickle)?;
        return weights
            .into_iter()
            .map(|(name, t)| Ok((name, t.to_device(device)?)))
            .collect();
    }
    Err(anyhow!("no model.safetensors or pytorch_model.bin in {}", model_dir.display()))
}

/// Deterministic hashing embedder: each whitespace token lands in one bucket.
/// Texts sharing words get nearby vectors, which is enough for tests and offline development.
pub struct HashingEmbedder {
    dim: usize,
    id: String,
}

impl HashingEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim: dim.max(1), id: format!("hashing:xxh64:d{}", dim.max(1)) }
    }

    fn embed_text(&self, text: &str) -> Vec<f32> {
        use std::hash::{Hash, Hasher};
        use twox_hash::XxHash64;
        let mut v = vec![0f32; self.dim];
        for token in text.split(|c: char| !c.is_alphanumeric()).filter(|t| !t.is_empty()) {
            let mut hasher = XxHash64::with_seed(0);
            token.to_lowercase().hash(&mut hasher);
            let h = hasher.finish();
            let idx = usize::try_from(h % self.dim as u64).unwrap_or(0);
            let val = 0.5 + f32::from((h >> 48) as u16) / f32::from(u16::MAX);
            v[idx] += val;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

impl Embedder for HashingEmbedder {
    fn id(&self) -> &str { &self.id }

    fn dim(&self) -> usize { self.dim }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_text(t)).collect())
    }
}

fn use_fake_embeddings() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .is_some_and(|v| v == "1" || v.eq_ignore_ascii_case("true"))
}

/// Provider selected by configuration; the hashing embedder keeps `config.dim`.
pub fn default_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    let hashing = config.provider.eq_ignore_ascii_case("hashing");
    if !hashing && !config.provider.eq_ignore_ascii_case("bert") {
        return Err(rag_core::Error::Config(format!("unknown embedding provider '{}'", config.provider)).into());
    }
    if hashing || use_fake_embeddings() {
        tracing::info!(dim = config.dim, "using hashing embedder");
        return Ok(Arc::new(HashingEmbedder::new(config.dim)));
    }
    let model_dir = resolve_model_dir(&config.model_dir)?;
    let embedder = BertEmbedder::load(&model_dir, config.max_len, config.batch_size)?;
    if embedder.dim() != config.dim {
        return Err(rag_core::Error::DimensionMismatch { expected: config.dim, actual: embedder.dim() }.into());
    }
    Ok(Arc::new(embedder))
}

fn resolve_model_dir(configured: &str) -> Result<PathBuf> {
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = expand_path(&dir);
            if p.exists() {
                tracing::debug!(var, dir = %p.display(), "model dir from environment");
                return Ok(p);
            }
        }
    }
    let p = expand_path(configured);
    if p.exists() {
        return Ok(p);
    }
    Err(rag_core::Error::Config(format!("could not locate embedding model directory '{configured}'")).into())
}
