//! docrag-embed
//!
//! Embedding providers for the pipeline. [`BertEmbedder`] runs a BERT-family
//! sentence encoder (all-MiniLM-L6-v2 by default) with candle: tokenize,
//! forward, masked mean pooling, L2 normalization. [`FakeEmbedder`] hashes
//! tokens into a vector of the configured size; it is deterministic and needs
//! no model files.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{Tokenizer, TruncationParams};
use tracing::{debug, info, warn};
use twox_hash::XxHash64;

use docrag_core::config::EmbeddingConfig;
use docrag_core::traits::Embedder;

mod device;
mod pool;
mod tokenize;

pub use device::select_device;
pub use pool::masked_mean_l2;
pub use tokenize::tokenize_on_device;

pub struct BertEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
}

impl BertEmbedder {
    /// Load `config.json`, `tokenizer.json` and `model.safetensors` (or
    /// `pytorch_model.bin`) from `model_dir`.
    pub fn load(model_dir: &Path, model_id: &str, max_len: usize) -> Result<Self> {
        let device = select_device();
        info!(model = model_id, dir = %model_dir.display(), "loading sentence encoder");

        let tokenizer_path = model_dir.join("tokenizer.json");
        let mut tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        tokenizer
            .with_truncation(Some(TruncationParams { max_length: max_len, ..Default::default() }))
            .map_err(|e| anyhow!("Failed to configure truncation: {}", e))?;
        tokenizer.with_padding(None);

        let config_path = model_dir.join("config.json");
        let raw = fs::read_to_string(&config_path).with_context(|| format!("reading {}", config_path.display()))?;
        let config: BertConfig = serde_json::from_str(&raw).with_context(|| format!("parsing {}", config_path.display()))?;

        let weights = load_weights(model_dir, &device)?;
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;
        let dim = config.hidden_size;
        let name = model_id.rsplit('/').next().unwrap_or(model_id);
        info!(dim, "sentence encoder ready");
        Ok(Self { model, tokenizer, device, id: format!("bert:{name}:d{dim}"), dim, max_len })
    }

    fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let (input_ids, attention_mask) = tokenize_on_device(&self.tokenizer, text, self.max_len, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let vector = pooled.to_device(&Device::Cpu)?.squeeze(0)?.to_vec1::<f32>()?;
        if vector.len() != self.dim {
            bail!("encoder produced {} dims, expected {}", vector.len(), self.dim);
        }
        debug!(elapsed_ms = start.elapsed().as_millis() as u64, "embedded text");
        Ok(vector)
    }
}

impl Embedder for BertEmbedder {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        texts.iter().map(|t| self.embed_one(t)).collect()
    }
}

fn load_weights(model_dir: &Path, device: &Device) -> Result<HashMap<String, Tensor>> {
    let safetensors = model_dir.join("model.safetensors");
    if safetensors.exists() {
        return Ok(candle_core::safetensors::load(&safetensors, device)?);
    }
    let pickle = model_dir.join("pytorch_model.bin");
    if pickle.exists() {
        let tensors = candle_core::pickle::read_all(&pickle)?;
        return tensors
            .into_iter()
            .map(|(name, t)| Ok((name, t.to_device(device)?)))
            .collect();
    }
    bail!("no model.safetensors or pytorch_model.bin under {}", model_dir.display())
}

/// Token-hashing embedder: every normalized token adds weight to one bucket.
/// Texts sharing words get high cosine similarity.
pub struct FakeEmbedder {
    dim: usize,
    id: String,
}

impl FakeEmbedder {
    pub fn new(dim: usize) -> Self {
        Self { dim, id: format!("fake:xxhash:d{dim}") }
    }

    fn embed_one(&self, text: &str) -> Vec<f32> {
        let mut v = vec![0f32; self.dim];
        for (i, token) in text.split_whitespace().filter_map(normalize_token).enumerate() {
            let mut hasher = XxHash64::with_seed(0);
            token.hash(&mut hasher);
            let h = hasher.finish();
            let idx = (h % self.dim as u64) as usize;
            let val = ((h >> 32) as u32) as f32 / u32::MAX as f32;
            v[idx] += 0.5 + val + (i % 3) as f32 * 0.01;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt().max(1e-6);
        for x in &mut v {
            *x /= norm;
        }
        v
    }
}

fn normalize_token(raw: &str) -> Option<String> {
    let token: String = raw.chars().filter(|c| c.is_alphanumeric()).flat_map(char::to_lowercase).collect();
    (!token.is_empty()).then_some(token)
}

impl Embedder for FakeEmbedder {
    fn model_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { usize::MAX }
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        Ok(texts.iter().map(|t| self.embed_one(t)).collect())
    }
}

fn fake_requested_by_env() -> bool {
    std::env::var("APP_USE_FAKE_EMBEDDINGS")
        .ok()
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

/// Build the configured embedder.
///
/// `APP_USE_FAKE_EMBEDDINGS=1` forces the fake embedder regardless of config.
/// A model whose output size differs from `embedding.dim` is rejected.
pub fn load_embedder(cfg: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    if cfg.fake || fake_requested_by_env() {
        info!(dim = cfg.dim, "using FakeEmbedder");
        return Ok(Arc::new(FakeEmbedder::new(cfg.dim)));
    }
    let dir = resolve_model_dir(cfg)?;
    let embedder = BertEmbedder::load(&dir, &cfg.model_id, cfg.max_len)?;
    if embedder.dim() != cfg.dim {
        bail!("model {} produces {} dims but embedding.dim is {}", cfg.model_id, embedder.dim(), cfg.dim);
    }
    Ok(Arc::new(embedder))
}

fn resolve_model_dir(cfg: &EmbeddingConfig) -> Result<PathBuf> {
    if let Some(dir) = &cfg.model_dir {
        if dir.exists() { return Ok(dir.clone()); }
        warn!(dir = %dir.display(), "configured model_dir does not exist, trying fallbacks");
    }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) {
            let p = PathBuf::from(&dir);
            if p.exists() { info!(var, dir = %p.display(), "using model dir from environment"); return Ok(p); }
        }
    }
    let name = cfg.model_id.rsplit('/').next().unwrap_or(&cfg.model_id);
    for candidate in [Path::new("models").join(name), Path::new("../models").join(name)] {
        if candidate.exists() { return Ok(candidate); }
    }
    Err(anyhow!("Could not locate model directory for {}", cfg.model_id))
}
