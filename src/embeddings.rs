//! # Embeddings
//!
//! Turns text into unit-length vectors.
//!
//! [`Embedder`] is the seam the rest of the pipeline depends on. The production
//! implementation, [`SentenceEmbedder`], runs the
//! `sentence-transformers/all-MiniLM-L6-v2` BERT model with Candle (pure Rust
//! ML framework) after fetching its weights from the Hugging Face Hub.
//!
//! Batch embedding encodes every text on its own, so a text embedded inside a
//! batch gets exactly the vector it would get from [`Embedder::embed`].

use std::path::Path;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use rayon::prelude::*;
use tokenizers::{Tokenizer, TruncationParams};

use crate::config::EmbeddingSettings;
use crate::error::{RagError, Result};

/// BERT position embeddings stop at 512 tokens.
const MAX_SEQUENCE_TOKENS: usize = 512;

/// Fixed-length embedding, L2-normalized at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddingVector(Vec<f32>);

impl EmbeddingVector {
    /// Scale `values` to unit length. An all-zero input stays all-zero.
    pub fn normalized(mut values: Vec<f32>) -> Self {
        let norm = values.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            values.iter_mut().for_each(|x| *x /= norm);
        }
        Self(values)
    }

    pub fn dimension(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Squared Euclidean distance, `Σ (a[i] - b[i])²`.
    ///
    /// Callers must compare vectors of equal dimension; extra trailing
    /// components of the longer vector are ignored.
    pub fn squared_distance(&self, other: &EmbeddingVector) -> f32 {
        self.0
            .iter()
            .zip(&other.0)
            .map(|(a, b)| (a - b).powi(2))
            .sum()
    }
}

/// Text → vector, backed by a single model instance.
pub trait Embedder {
    fn embed(&self, text: &str) -> Result<EmbeddingVector>;

    /// Embed every text, preserving input order.
    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>> {
        texts.iter().map(|text| self.embed(text)).collect()
    }
}

/// Sentence embeddings model using Candle.
pub struct SentenceEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

impl SentenceEmbedder {
    /// Download (or reuse the cached copy of) the model and load it on the CPU.
    ///
    /// # Errors
    /// [`RagError::ModelUnavailable`] if any file cannot be fetched or parsed.
    pub fn load(settings: &EmbeddingSettings) -> Result<Self> {
        let device = Device::Cpu;

        tracing::info!(
            "Loading embedding model {}@{}",
            settings.model_id,
            settings.revision
        );

        let repo = Repo::with_revision(
            settings.model_id.clone(),
            RepoType::Model,
            settings.revision.clone(),
        );
        let api = Api::new().map_err(unavailable)?;
        let api_repo = api.repo(repo);

        let config_filename = api_repo.get("config.json").map_err(unavailable)?;
        let tokenizer_filename = api_repo.get("tokenizer.json").map_err(unavailable)?;
        let weights_filename = api_repo
            .get("model.safetensors")
            .map_err(unavailable)?;

        let config = read_model_config(&config_filename)?;

        let mut tokenizer = Tokenizer::from_file(tokenizer_filename).map_err(unavailable)?;
        tokenizer
            .with_truncation(Some(TruncationParams {
                max_length: MAX_SEQUENCE_TOKENS,
                ..Default::default()
            }))
            .map_err(unavailable)?;
        tokenizer.with_padding(None);

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_filename], DTYPE, &device)
                .map_err(unavailable)?
        };
        let model = BertModel::load(vb, &config).map_err(unavailable)?;

        tracing::debug!("Embedding model loaded");

        Ok(Self {
            model,
            tokenizer,
            device,
        })
    }

    fn encode(&self, text: &str) -> candle_core::Result<Vec<f32>> {
        let tokens = self
            .tokenizer
            .encode(text, true)
            .map_err(candle_core::Error::msg)?;

        let token_ids = Tensor::new(tokens.get_ids(), &self.device)?.unsqueeze(0)?;
        let token_type_ids = Tensor::new(tokens.get_type_ids(), &self.device)?.unsqueeze(0)?;

        let output = self.model.forward(&token_ids, &token_type_ids, None)?;
        let pooled = self.mean_pooling(&output, tokens.get_attention_mask())?;

        pooled.to_vec1::<f32>()
    }

    /// Mean over token embeddings, weighted by the attention mask.
    ///
    /// `embeddings` is `[1, seq_len, hidden]`; the result is `[hidden]`.
    fn mean_pooling(
        &self,
        embeddings: &Tensor,
        attention_mask: &[u32],
    ) -> candle_core::Result<Tensor> {
        let mask = Tensor::new(attention_mask, &self.device)?
            .to_dtype(DType::F32)?
            .unsqueeze(0)?
            .unsqueeze(2)?; // [1, seq_len, 1]

        let sum = embeddings.broadcast_mul(&mask)?.sum(1)?;
        let count = mask.sum(1)?.clamp(1f32, f32::INFINITY)?;

        sum.broadcast_div(&count)?.squeeze(0)
    }
}

fn unavailable(e: impl std::fmt::Display) -> RagError {
    RagError::ModelUnavailable(e.to_string())
}

/// Parse the model's `config.json`.
fn read_model_config(path: &Path) -> Result<Config> {
    let config = std::fs::read_to_string(path).map_err(unavailable)?;
    serde_json::from_str(&config).map_err(unavailable)
}

impl Embedder for SentenceEmbedder {
    fn embed(&self, text: &str) -> Result<EmbeddingVector> {
        self.encode(text)
            .map(EmbeddingVector::normalized)
            .map_err(|e| RagError::EmbeddingFailed(e.to_string()))
    }

    fn embed_batch(&self, texts: &[&str]) -> Result<Vec<EmbeddingVector>> {
        // collect() on an indexed parallel iterator keeps input order
        texts.par_iter().map(|text| self.embed(text)).collect()
    }
}
