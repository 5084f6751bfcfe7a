//! In-process BERT embeddings using candle.
//!
//! Defaults suit `BAAI/bge-small-en-v1.5`: CLS pooling, L2-normalised.

use super::Embedder;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use candle_core::{Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig, DTYPE};
use hf_hub::{Repo, RepoType, api::sync::Api};
use std::sync::Arc;
use tokenizers::Tokenizer;

fn embed_err(context: &str, err: impl std::fmt::Display) -> EvalError {
    EvalError::Embedding(format!("{}: {}", context, err))
}

/// How token states are reduced to one vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Pooling {
    /// First (`[CLS]`) token; what bge models are trained for.
    Cls,
    /// Attention-masked mean; sentence-transformers style.
    Mean,
}

struct Inner {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
}

/// BERT embedding model running on the CPU.
pub struct LocalEmbedder {
    inner: Arc<Inner>,
    model_id: String,
    pooling: Pooling,
}

impl LocalEmbedder {
    /// Load a BERT model by Hugging Face repo id.
    pub fn load(model_id: &str) -> Result<Self> {
        let device = Device::Cpu;

        let api = Api::new().map_err(|e| embed_err("Failed to create HF Hub API", e))?;
        let repo = api.repo(Repo::new(model_id.to_string(), RepoType::Model));

        let config_path = repo
            .get("config.json")
            .map_err(|e| embed_err("Failed to get config.json", e))?;
        let tokenizer_path = repo
            .get("tokenizer.json")
            .map_err(|e| embed_err("Failed to get tokenizer.json", e))?;
        let weights_path = repo
            .get("model.safetensors")
            .map_err(|e| embed_err("Failed to get model weights", e))?;

        let config_text = std::fs::read_to_string(&config_path)
            .map_err(|e| EvalError::io(&config_path, e))?;
        let config: BertConfig = serde_json::from_str(&config_text)
            .map_err(|e| embed_err("Failed to parse config", e))?;

        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| embed_err("Failed to load tokenizer", e))?;

        let vb = unsafe {
            VarBuilder::from_mmaped_safetensors(&[weights_path], DTYPE, &device)
                .map_err(|e| embed_err("Failed to load model weights", e))?
        };

        let model = BertModel::load(vb, &config)
            .map_err(|e| embed_err("Failed to load BERT model", e))?;

        let pooling = if model_id.contains("bge") {
            Pooling::Cls
        } else {
            Pooling::Mean
        };

        Ok(Self {
            inner: Arc::new(Inner {
                model,
                tokenizer,
                device,
            }),
            model_id: model_id.to_string(),
            pooling,
        })
    }

    /// Override the pooling strategy.
    pub fn with_pooling(mut self, pooling: Pooling) -> Self {
        self.pooling = pooling;
        self
    }
}

impl Inner {
    fn embed_sync(&self, texts: &[String], pooling: Pooling) -> candle_core::Result<Vec<Vec<f32>>> {
        let encodings = self
            .tokenizer
            .encode_batch(texts.to_vec(), true)
            .map_err(|e| candle_core::Error::Msg(format!("Tokenization failed: {}", e)))?;

        let max_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(0);

        let mut input_ids = Vec::new();
        let mut attention_mask = Vec::new();

        for encoding in &encodings {
            let mut ids = encoding.get_ids().to_vec();
            let mut mask = encoding.get_attention_mask().to_vec();
            ids.resize(max_len, 0);
            mask.resize(max_len, 0);
            input_ids.extend(ids);
            attention_mask.extend(mask);
        }

        let batch_size = texts.len();
        let input_ids = Tensor::from_vec(input_ids, (batch_size, max_len), &self.device)?;
        let attention_mask = Tensor::from_vec(attention_mask, (batch_size, max_len), &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;

        let output = self
            .model
            .forward(&input_ids, &token_type_ids, Some(&attention_mask))?;

        let pooled = match pooling {
            Pooling::Cls => output.narrow(1, 0, 1)?.squeeze(1)?,
            Pooling::Mean => {
                let mask = attention_mask
                    .unsqueeze(2)?
                    .to_dtype(output.dtype())?
                    .broadcast_as(output.shape())?;
                let summed = (output * &mask)?.sum(1)?;
                let counts = mask.sum(1)?.clamp(1e-9, f64::MAX)?;
                (summed / counts)?
            }
        };

        let norms = pooled.sqr()?.sum_keepdim(1)?.sqrt()?;
        let normalized = pooled.broadcast_div(&norms)?;

        normalized.to_vec2::<f32>()
    }
}

#[async_trait]
impl Embedder for LocalEmbedder {
    fn model_name(&self) -> &str {
        &self.model_id
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let inner = Arc::clone(&self.inner);
        let owned: Vec<String> = texts.iter().map(|t| t.to_string()).collect();
        let pooling = self.pooling;

        tokio::task::spawn_blocking(move || inner.embed_sync(&owned, pooling))
            .await
            .map_err(|e| EvalError::Embedding(format!("Embedding task failed: {}", e)))?
            .map_err(|e| EvalError::Embedding(e.to_string()))
    }
}
