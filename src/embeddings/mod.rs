//! Text embeddings for the vector index.
//!
//! Two backends: the model server's `/api/embed` endpoint, and (with the
//! `local-embeddings` feature) an in-process BERT model loaded from the
//! Hugging Face Hub.

#[cfg(feature = "local-embeddings")]
mod local;

#[cfg(feature = "local-embeddings")]
pub use local::LocalEmbedder;

use crate::config::{EmbeddingConfig, EmbeddingProvider, ModelConfig};
use crate::error::{EvalError, Result};
use crate::llm::OllamaClient;
use async_trait::async_trait;

/// Turns text into vectors.
#[async_trait]
pub trait Embedder: Send + Sync {
    fn model_name(&self) -> &str;

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>>;

    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_batch(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| EvalError::Embedding("No embedding returned".to_string()))
    }
}

/// Embeddings served by the model server.
pub struct OllamaEmbedder {
    client: OllamaClient,
}

impl OllamaEmbedder {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = OllamaClient::new(ModelConfig {
            api_base: config.api_base.clone(),
            model: config.model.clone(),
            temperature: 0.0,
            request_timeout_secs: 120,
        })?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    fn model_name(&self) -> &str {
        &self.client.config().model
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        self.client.embed(texts).await
    }
}

/// Build the embedder selected by the configuration.
pub fn build_embedder(config: &EmbeddingConfig) -> Result<Box<dyn Embedder>> {
    match config.provider {
        EmbeddingProvider::Ollama => Ok(Box::new(OllamaEmbedder::new(config)?)),
        #[cfg(feature = "local-embeddings")]
        EmbeddingProvider::Local => Ok(Box::new(LocalEmbedder::load(&config.model)?)),
        #[cfg(not(feature = "local-embeddings"))]
        EmbeddingProvider::Local => Err(EvalError::InvalidConfig(
            "embedding.provider 'local' requires building with --features local-embeddings"
                .to_string(),
        )),
    }
}

/// Compute cosine similarity between two vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }

    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}
