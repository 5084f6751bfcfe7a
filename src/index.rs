//! In-memory vector index over document nodes.

use crate::chunker::{ChunkConfig, Node, split_documents};
use crate::document::Document;
use crate::embeddings::{Embedder, cosine_similarity};
use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// A vector index entry.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct IndexEntry {
    pub node: Node,
    pub embedding: Vec<f32>,
}

/// Vector search index.
#[derive(Debug, Clone, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct VectorIndex {
    /// Embedding model the vectors came from.
    pub embed_model: String,
    entries: Vec<IndexEntry>,
}

impl VectorIndex {
    /// Chunk and embed documents.
    pub async fn from_documents(
        documents: &[Document],
        config: &ChunkConfig,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self> {
        let nodes = split_documents(documents, config);
        info!(
            "Building vector index over {} nodes from {} documents",
            nodes.len(),
            documents.len()
        );
        Self::from_nodes(nodes, embedder, batch_size).await
    }

    /// Embed pre-split nodes in batches.
    pub async fn from_nodes(
        nodes: Vec<Node>,
        embedder: &dyn Embedder,
        batch_size: usize,
    ) -> Result<Self> {
        let mut entries = Vec::with_capacity(nodes.len());

        for (batch_num, batch) in nodes.chunks(batch_size.max(1)).enumerate() {
            let texts: Vec<&str> = batch.iter().map(|n| n.text.as_str()).collect();
            let embeddings = embedder.embed_batch(&texts).await?;

            if embeddings.len() != batch.len() {
                return Err(EvalError::Embedding(format!(
                    "Embedder returned {} vectors for {} nodes",
                    embeddings.len(),
                    batch.len()
                )));
            }

            debug!(batch = batch_num, size = batch.len(), "Embedded batch");

            for (node, embedding) in batch.iter().zip(embeddings) {
                entries.push(IndexEntry {
                    node: node.clone(),
                    embedding,
                });
            }
        }

        Ok(Self {
            embed_model: embedder.model_name().to_string(),
            entries,
        })
    }

    /// Number of nodes in the index.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if index is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Get all entries.
    pub fn entries(&self) -> &[IndexEntry] {
        &self.entries
    }

    /// Nodes most similar to an already-embedded query, best first.
    pub fn top_k(&self, query_embedding: &[f32], top_k: usize) -> Vec<ScoredNode> {
        let mut results: Vec<ScoredNode> = self
            .entries
            .iter()
            .map(|entry| ScoredNode {
                node: entry.node.clone(),
                score: cosine_similarity(query_embedding, &entry.embedding),
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        results.truncate(top_k);
        results
    }
}

/// A retrieved node with its similarity score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScoredNode {
    pub node: Node,
    /// Cosine similarity to the query.
    pub score: f32,
}

/// Embeds queries and looks them up in an index.
pub struct Retriever<'a> {
    index: &'a VectorIndex,
    embedder: &'a dyn Embedder,
    top_k: usize,
}

impl<'a> Retriever<'a> {
    pub fn new(index: &'a VectorIndex, embedder: &'a dyn Embedder, top_k: usize) -> Self {
        Self {
            index,
            embedder,
            top_k,
        }
    }

    /// Retrieve the `top_k` most similar nodes.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<ScoredNode>> {
        let query_embedding = self.embedder.embed(query).await?;
        Ok(self.index.top_k(&query_embedding, self.top_k))
    }
}
