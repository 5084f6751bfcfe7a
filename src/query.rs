//! Query engine: retrieve the closest nodes, then answer from them.

use crate::document::{estimate_tokens, truncate_to_tokens};
use crate::embeddings::Embedder;
use crate::error::Result;
use crate::index::{Retriever, ScoredNode, VectorIndex};
use crate::llm::{CompletionRequest, LanguageModel, Prompts};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Tokens held back from the context window for the model's answer.
pub const RESPONSE_RESERVE_TOKENS: usize = 256;

/// An answer plus the nodes it was synthesised from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub text: String,
    pub source_nodes: Vec<ScoredNode>,
}

impl Response {
    /// Texts of the source nodes, best match first.
    pub fn contexts(&self) -> Vec<String> {
        self.source_nodes.iter().map(|n| n.node.text.clone()).collect()
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// Anything that can answer a question.
#[async_trait]
pub trait Answerer: Send + Sync {
    async fn query(&self, question: &str) -> Result<Response>;
}

/// Retrieval-augmented query engine over a [`VectorIndex`].
pub struct QueryEngine {
    index: Arc<VectorIndex>,
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    top_k: usize,
    context_window: usize,
}

impl QueryEngine {
    pub fn new(
        index: Arc<VectorIndex>,
        embedder: Arc<dyn Embedder>,
        llm: Arc<dyn LanguageModel>,
        top_k: usize,
        context_window: usize,
    ) -> Self {
        Self {
            index,
            embedder,
            llm,
            top_k,
            context_window,
        }
    }

    /// Build the answer prompt, compacting the context to fit the window.
    fn build_prompt(&self, question: &str, nodes: &[ScoredNode]) -> String {
        let template = Prompts::text_qa();
        let overhead = estimate_tokens(template) + estimate_tokens(question) + RESPONSE_RESERVE_TOKENS;
        let budget = self.context_window.saturating_sub(overhead);

        let joined = nodes
            .iter()
            .map(|n| n.node.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let context = truncate_to_tokens(&joined, budget);

        Prompts::fill(template, &[("context", context.as_str()), ("question", question)])
    }
}

#[async_trait]
impl Answerer for QueryEngine {
    async fn query(&self, question: &str) -> Result<Response> {
        let retriever = Retriever::new(&self.index, self.embedder.as_ref(), self.top_k);
        let source_nodes = retriever.retrieve(question).await?;

        debug!(
            question,
            sources = source_nodes.len(),
            "Retrieved context for query"
        );

        let prompt = self.build_prompt(question, &source_nodes);
        let answer = self
            .llm
            .complete(CompletionRequest::new(&prompt).with_context_window(self.context_window))
            .await?;

        Ok(Response {
            text: answer.trim().to_string(),
            source_nodes,
        })
    }
}
