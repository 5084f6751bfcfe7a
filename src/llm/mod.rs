//! Language model integration.
//!
//! Provides the [`LanguageModel`] seam, an Ollama client implementing it,
//! and the prompts used for question generation, answering and judging.

mod client;
mod prompts;

pub use client::{ChatReply, Message, OllamaClient, Role};
pub use prompts::Prompts;

use crate::error::Result;
use async_trait::async_trait;

/// A single-turn completion request.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRequest<'a> {
    pub prompt: &'a str,
    /// Context window to request from the model, in tokens.
    pub context_window: Option<usize>,
}

impl<'a> CompletionRequest<'a> {
    pub fn new(prompt: &'a str) -> Self {
        Self {
            prompt,
            context_window: None,
        }
    }

    pub fn with_context_window(mut self, tokens: usize) -> Self {
        self.context_window = Some(tokens);
        self
    }
}

/// Something that turns a prompt into text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// Name recorded alongside generated questions.
    fn model_name(&self) -> &str;

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String>;
}
