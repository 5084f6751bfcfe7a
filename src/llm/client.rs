//! Client for a locally running Ollama server.
//!
//! Uses the native `/api/chat` and `/api/embed` endpoints so that the
//! context window can be passed per request as `num_ctx`.

use super::{CompletionRequest, LanguageModel};
use crate::config::ModelConfig;
use crate::error::{EvalError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Message role in a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// A message in the conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<Message>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_ctx: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ResponseMessage,
    #[serde(default)]
    done_reason: Option<String>,
    #[serde(default)]
    prompt_eval_count: Option<u32>,
    #[serde(default)]
    eval_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: String,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [&'a str],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

/// Ollama error body.
#[derive(Debug, Deserialize)]
struct ApiError {
    error: String,
}

/// Response from a chat call including metadata.
#[derive(Debug)]
pub struct ChatReply {
    /// The generated content.
    pub content: String,
    /// Reason the model stopped generating.
    pub done_reason: Option<String>,
    /// Tokens consumed by the prompt.
    pub prompt_tokens: Option<u32>,
    /// Tokens generated.
    pub completion_tokens: Option<u32>,
}

/// Ollama client bound to one model.
#[derive(Clone)]
pub struct OllamaClient {
    client: Client,
    config: ModelConfig,
}

impl OllamaClient {
    /// Create a new client; requests time out after the configured seconds.
    pub fn new(config: ModelConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;
        Ok(Self { client, config })
    }

    /// The configuration this client was built with.
    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        let base = self.config.api_base.trim_end_matches('/');
        format!("{}{}", base, path)
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<String> {
        let response = self.client.post(self.url(path)).json(body).send().await?;

        let status = response.status();
        let text = response.text().await?;

        if !status.is_success() {
            if let Ok(api_error) = serde_json::from_str::<ApiError>(&text) {
                return Err(EvalError::LlmApi(format!(
                    "API error ({}): {}",
                    status, api_error.error
                )));
            }
            return Err(EvalError::LlmApi(format!(
                "Request failed ({}): {}",
                status, text
            )));
        }

        Ok(text)
    }

    /// Send a non-streaming chat request.
    pub async fn chat(&self, messages: Vec<Message>, num_ctx: Option<usize>) -> Result<ChatReply> {
        let request = ChatRequest {
            model: &self.config.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.config.temperature,
                num_ctx,
            },
        };

        let body = self.post("/api/chat", &request).await?;
        let reply: ChatResponse = serde_json::from_str(&body)?;

        debug!(
            model = %self.config.model,
            prompt_tokens = ?reply.prompt_eval_count,
            completion_tokens = ?reply.eval_count,
            "Chat completed"
        );

        Ok(ChatReply {
            content: reply.message.content,
            done_reason: reply.done_reason,
            prompt_tokens: reply.prompt_eval_count,
            completion_tokens: reply.eval_count,
        })
    }

    /// Embed a batch of texts with this client's model.
    pub async fn embed(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbedRequest {
            model: &self.config.model,
            input: texts,
        };

        let body = self.post("/api/embed", &request).await?;
        let reply: EmbedResponse = serde_json::from_str(&body)?;

        if reply.embeddings.len() != texts.len() {
            return Err(EvalError::Embedding(format!(
                "Requested {} embeddings, received {}",
                texts.len(),
                reply.embeddings.len()
            )));
        }

        Ok(reply.embeddings)
    }

    /// Test connectivity to the model server.
    pub async fn test_connection(&self) -> Result<()> {
        let messages = vec![Message::user("Say 'hello' and nothing else.")];

        let reply = self.chat(messages, None).await?;

        if reply.content.to_lowercase().contains("hello") {
            Ok(())
        } else {
            Err(EvalError::LlmApi(format!(
                "Unexpected response: {}",
                reply.content
            )))
        }
    }
}

#[async_trait]
impl LanguageModel for OllamaClient {
    fn model_name(&self) -> &str {
        &self.config.model
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String> {
        let messages = vec![Message::user(request.prompt)];

        let reply = self.chat(messages, request.context_window).await?;
        Ok(reply.content)
    }
}
