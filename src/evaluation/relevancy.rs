//! LLM-as-judge relevancy scoring.

use crate::document::{estimate_tokens, truncate_to_tokens};
use crate::error::Result;
use crate::llm::{CompletionRequest, LanguageModel, Prompts};
use crate::query::{RESPONSE_RESERVE_TOKENS, Response};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Outcome of judging one response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationResult {
    pub query: String,
    pub response: String,
    pub contexts: Vec<String>,
    /// 0.0 to 1.0.
    pub score: f64,
    /// The judge's raw reply.
    pub feedback: String,
    pub passing: bool,
}

impl EvaluationResult {
    /// Score as a whole percentage.
    pub fn percent(&self) -> u32 {
        (self.score * 100.0).round() as u32
    }
}

/// Scores a response to a query.
#[async_trait]
pub trait Judge: Send + Sync {
    async fn evaluate_response(&self, query: &str, response: &Response) -> Result<EvaluationResult>;
}

/// Asks a model whether a response is in line with its source context.
///
/// Use a different model instance from the one that produced the response.
pub struct RelevancyEvaluator {
    llm: Arc<dyn LanguageModel>,
    context_window: usize,
}

impl RelevancyEvaluator {
    pub fn new(llm: Arc<dyn LanguageModel>, context_window: usize) -> Self {
        Self {
            llm,
            context_window,
        }
    }

    fn build_prompt(&self, query: &str, response: &str, contexts: &[String]) -> String {
        let template = Prompts::relevancy_eval();
        let query_and_response = format!("Question: {}\nResponse: {}", query, response);

        let overhead = estimate_tokens(template)
            + estimate_tokens(&query_and_response)
            + RESPONSE_RESERVE_TOKENS;
        let context = truncate_to_tokens(
            &contexts.join("\n\n"),
            self.context_window.saturating_sub(overhead),
        );

        Prompts::fill(
            template,
            &[("context", context.as_str()), ("query", query_and_response.as_str())],
        )
    }

    /// Score is 1.0 when the reply says yes, else 0.0.
    fn parse_verdict(reply: &str) -> (f64, bool) {
        let passing = reply.to_lowercase().contains("yes");
        (if passing { 1.0 } else { 0.0 }, passing)
    }
}

#[async_trait]
impl Judge for RelevancyEvaluator {
    async fn evaluate_response(&self, query: &str, response: &Response) -> Result<EvaluationResult> {
        let contexts = response.contexts();
        let prompt = self.build_prompt(query, &response.text, &contexts);

        let reply = self
            .llm
            .complete(CompletionRequest::new(&prompt).with_context_window(self.context_window))
            .await?;

        let (score, passing) = Self::parse_verdict(&reply);

        Ok(EvaluationResult {
            query: query.to_string(),
            response: response.text.clone(),
            contexts,
            score,
            feedback: reply.trim().to_string(),
            passing,
        })
    }
}
