//! Question generation from document nodes.

use super::dataset::{CreatedBy, LabelledQuestion, QuestionSet};
use crate::chunker::{ChunkConfig, Node, split_documents};
use crate::config::{GenerationConfig, Settings};
use crate::document::{Document, estimate_tokens, truncate_to_tokens};
use crate::error::{EvalError, Result};
use crate::llm::{CompletionRequest, LanguageModel, Prompts};
use crate::query::RESPONSE_RESERVE_TOKENS;
use async_trait::async_trait;
use futures::future::{BoxFuture, FutureExt};
use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::{debug, info};

/// Produces a question set from documents under the given settings.
#[async_trait]
pub trait QuestionSource: Send + Sync {
    async fn generate(&self, documents: &[Document], settings: &Settings) -> Result<QuestionSet>;
}

/// Asks a language model for questions about each node of the corpus.
pub struct QuestionGenerator {
    llm: Arc<dyn LanguageModel>,
    config: GenerationConfig,
}

impl QuestionGenerator {
    pub fn new(llm: Arc<dyn LanguageModel>, config: GenerationConfig) -> Self {
        Self { llm, config }
    }

    fn context_budget(&self, settings: &Settings, template: &str, extra: &str) -> usize {
        let overhead = estimate_tokens(template) + estimate_tokens(extra) + RESPONSE_RESERVE_TOKENS;
        settings.context_window.saturating_sub(overhead)
    }

    async fn questions_for_node(
        &self,
        node: &Node,
        settings: &Settings,
    ) -> Result<Vec<LabelledQuestion>> {
        let template = Prompts::question_generation();
        let query = &self.config.question_gen_query;
        let context = truncate_to_tokens(&node.text, self.context_budget(settings, template, query));

        let prompt = Prompts::fill(template, &[("context", context.as_str()), ("query", query.as_str())]);

        let reply = self
            .llm
            .complete(CompletionRequest::new(&prompt).with_context_window(settings.context_window))
            .await?;

        let mut questions: Vec<LabelledQuestion> =
            parse_questions(&reply, self.config.num_questions_per_chunk)
                .into_iter()
                .map(|q| LabelledQuestion::generated(q, node.text.clone(), self.llm.model_name()))
                .collect();

        if self.config.with_reference_answers {
            for question in &mut questions {
                question.reference_answer = self.reference_answer(&question.query, node, settings).await?;
                question.reference_answer_by = Some(CreatedBy::ai(self.llm.model_name()));
            }
        }

        Ok(questions)
    }

    async fn reference_answer(&self, question: &str, node: &Node, settings: &Settings) -> Result<String> {
        let template = Prompts::text_qa();
        let context = truncate_to_tokens(&node.text, self.context_budget(settings, template, question));
        let prompt = Prompts::fill(template, &[("context", context.as_str()), ("question", question)]);

        let answer = self
            .llm
            .complete(CompletionRequest::new(&prompt).with_context_window(settings.context_window))
            .await?;
        Ok(answer.trim().to_string())
    }
}

#[async_trait]
impl QuestionSource for QuestionGenerator {
    /// Split the documents with the current settings and query each node,
    /// keeping at most `workers` requests in flight. Any failed request
    /// fails the whole generation.
    async fn generate(&self, documents: &[Document], settings: &Settings) -> Result<QuestionSet> {
        let nodes = split_documents(documents, &ChunkConfig::from(*settings));
        let total = nodes.len();
        let done = AtomicUsize::new(0);

        info!(
            "Generating questions from {} nodes (chunk size {}, context window {}, {} workers)",
            total, settings.chunk_size, settings.context_window, self.config.workers
        );

        let done = &done;
        let tasks: Vec<BoxFuture<'_, Result<Vec<LabelledQuestion>>>> = nodes
            .iter()
            .map(|node| {
                async move {
                    let questions = self.questions_for_node(node, settings).await?;
                    let finished = done.fetch_add(1, Ordering::Relaxed) + 1;
                    debug!(node = %node.id, questions = questions.len(), "Node {}/{} done", finished, total);
                    Ok::<_, EvalError>(questions)
                }
                .boxed()
            })
            .collect();

        let per_node: Vec<Vec<LabelledQuestion>> = stream::iter(tasks)
            .buffered(self.config.workers.max(1))
            .try_collect()
            .await?;

        let examples: Vec<LabelledQuestion> = per_node.into_iter().flatten().collect();

        if examples.is_empty() {
            return Err(EvalError::Generation(format!(
                "the model produced no questions for {} nodes",
                total
            )));
        }

        info!("Generated {} questions", examples.len());
        Ok(QuestionSet::new(examples))
    }
}

/// Extract up to `limit` questions from a model reply.
///
/// List numbering and bullets are stripped. When some lines are phrased as
/// questions, lines without a question mark (preambles, headings) are dropped.
pub fn parse_questions(reply: &str, limit: usize) -> Vec<String> {
    let lines: Vec<String> = reply
        .lines()
        .map(strip_list_marker)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect();

    let has_questions = lines.iter().any(|l| l.contains('?'));

    lines
        .into_iter()
        .filter(|l| !has_questions || l.contains('?'))
        .take(limit)
        .collect()
}

fn strip_list_marker(line: &str) -> &str {
    let line = line.trim();
    let line = line.trim_start_matches(['-', '*', '•']).trim_start();

    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits > 0 {
        let rest = &line[digits..];
        if let Some(stripped) = rest.strip_prefix(['.', ')', ':']) {
            return stripped.trim();
        }
        if rest.starts_with(char::is_whitespace) {
            return rest.trim();
        }
    }
    line
}
