//! RAG question generation and relevancy evaluation.
//!
//! Builds a labelled set of evaluation questions from a document corpus,
//! answers each one with a retrieval-augmented query engine, and scores
//! every answer for relevancy with an independently configured judge model.
//!
//! # Overview
//!
//! 1. Load every file in the data folder into [`Document`]s
//! 2. Generate questions per chunk, cached to `questions.json`; failed
//!    generation is retried at half the chunk size and context window
//! 3. Build a [`VectorIndex`] and a [`QueryEngine`] over the documents
//! 4. Query, judge, print, and keep evaluations above the threshold in
//!    `evaluations.json`
//!
//! # Quick Start
//!
//! ```no_run
//! use rag_question_eval::{
//!     config::Config,
//!     document::DirectoryReader,
//!     embeddings::build_embedder,
//!     evaluation::{EvaluationRunner, RelevancyEvaluator},
//!     index::VectorIndex,
//!     llm::OllamaClient,
//!     query::QueryEngine,
//!     questions::{QuestionCache, QuestionGenerator},
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load(None)?;
//!     config.validate()?;
//!     let mut settings = config.settings;
//!
//!     let documents = DirectoryReader::new(&config.paths.data_dir).load_data()?;
//!
//!     let llm = Arc::new(OllamaClient::new(config.llm.clone())?);
//!     let generator = QuestionGenerator::new(llm.clone(), config.generation.clone());
//!     let cache = QuestionCache::new(&config.paths.questions_file, config.generation.min_chunk_size);
//!     let Some(questions) = cache.get_or_generate(&mut settings, &documents, &generator).await? else {
//!         anyhow::bail!("question generation failed at every chunk size");
//!     };
//!
//!     let embedder: Arc<dyn rag_question_eval::embeddings::Embedder> =
//!         Arc::from(build_embedder(&config.embedding)?);
//!     let index = VectorIndex::from_documents(
//!         &documents,
//!         &settings.into(),
//!         embedder.as_ref(),
//!         config.embedding.batch_size,
//!     )
//!     .await?;
//!     let engine = QueryEngine::new(
//!         Arc::new(index),
//!         embedder,
//!         llm,
//!         config.evaluation.similarity_top_k,
//!         settings.context_window,
//!     );
//!
//!     let judge = RelevancyEvaluator::new(
//!         Arc::new(OllamaClient::new(config.judge.clone())?),
//!         settings.context_window,
//!     );
//!     let runner = EvaluationRunner::new(
//!         &engine,
//!         &judge,
//!         &config.paths.evaluations_file,
//!         config.evaluation.relevancy_threshold,
//!     );
//!     let summary = runner.run(&questions, &mut std::io::stdout()).await?;
//!     summary.print_summary();
//!
//!     Ok(())
//! }
//! ```
//!
//! # Architecture
//!
//! - **DirectoryReader**: text and PDF ingestion from the data folder
//! - **OllamaClient**: chat and embedding client for a local model server
//! - **QuestionCache**: cached question generation with capacity-reducing retries
//! - **QueryEngine**: top-k retrieval plus answer synthesis
//! - **RelevancyEvaluator**: LLM-as-judge YES/NO relevancy scoring
//! - **EvaluationRunner**: the evaluate-print-persist loop

pub mod chunker;
pub mod config;
pub mod document;
pub mod download;
pub mod embeddings;
pub mod error;
pub mod evaluation;
pub mod index;
pub mod llm;
pub mod persistence;
pub mod query;
pub mod questions;

// Re-export commonly used types
pub use config::{Config, Settings};
pub use document::{DirectoryReader, Document};
pub use error::{EvalError, Result};
pub use evaluation::{EvaluationResult, EvaluationRunner, EvaluationSummary, RelevancyEvaluator};
pub use index::VectorIndex;
pub use llm::{LanguageModel, OllamaClient};
pub use query::{Answerer, QueryEngine, Response};
pub use questions::{LabelledQuestion, QuestionCache, QuestionGenerator, QuestionSet};
