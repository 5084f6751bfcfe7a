//! End-to-end runs of the question/evaluate pipeline against stub models.

use async_trait::async_trait;
use rag_question_eval::{
    EvalError, Result,
    config::{GenerationConfig, Settings},
    document::DirectoryReader,
    embeddings::Embedder,
    evaluation::{EvaluationResult, EvaluationRunner, RelevancyEvaluator},
    index::VectorIndex,
    llm::{CompletionRequest, LanguageModel},
    query::QueryEngine,
    questions::{QuestionCache, QuestionGenerator, QuestionSet},
};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Answers each prompt kind with a canned reply.
#[derive(Default)]
struct CannedModel {
    generation_calls: AtomicUsize,
}

#[async_trait]
impl LanguageModel for CannedModel {
    fn model_name(&self) -> &str {
        "canned"
    }

    async fn complete(&self, request: CompletionRequest<'_>) -> Result<String> {
        let prompt = request.prompt;
        if prompt.contains("generate only questions") {
            self.generation_calls.fetch_add(1, Ordering::SeqCst);
            Ok("Here are two questions:\n1. What must a driver do at a stop sign?\n2. When should a driver yield?".to_string())
        } else if prompt.contains("answer the query") {
            Ok("Come to a complete stop.".to_string())
        } else {
            Ok("YES".to_string())
        }
    }
}

/// Counts driving keywords.
struct KeywordEmbedder;

#[async_trait]
impl Embedder for KeywordEmbedder {
    fn model_name(&self) -> &str {
        "keywords"
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| {
                let t = t.to_lowercase();
                ["stop", "yield", "speed"]
                    .iter()
                    .map(|k| t.matches(k).count() as f32 + 0.01)
                    .collect()
            })
            .collect())
    }
}

fn write_corpus(dir: &Path) {
    fs::write(
        dir.join("stop.txt"),
        "At a stop sign you must stop completely before the line. Look both ways.",
    )
    .unwrap();
    fs::write(
        dir.join("yield.txt"),
        "Yield to pedestrians in crosswalks. Yield to traffic already in the roundabout.",
    )
    .unwrap();
}

fn settings() -> Settings {
    Settings {
        chunk_size: 1024,
        chunk_overlap: 20,
        context_window: 3900,
    }
}

async fn run_pipeline(
    data: &Path,
    out_dir: &Path,
    model: Arc<CannedModel>,
) -> Result<(QuestionSet, Vec<u8>)> {
    let documents = DirectoryReader::new(data).load_data()?;
    let mut settings = settings();

    let generator = QuestionGenerator::new(model.clone(), GenerationConfig::default());
    let cache = QuestionCache::new(out_dir.join("questions.json"), 128);
    let questions = cache
        .get_or_generate(&mut settings, &documents, &generator)
        .await?
        .ok_or_else(|| EvalError::Generation("no questions".to_string()))?;

    let embedder: Arc<dyn Embedder> = Arc::new(KeywordEmbedder);
    let index =
        VectorIndex::from_documents(&documents, &settings.into(), embedder.as_ref(), 8).await?;
    let engine = QueryEngine::new(
        Arc::new(index),
        embedder,
        model.clone(),
        2,
        settings.context_window,
    );
    let judge = RelevancyEvaluator::new(model, settings.context_window);

    let runner = EvaluationRunner::new(&engine, &judge, out_dir.join("evaluations.json"), 0.6);
    let mut out = Vec::new();
    runner.run(&questions, &mut out).await?;

    Ok((questions, out))
}

#[tokio::test]
async fn test_full_pipeline_persists_passing_evaluations() {
    let data = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    write_corpus(data.path());
    let model = Arc::new(CannedModel::default());

    let (questions, out) = run_pipeline(data.path(), out_dir.path(), model.clone())
        .await
        .unwrap();

    // Two documents, one node each, two questions per node.
    assert_eq!(questions.len(), 4);
    assert_eq!(model.generation_calls.load(Ordering::SeqCst), 2);

    let printed = String::from_utf8(out).unwrap();
    assert_eq!(printed.matches("Evaluation Result: 100/100").count(), 4);
    assert!(printed.starts_with(
        "Question: What must a driver do at a stop sign?\nResponse: Come to a complete stop.\n"
    ));

    let saved: Vec<EvaluationResult> = serde_json::from_str(
        &fs::read_to_string(out_dir.path().join("evaluations.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(saved.len(), 4);
    assert!(saved.iter().all(|e| e.passing && !e.contexts.is_empty()));
}

#[tokio::test]
async fn test_second_run_reuses_cached_questions() {
    let data = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    write_corpus(data.path());
    let model = Arc::new(CannedModel::default());

    let (first, _) = run_pipeline(data.path(), out_dir.path(), model.clone())
        .await
        .unwrap();
    let (second, _) = run_pipeline(data.path(), out_dir.path(), model.clone())
        .await
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(model.generation_calls.load(Ordering::SeqCst), 2);

    // Evaluations accumulate across runs.
    let saved: Vec<EvaluationResult> = serde_json::from_str(
        &fs::read_to_string(out_dir.path().join("evaluations.json")).unwrap(),
    )
    .unwrap();
    assert_eq!(saved.len(), 8);
}

#[tokio::test]
async fn test_empty_evaluations_file_is_an_error() {
    let data = TempDir::new().unwrap();
    let out_dir = TempDir::new().unwrap();
    write_corpus(data.path());
    fs::write(out_dir.path().join("evaluations.json"), "").unwrap();

    let result = run_pipeline(data.path(), out_dir.path(), Arc::new(CannedModel::default())).await;

    assert!(matches!(result, Err(EvalError::Serialization(_))));
    assert_eq!(
        fs::read_to_string(out_dir.path().join("evaluations.json")).unwrap(),
        ""
    );
}

#[tokio::test]
async fn test_missing_corpus_is_an_error() {
    let out_dir = TempDir::new().unwrap();
    let result = run_pipeline(
        &out_dir.path().join("no-such-dir"),
        out_dir.path(),
        Arc::new(CannedModel::default()),
    )
    .await;

    assert!(matches!(result, Err(EvalError::CorpusNotFound(_))));
}
