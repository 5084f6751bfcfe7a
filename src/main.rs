//! Question generation and relevancy evaluation CLI
//!
//! Generates evaluation questions from a document folder and scores a
//! retrieval-augmented query engine's answers with a judge model.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rag_question_eval::{
    config::{Config, Settings},
    document::{DirectoryReader, Document},
    download::download_source,
    embeddings::{Embedder, build_embedder},
    evaluation::{EvaluationRunner, RelevancyEvaluator},
    index::VectorIndex,
    llm::{LanguageModel, OllamaClient},
    persistence::{file_exists, file_size, load_index, save_index},
    query::{Answerer, QueryEngine},
    questions::{QuestionCache, QuestionGenerator, QuestionSet},
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

const METADATA_TOO_LARGE: &str = "Sorry, but your metadata is too large for your current system. Please decrease the amount of data to read, or upgrade your system.";

/// Generate evaluation questions from documents and score a RAG pipeline's answers
#[derive(Parser)]
#[command(name = "question-eval")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download the source document into the data folder
    Download {
        /// URL to fetch instead of the configured source
        #[arg(long)]
        url: Option<String>,

        /// Re-download even if the file already exists
        #[arg(short, long)]
        force: bool,
    },

    /// Generate (or load cached) evaluation questions
    Generate {
        /// Print every question
        #[arg(long)]
        show: bool,
    },

    /// Answer and judge every question, saving good evaluations
    Evaluate {
        /// Only evaluate the first N questions
        #[arg(short = 'n', long)]
        max_items: Option<usize>,

        /// Vector index file to load, or to create if missing
        #[arg(short, long)]
        index: Option<PathBuf>,
    },

    /// Ask the query engine a single question
    Query {
        /// The question to ask
        question: String,

        /// Vector index file to load, or to create if missing
        #[arg(short, long)]
        index: Option<PathBuf>,
    },

    /// Test model server connections
    Test,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("rag_question_eval=info")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref()).context("Failed to load configuration")?;

    match cli.command {
        Commands::Download { url, force } => cmd_download(&config, url, force).await,
        Commands::Generate { show } => cmd_generate(&config, show).await,
        Commands::Evaluate { max_items, index } => cmd_evaluate(&config, max_items, index).await,
        Commands::Query { question, index } => cmd_query(&config, &question, index).await,
        Commands::Test => cmd_test(&config).await,
    }
}

async fn cmd_download(config: &Config, url: Option<String>, force: bool) -> Result<()> {
    let url = url.unwrap_or_else(|| config.paths.source_url.clone());

    let path = download_source(
        &url,
        &config.paths.data_dir,
        &config.paths.source_file,
        force,
    )
    .await
    .context("Failed to download source document")?;

    let size = file_size(&path)?;
    println!("Source saved to: {}", path.display());
    println!("  File size: {:.1} KB", size as f64 / 1024.0);

    Ok(())
}

async fn cmd_generate(config: &Config, show: bool) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let documents = load_documents(config)?;
    let llm: Arc<dyn LanguageModel> = Arc::new(OllamaClient::new(config.llm.clone())?);
    let mut settings = config.settings;

    let start = Instant::now();
    let questions = generate_questions(config, &mut settings, &documents, llm).await?;

    println!(
        "\n{} questions in {} ({:.2?})",
        questions.len(),
        config.paths.questions_file.display(),
        start.elapsed()
    );

    if show {
        println!("{}", "─".repeat(60));
        for (i, question) in questions.iter().enumerate() {
            println!("{:>3}. {}", i + 1, question.query);
        }
        println!("{}", "─".repeat(60));
    }

    Ok(())
}

async fn cmd_evaluate(config: &Config, max_items: Option<usize>, index: Option<PathBuf>) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    println!("Generator model: {}", config.llm.model);
    println!("Judge model:     {}", config.judge.model);

    let documents = load_documents(config)?;
    let llm: Arc<dyn LanguageModel> = Arc::new(OllamaClient::new(config.llm.clone())?);
    let mut settings = config.settings;

    let mut questions = generate_questions(config, &mut settings, &documents, llm.clone()).await?;
    if let Some(n) = max_items {
        questions = questions.take(n);
    }

    let engine = build_engine(config, &settings, &documents, llm, index).await?;

    let judge_llm: Arc<dyn LanguageModel> = Arc::new(OllamaClient::new(config.judge.clone())?);
    let judge = RelevancyEvaluator::new(judge_llm, settings.context_window);

    let runner = EvaluationRunner::new(
        &engine,
        &judge,
        &config.paths.evaluations_file,
        config.evaluation.relevancy_threshold,
    );

    println!();
    let summary = runner
        .run(&questions, &mut std::io::stdout())
        .await
        .context("Evaluation failed")?;

    summary.print_summary();
    if summary.persisted > 0 {
        println!(
            "Evaluations saved to: {}",
            config.paths.evaluations_file.display()
        );
    }

    Ok(())
}

async fn cmd_query(config: &Config, question: &str, index: Option<PathBuf>) -> Result<()> {
    config.validate().context("Invalid configuration")?;

    let documents = load_documents(config)?;
    let llm: Arc<dyn LanguageModel> = Arc::new(OllamaClient::new(config.llm.clone())?);
    let engine = build_engine(config, &config.settings, &documents, llm, index).await?;

    println!("Query: \"{}\"", question);
    println!("Using model: {}", config.llm.model);
    println!();

    let start = Instant::now();
    let response = engine.query(question).await.context("Query failed")?;

    println!("{}", response);
    println!();
    println!("Sources:");
    println!("{}", "─".repeat(60));
    for (i, source) in response.source_nodes.iter().enumerate() {
        let page = source
            .node
            .page_label
            .as_deref()
            .map(|p| format!(" p.{}", p))
            .unwrap_or_default();
        println!(
            "{:>2}. {}{} (score: {:.4})",
            i + 1,
            source.node.file_name,
            page,
            source.score
        );
        let preview: String = source.node.text.chars().take(200).collect();
        for line in preview.lines().take(3) {
            println!("      {}", line);
        }
        if source.node.text.chars().count() > 200 {
            println!("      ...");
        }
    }
    println!("{}", "─".repeat(60));
    println!("Answered in {:.2?}", start.elapsed());

    Ok(())
}

async fn cmd_test(config: &Config) -> Result<()> {
    println!("Testing model server connections...\n");

    println!("Configuration:");
    println!("  Generator: {} @ {}", config.llm.model, config.llm.api_base);
    println!("  Judge:     {} @ {}", config.judge.model, config.judge.api_base);
    println!(
        "  Embedding: {} ({:?})",
        config.embedding.model, config.embedding.provider
    );
    println!();

    if let Err(e) = config.validate() {
        println!("Configuration error: {}", e);
        return Ok(());
    }

    for (label, model_config) in [("Generator", &config.llm), ("Judge", &config.judge)] {
        let client = OllamaClient::new(model_config.clone())?;
        match client.test_connection().await {
            Ok(()) => println!("{}: connection successful!", label),
            Err(e) => println!("{}: connection failed: {}", label, e),
        }
    }

    match build_embedder(&config.embedding) {
        Ok(embedder) => match embedder.embed("connection test").await {
            Ok(vector) => println!("Embedding: ok ({} dimensions)", vector.len()),
            Err(e) => println!("Embedding: failed: {}", e),
        },
        Err(e) => println!("Embedding: failed: {}", e),
    }

    Ok(())
}

fn load_documents(config: &Config) -> Result<Vec<Document>> {
    let documents = DirectoryReader::new(&config.paths.data_dir)
        .load_data()
        .with_context(|| {
            format!(
                "Failed to load documents from '{}'. Run 'download' first.",
                config.paths.data_dir.display()
            )
        })?;

    let tokens: usize = documents.iter().map(Document::estimated_tokens).sum();
    info!("Loaded {} documents (~{} tokens)", documents.len(), tokens);

    Ok(documents)
}

/// Load cached questions or generate them, giving up with the terminal
/// message when every chunk size failed.
async fn generate_questions(
    config: &Config,
    settings: &mut Settings,
    documents: &[Document],
    llm: Arc<dyn LanguageModel>,
) -> Result<QuestionSet> {
    let generator = QuestionGenerator::new(llm, config.generation.clone());
    let cache = QuestionCache::new(
        &config.paths.questions_file,
        config.generation.min_chunk_size,
    );

    cache
        .get_or_generate(settings, documents, &generator)
        .await
        .context("Failed to load or generate questions")?
        .context(METADATA_TOO_LARGE)
}

async fn build_engine(
    config: &Config,
    settings: &Settings,
    documents: &[Document],
    llm: Arc<dyn LanguageModel>,
    index_path: Option<PathBuf>,
) -> Result<QueryEngine> {
    let embedder: Arc<dyn Embedder> = Arc::from(
        build_embedder(&config.embedding).context("Failed to create embedding model")?,
    );

    let index_path = index_path.or_else(|| config.paths.index_file.clone());
    let index = match index_path.as_deref() {
        Some(path) if file_exists(path) => load_cached_index(path, embedder.model_name())?,
        _ => {
            let start = Instant::now();
            let index = VectorIndex::from_documents(
                documents,
                &(*settings).into(),
                embedder.as_ref(),
                config.embedding.batch_size,
            )
            .await
            .context("Failed to build vector index")?;
            info!(
                "Indexed {} nodes in {:.2?}",
                index.len(),
                start.elapsed()
            );

            if let Some(path) = index_path.as_deref() {
                save_index(&index, path).context("Failed to save vector index")?;
                info!("Index saved to {}", path.display());
            }
            index
        }
    };

    Ok(QueryEngine::new(
        Arc::new(index),
        embedder,
        llm,
        config.evaluation.similarity_top_k,
        settings.context_window,
    ))
}

fn load_cached_index(path: &Path, embed_model: &str) -> Result<VectorIndex> {
    let index = load_index(path).context("Failed to load vector index")?;
    if index.embed_model != embed_model {
        warn!(
            "Index at {} was built with '{}', but the configured embedding model is '{}'",
            path.display(),
            index.embed_model,
            embed_model
        );
    }
    info!("Loaded {} nodes from {}", index.len(), path.display());
    Ok(index)
}
