//! Configuration for question generation and evaluation.
//!
//! Supports both environment variables and YAML config file.
//! Environment variables take precedence over config file values.

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

/// Default URL of the source document fetched by `download`.
pub const DEFAULT_SOURCE_URL: &str = "https://downloads.ctfassets.net/nnc41duedoho/63cHBOAVpOAQGOOMBFhFbL/0cc93af0c5ce6b5278dfccfa6e53cf4c/driver-full.pdf";

/// Chunk size the retry notice treats as full speed.
pub const REFERENCE_CHUNK_SIZE: usize = 1024;

const DEFAULT_QUESTION_GEN_QUERY: &str = "You are an instructor making question based on the data provided. Please make the best questions you can, otherwise you will be fired.";

/// Connection settings for one model instance on the model server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Base URL of the model server (e.g., "http://localhost:11434")
    pub api_base: String,

    /// Model name (e.g., "llama3", "phi3")
    pub model: String,

    /// Sampling temperature
    pub temperature: f32,

    /// Seconds before a request is abandoned
    pub request_timeout_secs: u64,
}

impl ModelConfig {
    /// Settings for the model that generates questions and answers queries.
    pub fn generator() -> Self {
        Self {
            api_base: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: 0.3,
            request_timeout_secs: 1000,
        }
    }

    /// Settings for the independent model that judges relevancy.
    pub fn judge() -> Self {
        Self {
            api_base: "http://localhost:11434".to_string(),
            model: "llama3".to_string(),
            temperature: 0.75,
            request_timeout_secs: 30,
        }
    }
}

/// Where embeddings are computed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingProvider {
    /// The model server's `/api/embed` endpoint.
    Ollama,
    /// An in-process BERT model (requires the `local-embeddings` feature).
    Local,
}

impl EmbeddingProvider {
    /// Parse a provider name (case-insensitive).
    pub fn parse(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "ollama" => Ok(EmbeddingProvider::Ollama),
            "local" => Ok(EmbeddingProvider::Local),
            other => Err(EvalError::InvalidConfig(format!(
                "Unknown embedding provider '{}'. Expected 'ollama' or 'local'.",
                other
            ))),
        }
    }

    /// Model used when the configuration names none.
    pub fn default_model(&self) -> &'static str {
        match self {
            EmbeddingProvider::Ollama => "nomic-embed-text",
            EmbeddingProvider::Local => "BAAI/bge-small-en-v1.5",
        }
    }
}

/// Embedding model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    pub provider: EmbeddingProvider,
    /// Model name on the server, or Hugging Face repo id for local models.
    pub model: String,
    /// Base URL of the model server (ignored for local models).
    pub api_base: String,
    /// Texts embedded per request.
    pub batch_size: usize,
}

impl EmbeddingConfig {
    /// Switch provider. A model still at the old provider's default follows
    /// the switch; an explicitly chosen model is kept.
    pub fn set_provider(&mut self, provider: EmbeddingProvider) {
        if self.model == self.provider.default_model() {
            self.model = provider.default_model().to_string();
        }
        self.provider = provider;
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: EmbeddingProvider::Ollama,
            model: EmbeddingProvider::Ollama.default_model().to_string(),
            api_base: "http://localhost:11434".to_string(),
            batch_size: 32,
        }
    }
}

/// Process-wide chunking and context settings.
///
/// A mutable copy of these travels through the pipeline; question
/// generation halves `chunk_size` and `context_window` when it fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Target chunk size in estimated tokens.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks in estimated tokens.
    pub chunk_overlap: usize,
    /// Context window handed to the model, in tokens.
    pub context_window: usize,
}

impl Default for Settings {
    /// Twice the usual 1024-token chunk and 3900-token window, so the first
    /// attempt runs at full capacity.
    fn default() -> Self {
        Self {
            chunk_size: 2 * REFERENCE_CHUNK_SIZE,
            chunk_overlap: 20,
            context_window: 2 * 3900,
        }
    }
}

impl Settings {
    /// Halve chunk size and context window.
    pub fn halve(&mut self) {
        self.chunk_size /= 2;
        self.context_window /= 2;
        // Keep the splitter valid once chunks get small.
        if self.chunk_overlap >= self.chunk_size {
            self.chunk_overlap = self.chunk_size / 2;
        }
    }

    /// Current chunk size as a percentage of the reference chunk size.
    pub fn speed_percent(&self) -> u64 {
        (100.0 * self.chunk_size as f64 / REFERENCE_CHUNK_SIZE as f64).round_ties_even() as u64
    }
}

/// Question generation options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationConfig {
    pub num_questions_per_chunk: usize,
    /// Maximum generation requests in flight.
    pub workers: usize,
    /// Instruction appended to every question generation prompt.
    pub question_gen_query: String,
    /// Retries stop once the halved chunk size drops below this.
    pub min_chunk_size: usize,
    /// Also ask the model for a reference answer per question.
    pub with_reference_answers: bool,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            num_questions_per_chunk: 2,
            workers: 8,
            question_gen_query: DEFAULT_QUESTION_GEN_QUERY.to_string(),
            min_chunk_size: 128,
            with_reference_answers: false,
        }
    }
}

/// Query and scoring options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationConfig {
    /// Nodes retrieved per query.
    pub similarity_top_k: usize,
    /// Evaluations scoring strictly above this are persisted.
    pub relevancy_threshold: f64,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            similarity_top_k: 2,
            relevancy_threshold: 0.6,
        }
    }
}

/// File locations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub data_dir: PathBuf,
    pub questions_file: PathBuf,
    pub evaluations_file: PathBuf,
    /// Persisted vector index (rebuilt every run when unset).
    pub index_file: Option<PathBuf>,
    pub source_url: String,
    pub source_file: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            questions_file: PathBuf::from("questions.json"),
            evaluations_file: PathBuf::from("evaluations.json"),
            index_file: None,
            source_url: DEFAULT_SOURCE_URL.to_string(),
            source_file: "DriversManual.pdf".to_string(),
        }
    }
}

/// Full application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub llm: ModelConfig,
    pub judge: ModelConfig,
    pub embedding: EmbeddingConfig,
    pub settings: Settings,
    pub generation: GenerationConfig,
    pub evaluation: EvaluationConfig,
    pub paths: PathsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm: ModelConfig::generator(),
            judge: ModelConfig::judge(),
            embedding: EmbeddingConfig::default(),
            settings: Settings::default(),
            generation: GenerationConfig::default(),
            evaluation: EvaluationConfig::default(),
            paths: PathsConfig::default(),
        }
    }
}

/// Configuration file structure (YAML format).
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    llm: Option<ModelFileSection>,
    judge: Option<ModelFileSection>,
    embedding: Option<EmbeddingFileSection>,
    settings: Option<SettingsFileSection>,
    generation: Option<GenerationFileSection>,
    evaluation: Option<EvaluationFileSection>,
    paths: Option<PathsFileSection>,
}

#[derive(Debug, Deserialize)]
struct ModelFileSection {
    api_base: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingFileSection {
    provider: Option<String>,
    model: Option<String>,
    api_base: Option<String>,
    batch_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct SettingsFileSection {
    chunk_size: Option<usize>,
    chunk_overlap: Option<usize>,
    context_window: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct GenerationFileSection {
    num_questions_per_chunk: Option<usize>,
    workers: Option<usize>,
    question_gen_query: Option<String>,
    min_chunk_size: Option<usize>,
    with_reference_answers: Option<bool>,
}

#[derive(Debug, Deserialize)]
struct EvaluationFileSection {
    similarity_top_k: Option<usize>,
    relevancy_threshold: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct PathsFileSection {
    data_dir: Option<PathBuf>,
    questions_file: Option<PathBuf>,
    evaluations_file: Option<PathBuf>,
    index_file: Option<PathBuf>,
    source_url: Option<String>,
    source_file: Option<String>,
}

impl ModelFileSection {
    fn apply(self, target: &mut ModelConfig) {
        if let Some(api_base) = self.api_base {
            target.api_base = api_base;
        }
        if let Some(model) = self.model {
            target.model = model;
        }
        if let Some(temperature) = self.temperature {
            target.temperature = temperature;
        }
        if let Some(timeout) = self.request_timeout_secs {
            target.request_timeout_secs = timeout;
        }
    }
}

impl Config {
    /// Load configuration from environment variables and an optional config file.
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (LLM_MODEL, JUDGE_MODEL, EMBED_MODEL, ...)
    /// 2. Config file (`explicit_path`, or ~/.config/rag-question-eval/config.yaml)
    /// 3. Default values
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let mut config = match explicit_path {
            Some(path) => Self::load_from_file(path)?,
            None => match Self::config_file_path() {
                Some(path) if path.exists() => Self::load_from_file(&path)?,
                _ => Config::default(),
            },
        };

        config.apply_env()?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(api_base) = env::var("LLM_API_BASE") {
            self.llm.api_base = api_base;
        }
        if let Ok(model) = env::var("LLM_MODEL") {
            self.llm.model = model;
        }
        if let Some(temperature) = parsed_env("LLM_TEMPERATURE") {
            self.llm.temperature = temperature;
        }
        if let Some(timeout) = parsed_env("LLM_REQUEST_TIMEOUT") {
            self.llm.request_timeout_secs = timeout;
        }

        if let Ok(api_base) = env::var("JUDGE_API_BASE") {
            self.judge.api_base = api_base;
        }
        if let Ok(model) = env::var("JUDGE_MODEL") {
            self.judge.model = model;
        }
        if let Some(temperature) = parsed_env("JUDGE_TEMPERATURE") {
            self.judge.temperature = temperature;
        }

        if let Ok(provider) = env::var("EMBED_PROVIDER") {
            self.embedding.set_provider(EmbeddingProvider::parse(&provider)?);
        }
        if let Ok(model) = env::var("EMBED_MODEL") {
            self.embedding.model = model;
        }
        if let Ok(api_base) = env::var("EMBED_API_BASE") {
            self.embedding.api_base = api_base;
        }

        if let Ok(dir) = env::var("QEVAL_DATA_DIR") {
            self.paths.data_dir = PathBuf::from(dir);
        }
        if let Ok(file) = env::var("QEVAL_QUESTIONS_FILE") {
            self.paths.questions_file = PathBuf::from(file);
        }
        if let Ok(file) = env::var("QEVAL_EVALUATIONS_FILE") {
            self.paths.evaluations_file = PathBuf::from(file);
        }

        Ok(())
    }

    /// Load configuration from a specific file path.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML text, filling unset values with defaults.
    pub fn from_yaml(content: &str) -> Result<Self> {
        let file_config: Option<ConfigFile> = serde_yaml::from_str(content)
            .map_err(|e| EvalError::Config(format!("Failed to parse config file: {}", e)))?;
        let file_config = file_config.unwrap_or_default();

        let mut config = Config::default();

        if let Some(llm) = file_config.llm {
            llm.apply(&mut config.llm);
        }
        if let Some(judge) = file_config.judge {
            judge.apply(&mut config.judge);
        }

        if let Some(embedding) = file_config.embedding {
            if let Some(provider) = embedding.provider {
                config.embedding.set_provider(EmbeddingProvider::parse(&provider)?);
            }
            if let Some(model) = embedding.model {
                config.embedding.model = model;
            }
            if let Some(api_base) = embedding.api_base {
                config.embedding.api_base = api_base;
            }
            if let Some(batch_size) = embedding.batch_size {
                config.embedding.batch_size = batch_size;
            }
        }

        if let Some(settings) = file_config.settings {
            if let Some(chunk_size) = settings.chunk_size {
                config.settings.chunk_size = chunk_size;
            }
            if let Some(chunk_overlap) = settings.chunk_overlap {
                config.settings.chunk_overlap = chunk_overlap;
            }
            if let Some(context_window) = settings.context_window {
                config.settings.context_window = context_window;
            }
        }

        if let Some(generation) = file_config.generation {
            if let Some(n) = generation.num_questions_per_chunk {
                config.generation.num_questions_per_chunk = n;
            }
            if let Some(workers) = generation.workers {
                config.generation.workers = workers;
            }
            if let Some(query) = generation.question_gen_query {
                config.generation.question_gen_query = query;
            }
            if let Some(min) = generation.min_chunk_size {
                config.generation.min_chunk_size = min;
            }
            if let Some(with_answers) = generation.with_reference_answers {
                config.generation.with_reference_answers = with_answers;
            }
        }

        if let Some(evaluation) = file_config.evaluation {
            if let Some(top_k) = evaluation.similarity_top_k {
                config.evaluation.similarity_top_k = top_k;
            }
            if let Some(threshold) = evaluation.relevancy_threshold {
                config.evaluation.relevancy_threshold = threshold;
            }
        }

        if let Some(paths) = file_config.paths {
            if let Some(dir) = paths.data_dir {
                config.paths.data_dir = dir;
            }
            if let Some(file) = paths.questions_file {
                config.paths.questions_file = file;
            }
            if let Some(file) = paths.evaluations_file {
                config.paths.evaluations_file = file;
            }
            if paths.index_file.is_some() {
                config.paths.index_file = paths.index_file;
            }
            if let Some(url) = paths.source_url {
                config.paths.source_url = url;
            }
            if let Some(file) = paths.source_file {
                config.paths.source_file = file;
            }
        }

        Ok(config)
    }

    /// Get the default config file path.
    pub fn config_file_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "rag-question-eval")
            .map(|dirs| dirs.config_dir().join("config.yaml"))
    }

    /// Validate that the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        for (name, model) in [("llm", &self.llm), ("judge", &self.judge)] {
            if model.api_base.is_empty() {
                return Err(EvalError::InvalidConfig(format!(
                    "{}.api_base is required",
                    name
                )));
            }
            if model.model.is_empty() {
                return Err(EvalError::InvalidConfig(format!(
                    "{}.model is required",
                    name
                )));
            }
        }

        if self.embedding.model.is_empty() {
            return Err(EvalError::InvalidConfig(
                "embedding.model is required".to_string(),
            ));
        }
        if self.embedding.batch_size == 0 {
            return Err(EvalError::InvalidConfig(
                "embedding.batch_size must be at least 1".to_string(),
            ));
        }

        if self.settings.chunk_size == 0 {
            return Err(EvalError::InvalidConfig(
                "settings.chunk_size must be at least 1".to_string(),
            ));
        }
        if self.settings.chunk_overlap >= self.settings.chunk_size {
            return Err(EvalError::InvalidConfig(format!(
                "settings.chunk_overlap ({}) must be smaller than settings.chunk_size ({})",
                self.settings.chunk_overlap, self.settings.chunk_size
            )));
        }

        if self.generation.workers == 0 {
            return Err(EvalError::InvalidConfig(
                "generation.workers must be at least 1".to_string(),
            ));
        }
        if self.generation.num_questions_per_chunk == 0 {
            return Err(EvalError::InvalidConfig(
                "generation.num_questions_per_chunk must be at least 1".to_string(),
            ));
        }

        if self.evaluation.similarity_top_k == 0 {
            return Err(EvalError::InvalidConfig(
                "evaluation.similarity_top_k must be at least 1".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.evaluation.relevancy_threshold) {
            return Err(EvalError::InvalidConfig(format!(
                "evaluation.relevancy_threshold must be within 0..=1, got {}",
                self.evaluation.relevancy_threshold
            )));
        }

        Ok(())
    }
}

fn parsed_env<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.llm.model, "llama3");
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.llm.request_timeout_secs, 1000);
        assert_eq!(config.judge.request_timeout_secs, 30);
        assert_eq!(config.settings.chunk_size, 2048);
        assert_eq!(config.settings.context_window, 7800);
        assert_eq!(config.generation.num_questions_per_chunk, 2);
        assert_eq!(config.generation.workers, 8);
        assert_eq!(config.generation.min_chunk_size, 128);
        assert_eq!(config.evaluation.relevancy_threshold, 0.6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_settings_halve() {
        let mut settings = Settings::default();
        settings.halve();
        assert_eq!(settings.chunk_size, 1024);
        assert_eq!(settings.context_window, 3900);
        assert_eq!(settings.speed_percent(), 100);

        settings.halve();
        assert_eq!(settings.speed_percent(), 50);
    }

    #[test]
    fn test_halve_keeps_overlap_below_chunk_size() {
        let mut settings = Settings {
            chunk_size: 40,
            chunk_overlap: 20,
            context_window: 100,
        };
        settings.halve();
        assert_eq!(settings.chunk_size, 20);
        assert!(settings.chunk_overlap < settings.chunk_size);
    }

    #[test]
    fn test_from_yaml_overrides_sections() {
        let yaml = r#"
llm:
  model: phi3
judge:
  model: mistral
  temperature: 0.1
embedding:
  provider: local
  model: BAAI/bge-small-en-v1.5
settings:
  chunk_size: 512
generation:
  workers: 2
evaluation:
  relevancy_threshold: 0.8
paths:
  data_dir: corpus
  index_file: storage/index.bin
"#;
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.llm.model, "phi3");
        assert_eq!(config.llm.temperature, 0.3);
        assert_eq!(config.judge.model, "mistral");
        assert_eq!(config.judge.temperature, 0.1);
        assert_eq!(config.embedding.provider, EmbeddingProvider::Local);
        assert_eq!(config.settings.chunk_size, 512);
        assert_eq!(config.settings.context_window, 7800);
        assert_eq!(config.generation.workers, 2);
        assert_eq!(config.evaluation.relevancy_threshold, 0.8);
        assert_eq!(config.paths.data_dir, PathBuf::from("corpus"));
        assert_eq!(
            config.paths.index_file,
            Some(PathBuf::from("storage/index.bin"))
        );
    }

    #[test]
    fn test_speed_percent_rounds_half_to_even() {
        let at = |chunk_size| Settings {
            chunk_size,
            chunk_overlap: 20,
            context_window: 3900,
        }
        .speed_percent();
        assert_eq!(at(2048), 200);
        assert_eq!(at(256), 25);
        assert_eq!(at(128), 12);
        assert_eq!(at(64), 6);
    }

    #[test]
    fn test_local_provider_defaults_to_bge() {
        let config = Config::from_yaml("embedding:\n  provider: local\n").unwrap();
        assert_eq!(config.embedding.provider, EmbeddingProvider::Local);
        assert_eq!(config.embedding.model, "BAAI/bge-small-en-v1.5");

        let yaml = "embedding:\n  provider: local\n  model: BAAI/bge-base-en-v1.5\n";
        let config = Config::from_yaml(yaml).unwrap();
        assert_eq!(config.embedding.model, "BAAI/bge-base-en-v1.5");
    }

    #[test]
    fn test_set_provider_keeps_explicit_model() {
        let mut embedding = EmbeddingConfig::default();
        embedding.set_provider(EmbeddingProvider::Local);
        assert_eq!(embedding.model, "BAAI/bge-small-en-v1.5");
        embedding.set_provider(EmbeddingProvider::Ollama);
        assert_eq!(embedding.model, "nomic-embed-text");

        embedding.model = "mxbai-embed-large".to_string();
        embedding.set_provider(EmbeddingProvider::Local);
        assert_eq!(embedding.model, "mxbai-embed-large");
    }

    #[test]
    fn test_empty_yaml_gives_defaults() {
        let config = Config::from_yaml("").unwrap();
        assert_eq!(config.llm.model, "llama3");
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let yaml = "embedding:\n  provider: fastembed\n";
        assert!(Config::from_yaml(yaml).is_err());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = Config::default();
        config.settings.chunk_overlap = config.settings.chunk_size;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.generation.workers = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.evaluation.relevancy_threshold = 1.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.judge.model.clear();
        assert!(config.validate().is_err());
    }
}
