//! File-backed question cache with capacity-reducing retries.
//!
//! Questions are generated once and reused from the cache file on later
//! runs. A failed generation is taken to mean the model was too slow or
//! under-resourced: chunk size and context window are halved and generation
//! is retried until the chunk size would fall below the floor.

use super::dataset::QuestionSet;
use super::generator::QuestionSource;
use crate::config::Settings;
use crate::document::Document;
use crate::error::Result;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Generated questions cached in a JSON file.
#[derive(Debug, Clone)]
pub struct QuestionCache {
    path: PathBuf,
    min_chunk_size: usize,
}

impl QuestionCache {
    pub fn new(path: impl Into<PathBuf>, min_chunk_size: usize) -> Self {
        Self {
            path: path.into(),
            min_chunk_size,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Return the cached questions, or generate and cache them.
    ///
    /// Returns `Ok(None)` when every attempt failed and the chunk size has
    /// dropped below the floor. `settings` is left at the values of the last
    /// attempt. Reading an existing cache or writing a new one may fail.
    pub async fn get_or_generate(
        &self,
        settings: &mut Settings,
        documents: &[Document],
        source: &dyn QuestionSource,
    ) -> Result<Option<QuestionSet>> {
        if self.path.is_file() {
            info!("Using cached questions from {}", self.path.display());
            return QuestionSet::load_json(&self.path).map(Some);
        }

        loop {
            match source.generate(documents, settings).await {
                Ok(questions) => {
                    questions.save_json(&self.path)?;
                    info!(
                        "Saved {} questions to {}",
                        questions.len(),
                        self.path.display()
                    );
                    return Ok(Some(questions));
                }
                Err(e) => {
                    warn!(
                        "Question generation failed at chunk size {}: {}",
                        settings.chunk_size, e
                    );
                    settings.halve();

                    if settings.chunk_size < self.min_chunk_size {
                        warn!(
                            "Chunk size {} is below the minimum of {}, giving up",
                            settings.chunk_size, self.min_chunk_size
                        );
                        return Ok(None);
                    }

                    println!(
                        "\nThe LLM either took too long to generate a response, or had too much power dedicated to it. \nRetrying with lower performance, now running at {}% speed",
                        settings.speed_percent()
                    );
                }
            }
        }
    }
}
