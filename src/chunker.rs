//! Splits documents into nodes sized in estimated tokens.
//!
//! Each node tries to end on a sentence boundary and overlaps the previous
//! node by `chunk_overlap` tokens.

use crate::config::Settings;
use crate::document::{Document, DocumentMetadata};
use serde::{Deserialize, Serialize};

/// Words per token in the rough estimate used throughout the crate.
const WORDS_PER_TOKEN: f64 = 0.75;

/// Configuration for text chunking.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// Maximum estimated tokens per chunk.
    pub chunk_size: usize,
    /// Overlap between consecutive chunks, in estimated tokens.
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Settings::default().into()
    }
}

impl From<Settings> for ChunkConfig {
    fn from(settings: Settings) -> Self {
        Self {
            chunk_size: settings.chunk_size,
            chunk_overlap: settings.chunk_overlap,
        }
    }
}

impl ChunkConfig {
    fn words_per_chunk(&self) -> usize {
        ((self.chunk_size as f64 * WORDS_PER_TOKEN) as usize).max(1)
    }

    fn overlap_words(&self) -> usize {
        (self.chunk_overlap as f64 * WORDS_PER_TOKEN) as usize
    }
}

/// A chunk of a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, bincode::Encode, bincode::Decode)]
pub struct Node {
    /// `{doc_id}:{index}`.
    pub id: String,
    pub text: String,
    pub doc_id: String,
    pub file_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_label: Option<String>,
}

impl Node {
    fn new(doc: &Document, index: usize, text: String) -> Self {
        let DocumentMetadata {
            file_name,
            page_label,
            ..
        } = &doc.metadata;
        Self {
            id: format!("{}:{}", doc.id, index),
            text,
            doc_id: doc.id.clone(),
            file_name: file_name.clone(),
            page_label: page_label.clone(),
        }
    }
}

/// Split every document into nodes, in document order.
pub fn split_documents(documents: &[Document], config: &ChunkConfig) -> Vec<Node> {
    documents
        .iter()
        .flat_map(|doc| {
            split_text(&doc.text, config)
                .into_iter()
                .enumerate()
                .map(move |(i, text)| Node::new(doc, i, text))
        })
        .collect()
}

/// Split text into overlapping word windows.
pub fn split_text(text: &str, config: &ChunkConfig) -> Vec<String> {
    let words: Vec<&str> = text.split_whitespace().collect();
    let total = words.len();
    let mut chunks = Vec::new();

    if total == 0 {
        return chunks;
    }

    let window = config.words_per_chunk();
    let overlap = config.overlap_words().min(window.saturating_sub(1));
    let mut start = 0;

    while start < total {
        let end = (start + window).min(total);

        // Prefer ending on a sentence boundary in the last quarter of the window.
        let adjusted_end = if end < total {
            let search_from = (end - (end - start) / 4).max(start + 1);
            (search_from..=end)
                .rev()
                .find(|&i| ends_sentence(words[i - 1]))
                .unwrap_or(end)
        } else {
            end
        };

        chunks.push(words[start..adjusted_end].join(" "));

        if adjusted_end >= total {
            break;
        }

        let next_start = adjusted_end.saturating_sub(overlap);
        start = if next_start <= start {
            adjusted_end
        } else {
            next_start
        };
    }

    chunks
}

fn ends_sentence(word: &str) -> bool {
    word.ends_with(['.', '!', '?'])
}
