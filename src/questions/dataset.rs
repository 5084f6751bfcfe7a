//! Labelled question datasets.
//!
//! The JSON layout is `{"examples": [...]}` with one entry per question, so
//! files written by other labelled-RAG-dataset tooling load unchanged.

use crate::error::{EvalError, Result};
use crate::persistence::{read_json, write_json};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Who produced a query or answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreatorKind {
    Ai,
    Human,
}

/// Provenance of a query or reference answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedBy {
    #[serde(default)]
    pub model_name: String,
    #[serde(rename = "type")]
    pub kind: CreatorKind,
}

impl CreatedBy {
    pub fn ai(model_name: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            kind: CreatorKind::Ai,
        }
    }
}

/// One generated question with the context it was written from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledQuestion {
    pub query: String,
    #[serde(default)]
    pub query_by: Option<CreatedBy>,
    #[serde(default)]
    pub reference_contexts: Vec<String>,
    #[serde(default)]
    pub reference_answer: String,
    #[serde(default)]
    pub reference_answer_by: Option<CreatedBy>,
}

impl LabelledQuestion {
    /// A question written by `model` from a single context.
    pub fn generated(query: impl Into<String>, context: impl Into<String>, model: &str) -> Self {
        Self {
            query: query.into(),
            query_by: Some(CreatedBy::ai(model)),
            reference_contexts: vec![context.into()],
            reference_answer: String::new(),
            reference_answer_by: None,
        }
    }
}

/// A collection of labelled questions.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionSet {
    pub examples: Vec<LabelledQuestion>,
}

impl QuestionSet {
    pub fn new(examples: Vec<LabelledQuestion>) -> Self {
        Self { examples }
    }

    /// Number of questions.
    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, LabelledQuestion> {
        self.examples.iter()
    }

    /// The first `n` questions.
    pub fn take(&self, n: usize) -> Self {
        Self {
            examples: self.examples.iter().take(n).cloned().collect(),
        }
    }

    /// Load from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        read_json(path).map_err(|e| match e {
            EvalError::Serialization(msg) => {
                EvalError::Serialization(format!("Failed to parse question set: {}", msg))
            }
            other => other,
        })
    }

    /// Save to a JSON file.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        write_json(self, path)
    }
}

impl<'a> IntoIterator for &'a QuestionSet {
    type Item = &'a LabelledQuestion;
    type IntoIter = std::slice::Iter<'a, LabelledQuestion>;

    fn into_iter(self) -> Self::IntoIter {
        self.examples.iter()
    }
}
