//! Relevancy evaluation of query engine responses.

pub mod relevancy;
pub mod runner;

pub use relevancy::{EvaluationResult, Judge, RelevancyEvaluator};
pub use runner::{EvaluationRunner, EvaluationSummary, write_report};
