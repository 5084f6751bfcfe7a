//! Evaluation questions: dataset types, generation, and the on-disk cache.

pub mod cache;
pub mod dataset;
pub mod generator;

pub use cache::QuestionCache;
pub use dataset::{CreatedBy, CreatorKind, LabelledQuestion, QuestionSet};
pub use generator::{QuestionGenerator, QuestionSource, parse_questions};
