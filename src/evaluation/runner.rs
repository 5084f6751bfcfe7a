//! The evaluation loop: answer every question, judge it, keep the good ones.

use super::relevancy::{EvaluationResult, Judge};
use crate::error::{EvalError, Result};
use crate::persistence::append_json_record;
use crate::query::Answerer;
use crate::questions::QuestionSet;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, info};

/// Aggregated results of one evaluation run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvaluationSummary {
    /// Questions evaluated.
    pub total: usize,
    /// Evaluations the judge passed.
    pub passed: usize,
    /// Evaluations written to the evaluations file.
    pub persisted: usize,
    /// Mean score across all evaluations.
    pub mean_score: f64,
    /// Wall-clock duration of the run.
    pub total_time_secs: f64,
}

impl EvaluationSummary {
    fn record(&mut self, result: &EvaluationResult) {
        self.mean_score =
            (self.mean_score * self.total as f64 + result.score) / (self.total + 1) as f64;
        self.total += 1;
        if result.passing {
            self.passed += 1;
        }
    }

    /// Print summary to stdout.
    pub fn print_summary(&self) {
        println!("\n========== Evaluation Results ==========");
        println!("Questions evaluated: {}", self.total);
        println!(
            "Passed:              {} ({:.1}%)",
            self.passed,
            if self.total > 0 {
                self.passed as f64 / self.total as f64 * 100.0
            } else {
                0.0
            }
        );
        println!("Mean score:          {:.0}/100", self.mean_score * 100.0);
        println!("Saved evaluations:   {}", self.persisted);
        println!("Total time:          {:.1}s", self.total_time_secs);
        println!("=========================================\n");
    }
}

/// Runs every question through an answerer and a judge.
pub struct EvaluationRunner<'a> {
    answerer: &'a dyn Answerer,
    judge: &'a dyn Judge,
    evaluations_path: PathBuf,
    threshold: f64,
}

impl<'a> EvaluationRunner<'a> {
    pub fn new(
        answerer: &'a dyn Answerer,
        judge: &'a dyn Judge,
        evaluations_path: impl Into<PathBuf>,
        threshold: f64,
    ) -> Self {
        Self {
            answerer,
            judge,
            evaluations_path: evaluations_path.into(),
            threshold,
        }
    }

    /// Evaluate each question in order, writing a report block per question
    /// to `out`. Evaluations scoring above the threshold are appended to the
    /// evaluations file. The first error stops the run.
    pub async fn run<W: Write>(&self, questions: &QuestionSet, out: &mut W) -> Result<EvaluationSummary> {
        let start = Instant::now();
        let mut summary = EvaluationSummary::default();

        info!("Evaluating {} questions", questions.len());

        for (idx, question) in questions.iter().enumerate() {
            debug!("[{}/{}] {}", idx + 1, questions.len(), question.query);

            let response = self.answerer.query(&question.query).await?;
            let result = self.judge.evaluate_response(&question.query, &response).await?;

            write_report(out, &result)
                .map_err(|e| EvalError::io("<output>", e))?;
            summary.record(&result);

            if result.score > self.threshold {
                let count = append_json_record(&self.evaluations_path, &result)?;
                summary.persisted += 1;
                debug!(
                    "Saved evaluation {} to {}",
                    count,
                    self.evaluations_path.display()
                );
            }
        }

        summary.total_time_secs = start.elapsed().as_secs_f64();
        Ok(summary)
    }
}

/// Write the report block for one evaluation.
pub fn write_report<W: Write>(out: &mut W, result: &EvaluationResult) -> std::io::Result<()> {
    writeln!(
        out,
        "Question: {}\nResponse: {}\nEvaluation Result: {}/100\nFeedback:{}\n",
        result.query,
        result.response,
        result.percent(),
        result.feedback
    )?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::Response;
    use crate::questions::LabelledQuestion;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FixedAnswerer {
        asked: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Answerer for FixedAnswerer {
        async fn query(&self, question: &str) -> Result<Response> {
            self.asked.lock().unwrap().push(question.to_string());
            Ok(Response {
                text: "Stop completely.".to_string(),
                source_nodes: Vec::new(),
            })
        }
    }

    struct FixedJudge {
        score: f64,
    }

    #[async_trait]
    impl Judge for FixedJudge {
        async fn evaluate_response(&self, query: &str, response: &Response) -> Result<EvaluationResult> {
            Ok(EvaluationResult {
                query: query.to_string(),
                response: response.text.clone(),
                contexts: Vec::new(),
                score: self.score,
                feedback: "YES".to_string(),
                passing: self.score > 0.0,
            })
        }
    }

    fn answerer() -> FixedAnswerer {
        FixedAnswerer {
            asked: Mutex::new(Vec::new()),
        }
    }

    fn questions(queries: &[&str]) -> QuestionSet {
        QuestionSet::new(
            queries
                .iter()
                .map(|q| LabelledQuestion::generated(*q, "ctx", "stub"))
                .collect(),
        )
    }

    const EXPECTED_BLOCK: &str = "Question: What do you do at a stop sign?\nResponse: Stop completely.\nEvaluation Result: 90/100\nFeedback:YES\n\n";

    #[tokio::test]
    async fn test_prints_report_and_persists_high_scores() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evaluations.json");
        let answerer = answerer();
        let judge = FixedJudge { score: 0.9 };
        let runner = EvaluationRunner::new(&answerer, &judge, &path, 0.6);

        let mut out = Vec::new();
        let summary = runner
            .run(&questions(&["What do you do at a stop sign?"]), &mut out)
            .await
            .unwrap();

        assert_eq!(String::from_utf8(out).unwrap(), EXPECTED_BLOCK);
        assert_eq!(summary.total, 1);
        assert_eq!(summary.persisted, 1);
        assert!((summary.mean_score - 0.9).abs() < 1e-9);

        let saved: Vec<EvaluationResult> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(saved.len(), 1);
        assert_eq!(saved[0].score, 0.9);
    }

    #[tokio::test]
    async fn test_threshold_is_strict() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evaluations.json");
        let answerer = answerer();
        let judge = FixedJudge { score: 0.6 };
        let runner = EvaluationRunner::new(&answerer, &judge, &path, 0.6);

        let mut out = Vec::new();
        let summary = runner
            .run(&questions(&["Q1?", "Q2?"]), &mut out)
            .await
            .unwrap();

        assert_eq!(summary.total, 2);
        assert_eq!(summary.persisted, 0);
        assert!(!path.exists());
        assert_eq!(*answerer.asked.lock().unwrap(), vec!["Q1?", "Q2?"]);
    }

    #[tokio::test]
    async fn test_empty_evaluations_file_stops_the_loop() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("evaluations.json");
        fs::write(&path, "").unwrap();

        let answerer = answerer();
        let judge = FixedJudge { score: 0.9 };
        let runner = EvaluationRunner::new(&answerer, &judge, &path, 0.6);

        let mut out = Vec::new();
        let result = runner
            .run(
                &questions(&["What do you do at a stop sign?", "Never asked?"]),
                &mut out,
            )
            .await;

        // The report is printed before the save fails.
        assert_eq!(String::from_utf8(out).unwrap(), EXPECTED_BLOCK);
        assert!(matches!(result, Err(EvalError::Serialization(_))));
        assert_eq!(answerer.asked.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_summary_accumulates() {
        let mut summary = EvaluationSummary::default();
        for score in [1.0, 0.0, 1.0, 1.0] {
            summary.record(&EvaluationResult {
                query: String::new(),
                response: String::new(),
                contexts: Vec::new(),
                score,
                feedback: String::new(),
                passing: score > 0.0,
            });
        }
        assert_eq!(summary.total, 4);
        assert_eq!(summary.passed, 3);
        assert!((summary.mean_score - 0.75).abs() < 1e-9);
    }
}
