//! Sequential grading loop over a batch of submissions.
//!
//! One submission at a time, one record per submission, in source order. A
//! failed grading run never aborts the batch; the failure becomes a
//! sentinel-shaped record and the loop moves on.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::Context;
use tokio::time::sleep;

use crate::config::GradingConfig;
use crate::grader::Backend;
use crate::models::{GradingOutcome, ResultRecord, Submission};
use crate::results::write_results;

#[derive(Debug)]
pub struct BatchSummary {
    pub total: usize,
    pub success_count: usize,
    pub fail_count: usize,
    pub output_path: PathBuf,
}

pub struct Runner {
    backend: Backend,
    config: GradingConfig,
    rate_limit: Duration,
}

impl Runner {
    pub fn new(backend: Backend, config: GradingConfig, rate_limit: Duration) -> Self {
        Self {
            backend,
            config,
            rate_limit,
        }
    }

    /// Grade every submission and write the batch to `output` in one pass.
    pub async fn run(
        &self,
        submissions: &[Submission],
        output: &Path,
    ) -> anyhow::Result<BatchSummary> {
        let total = submissions.len();
        let total_points = self.config.total_points();
        let mut records = Vec::with_capacity(total);
        let mut success_count = 0;
        let mut fail_count = 0;

        for (i, submission) in submissions.iter().enumerate() {
            println!("--- Student {}/{} ---", i + 1, total);
            println!("Name: {}", submission.student_name);
            println!("ID: {}", submission.student_id);
            for question in &self.config.questions {
                let score = submission.grader_scores.get(question).copied().unwrap_or(0.0);
                println!(
                    "Q{question} Grader Score: {score}/{}",
                    self.config.points_per_question
                );
            }

            let outcome = self.backend.grade(&submission.answers).await;
            let record = ResultRecord::from_outcome(submission, &outcome, &self.config.questions);

            match &outcome {
                GradingOutcome::Graded { .. } => {
                    for question in &record.questions {
                        println!(
                            "  Q{}: LLM={:.1}/{}, Diff={:+.1}",
                            question.question,
                            question.llm_score,
                            self.config.points_per_question,
                            question.score_difference
                        );
                    }
                    println!(
                        "  Total: LLM={:.1}/{total_points}, Grader={}/{total_points}, Diff={:+.1}",
                        record.total_llm_score,
                        record.total_grader_score,
                        record.total_score_difference
                    );
                    success_count += 1;
                }
                GradingOutcome::Failed { reason } => {
                    println!("  ✗ Grading failed: {reason}");
                    fail_count += 1;
                }
            }
            records.push(record);
            println!();

            if i + 1 < total {
                sleep(self.rate_limit).await;
            }
        }

        write_results(output, &records, &self.config.questions)
            .with_context(|| format!("failed to write results to {}", output.display()))?;

        Ok(BatchSummary {
            total,
            success_count,
            fail_count,
            output_path: output.to_path_buf(),
        })
    }
}
