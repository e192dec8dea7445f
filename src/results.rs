//! Result aggregation and the durable results file.
//!
//! The aggregator is pure and total: any grading outcome, including failure,
//! maps to exactly one `ResultRecord`. The store writes the whole batch in
//! one pass with a fixed column layout and reloads it for analysis.

use std::collections::HashMap;
use std::path::Path;

use crate::error::StoreError;
use crate::models::{
    FAILED_SCORE, GradingOutcome, MANUAL_REVIEW_FEEDBACK, QuestionGrade, QuestionId,
    QuestionResult, ResultRecord, Submission, round1,
};

impl ResultRecord {
    /// Combine one submission with its grading outcome.
    pub fn from_outcome(
        submission: &Submission,
        outcome: &GradingOutcome,
        questions: &[QuestionId],
    ) -> Self {
        match outcome {
            GradingOutcome::Graded { grades } => Self::graded(submission, grades, questions),
            GradingOutcome::Failed { .. } => Self::failed(submission, questions),
        }
    }

    fn graded(
        submission: &Submission,
        grades: &HashMap<QuestionId, QuestionGrade>,
        questions: &[QuestionId],
    ) -> Self {
        let mut question_results = Vec::with_capacity(questions.len());
        let mut total_llm = 0.0;
        let mut total_grader = 0.0;

        for question in questions {
            // A question the model skipped scores 0 rather than failing the
            // whole record.
            let grade = grades.get(question);
            let llm_score = grade.map(|g| g.score).unwrap_or(0.0);
            let grader_score = submission
                .grader_scores
                .get(question)
                .copied()
                .unwrap_or(0.0);
            total_llm += llm_score;
            total_grader += grader_score;

            question_results.push(QuestionResult {
                question: question.clone(),
                query: submission
                    .answers
                    .get(question)
                    .cloned()
                    .unwrap_or_default(),
                grader_score,
                llm_score,
                score_difference: round1(llm_score - grader_score),
                feedback: grade.map(|g| g.feedback.clone()).unwrap_or_default(),
                needs_review: grade.map(|g| g.needs_review).unwrap_or(false),
            });
        }

        let total_llm_score = round1(total_llm);
        Self {
            student_id: submission.student_id.clone(),
            student_name: submission.student_name.clone(),
            questions: question_results,
            total_llm_score,
            total_grader_score: total_grader,
            total_score_difference: round1(total_llm_score - total_grader),
        }
    }

    /// The failure-shaped record: every model-derived field is the sentinel,
    /// every question is flagged for review, and the human totals stay real
    /// so later analysis keeps its baseline.
    fn failed(submission: &Submission, questions: &[QuestionId]) -> Self {
        let mut question_results = Vec::with_capacity(questions.len());
        let mut total_grader = 0.0;

        for question in questions {
            let grader_score = submission
                .grader_scores
                .get(question)
                .copied()
                .unwrap_or(0.0);
            total_grader += grader_score;

            question_results.push(QuestionResult {
                question: question.clone(),
                query: submission
                    .answers
                    .get(question)
                    .cloned()
                    .unwrap_or_default(),
                grader_score,
                llm_score: FAILED_SCORE,
                score_difference: FAILED_SCORE,
                feedback: MANUAL_REVIEW_FEEDBACK.to_string(),
                needs_review: true,
            });
        }

        Self {
            student_id: submission.student_id.clone(),
            student_name: submission.student_name.clone(),
            questions: question_results,
            total_llm_score: FAILED_SCORE,
            total_grader_score: total_grader,
            total_score_difference: FAILED_SCORE,
        }
    }
}

/// Column order of the results file: identity, six columns per question,
/// then totals.
pub fn result_header(questions: &[QuestionId]) -> Vec<String> {
    let mut columns = vec!["student_id".to_string(), "student_name".to_string()];
    for question in questions {
        let prefix = question.column_prefix();
        columns.push(format!("{prefix}_query"));
        columns.push(format!("{prefix}_grader_score"));
        columns.push(format!("{prefix}_llm_score"));
        columns.push(format!("{prefix}_score_difference"));
        columns.push(format!("{prefix}_feedback"));
        columns.push(format!("{prefix}_needs_review"));
    }
    columns.push("total_llm_score".to_string());
    columns.push("total_grader_score".to_string());
    columns.push("total_score_difference".to_string());
    columns
}

/// Serialize the whole batch, header included, overwriting any existing file.
/// No partial-write recovery: a mid-write failure is reported and the caller
/// re-runs the write.
pub fn write_results(
    path: &Path,
    records: &[ResultRecord],
    questions: &[QuestionId],
) -> Result<(), StoreError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(result_header(questions))?;
    for record in records {
        let mut row = vec![record.student_id.clone(), record.student_name.clone()];
        for question in &record.questions {
            row.push(question.query.clone());
            row.push(question.grader_score.to_string());
            row.push(question.llm_score.to_string());
            row.push(question.score_difference.to_string());
            row.push(question.feedback.clone());
            row.push(question.needs_review.to_string());
        }
        row.push(record.total_llm_score.to_string());
        row.push(record.total_grader_score.to_string());
        row.push(record.total_score_difference.to_string());
        writer.write_record(&row)?;
    }
    writer.flush()?;
    Ok(())
}

/// One question's scores as reloaded for analysis. Blank or unparsable cells
/// read back as `None` so the statistics filter can tell "missing" apart
/// from a real value.
#[derive(Debug, Clone)]
pub struct ScoredQuestion {
    pub llm_score: Option<f64>,
    pub grader_score: Option<f64>,
    pub score_difference: Option<f64>,
}

/// One results-file row as consumed by the statistics engine.
#[derive(Debug, Clone)]
pub struct ScoredRow {
    pub questions: Vec<ScoredQuestion>,
    pub total_llm_score: Option<f64>,
    pub total_grader_score: Option<f64>,
    pub total_score_difference: Option<f64>,
}

/// Reload the results file for analysis. Unknown extra columns are ignored;
/// a missing expected column is an error.
pub fn read_results(path: &Path, questions: &[QuestionId]) -> Result<Vec<ScoredRow>, StoreError> {
    let mut reader = csv::Reader::from_path(path)?;
    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let index_of = |column: &str| -> Result<usize, StoreError> {
        headers
            .iter()
            .position(|h| h == column)
            .ok_or_else(|| StoreError::MissingColumn(column.to_string()))
    };

    let mut question_indexes = Vec::with_capacity(questions.len());
    for question in questions {
        let prefix = question.column_prefix();
        question_indexes.push((
            index_of(&format!("{prefix}_llm_score"))?,
            index_of(&format!("{prefix}_grader_score"))?,
            index_of(&format!("{prefix}_score_difference"))?,
        ));
    }
    let total_llm_index = index_of("total_llm_score")?;
    let total_grader_index = index_of("total_grader_score")?;
    let total_diff_index = index_of("total_score_difference")?;

    let parse = |row: &csv::StringRecord, index: usize| -> Option<f64> {
        row.get(index).and_then(|v| v.trim().parse::<f64>().ok())
    };

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        rows.push(ScoredRow {
            questions: question_indexes
                .iter()
                .map(|&(llm, grader, diff)| ScoredQuestion {
                    llm_score: parse(&record, llm),
                    grader_score: parse(&record, grader),
                    score_difference: parse(&record, diff),
                })
                .collect(),
            total_llm_score: parse(&record, total_llm_index),
            total_grader_score: parse(&record, total_grader_index),
            total_score_difference: parse(&record, total_diff_index),
        });
    }
    Ok(rows)
}
