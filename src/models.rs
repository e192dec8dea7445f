use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// Placeholder substituted for a blank or missing answer before grading.
pub const NO_ANSWER: &str = "[NO ANSWER PROVIDED]";

/// Sentinel written to every model-derived field when grading failed.
/// Distinct from any legitimate 0-10 score.
pub const FAILED_SCORE: f64 = -1.0;

/// Feedback text written to every question of a failed record.
pub const MANUAL_REVIEW_FEEDBACK: &str = "Grading failed - requires manual review";

/// Identifier for one rubric question (e.g. "4.1").
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QuestionId(String);

impl QuestionId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Key under which the model reports this question in its JSON payload,
    /// e.g. "4.1" -> "question_4_1".
    pub fn payload_key(&self) -> String {
        format!("question_{}", self.0.replace('.', "_"))
    }

    /// Prefix used for this question's columns in the results file,
    /// e.g. "4.1" -> "q4_1".
    pub fn column_prefix(&self) -> String {
        format!("q{}", self.0.replace('.', "_"))
    }
}

impl fmt::Display for QuestionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One student's submission, normalized by the loader: every configured
/// question has an answer (possibly the no-answer sentinel) and a human score.
#[derive(Debug, Clone)]
pub struct Submission {
    pub student_id: String,
    pub student_name: String,
    pub answers: HashMap<QuestionId, String>,
    pub grader_scores: HashMap<QuestionId, f64>,
}

/// The model's verdict on a single question.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionGrade {
    pub score: f64,
    pub feedback: String,
    pub needs_review: bool,
}

/// Outcome of grading one submission. Backends never return errors to the
/// caller; every provider failure ends up as `Failed` with a reason.
#[derive(Debug, Clone)]
pub enum GradingOutcome {
    Graded {
        grades: HashMap<QuestionId, QuestionGrade>,
    },
    Failed {
        reason: String,
    },
}

/// Per-question slice of a result record.
#[derive(Debug, Clone, PartialEq)]
pub struct QuestionResult {
    pub question: QuestionId,
    pub query: String,
    pub grader_score: f64,
    pub llm_score: f64,
    pub score_difference: f64,
    pub feedback: String,
    pub needs_review: bool,
}

/// The durable per-student record: human and model scores side by side for
/// every question, plus totals. Created once by the aggregator, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub struct ResultRecord {
    pub student_id: String,
    pub student_name: String,
    pub questions: Vec<QuestionResult>,
    pub total_llm_score: f64,
    pub total_grader_score: f64,
    pub total_score_difference: f64,
}

/// Round to one decimal place, the precision used for all score arithmetic.
pub fn round1(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
