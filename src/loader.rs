use std::collections::HashMap;
use std::path::Path;

use crate::config::GradingConfig;
use crate::error::LoadError;
use crate::models::{NO_ANSWER, QuestionId, Submission};

/// Loads student submissions from a CSV file and normalizes them.
///
/// Rows are kept in source order. Duplicate student ids are preserved as-is;
/// the file may legitimately contain multiple attempts and deduplication is
/// not this component's call to make.
pub struct SubmissionLoader {
    headers: Vec<String>,
    rows: Vec<csv::StringRecord>,
    config: GradingConfig,
}

impl SubmissionLoader {
    /// Read the whole submissions file eagerly.
    pub fn load(path: &Path, config: &GradingConfig) -> Result<Self, LoadError> {
        let wrap = |source: csv::Error| LoadError {
            path: path.display().to_string(),
            source,
        };
        let mut reader = csv::Reader::from_path(path).map_err(wrap)?;
        let headers = reader
            .headers()
            .map_err(wrap)?
            .iter()
            .map(str::to_string)
            .collect();
        let rows = reader
            .records()
            .collect::<Result<Vec<_>, _>>()
            .map_err(wrap)?;
        Ok(Self {
            headers,
            rows,
            config: config.clone(),
        })
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Pre-flight schema check: every expected column that is absent from the
    /// header row, in configuration order. Empty means the schema is usable.
    pub fn validate_schema(&self) -> Vec<String> {
        let mut missing = Vec::new();
        let mut check = |column: &str| {
            if !self.headers.iter().any(|h| h == column) {
                missing.push(column.to_string());
            }
        };
        check(&self.config.student_id_column);
        check(&self.config.student_name_column);
        for question in &self.config.questions {
            let columns = self.config.columns_for(question);
            check(&columns.response);
            check(&columns.score);
        }
        missing
    }

    /// Normalized submissions in source-row order, optionally capped.
    ///
    /// Blank or missing answer text becomes the no-answer sentinel; blank or
    /// unparsable human scores become 0.0; identity fields pass through as
    /// text.
    pub fn submissions(&self, limit: Option<usize>) -> Vec<Submission> {
        let index_of =
            |column: &str| -> Option<usize> { self.headers.iter().position(|h| h == column) };
        let id_index = index_of(&self.config.student_id_column);
        let name_index = index_of(&self.config.student_name_column);
        let question_indexes: Vec<(QuestionId, Option<usize>, Option<usize>)> = self
            .config
            .questions
            .iter()
            .map(|question| {
                let columns = self.config.columns_for(question);
                (
                    question.clone(),
                    index_of(&columns.response),
                    index_of(&columns.score),
                )
            })
            .collect();

        let take = limit.unwrap_or(self.rows.len());
        self.rows
            .iter()
            .take(take)
            .map(|row| {
                let field = |index: Option<usize>| -> &str {
                    index.and_then(|i| row.get(i)).unwrap_or("")
                };

                let mut answers = HashMap::new();
                let mut grader_scores = HashMap::new();
                for (question, response_index, score_index) in &question_indexes {
                    let answer = field(*response_index).trim();
                    let answer = if answer.is_empty() { NO_ANSWER } else { answer };
                    answers.insert(question.clone(), answer.to_string());

                    let score = field(*score_index).trim().parse::<f64>().unwrap_or(0.0);
                    grader_scores.insert(question.clone(), score);
                }

                Submission {
                    student_id: field(id_index).trim().to_string(),
                    student_name: field(name_index).trim().to_string(),
                    answers,
                    grader_scores,
                }
            })
            .collect()
    }
}
