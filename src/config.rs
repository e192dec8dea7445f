use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::models::QuestionId;

/// Configuration for the Gemini API backend.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: String,
    /// OpenAI-compatible endpoint for the Gemini API.
    pub api_base: String,
    pub model_name: String,
    pub temperature: f64,
    pub max_retries: u32,
    /// Fixed delay between attempts, in seconds.
    pub retry_delay: f64,
}

impl GeminiConfig {
    /// Read the API key from the environment. A missing key is a fatal
    /// startup error, not something to retry.
    pub fn from_env() -> Result<Self, ConfigError> {
        let api_key = std::env::var("GEMINI_API_KEY").map_err(|_| ConfigError::MissingApiKey)?;
        if api_key.is_empty() {
            return Err(ConfigError::MissingApiKey);
        }
        Ok(Self {
            api_key,
            api_base: "https://generativelanguage.googleapis.com/v1beta/openai".to_string(),
            model_name: "gemini-2.5-flash".to_string(),
            temperature: 0.0,
            max_retries: 3,
            retry_delay: 2.0,
        })
    }
}

/// Configuration for locally hosted Ollama models.
#[derive(Debug, Clone)]
pub struct OllamaConfig {
    pub model_name: String,
    pub base_url: String,
    pub temperature: f64,
    pub max_tokens: u32,
    pub max_retries: u32,
    /// Fixed delay between attempts, in seconds.
    pub retry_delay: f64,
    /// Request timeout in seconds. Local inference is slow, so this is much
    /// longer than a typical API timeout.
    pub timeout: f64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            model_name: "llama3.1:8b".to_string(),
            base_url: "http://localhost:11434".to_string(),
            temperature: 0.0,
            max_tokens: 4096,
            max_retries: 3,
            retry_delay: 2.0,
            timeout: 300.0,
        }
    }
}

/// CSV column names holding one question's answer text and human score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMap {
    pub response: String,
    pub score: String,
}

/// Grading parameters: the question set and how it maps onto the submissions
/// file schema. Built once at startup and passed down to every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GradingConfig {
    #[serde(default = "default_questions")]
    pub questions: Vec<QuestionId>,
    #[serde(default = "default_points_per_question")]
    pub points_per_question: u32,
    #[serde(default = "default_student_id_column")]
    pub student_id_column: String,
    #[serde(default = "default_student_name_column")]
    pub student_name_column: String,
    /// Explicit column mapping per question. Questions absent from this map
    /// fall back to the "Question {id} Response" / "Question {id} Score"
    /// naming convention.
    #[serde(default)]
    pub question_columns: HashMap<QuestionId, ColumnMap>,
}

fn default_questions() -> Vec<QuestionId> {
    crate::prompts::rubric_questions()
}

fn default_points_per_question() -> u32 {
    10
}

fn default_student_id_column() -> String {
    "Student ID".to_string()
}

fn default_student_name_column() -> String {
    "Name".to_string()
}

impl Default for GradingConfig {
    fn default() -> Self {
        Self {
            questions: default_questions(),
            points_per_question: default_points_per_question(),
            student_id_column: default_student_id_column(),
            student_name_column: default_student_name_column(),
            question_columns: HashMap::new(),
        }
    }
}

impl GradingConfig {
    /// Load grading parameters from a TOML file. Missing fields keep their
    /// defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.display().to_string(),
            source,
        })?;
        toml::from_str(&content).map_err(|source| ConfigError::ParseFile {
            path: path.display().to_string(),
            source,
        })
    }

    /// Column names for one question, using the explicit mapping when
    /// configured and the naming convention otherwise.
    pub fn columns_for(&self, question: &QuestionId) -> ColumnMap {
        self.question_columns
            .get(question)
            .cloned()
            .unwrap_or_else(|| ColumnMap {
                response: format!("Question {question} Response"),
                score: format!("Question {question} Score"),
            })
    }

    pub fn total_points(&self) -> u32 {
        self.points_per_question * self.questions.len() as u32
    }
}
