use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use async_openai::{Client, config::OpenAIConfig, types::CreateChatCompletionRequestArgs};
use tokio::time::sleep;

use crate::config::GeminiConfig;
use crate::error::ConfigError;
use crate::extract::{extract_payload, grades_from_payload};
use crate::models::{GradingOutcome, QuestionGrade, QuestionId};
use crate::ollama::OllamaGrader;
use crate::prompts::{create_grading_prompt, unsupported_questions};

pub(crate) type AttemptFuture<'a, T> =
    Pin<Box<dyn Future<Output = Result<T, String>> + Send + 'a>>;

/// Run `attempt` up to `max_retries` times with a fixed delay between
/// attempts. Returns the last attempt's error on exhaustion.
pub(crate) async fn with_retries<'a, T>(
    max_retries: u32,
    retry_delay: Duration,
    mut attempt: impl FnMut(u32) -> AttemptFuture<'a, T>,
) -> Result<T, String> {
    let attempts = max_retries.max(1);
    let mut last_error = String::from("no attempts were made");
    for n in 1..=attempts {
        match attempt(n).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                last_error = format!("{err} (attempt {n})");
                if n < attempts {
                    sleep(retry_delay).await;
                }
            }
        }
    }
    Err(last_error)
}

/// Refuse question sets the fixed rubric cannot grade. Without this check a
/// well-formed model reply would simply lack the configured payload keys and
/// every question would score 0 while the outcome still reads as graded.
pub(crate) fn ensure_rubric_covers(questions: &[QuestionId]) -> Result<(), ConfigError> {
    let unsupported = unsupported_questions(questions);
    if unsupported.is_empty() {
        return Ok(());
    }
    Err(ConfigError::UnsupportedQuestions(
        unsupported
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", "),
    ))
}

/// The grading backend. Callers only ever see `grade`; which provider sits
/// behind it is decided once, at construction time.
pub enum Backend {
    Gemini(GeminiGrader),
    Ollama(OllamaGrader),
}

impl Backend {
    pub async fn grade(&self, answers: &HashMap<QuestionId, String>) -> GradingOutcome {
        match self {
            Backend::Gemini(grader) => grader.grade(answers).await,
            Backend::Ollama(grader) => grader.grade(answers).await,
        }
    }

    pub fn model_name(&self) -> &str {
        match self {
            Backend::Gemini(grader) => &grader.config.model_name,
            Backend::Ollama(grader) => &grader.config.model_name,
        }
    }
}

/// Grades submissions through the Gemini API (OpenAI-compatible endpoint).
pub struct GeminiGrader {
    pub(crate) config: GeminiConfig,
    client: Client<OpenAIConfig>,
    questions: Vec<QuestionId>,
}

impl GeminiGrader {
    pub fn new(config: GeminiConfig, questions: Vec<QuestionId>) -> Result<Self, ConfigError> {
        ensure_rubric_covers(&questions)?;
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.api_key.clone())
            .with_api_base(config.api_base.clone());
        Ok(Self {
            config,
            client: Client::with_config(openai_config),
            questions,
        })
    }

    /// Grade one submission. Provider errors, timeouts and malformed output
    /// are retried; exhaustion becomes a `Failed` outcome, never an error.
    pub async fn grade(&self, answers: &HashMap<QuestionId, String>) -> GradingOutcome {
        let prompt_text = create_grading_prompt(answers);
        let prompt = prompt_text.as_str();
        let retry_delay = Duration::from_secs_f64(self.config.retry_delay);

        let result = with_retries(self.config.max_retries, retry_delay, move |_| {
            Box::pin(self.attempt(prompt)) as AttemptFuture<'_, _>
        })
        .await;

        match result {
            Ok(grades) => GradingOutcome::Graded { grades },
            Err(reason) => GradingOutcome::Failed { reason },
        }
    }

    async fn attempt(&self, prompt: &str) -> Result<HashMap<QuestionId, QuestionGrade>, String> {
        let user_message = async_openai::types::ChatCompletionRequestUserMessageArgs::default()
            .content(prompt.to_string())
            .build()
            .map_err(|e| format!("failed to build request message: {e}"))?
            .into();

        let request = CreateChatCompletionRequestArgs::default()
            .model(self.config.model_name.clone())
            .messages([user_message])
            .temperature(self.config.temperature as f32)
            .build()
            .map_err(|e| format!("failed to build chat completion request: {e}"))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e| format!("Gemini API error: {e}"))?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .unwrap_or_default();
        if content.trim().is_empty() {
            return Err("empty response from model".to_string());
        }

        let payload = extract_payload(&content).map_err(|e| e.to_string())?;
        Ok(grades_from_payload(&payload, &self.questions))
    }
}
