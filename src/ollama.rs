//! Grading backend for locally hosted Ollama models.
//!
//! Differs from the remote backend in three ways: a pre-flight reachability
//! probe (a dead local server fails the submission immediately instead of
//! burning the retry budget), reasoning-trace stripping for models that emit
//! their deliberation inline, and a much longer request timeout.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::{Value, json};

use crate::config::OllamaConfig;
use crate::error::ConfigError;
use crate::extract::{extract_payload, grades_from_payload, strip_reasoning};
use crate::grader::{AttemptFuture, ensure_rubric_covers, with_retries};
use crate::models::{GradingOutcome, QuestionGrade, QuestionId};
use crate::prompts::create_grading_prompt;

const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

pub struct OllamaGrader {
    pub(crate) config: OllamaConfig,
    client: reqwest::Client,
    questions: Vec<QuestionId>,
}

impl OllamaGrader {
    pub fn new(config: OllamaConfig, questions: Vec<QuestionId>) -> Result<Self, ConfigError> {
        ensure_rubric_covers(&questions)?;
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs_f64(config.timeout))
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;
        Ok(Self {
            config,
            client,
            questions,
        })
    }

    /// Check that the Ollama server answers at all before sending a prompt.
    async fn server_available(&self) -> bool {
        let url = format!("{}/api/tags", self.config.base_url);
        match self.client.get(url).timeout(PROBE_TIMEOUT).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    pub async fn grade(&self, answers: &HashMap<QuestionId, String>) -> GradingOutcome {
        if !self.server_available().await {
            return GradingOutcome::Failed {
                reason: format!(
                    "Ollama server not reachable at {}. Start it with: ollama serve\n\
                     Then pull the model with: ollama pull {}",
                    self.config.base_url, self.config.model_name
                ),
            };
        }

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
        let url = format!("{}/api/generate", self.config.base_url);
        let body = json!({
            "model": self.config.model_name,
            "prompt": prompt,
            "stream": false,
            "options": {
                "temperature": self.config.temperature,
                "num_predict": self.config.max_tokens,
            },
        });

        let response = self.client.post(url).json(&body).send().await.map_err(|e| {
            if e.is_timeout() {
                "request timed out".to_string()
            } else {
                format!("request failed: {e}")
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(format!("Ollama API error: {status} - {text}"));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| format!("invalid response body: {e}"))?;
        let raw = body.get("response").and_then(Value::as_str).unwrap_or("");
        if raw.trim().is_empty() {
            return Err("empty response from Ollama".to_string());
        }

        let cleaned = strip_reasoning(raw);
        let payload = extract_payload(&cleaned).map_err(|e| e.to_string())?;
        Ok(grades_from_payload(&payload, &self.questions))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config(base_url: String) -> OllamaConfig {
        OllamaConfig {
            base_url,
            max_retries: 2,
            retry_delay: 0.0,
            ..OllamaConfig::default()
        }
    }

    fn questions() -> Vec<QuestionId> {
        vec![QuestionId::new("4.1"), QuestionId::new("4.2")]
    }

    fn answers() -> HashMap<QuestionId, String> {
        let mut answers = HashMap::new();
        answers.insert(
            QuestionId::new("4.1"),
            "SELECT COUNT(*) FROM PART".to_string(),
        );
        answers
    }

    #[test]
    fn test_new_rejects_questions_outside_rubric() {
        let result = OllamaGrader::new(
            test_config("http://127.0.0.1:1".to_string()),
            vec![QuestionId::new("9.9")],
        );
        let err = result.err().expect("construction must fail").to_string();
        assert!(err.contains("9.9"), "error: {err}");
    }

    #[tokio::test]
    async fn test_unreachable_server_fails_without_retrying() {
        let grader =
            OllamaGrader::new(test_config("http://127.0.0.1:1".to_string()), questions()).unwrap();
        let outcome = grader.grade(&answers()).await;
        match outcome {
            GradingOutcome::Failed { reason } => {
                assert!(reason.contains("ollama serve"), "reason: {reason}");
                assert!(reason.contains("ollama pull"), "reason: {reason}");
                // The probe failed before any attempt, so the reason carries
                // the remediation text, not an attempt counter.
                assert!(!reason.contains("attempt"), "reason: {reason}");
            }
            GradingOutcome::Graded { .. } => panic!("expected Failed outcome"),
        }
    }

    #[tokio::test]
    async fn test_grade_success_with_fenced_and_reasoned_output() {
        let mut server = mockito::Server::new_async().await;
        let _tags = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(r#"{"models": []}"#)
            .create_async()
            .await;
        let model_output = "<think>checking joins</think>Here you go:\n```json\n\
            {\"question_4_1\": {\"score\": 10, \"feedback\": \"correct\", \"needs_review\": false},\n\
            \"question_4_2\": {\"score\": 0, \"feedback\": \"no answer\", \"needs_review\": false}}\n```";
        let body = serde_json::to_string(&json!({ "response": model_output })).unwrap();
        let _generate = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let grader = OllamaGrader::new(test_config(server.url()), questions()).unwrap();
        match grader.grade(&answers()).await {
            GradingOutcome::Graded { grades } => {
                assert_eq!(grades[&QuestionId::new("4.1")].score, 10.0);
                assert_eq!(grades[&QuestionId::new("4.2")].feedback, "no answer");
            }
            GradingOutcome::Failed { reason } => panic!("grading failed: {reason}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_exhausts_retries() {
        let mut server = mockito::Server::new_async().await;
        let _tags = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .create_async()
            .await;
        let generate = server
            .mock("POST", "/api/generate")
            .with_status(500)
            .with_body("model crashed")
            .expect(2)
            .create_async()
            .await;

        let grader = OllamaGrader::new(test_config(server.url()), questions()).unwrap();
        match grader.grade(&answers()).await {
            GradingOutcome::Failed { reason } => {
                assert!(reason.contains("500"), "reason: {reason}");
                assert!(reason.contains("attempt 2"), "reason: {reason}");
            }
            GradingOutcome::Graded { .. } => panic!("expected Failed outcome"),
        }
        generate.assert_async().await;
    }

    #[tokio::test]
    async fn test_unparsable_output_becomes_failed() {
        let mut server = mockito::Server::new_async().await;
        let _tags = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .create_async()
            .await;
        let body = serde_json::to_string(&json!({ "response": "I refuse to produce JSON." }))
            .unwrap();
        let _generate = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let grader = OllamaGrader::new(test_config(server.url()), questions()).unwrap();
        match grader.grade(&answers()).await {
            GradingOutcome::Failed { reason } => {
                assert!(reason.contains("no JSON object"), "reason: {reason}");
            }
            GradingOutcome::Graded { .. } => panic!("expected Failed outcome"),
        }
    }

    #[tokio::test]
    async fn test_empty_response_becomes_failed() {
        let mut server = mockito::Server::new_async().await;
        let _tags = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .create_async()
            .await;
        let body = serde_json::to_string(&json!({ "response": "" })).unwrap();
        let _generate = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(body)
            .create_async()
            .await;

        let grader = OllamaGrader::new(test_config(server.url()), questions()).unwrap();
        match grader.grade(&answers()).await {
            GradingOutcome::Failed { reason } => {
                assert!(reason.contains("empty response"), "reason: {reason}");
            }
            GradingOutcome::Graded { .. } => panic!("expected Failed outcome"),
        }
    }
}
