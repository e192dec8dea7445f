//! Recovers a structured grading payload from free-form model output.
//!
//! Different model families wrap their answers differently and none of them
//! follow the output-format instruction reliably, so extraction is a layered
//! series of fallbacks: fenced ```json block, any fenced block, then the
//! first-`{`-to-last-`}` span. Truly unparsable output fails loudly; scores
//! are never silently substituted.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::ExtractError;
use crate::models::{QuestionGrade, QuestionId};

const THINK_OPEN: &str = "<think>";
const THINK_CLOSE: &str = "</think>";

/// Remove `<think>...</think>` blocks that reasoning models emit inline with
/// the answer. An unterminated block swallows the rest of the text.
pub fn strip_reasoning(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find(THINK_OPEN) {
        out.push_str(&rest[..start]);
        match rest[start..].find(THINK_CLOSE) {
            Some(close) => rest = &rest[start + close + THINK_CLOSE.len()..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out.trim().to_string()
}

fn fenced_interior<'a>(text: &'a str, fence: &str) -> Option<&'a str> {
    let start = text.find(fence)? + fence.len();
    let end = text[start..].find("```")?;
    Some(&text[start..start + end])
}

/// Extract the JSON grading object from raw model output.
pub fn extract_payload(raw: &str) -> Result<Value, ExtractError> {
    let mut text = raw.trim();

    if let Some(inner) = fenced_interior(text, "```json") {
        text = inner;
    } else if let Some(inner) = fenced_interior(text, "```") {
        text = inner;
    }
    let text = text.trim();

    // Slice to the outermost brace pair; this drops any commentary the model
    // added around the object despite instructions.
    let span = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => return Err(ExtractError::NoJsonObject),
    };

    Ok(serde_json::from_str(span)?)
}

/// Map the payload object onto the configured question set. Questions the
/// model skipped are simply absent; a malformed per-question entry degrades
/// to field defaults rather than aborting the whole record.
pub fn grades_from_payload(
    payload: &Value,
    questions: &[QuestionId],
) -> HashMap<QuestionId, QuestionGrade> {
    let mut grades = HashMap::new();
    for question in questions {
        let Some(entry) = payload.get(question.payload_key()) else {
            continue;
        };
        let score = entry
            .get("score")
            .and_then(Value::as_f64)
            .unwrap_or(0.0)
            .clamp(0.0, 10.0);
        let feedback = entry
            .get("feedback")
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string();
        let needs_review = entry
            .get("needs_review")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        grades.insert(
            question.clone(),
            QuestionGrade {
                score,
                feedback,
                needs_review,
            },
        );
    }
    grades
}
