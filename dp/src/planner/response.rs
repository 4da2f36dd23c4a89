//! Structured-response extraction
//!
//! Model output is JSON delivered as free text. Code fences are stripped and
//! the outermost brace-delimited object is cut out before parsing, so chatter
//! around the payload does not matter.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::StageError;
use crate::domain::{Candidate, Plan};

/// Cut the outermost `{...}` object out of raw model text
pub fn extract_object(raw: &str) -> Result<&str, StageError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(StageError::EmptyResponse);
    }
    let text = text
        .strip_prefix("```json")
        .or_else(|| text.strip_prefix("```"))
        .unwrap_or(text);
    let text = text.strip_suffix("```").unwrap_or(text);

    let start = text.find('{');
    let end = text.rfind('}');
    match (start, end) {
        (Some(start), Some(end)) if start < end => Ok(&text[start..=end]),
        _ => Err(StageError::Parse("no JSON object in response".to_string())),
    }
}

/// Extract and deserialize a structured payload
pub fn parse_payload<T: DeserializeOwned>(raw: &str) -> Result<T, StageError> {
    debug!(len = raw.len(), "parse_payload: called");
    let object = extract_object(raw)?;
    serde_json::from_str(object).map_err(|e| StageError::Parse(e.to_string()))
}

/// `{"plan": [...], "reason": "..."}` as returned by generation and replanning
#[derive(Debug, Clone, Deserialize)]
pub struct PlanPayload {
    pub plan: Vec<String>,
    pub reason: String,
}

impl From<PlanPayload> for Candidate {
    fn from(payload: PlanPayload) -> Self {
        Candidate::new(Plan::new(payload.plan), payload.reason)
    }
}
