//! Reflection stage: semantic judgment of a candidate plan
//!
//! Two chained requests. The candidate is first condensed into an action
//! gist, then judged against the event gist and the person's pattern gist.

use serde_json::Value;
use tracing::{debug, info, warn};

use super::Collaborators;
use super::error::StageError;
use super::response::extract_object;
use crate::domain::Candidate;
use crate::prompts::Template;

/// Rejection reason used when no judgment could be read
pub const REFLECTION_FAILED: &str = "Reflection failed";

const PATTERN_KEY: &str = "coherence_with_pattern";
const EVENT_KEY: &str = "coherence_with_event";
const REASON_KEY: &str = "reason";

/// A well-formed judgment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JudgmentResult {
    pub coherence_with_pattern: bool,
    pub coherence_with_event: bool,
    pub reason: String,
}

impl JudgmentResult {
    /// Parse raw model text into a judgment
    ///
    /// All three keys must be present with both coherence flags boolean.
    /// Anything else is `ReflectionIncomplete`, carrying whatever textual
    /// reason was present.
    pub fn parse(raw: &str) -> Result<Self, StageError> {
        debug!(len = raw.len(), "JudgmentResult::parse: called");
        let object = extract_object(raw)?;
        let value: Value = serde_json::from_str(object).map_err(|e| StageError::Parse(e.to_string()))?;
        let Value::Object(map) = value else {
            return Err(StageError::Parse("judgment is not an object".to_string()));
        };

        let reason = map.get(REASON_KEY).and_then(Value::as_str).map(str::to_string);
        let incomplete = |detail: String| StageError::ReflectionIncomplete {
            detail,
            reason: reason.clone(),
        };

        let flag = |key: &str| match map.get(key) {
            None => Err(incomplete(format!("missing {key}"))),
            Some(Value::Bool(b)) => Ok(*b),
            Some(other) => Err(incomplete(format!("{key} is not a boolean: {other}"))),
        };
        let coherence_with_pattern = flag(PATTERN_KEY)?;
        let coherence_with_event = flag(EVENT_KEY)?;

        let reason = match map.get(REASON_KEY) {
            None => return Err(incomplete(format!("missing {REASON_KEY}"))),
            Some(Value::String(s)) => s.clone(),
            Some(other) => other.to_string(),
        };

        Ok(Self {
            coherence_with_pattern,
            coherence_with_event,
            reason,
        })
    }

    /// Both coherence checks passed
    pub fn is_accepted(&self) -> bool {
        self.coherence_with_pattern && self.coherence_with_event
    }
}

/// Outcome of reflecting on one candidate
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Accepted,
    Rejected { reason: String },
}

impl Verdict {
    /// Verdict for a parse attempt; malformed judgments are rejections
    pub fn from_judgment(judgment: Result<JudgmentResult, StageError>) -> Self {
        match judgment {
            Ok(j) if j.is_accepted() => Self::Accepted,
            Ok(j) => Self::Rejected { reason: j.reason },
            Err(StageError::ReflectionIncomplete {
                detail,
                reason: Some(reason),
            }) => {
                warn!(%detail, "Incomplete judgment, using its reason");
                Self::Rejected { reason }
            }
            Err(e) => {
                warn!(error = %e, "Judgment unreadable");
                Self::Rejected {
                    reason: REFLECTION_FAILED.to_string(),
                }
            }
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }
}

/// Judge a candidate against the event and pattern gists
///
/// Only fatal errors are returned as `Err`; every other failure becomes a
/// rejection so the caller can replan.
pub async fn reflect(
    collab: &Collaborators,
    candidate: &Candidate,
    event_gist: &str,
    pattern_gist: &str,
) -> Result<Verdict, StageError> {
    debug!(activities = candidate.plan.len(), "reflect: called");
    let plan_text = candidate.plan.to_prompt_text();
    let prompt = collab
        .prompts
        .render(Template::ActionGist, &[plan_text.as_str(), candidate.reason.as_str()])?;
    let action_gist = match collab.service.ask(&prompt, "action-gist").await {
        Ok(text) => text.trim().to_string(),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => return Ok(Verdict::from_judgment(Err(e))),
    };

    let prompt = collab
        .prompts
        .render(Template::Reflection, &[event_gist, pattern_gist, action_gist.as_str()])?;
    let judgment = match collab.service.ask(&prompt, "reflection").await {
        Ok(raw) => JudgmentResult::parse(&raw),
        Err(e) if e.is_fatal() => return Err(e),
        Err(e) => Err(e),
    };

    let verdict = Verdict::from_judgment(judgment);
    match &verdict {
        Verdict::Accepted => info!("Reflection accepted candidate"),
        Verdict::Rejected { reason } => info!(%reason, "Reflection rejected candidate"),
    }
    Ok(verdict)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::mock::MockLlmClient;
    use crate::planner::{GenerationService, PlanValidator};
    use crate::prompts::PromptLoader;
    use std::sync::Arc;
    use std::time::Duration;

    fn collaborators(texts: &[&str]) -> (Collaborators, Arc<MockLlmClient>) {
        let client = Arc::new(MockLlmClient::with_texts(texts));
        let collab = Collaborators::new(
            GenerationService::with_deadline(client.clone(), Duration::from_secs(5)),
            PromptLoader::embedded_only().unwrap(),
            PlanValidator::new(["Office"].into_iter().collect()).unwrap(),
        );
        (collab, client)
    }

    fn candidate() -> Candidate {
        Candidate::new(vec!["Office#1 at 09:00".to_string()], "weekday")
    }

    #[test]
    fn test_parse_accepted() {
        let j = JudgmentResult::parse(r#"{"coherence_with_pattern": true, "coherence_with_event": true, "reason": "ok"}"#)
            .unwrap();
        assert!(j.is_accepted());
        assert_eq!(j.reason, "ok");
    }

    #[test]
    fn test_parse_one_false_rejected() {
        let j = JudgmentResult::parse(r#"{"coherence_with_pattern": true, "coherence_with_event": false, "reason": "x"}"#)
            .unwrap();
        assert!(!j.is_accepted());
        assert_eq!(
            Verdict::from_judgment(Ok(j)),
            Verdict::Rejected { reason: "x".to_string() }
        );
    }

    #[test]
    fn test_missing_reason_rejected() {
        let result = JudgmentResult::parse(r#"{"coherence_with_pattern": true, "coherence_with_event": true}"#);
        assert!(matches!(result, Err(StageError::ReflectionIncomplete { reason: None, .. })));
        assert_eq!(
            Verdict::from_judgment(result),
            Verdict::Rejected {
                reason: REFLECTION_FAILED.to_string()
            }
        );
    }

    #[test]
    fn test_non_boolean_flag_rejected() {
        let result =
            JudgmentResult::parse(r#"{"coherence_with_pattern": "true", "coherence_with_event": true, "reason": "r"}"#);
        assert!(matches!(result, Err(StageError::ReflectionIncomplete { .. })));
        assert_eq!(
            Verdict::from_judgment(result),
            Verdict::Rejected { reason: "r".to_string() }
        );
    }

    #[test]
    fn test_fenced_judgment() {
        let raw = "```json\n{\"coherence_with_pattern\": true, \"coherence_with_event\": true, \"reason\": \"fine\"}\n```";
        assert!(JudgmentResult::parse(raw).unwrap().is_accepted());
    }

    #[test]
    fn test_garbage_is_failure_not_panic() {
        assert!(matches!(JudgmentResult::parse("yes"), Err(StageError::Parse(_))));
        assert!(matches!(JudgmentResult::parse("{not json}"), Err(StageError::Parse(_))));
        assert!(!Verdict::from_judgment(JudgmentResult::parse("yes")).is_accepted());
    }

    #[tokio::test]
    async fn test_reflect_chains_two_requests() {
        let (collab, client) = collaborators(&[
            "Goes to the office in the morning.",
            r#"{"coherence_with_pattern": true, "coherence_with_event": true, "reason": "ok"}"#,
        ]);
        let verdict = reflect(&collab, &candidate(), "EVENT", "PATTERN").await.unwrap();
        assert_eq!(verdict, Verdict::Accepted);

        let prompts = client.prompts();
        assert_eq!(prompts.len(), 2);
        assert!(prompts[0].contains("Summarize the proposed plan"));
        assert!(prompts[0].contains(r#"["Office#1 at 09:00"]"#));
        assert!(prompts[1].contains("Judge whether the proposed day"));
        assert!(prompts[1].contains("Goes to the office in the morning."));
        assert!(prompts[1].contains("EVENT"));
        assert!(prompts[1].contains("PATTERN"));
    }

    #[tokio::test]
    async fn test_reflect_rejection_carries_reason() {
        let (collab, _client) = collaborators(&[
            "gist",
            r#"{"coherence_with_pattern": false, "coherence_with_event": true, "reason": "never works on Sunday"}"#,
        ]);
        let verdict = reflect(&collab, &candidate(), "e", "p").await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Rejected {
                reason: "never works on Sunday".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_reflect_empty_action_gist_is_rejection() {
        let (collab, client) = collaborators(&[""]);
        let verdict = reflect(&collab, &candidate(), "e", "p").await.unwrap();
        assert_eq!(
            verdict,
            Verdict::Rejected {
                reason: REFLECTION_FAILED.to_string()
            }
        );
        assert_eq!(client.call_count(), 1);
    }

    #[tokio::test]
    async fn test_reflect_service_failure_is_fatal() {
        let (collab, _client) = collaborators(&["gist"]);
        assert!(reflect(&collab, &candidate(), "e", "p").await.unwrap_err().is_fatal());
    }
}
