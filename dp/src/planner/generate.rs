//! Generation stage: first candidate plan for a day

use tracing::{debug, info};

use super::Collaborators;
use super::context::DayContext;
use super::error::{Stage, StageError};
use super::response::{PlanPayload, parse_payload};
use super::retry::bounded;
use crate::domain::Candidate;
use crate::prompts::Template;

/// Ask for a plan up to `limit` times, returning the first valid one
pub async fn generate(collab: &Collaborators, ctx: &DayContext, limit: u32) -> Result<Candidate, StageError> {
    debug!(limit, "generate: called");
    let prompt = collab.prompts.render(
        Template::Generation,
        &[&ctx.distant, &ctx.recent, &ctx.event_schema, &ctx.day_type].map(String::as_str),
    )?;
    let candidate = bounded(Stage::Generate, limit, StageError::is_retryable, |attempt| {
        let prompt = prompt.as_str();
        async move {
            debug!(attempt, "generate: asking");
            request_candidate(collab, prompt, "generation").await
        }
    })
    .await?;
    info!(activities = candidate.plan.len(), "Generated candidate plan");
    Ok(candidate)
}

/// One ask-parse-validate round trip shared with replanning
pub(super) async fn request_candidate(
    collab: &Collaborators,
    prompt: &str,
    objective: &str,
) -> Result<Candidate, StageError> {
    let raw = collab.service.ask(prompt, objective).await?;
    let candidate: Candidate = parse_payload::<PlanPayload>(&raw)?.into();
    collab.validator.check(&candidate.plan)?;
    Ok(candidate)
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
            PlanValidator::new(["Office", "Gym"].into_iter().collect()).unwrap(),
        );
        (collab, client)
    }

    fn ctx() -> DayContext {
        DayContext {
            recent: "RECENT".into(),
            distant: "DISTANT".into(),
            event_schema: "SCHEMA".into(),
            day_type: "Today is Weekday.".into(),
            ..DayContext::default()
        }
    }

    #[tokio::test]
    async fn test_first_valid_plan_returned() {
        let (collab, client) = collaborators(&[r#"{"plan": ["Office#1 at 09:00", "Gym#2 at 18:00"], "reason": "usual"}"#]);
        let candidate = generate(&collab, &ctx(), 3).await.unwrap();
        assert_eq!(candidate.plan.activities(), ["Office#1 at 09:00", "Gym#2 at 18:00"]);
        assert_eq!(candidate.reason, "usual");
        assert_eq!(client.call_count(), 1);

        let prompt = &client.prompts()[0];
        assert!(prompt.contains("Plan the activities of the day being simulated."));
        let d = prompt.find("DISTANT").unwrap();
        let r = prompt.find("RECENT").unwrap();
        assert!(d < r);
        assert!(prompt.contains("SCHEMA"));
    }

    #[tokio::test]
    async fn test_retries_past_bad_responses() {
        let (collab, client) = collaborators(&[
            "",
            "not json at all",
            r#"{"plan": ["Library#1 at 09:00"], "reason": "unknown place"}"#,
        ]);
        let err = generate(&collab, &ctx(), 3).await.unwrap_err();
        assert!(matches!(err, StageError::RetriesExhausted { stage: Stage::Generate, attempts: 3, .. }));
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_recovers_on_third_attempt() {
        let (collab, client) = collaborators(&[
            r#"{"plan": [], "reason": "nothing"}"#,
            r#"{"plan": ["Gym#2 at 6:00 pm"], "reason": "evening"}"#,
            r#"```json
{"plan": ["Gym#2 at 18:00"], "reason": "evening"}
```"#,
        ]);
        let candidate = generate(&collab, &ctx(), 3).await.unwrap();
        assert_eq!(candidate.plan.activities(), ["Gym#2 at 18:00"]);
        assert_eq!(client.call_count(), 3);
    }

    #[tokio::test]
    async fn test_service_failure_propagates() {
        let (collab, _client) = collaborators(&[]);
        assert!(generate(&collab, &ctx(), 3).await.unwrap_err().is_fatal());
    }
}
