//! Replan stage: revise a rejected candidate

use tracing::{debug, info};

use super::Collaborators;
use super::context::DayContext;
use super::error::{Stage, StageError};
use super::generate::request_candidate;
use super::retry::bounded;
use crate::domain::Candidate;
use crate::prompts::Template;

/// Ask for a revised plan given the rejected one and why it was rejected
pub async fn replan(
    collab: &Collaborators,
    ctx: &DayContext,
    rejected: &Candidate,
    rejection_reason: &str,
    limit: u32,
) -> Result<Candidate, StageError> {
    debug!(limit, rejected = rejected.plan.len(), "replan: called");
    let rejected_plan = rejected.plan.to_prompt_text();
    let prompt = collab.prompts.render(
        Template::Regeneration,
        &[
            ctx.distant.as_str(),
            ctx.recent.as_str(),
            ctx.event_schema.as_str(),
            ctx.day_type.as_str(),
            rejected_plan.as_str(),
            rejection_reason,
        ],
    )?;
    let candidate = bounded(Stage::Replan, limit, StageError::is_retryable, |attempt| {
        let prompt = prompt.as_str();
        async move {
            debug!(attempt, "replan: asking");
            request_candidate(collab, prompt, "regeneration").await
        }
    })
    .await?;
    info!(activities = candidate.plan.len(), "Replanned candidate");
    Ok(candidate)
}
