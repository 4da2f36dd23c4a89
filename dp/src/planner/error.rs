//! Stage-level error taxonomy for the planning loop

use std::time::Duration;

use thiserror::Error;

use super::validator::FormatViolation;
use crate::llm::LlmError;
use crate::prompts::PromptError;

/// Which bounded stage produced an error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Generate,
    Replan,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generate => f.write_str("generate"),
            Self::Replan => f.write_str("replan"),
        }
    }
}

/// Errors raised inside one planning stage
///
/// Everything except `Service` and `Template` is local to the day: it counts
/// against the stage's attempt budget or sends the day to fallback.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("generation service returned an empty response")]
    EmptyResponse,

    #[error("malformed structured response: {0}")]
    Parse(String),

    #[error("plan failed validation: {0}")]
    Format(#[from] FormatViolation),

    #[error("incomplete judgment ({detail})")]
    ReflectionIncomplete { detail: String, reason: Option<String> },

    #[error("request exceeded its {0:?} deadline")]
    Deadline(Duration),

    #[error("{stage} exhausted {attempts} attempts, last error: {last}")]
    RetriesExhausted { stage: Stage, attempts: u32, last: String },

    #[error("cannot build fallback from prior entry: {0}")]
    FallbackConstruction(String),

    #[error("provider refused the request: {0}")]
    Refused(LlmError),

    #[error("generation service failed: {0}")]
    Service(#[from] LlmError),

    #[error(transparent)]
    Template(#[from] PromptError),
}

impl StageError {
    /// Whether another attempt of the same stage may succeed
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::EmptyResponse | Self::Parse(_) | Self::Format(_) | Self::Deadline(_) | Self::Refused(_)
        )
    }

    /// Whether the run itself should stop
    ///
    /// A template that cannot render will fail the same way for every person,
    /// so it is treated like an unreachable service.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Service(_) | Self::Template(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StageError::EmptyResponse.is_retryable());
        assert!(StageError::Parse("x".into()).is_retryable());
        assert!(StageError::Format(FormatViolation::EmptyPlan).is_retryable());
        assert!(StageError::Deadline(Duration::from_secs(1)).is_retryable());
        assert!(!StageError::Service(LlmError::MissingApiKey("K".into())).is_retryable());
        assert!(
            !StageError::RetriesExhausted {
                stage: Stage::Generate,
                attempts: 3,
                last: "x".into()
            }
            .is_retryable()
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(StageError::Service(LlmError::MissingApiKey("K".into())).is_fatal());
        assert!(StageError::Template(PromptError::NotFound("x".into())).is_fatal());
        assert!(!StageError::Parse("x".into()).is_fatal());
        assert!(!StageError::FallbackConstruction("x".into()).is_fatal());
        let refused = StageError::Refused(LlmError::Status {
            status: 400,
            body: "content_filter".into(),
        });
        assert!(!refused.is_fatal());
        assert!(refused.is_retryable());
    }

    #[test]
    fn test_exhausted_message() {
        let err = StageError::RetriesExhausted {
            stage: Stage::Replan,
            attempts: 3,
            last: "plan failed validation: plan has no activities".into(),
        };
        assert_eq!(
            err.to_string(),
            "replan exhausted 3 attempts, last error: plan failed validation: plan has no activities"
        );
    }
}
