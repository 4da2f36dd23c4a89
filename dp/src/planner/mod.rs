//! Per-day planning loop
//!
//! History selection, bounded generation, reflection, bounded replanning and
//! the heuristic fallback, composed by [`DayPlanner`].

use std::sync::Arc;

mod context;
mod engine;
mod error;
mod fallback;
mod generate;
pub mod history;
mod reflect;
mod replan;
pub mod response;
pub mod retry;
mod service;
mod validator;

pub use context::{DayContext, EventCalendar, day_type};
pub use engine::{DayOutcome, DayPlanner, FallbackCause, PersonReport};
pub use error::{Stage, StageError};
pub use fallback::{fallback_plan, substitute};
pub use generate::generate;
pub use reflect::{JudgmentResult, Verdict, reflect};
pub use replan::replan;
pub use service::GenerationService;
pub use validator::{FormatViolation, LocationVocabulary, PlanValidator};

use crate::prompts::PromptLoader;

/// Shared, read-only services every stage needs
#[derive(Clone)]
pub struct Collaborators {
    pub service: Arc<GenerationService>,
    pub prompts: Arc<PromptLoader>,
    pub validator: Arc<PlanValidator>,
}

impl Collaborators {
    pub fn new(service: GenerationService, prompts: PromptLoader, validator: PlanValidator) -> Self {
        Self {
            service: Arc::new(service),
            prompts: Arc::new(prompts),
            validator: Arc::new(validator),
        }
    }
}
