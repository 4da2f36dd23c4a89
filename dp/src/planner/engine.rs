//! DayPlanner - the per-day state machine and the per-person walk
//!
//! ```text
//! SelectContext -> Generate -> Reflect -> Accept
//!                     |          |  ^
//!                     |          v  |
//!                     |        Replan
//!                     v          |
//!                  Fallback <----+ (failure or exhausted rounds)
//! ```

use chrono::NaiveDate;
use tracing::{debug, info, warn};

use super::Collaborators;
use super::context::{DayContext, EventCalendar};
use super::error::StageError;
use super::fallback::fallback_plan;
use super::generate::generate;
use super::reflect::{Verdict, reflect};
use super::replan::replan;
use crate::config::PlannerConfig;
use crate::domain::{Candidate, Person, RoutineEntry, WorldInteraction};

/// Why a day ended in fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FallbackCause {
    /// Generation used its whole attempt budget
    GenerationFailed(String),
    /// A replan after rejection used its whole attempt budget
    ReplanFailed(String),
    /// Every reflection round rejected its candidate
    ReflectionExhausted,
}

impl std::fmt::Display for FallbackCause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::GenerationFailed(e) => write!(f, "generation failed: {e}"),
            Self::ReplanFailed(e) => write!(f, "replan failed: {e}"),
            Self::ReflectionExhausted => f.write_str("reflection rounds exhausted"),
        }
    }
}

/// How one day was planned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DayOutcome {
    Accepted { candidate: Candidate, replans: u32 },
    Fallback { text: String, cause: FallbackCause, replans: u32 },
}

impl DayOutcome {
    /// Text recorded as the day's result
    pub fn text(&self, date: NaiveDate) -> String {
        match self {
            Self::Accepted { candidate, .. } => candidate.plan.render(date),
            Self::Fallback { text, .. } => text.clone(),
        }
    }

    pub fn replans(&self) -> u32 {
        match self {
            Self::Accepted { replans, .. } | Self::Fallback { replans, .. } => *replans,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted { .. })
    }
}

/// Result of walking one person through every test day
#[derive(Debug, Clone)]
pub struct PersonReport {
    /// The person with every planned day's ground truth appended
    pub person: Person,
    pub interaction: WorldInteraction,
    pub accepted: u32,
    pub fallbacks: u32,
    pub replans: u32,
}

enum DayState {
    Generate,
    Reflect { candidate: Candidate, round: u32 },
    Replan { rejected: Candidate, reason: String, round: u32 },
    Accept(Candidate),
    Fallback(FallbackCause),
}

/// Plans days for persons, one day at a time
pub struct DayPlanner {
    collab: Collaborators,
    calendar: EventCalendar,
    limits: PlannerConfig,
}

impl DayPlanner {
    pub fn new(collab: Collaborators, calendar: EventCalendar, limits: PlannerConfig) -> Self {
        debug!(
            max_trial = limits.max_trial,
            max_reflection_try = limits.max_reflection_try,
            replan_trial = limits.replan_trial,
            "DayPlanner::new: called"
        );
        Self {
            collab,
            calendar,
            limits,
        }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collab
    }

    /// Plan a single day for `person`
    ///
    /// `Err` is returned only for fatal errors. Every semantic failure ends in
    /// a fallback outcome.
    pub async fn plan_day(&self, person: &Person, date: NaiveDate) -> Result<DayOutcome, StageError> {
        debug!(person = person.id(), %date, "plan_day: called");
        let ctx = DayContext::gather(&self.collab, &self.calendar, person, date, self.limits.recent_days).await?;

        let mut replans = 0;
        let mut state = DayState::Generate;
        loop {
            state = match state {
                DayState::Generate => match generate(&self.collab, &ctx, self.limits.max_trial).await {
                    Ok(candidate) => DayState::Reflect { candidate, round: 1 },
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => DayState::Fallback(FallbackCause::GenerationFailed(e.to_string())),
                },
                DayState::Reflect { round, .. } if round > self.limits.max_reflection_try => {
                    DayState::Fallback(FallbackCause::ReflectionExhausted)
                }
                DayState::Reflect { candidate, round } => {
                    match reflect(&self.collab, &candidate, &ctx.event_gist, &ctx.pattern_gist).await? {
                        Verdict::Accepted => DayState::Accept(candidate),
                        Verdict::Rejected { reason } => DayState::Replan {
                            rejected: candidate,
                            reason,
                            round,
                        },
                    }
                }
                DayState::Replan {
                    rejected,
                    reason,
                    round,
                } => {
                    replans += 1;
                    match replan(&self.collab, &ctx, &rejected, &reason, self.limits.replan_trial).await {
                        Ok(candidate) => DayState::Reflect {
                            candidate,
                            round: round + 1,
                        },
                        Err(e) if e.is_fatal() => return Err(e),
                        Err(e) => DayState::Fallback(FallbackCause::ReplanFailed(e.to_string())),
                    }
                }
                DayState::Accept(candidate) => {
                    info!(person = person.id(), %date, replans, "Plan accepted");
                    return Ok(DayOutcome::Accepted { candidate, replans });
                }
                DayState::Fallback(cause) => {
                    warn!(person = person.id(), %date, %cause, "Using fallback plan");
                    let text = fallback_plan(person.latest(), date);
                    return Ok(DayOutcome::Fallback { text, cause, replans });
                }
            };
        }
    }

    /// Plan every test day for `person` in date order
    ///
    /// Each day's ground truth joins the history before the next day is
    /// planned, whatever the outcome.
    pub async fn plan_person(&self, person: Person) -> Result<PersonReport, StageError> {
        debug!(person = person.id(), days = person.test_schedule().len(), "plan_person: called");
        let schedule: Vec<RoutineEntry> = person.test_schedule().to_vec();
        let mut person = person;
        let mut interaction = WorldInteraction::new();
        let (mut accepted, mut fallbacks, mut replans) = (0, 0, 0);

        for truth in schedule {
            let date = truth.date();
            let outcome = self.plan_day(&person, date).await?;
            if outcome.is_accepted() {
                accepted += 1;
            } else {
                fallbacks += 1;
            }
            replans += outcome.replans();

            if let Err(e) = interaction.record(date, outcome.text(date), truth.text()) {
                warn!(person = person.id(), error = %e, "Result not recorded");
            }
            person = person.observe(truth);
        }

        info!(
            person = person.id(),
            days = interaction.len(),
            accepted,
            fallbacks,
            "Person complete"
        );
        Ok(PersonReport {
            person,
            interaction,
            accepted,
            fallbacks,
            replans,
        })
    }
}
