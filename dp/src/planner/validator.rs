//! Plan validation against the activity grammar and location vocabulary

use std::collections::HashSet;

use regex::Regex;
use thiserror::Error;
use tracing::debug;

use crate::domain::Plan;

/// Why a plan was rejected
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FormatViolation {
    #[error("plan has no activities")]
    EmptyPlan,

    #[error("{0:?} is not '<location>#<id> at HH:MM'")]
    Grammar(String),

    #[error("{0:?} uses an am/pm marker instead of a 24-hour time")]
    Meridiem(String),

    #[error("unknown location {location:?} in {activity:?}")]
    UnknownLocation { location: String, activity: String },
}

/// The set of location names a plan may mention
#[derive(Debug, Clone, Default)]
pub struct LocationVocabulary {
    names: HashSet<String>,
}

impl LocationVocabulary {
    /// One name per line; surrounding whitespace and blank lines are ignored
    pub fn from_lines(text: &str) -> Self {
        text.lines().collect()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for LocationVocabulary {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let names = iter
            .into_iter()
            .map(|name| name.as_ref().trim().to_string())
            .filter(|name| !name.is_empty())
            .collect();
        Self { names }
    }
}

/// Structural and vocabulary checks for candidate plans
///
/// Pure: each activity is checked on its own and the plan is accepted only
/// when every one passes.
#[derive(Debug, Clone)]
pub struct PlanValidator {
    vocabulary: LocationVocabulary,
    activity: Regex,
    meridiem: Regex,
}

impl PlanValidator {
    pub fn new(vocabulary: LocationVocabulary) -> Result<Self, regex::Error> {
        debug!(locations = vocabulary.len(), "PlanValidator::new: called");
        Ok(Self {
            vocabulary,
            // Anchored at the start only; trailing punctuation is tolerated
            activity: Regex::new(r"^(?P<location>[^#]+)#\d+\s+at\s+(?:[01]?\d|2[0-3]):[0-5]\d(?::[0-5]\d)?")?,
            meridiem: Regex::new(r"(?i)(?:\b|\d)(?:am|pm)\b")?,
        })
    }

    /// True when every activity passes
    pub fn validate(&self, plan: &Plan) -> bool {
        self.check(plan).is_ok()
    }

    /// First violation in the plan, if any
    pub fn check(&self, plan: &Plan) -> Result<(), FormatViolation> {
        debug!(activities = plan.len(), "PlanValidator::check: called");
        if plan.is_empty() {
            return Err(FormatViolation::EmptyPlan);
        }
        plan.activities()
            .iter()
            .try_for_each(|activity| self.check_activity(activity))
    }

    /// Check a single activity string
    pub fn check_activity(&self, activity: &str) -> Result<(), FormatViolation> {
        let caps = self
            .activity
            .captures(activity)
            .ok_or_else(|| FormatViolation::Grammar(activity.to_string()))?;
        if self.meridiem.is_match(activity) {
            return Err(FormatViolation::Meridiem(activity.to_string()));
        }
        let location = caps.name("location").map(|m| m.as_str().trim()).unwrap_or_default();
        if !self.vocabulary.contains(location) {
            return Err(FormatViolation::UnknownLocation {
                location: location.to_string(),
                activity: activity.to_string(),
            });
        }
        Ok(())
    }

    pub fn vocabulary(&self) -> &LocationVocabulary {
        &self.vocabulary
    }
}
