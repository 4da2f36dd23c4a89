//! Plan - an ordered day of activity strings

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::RoutineEntry;

/// Ordered activities, each `"<location>#<id> at HH:MM"`
///
/// Order is the chronological narrative of the day and is never changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Plan(Vec<String>);

impl Plan {
    pub fn new(activities: Vec<String>) -> Self {
        Self(activities)
    }

    pub fn activities(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Render as a routine entry text for the given date
    pub fn render(&self, date: NaiveDate) -> String {
        RoutineEntry::from_activities(date, &self.0).text().to_string()
    }

    /// JSON array form used inside prompts
    pub fn to_prompt_text(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| self.0.join(", "))
    }
}

impl From<Vec<String>> for Plan {
    fn from(activities: Vec<String>) -> Self {
        Self(activities)
    }
}

/// A plan returned by the generation service along with its rationale
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub plan: Plan,
    pub reason: String,
}

impl Candidate {
    pub fn new(plan: impl Into<Plan>, reason: impl Into<String>) -> Self {
        Self {
            plan: plan.into(),
            reason: reason.into(),
        }
    }
}
