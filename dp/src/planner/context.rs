//! Day context: history windows, event gists and the day-type line

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::{debug, warn};

use super::Collaborators;
use super::error::StageError;
use super::history::{self, HistoryWindow};
use crate::config::EventConfig;
use crate::domain::Person;
use crate::prompts::Template;

/// "Today is Weekday." or "Today is Weekend."
pub fn day_type(date: NaiveDate) -> &'static str {
    match date.weekday() {
        Weekday::Sat | Weekday::Sun => "Today is Weekend.",
        _ => "Today is Weekday.",
    }
}

/// Event description per date with a default
#[derive(Debug, Clone)]
pub struct EventCalendar {
    default: String,
    overrides: BTreeMap<NaiveDate, String>,
}

impl EventCalendar {
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            overrides: BTreeMap::new(),
        }
    }

    pub fn with_override(mut self, date: NaiveDate, description: impl Into<String>) -> Self {
        self.overrides.insert(date, description.into());
        self
    }

    pub fn for_date(&self, date: NaiveDate) -> &str {
        self.overrides.get(&date).map(String::as_str).unwrap_or(&self.default)
    }
}

impl From<&EventConfig> for EventCalendar {
    fn from(config: &EventConfig) -> Self {
        Self {
            default: config.context.clone(),
            overrides: config.overrides.clone(),
        }
    }
}

/// Everything the stages need to know about one planned day
#[derive(Debug, Clone, Default)]
pub struct DayContext {
    pub recent: String,
    pub distant: String,
    pub event_schema: String,
    pub event_gist: String,
    pub pattern_gist: String,
    pub day_type: String,
}

impl DayContext {
    /// Select history and ask for the event and pattern summaries
    ///
    /// Only fatal errors escape; a summary that times out or comes back empty
    /// is left blank.
    pub async fn gather(
        collab: &Collaborators,
        calendar: &EventCalendar,
        person: &Person,
        date: NaiveDate,
        recent_days: usize,
    ) -> Result<Self, StageError> {
        debug!(person = person.id(), %date, "DayContext::gather: called");
        let window = HistoryWindow::select(date, person.train_history(), recent_days);
        let recent = window.recent_text();
        let distant = window.distant_text();
        let all_past: Vec<_> = window.recent.iter().chain(&window.distant).copied().collect();
        let full = history::render(&all_past);

        let event = calendar.for_date(date);
        let event_schema = summarize(collab, Template::EventSchema, &[event]).await?;
        let event_gist = summarize(collab, Template::EventGist, &[event]).await?;
        let pattern_gist = summarize(collab, Template::PatternGist, &[full.as_str(), recent.as_str()]).await?;

        Ok(Self {
            recent,
            distant,
            event_schema,
            event_gist,
            pattern_gist,
            day_type: day_type(date).to_string(),
        })
    }
}

async fn summarize(collab: &Collaborators, template: Template, inputs: &[&str]) -> Result<String, StageError> {
    let prompt = collab.prompts.render(template, inputs)?;
    match collab.service.ask(&prompt, template.name()).await {
        Ok(text) => Ok(text.trim().to_string()),
        Err(e) if e.is_fatal() => Err(e),
        Err(e) => {
            warn!(%template, error = %e, "Context summary unavailable, continuing without it");
            Ok(String::new())
        }
    }
}
