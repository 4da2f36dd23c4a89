//! RoutineEntry - one recorded day of activities
//!
//! Raw text looks like `Activities at 2020-04-06: gym#12 at 18:00, home#3 at 21:30.`
//! The date is parsed exactly once, at ingestion; nothing downstream reads
//! dates back out of free text.

use chrono::NaiveDate;
use thiserror::Error;
use tracing::debug;

/// Prefix every raw routine entry starts with
pub const HEADER_PREFIX: &str = "Activities at ";

/// Format of the date token inside the header
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Errors raised while parsing a raw routine entry
#[derive(Debug, Error)]
pub enum EntryError {
    #[error("missing 'Activities at DATE:' header in {0:?}")]
    MissingHeader(String),

    #[error("invalid date {date:?} in routine header: {source}")]
    InvalidDate {
        date: String,
        #[source]
        source: chrono::ParseError,
    },
}

/// One dated day of recorded (or simulated) activities
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutineEntry {
    date: NaiveDate,
    text: String,
}

impl RoutineEntry {
    /// Parse a raw entry, extracting its header date
    pub fn parse(raw: impl Into<String>) -> Result<Self, EntryError> {
        let text = raw.into();
        debug!(len = text.len(), "RoutineEntry::parse: called");
        let rest = text
            .strip_prefix(HEADER_PREFIX)
            .ok_or_else(|| EntryError::MissingHeader(text.clone()))?;
        let (token, _) = rest
            .split_once(':')
            .ok_or_else(|| EntryError::MissingHeader(text.clone()))?;
        let date = NaiveDate::parse_from_str(token.trim(), DATE_FORMAT).map_err(|source| EntryError::InvalidDate {
            date: token.to_string(),
            source,
        })?;
        Ok(Self { date, text })
    }

    /// Entry for a day whose body is given verbatim
    pub fn with_body(date: NaiveDate, body: &str) -> Self {
        Self {
            date,
            text: format!("{} {}", Self::header(date), body),
        }
    }

    /// Entry listing the given activities in order
    pub fn from_activities(date: NaiveDate, activities: &[String]) -> Self {
        Self::with_body(date, &activities.join(", "))
    }

    /// The header for a date: `Activities at 2020-04-07:`
    pub fn header(date: NaiveDate) -> String {
        format!("{}{}:", HEADER_PREFIX, date.format(DATE_FORMAT))
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Everything after the header, untouched (usually starts with a space)
    ///
    /// None when the text no longer starts with the header for its own date.
    pub fn body(&self) -> Option<&str> {
        self.text.strip_prefix(&Self::header(self.date))
    }

    /// Number of `#`-tagged activities in the entry
    pub fn activity_count(&self) -> usize {
        self.text.matches('#').count()
    }
}

impl std::fmt::Display for RoutineEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}
