//! WorldInteraction - per-person simulated vs real days

use std::collections::BTreeMap;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::DATE_FORMAT;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InteractionError {
    #[error("day {0} was already recorded")]
    DuplicateDay(String),
}

/// Two parallel date-keyed maps: generated plan text and ground truth text
///
/// Keys are ISO dates, so map order is date order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldInteraction {
    pub results: BTreeMap<String, String>,
    pub reals: BTreeMap<String, String>,
}

impl WorldInteraction {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one planned day; each date may be recorded once
    pub fn record(
        &mut self,
        date: NaiveDate,
        result: impl Into<String>,
        real: impl Into<String>,
    ) -> Result<(), InteractionError> {
        let key = date.format(DATE_FORMAT).to_string();
        if self.results.contains_key(&key) || self.reals.contains_key(&key) {
            return Err(InteractionError::DuplicateDay(key));
        }
        self.results.insert(key.clone(), result.into());
        self.reals.insert(key, real.into());
        Ok(())
    }

    pub fn result(&self, date: NaiveDate) -> Option<&str> {
        self.results.get(&date.format(DATE_FORMAT).to_string()).map(String::as_str)
    }

    pub fn real(&self, date: NaiveDate) -> Option<&str> {
        self.reals.get(&date.format(DATE_FORMAT).to_string()).map(String::as_str)
    }

    /// Number of recorded days
    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_populates_both_maps() {
        let mut wi = WorldInteraction::new();
        let date = NaiveDate::from_ymd_opt(2020, 4, 7).unwrap();
        wi.record(date, "Activities at 2020-04-07: a#1 at 10:00", "Activities at 2020-04-07: b#2 at 11:00")
            .unwrap();

        assert_eq!(wi.len(), 1);
        assert_eq!(wi.result(date), Some("Activities at 2020-04-07: a#1 at 10:00"));
        assert_eq!(wi.real(date), Some("Activities at 2020-04-07: b#2 at 11:00"));
    }

    #[test]
    fn test_record_rejects_duplicate_day() {
        let mut wi = WorldInteraction::new();
        let date = NaiveDate::from_ymd_opt(2020, 4, 7).unwrap();
        wi.record(date, "x", "y").unwrap();
        assert_eq!(
            wi.record(date, "x2", "y2"),
            Err(InteractionError::DuplicateDay("2020-04-07".to_string()))
        );
        assert_eq!(wi.result(date), Some("x"));
    }

    #[test]
    fn test_serializes_with_date_keys() {
        let mut wi = WorldInteraction::new();
        wi.record(NaiveDate::from_ymd_opt(2020, 4, 8).unwrap(), "r", "t").unwrap();
        let json = serde_json::to_value(&wi).unwrap();
        assert_eq!(json["results"]["2020-04-08"], "r");
        assert_eq!(json["reals"]["2020-04-08"], "t");
    }
}
