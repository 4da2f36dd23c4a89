//! Heuristic fallback plan
//!
//! Reuses the most recent history entry under the target date. A lone
//! activity is listed twice so the day is not a single visit.

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::error::StageError;
use crate::domain::RoutineEntry;

/// Re-date `latest` to `date`, doubling a single-activity day
pub fn substitute(latest: Option<&RoutineEntry>, date: NaiveDate) -> Result<String, StageError> {
    debug!(%date, has_latest = latest.is_some(), "substitute: called");
    let latest = latest.ok_or_else(|| StageError::FallbackConstruction("no history".to_string()))?;
    let body = latest.body().ok_or_else(|| {
        StageError::FallbackConstruction(format!("unexpected header layout in {:?}", latest.text()))
    })?;
    let text = format!("{}{}", RoutineEntry::header(date), body);

    if latest.activity_count() != 1 {
        return Ok(text);
    }
    let (head, rest) = text
        .split_once(": ")
        .ok_or_else(|| StageError::FallbackConstruction(format!("no activity list in {:?}", text)))?;
    let rest = rest.trim_end_matches('.');
    Ok(format!("{head}: {rest}, {rest}."))
}

/// Fallback text for `date`; never fails
///
/// Falls back further to an explicitly empty day when the prior entry cannot
/// be reused.
pub fn fallback_plan(latest: Option<&RoutineEntry>, date: NaiveDate) -> String {
    match substitute(latest, date) {
        Ok(text) => text,
        Err(e) => {
            warn!(%date, error = %e, "Fallback degraded to empty day");
            format!("{} ", RoutineEntry::header(date))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn entry(raw: &str) -> RoutineEntry {
        RoutineEntry::parse(raw).unwrap()
    }

    #[test]
    fn test_empty_history() {
        assert_eq!(fallback_plan(None, date(2020, 4, 7)), "Activities at 2020-04-07: ");
    }

    #[test]
    fn test_single_activity_duplicated() {
        let latest = entry("Activities at 2020-04-06: gym#12 at 18:00.");
        assert_eq!(
            fallback_plan(Some(&latest), date(2020, 4, 7)),
            "Activities at 2020-04-07: gym#12 at 18:00, gym#12 at 18:00."
        );
    }

    #[test]
    fn test_multi_activity_redated() {
        let latest = entry("Activities at 2020-04-06: home#1 at 08:00, office#2 at 09:30.");
        assert_eq!(
            fallback_plan(Some(&latest), date(2020, 4, 7)),
            "Activities at 2020-04-07: home#1 at 08:00, office#2 at 09:30."
        );
    }

    #[test]
    fn test_placeholder_entry_redated() {
        let latest = RoutineEntry::with_body(date(2020, 4, 6), "stay at home");
        assert_eq!(
            fallback_plan(Some(&latest), date(2020, 4, 7)),
            "Activities at 2020-04-07: stay at home"
        );
    }

    #[test]
    fn test_unusual_header_spacing_degrades() {
        // Parses, but the header is not the canonical one for its date
        let latest = entry("Activities at  2020-04-06: gym#12 at 18:00.");
        assert!(matches!(
            substitute(Some(&latest), date(2020, 4, 7)),
            Err(StageError::FallbackConstruction(_))
        ));
        assert_eq!(fallback_plan(Some(&latest), date(2020, 4, 7)), "Activities at 2020-04-07: ");
    }

    #[test]
    fn test_single_activity_without_separator_degrades() {
        let latest = entry("Activities at 2020-04-06:gym#12 at 18:00");
        assert_eq!(fallback_plan(Some(&latest), date(2020, 4, 7)), "Activities at 2020-04-07: ");
    }
}
