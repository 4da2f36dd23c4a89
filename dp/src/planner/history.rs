//! History selection with strict causality
//!
//! Entries dated on or after the planned day are never visible to it.

use chrono::NaiveDate;
use tracing::debug;

use crate::domain::RoutineEntry;

/// Strictly-past entries, nearest first
fn past_by_gap(date: NaiveDate, history: &[RoutineEntry]) -> Vec<&RoutineEntry> {
    let mut past: Vec<&RoutineEntry> = history.iter().filter(|e| e.date() < date).collect();
    past.sort_by_key(|e| date.signed_duration_since(e.date()));
    past
}

/// The `n` strictly-past entries closest to `date`, nearest first
pub fn recent(date: NaiveDate, history: &[RoutineEntry], n: usize) -> Vec<&RoutineEntry> {
    debug!(%date, entries = history.len(), n, "recent: called");
    let mut past = past_by_gap(date, history);
    past.truncate(n);
    past
}

/// Every strictly-past entry beyond the `n` nearest, nearest first
pub fn distant(date: NaiveDate, history: &[RoutineEntry], n: usize) -> Vec<&RoutineEntry> {
    debug!(%date, entries = history.len(), n, "distant: called");
    let past = past_by_gap(date, history);
    past.into_iter().skip(n).collect()
}

/// Both windows for one planned day
#[derive(Debug, Clone)]
pub struct HistoryWindow<'a> {
    pub recent: Vec<&'a RoutineEntry>,
    pub distant: Vec<&'a RoutineEntry>,
}

impl<'a> HistoryWindow<'a> {
    /// Partition the strictly-past history around `date`
    pub fn select(date: NaiveDate, history: &'a [RoutineEntry], n: usize) -> Self {
        let mut past = past_by_gap(date, history);
        let distant = past.split_off(n.min(past.len()));
        Self { recent: past, distant }
    }

    pub fn recent_text(&self) -> String {
        render(&self.recent)
    }

    pub fn distant_text(&self) -> String {
        render(&self.distant)
    }
}

/// Prompt text for a set of entries: one per line, oldest first
pub fn render(entries: &[&RoutineEntry]) -> String {
    let mut ordered = entries.to_vec();
    ordered.sort_by_key(|e| e.date());
    ordered.iter().map(|e| e.text()).collect::<Vec<_>>().join("\n")
}
