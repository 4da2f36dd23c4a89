//! Person - history and schedule owned by one planning task

use tracing::{debug, warn};

use super::RoutineEntry;

/// One simulated individual
///
/// `train_history` only ever grows, and always in strictly increasing date
/// order: a day's ground truth becomes history once that day is planned.
#[derive(Debug, Clone)]
pub struct Person {
    id: String,
    train_history: Vec<RoutineEntry>,
    test_schedule: Vec<RoutineEntry>,
}

impl Person {
    /// Build a person, ordering both sequences by date
    ///
    /// Duplicate dates keep their first entry. History entries dated on
    /// or after the first test date are dropped so planning never looks ahead.
    pub fn new(id: impl Into<String>, mut train_history: Vec<RoutineEntry>, mut test_schedule: Vec<RoutineEntry>) -> Self {
        let id = id.into();
        debug!(%id, train = train_history.len(), test = test_schedule.len(), "Person::new: called");

        test_schedule.sort_by_key(RoutineEntry::date);
        test_schedule.dedup_by_key(|e| e.date());

        train_history.sort_by_key(RoutineEntry::date);
        let recorded = train_history.len();
        train_history.dedup_by_key(|e| e.date());
        if train_history.len() != recorded {
            warn!(%id, dropped = recorded - train_history.len(), "history had several entries for one date, kept the first");
        }
        if let Some(first_test) = test_schedule.first().map(RoutineEntry::date) {
            let before = train_history.len();
            train_history.retain(|e| e.date() < first_test);
            if train_history.len() != before {
                warn!(%id, dropped = before - train_history.len(), %first_test, "history overlapped the test window");
            }
        }

        Self {
            id,
            train_history,
            test_schedule,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn train_history(&self) -> &[RoutineEntry] {
        &self.train_history
    }

    pub fn test_schedule(&self) -> &[RoutineEntry] {
        &self.test_schedule
    }

    /// Most recently dated history entry
    pub fn latest(&self) -> Option<&RoutineEntry> {
        self.train_history.last()
    }

    /// Append a planned day's ground truth to history
    ///
    /// Entries that would not extend history forward in time are ignored.
    pub fn observe(mut self, truth: RoutineEntry) -> Self {
        debug!(id = %self.id, date = %truth.date(), "Person::observe: called");
        match self.latest() {
            Some(last) if last.date() >= truth.date() => {
                warn!(id = %self.id, date = %truth.date(), last = %last.date(), "refusing out-of-order history entry");
            }
            _ => self.train_history.push(truth),
        }
        self
    }
}
