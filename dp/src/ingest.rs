//! Input loading and date windowing
//!
//! Every raw history string is parsed into a `RoutineEntry` here, once.

use std::collections::{BTreeSet, HashMap};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{DataConfig, PlaceholderMode, WindowConfig};
use crate::domain::{Person, RoutineEntry};
use crate::planner::LocationVocabulary;

/// Errors raised while loading run inputs
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("history store {path} is not a JSON object of string lists: {source}")]
    HistoryFormat {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

fn read(path: &Path) -> Result<String, IngestError> {
    std::fs::read_to_string(path).map_err(|source| IngestError::Read {
        path: path.to_path_buf(),
        source,
    })
}

/// Person identifiers: first comma-separated field of each non-blank line
pub fn parse_person_ids(text: &str) -> Vec<String> {
    text.lines()
        .filter_map(|line| line.split(',').next())
        .map(|id| id.trim().trim_matches('"').to_string())
        .filter(|id| !id.is_empty())
        .collect()
}

pub fn load_person_ids(path: &Path) -> Result<Vec<String>, IngestError> {
    debug!(?path, "load_person_ids: called");
    let ids = parse_person_ids(&read(path)?);
    info!("Loaded {} person ids from {}", ids.len(), path.display());
    Ok(ids)
}

pub fn load_vocabulary(path: &Path) -> Result<LocationVocabulary, IngestError> {
    debug!(?path, "load_vocabulary: called");
    let vocabulary = LocationVocabulary::from_lines(&read(path)?);
    info!("Loaded {} locations from {}", vocabulary.len(), path.display());
    Ok(vocabulary)
}

/// Parsed history for every person
#[derive(Debug, Clone, Default)]
pub struct HistoryStore {
    entries: HashMap<String, Vec<RoutineEntry>>,
}

impl HistoryStore {
    /// Parse `{"person": ["Activities at ...", ...], ...}`
    ///
    /// Entries without a readable header date are dropped with a warning.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        let raw: HashMap<String, Vec<String>> = serde_json::from_str(text)?;
        let mut entries = HashMap::with_capacity(raw.len());
        for (id, items) in raw {
            let parsed: Vec<RoutineEntry> = items
                .into_iter()
                .filter_map(|item| match RoutineEntry::parse(item) {
                    Ok(entry) => Some(entry),
                    Err(e) => {
                        warn!(person = %id, error = %e, "Dropping unparseable history entry");
                        None
                    }
                })
                .collect();
            entries.insert(id, parsed);
        }
        Ok(Self { entries })
    }

    pub fn load(path: &Path) -> Result<Self, IngestError> {
        debug!(?path, "HistoryStore::load: called");
        let store = Self::from_json(&read(path)?).map_err(|source| IngestError::HistoryFormat {
            path: path.to_path_buf(),
            source,
        })?;
        info!("Loaded history for {} persons from {}", store.len(), path.display());
        Ok(store)
    }

    pub fn get(&self, id: &str) -> Option<&[RoutineEntry]> {
        self.entries.get(id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Entries dated within `start..=end`
pub fn filter_range(entries: &[RoutineEntry], start: NaiveDate, end: NaiveDate) -> Vec<RoutineEntry> {
    entries
        .iter()
        .filter(|e| (start..=end).contains(&e.date()))
        .cloned()
        .collect()
}

/// Fill every date of `dates` missing from `entries` with a placeholder
///
/// The result is sorted by date.
pub fn ensure_dates(mut entries: Vec<RoutineEntry>, dates: &[NaiveDate], placeholder: PlaceholderMode) -> Vec<RoutineEntry> {
    let existing: BTreeSet<NaiveDate> = entries.iter().map(RoutineEntry::date).collect();
    for date in dates.iter().filter(|d| !existing.contains(d)) {
        debug!(%date, "ensure_dates: inserting placeholder");
        entries.push(RoutineEntry::with_body(*date, placeholder.body()));
    }
    entries.sort_by_key(RoutineEntry::date);
    entries
}

/// Build a person from the store using the train and test windows
pub fn build_person(id: &str, store: &HistoryStore, window: &WindowConfig) -> Person {
    let entries: &[RoutineEntry] = match store.get(id) {
        Some(entries) => entries,
        None => {
            warn!(person = %id, "No history for person, planning from placeholders");
            &[]
        }
    };
    let dates = window.test_dates();
    let train = filter_range(entries, window.train_start, window.train_end);
    let test = match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => filter_range(entries, *first, *last),
        _ => Vec::new(),
    };
    Person::new(id, train, ensure_dates(test, &dates, window.placeholder))
}

/// Everything a run reads before planning starts
#[derive(Debug, Clone)]
pub struct Inputs {
    pub person_ids: Vec<String>,
    pub history: HistoryStore,
    pub vocabulary: LocationVocabulary,
}

impl Inputs {
    pub fn load(data: &DataConfig) -> Result<Self, IngestError> {
        debug!("Inputs::load: called");
        Ok(Self {
            person_ids: load_person_ids(&data.person_list)?,
            history: HistoryStore::load(&data.history_store)?,
            vocabulary: load_vocabulary(&data.vocabulary)?,
        })
    }
}
