//! Domain types for day planning
//!
//! - [`RoutineEntry`] - one dated day of activities, parsed once at ingestion
//! - [`Person`] - append-only history plus the schedule of days to simulate
//! - [`Plan`] / [`Candidate`] - ordered activities proposed for a day
//! - [`WorldInteraction`] - simulated vs ground-truth text per date

mod entry;
mod interaction;
mod person;
mod plan;

pub use entry::{DATE_FORMAT, EntryError, HEADER_PREFIX, RoutineEntry};
pub use interaction::{InteractionError, WorldInteraction};
pub use person::Person;
pub use plan::{Candidate, Plan};
