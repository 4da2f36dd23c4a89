//! DayPlanner - walk-forward daily activity plan synthesis
//!
//! For each person and each simulated day, DayPlanner selects past history,
//! asks a model for a plan, checks it structurally and semantically, replans
//! on rejection and falls back to a reused past day when nothing survives.
//! The day's ground truth then joins the history before the next day.
//!
//! # Modules
//!
//! - [`domain`] - Routine entries, persons, plans and per-person results
//! - [`planner`] - The per-day state machine and its stages
//! - [`llm`] - LLM client trait and OpenAI implementation
//! - [`prompts`] - Positional prompt templates
//! - [`ingest`] - Input files and date windows
//! - [`checkpoint`] - Result snapshots and resume
//! - [`runner`] - Per-person worker pool
//! - [`config`] - Configuration types and loading
//! - [`cli`] - Command-line interface

pub mod checkpoint;
pub mod cli;
pub mod config;
pub mod domain;
pub mod ingest;
pub mod llm;
pub mod planner;
pub mod prompts;
pub mod runner;

// Re-export commonly used types
pub use checkpoint::{CheckpointError, CheckpointStore};
pub use config::{Config, LlmConfig, PlannerConfig};
pub use domain::{Candidate, Person, Plan, RoutineEntry, WorldInteraction};
pub use llm::{LlmClient, LlmError};
pub use planner::{Collaborators, DayOutcome, DayPlanner, GenerationService, PlanValidator, StageError};
pub use prompts::{PromptLoader, Template};
pub use runner::{RunError, RunSummary, Runner};
