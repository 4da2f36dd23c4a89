//! Prompt templates
//!
//! Seven positional templates drive the planner. Each is looked up in an
//! optional override directory first and falls back to the embedded copy.

mod embedded;
mod loader;

use std::path::PathBuf;

use thiserror::Error;

pub use loader::{COMMENT_BLOCK_MARKER, NONE_SENTINEL, PromptLoader};

/// The templates the planner knows how to render
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Template {
    /// First plan for a day
    Generation,
    /// Revised plan after a rejection
    Regeneration,
    /// Structured description of the day's event
    EventSchema,
    /// Short gist of the day's event
    EventGist,
    /// Habitual pattern of the person
    PatternGist,
    /// Summary of a candidate plan
    ActionGist,
    /// Coherence judgment of a candidate
    Reflection,
}

impl Template {
    pub const ALL: [Template; 7] = [
        Self::Generation,
        Self::Regeneration,
        Self::EventSchema,
        Self::EventGist,
        Self::PatternGist,
        Self::ActionGist,
        Self::Reflection,
    ];

    /// File stem, also the embedded lookup key
    pub fn name(&self) -> &'static str {
        match self {
            Self::Generation => "generation",
            Self::Regeneration => "regeneration",
            Self::EventSchema => "event-schema",
            Self::EventGist => "event-gist",
            Self::PatternGist => "pattern-gist",
            Self::ActionGist => "action-gist",
            Self::Reflection => "reflection",
        }
    }

    /// Number of positional inputs the template expects
    pub fn arity(&self) -> usize {
        match self {
            Self::Generation => 4,
            Self::Regeneration => 6,
            Self::EventSchema | Self::EventGist => 1,
            Self::PatternGist | Self::ActionGist => 2,
            Self::Reflection => 3,
        }
    }
}

impl std::fmt::Display for Template {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Errors raised while loading or rendering a template
#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template not found: {0}")]
    NotFound(String),

    #[error("failed to read prompt {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("template {template} takes {expected} inputs, got {got}")]
    Arity {
        template: Template,
        expected: usize,
        got: usize,
    },

    #[error("failed to render template {template}: {source}")]
    Render {
        template: Template,
        #[source]
        source: handlebars::RenderError,
    },

    #[error("invalid normalisation pattern: {0}")]
    Pattern(#[from] regex::Error),
}
