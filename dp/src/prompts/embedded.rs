//! Embedded prompt templates
//!
//! Compiled into the binary and used when no override file exists.

pub const GENERATION: &str = include_str!("../../prompts/generation.pmt");
pub const REGENERATION: &str = include_str!("../../prompts/regeneration.pmt");
pub const EVENT_SCHEMA: &str = include_str!("../../prompts/event-schema.pmt");
pub const EVENT_GIST: &str = include_str!("../../prompts/event-gist.pmt");
pub const PATTERN_GIST: &str = include_str!("../../prompts/pattern-gist.pmt");
pub const ACTION_GIST: &str = include_str!("../../prompts/action-gist.pmt");
pub const REFLECTION: &str = include_str!("../../prompts/reflection.pmt");

/// Get an embedded template by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    match name {
        "generation" => Some(GENERATION),
        "regeneration" => Some(REGENERATION),
        "event-schema" => Some(EVENT_SCHEMA),
        "event-gist" => Some(EVENT_GIST),
        "pattern-gist" => Some(PATTERN_GIST),
        "action-gist" => Some(ACTION_GIST),
        "reflection" => Some(REFLECTION),
        _ => None,
    }
}
