//! Prompt Loader
//!
//! Loads templates from an override directory or the embedded defaults,
//! substitutes positional inputs and normalises the rendered text.

use std::path::{Path, PathBuf};

use handlebars::Handlebars;
use regex::{Captures, Regex};
use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{PromptError, Template, embedded};

/// Everything up to and including this marker is template commentary
pub const COMMENT_BLOCK_MARKER: &str = "<commentblockmarker>###</commentblockmarker>";

/// Input value that renders as an empty string
pub const NONE_SENTINEL: &str = "None";

/// Loads and renders prompt templates
pub struct PromptLoader {
    hbs: Handlebars<'static>,
    /// Optional directory holding `{name}.pmt` overrides
    override_dir: Option<PathBuf>,
    legacy_input: Regex,
    time_seconds: Regex,
    second_person: Regex,
}

impl PromptLoader {
    /// Create a loader, preferring templates found in `override_dir`
    pub fn new(override_dir: Option<&Path>) -> Result<Self, PromptError> {
        debug!(?override_dir, "PromptLoader::new: called");
        let mut hbs = Handlebars::new();
        hbs.register_escape_fn(handlebars::no_escape);

        let override_dir = override_dir.filter(|dir| dir.is_dir()).map(Path::to_path_buf);
        if let Some(ref dir) = override_dir {
            info!("Prompt overrides enabled from {}", dir.display());
        }

        Ok(Self {
            hbs,
            override_dir,
            legacy_input: Regex::new(r"!<INPUT (\d+)>!")?,
            time_seconds: Regex::new(r"(\d{2}:\d{2}):00")?,
            second_person: Regex::new(r"(?i)\b(?:you|your)\b")?,
        })
    }

    /// Create a loader that only uses embedded prompts
    pub fn embedded_only() -> Result<Self, PromptError> {
        Self::new(None)
    }

    /// Load a template's raw text
    ///
    /// Checks in order:
    /// 1. Override: `{override_dir}/{name}.pmt`
    /// 2. Embedded fallback
    fn load_template(&self, template: Template) -> Result<String, PromptError> {
        let name = template.name();
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!("Loading prompt from override: {:?}", path);
                return std::fs::read_to_string(&path).map_err(|source| PromptError::Read { path, source });
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!("Using embedded prompt: {}", name);
            return Ok(content.to_string());
        }

        Err(PromptError::NotFound(name.to_string()))
    }

    /// Render a template with positional inputs
    pub fn render(&self, template: Template, inputs: &[&str]) -> Result<String, PromptError> {
        debug!(%template, inputs = inputs.len(), "PromptLoader::render: called");
        if inputs.len() != template.arity() {
            return Err(PromptError::Arity {
                template,
                expected: template.arity(),
                got: inputs.len(),
            });
        }

        let raw = self.load_template(template)?;
        let body = match raw.split_once(COMMENT_BLOCK_MARKER) {
            Some((_, body)) => body,
            None => raw.as_str(),
        };
        let body = self.legacy_input.replace_all(body, "{{input_$1}}");

        let mut context = Map::new();
        for (idx, input) in inputs.iter().enumerate() {
            let value = if *input == NONE_SENTINEL { "" } else { *input };
            context.insert(format!("input_{}", idx), Value::String(value.to_string()));
        }

        let rendered = self
            .hbs
            .render_template(&body, &Value::Object(context))
            .map_err(|source| PromptError::Render { template, source })?;
        Ok(self.normalize(&rendered))
    }

    /// Shorten `HH:MM:00`, lower-case "You"/"Your", drop blank lines
    pub fn normalize(&self, text: &str) -> String {
        let text = self.time_seconds.replace_all(text, "$1");
        let text = self
            .second_person
            .replace_all(&text, |caps: &Captures| caps[0].to_lowercase());
        text.lines()
            .filter(|line| !line.trim().is_empty())
            .collect::<Vec<_>>()
            .join("\n")
            .trim()
            .to_string()
    }
}
