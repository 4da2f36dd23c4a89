//! DayPlanner configuration types and loading

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Days, NaiveDate};
use eyre::{Context, Result};
use serde::{Deserialize, Serialize};

/// Main DayPlanner configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Generation backend configuration
    pub llm: LlmConfig,

    /// Attempt bounds and context window sizes for the planning loop
    pub planner: PlannerConfig,

    /// Input and output file locations
    pub data: DataConfig,

    /// Train/test date windows
    pub window: WindowConfig,

    /// Event descriptions fed to the event prompts
    pub event: EventConfig,

    /// Concurrency limits
    pub concurrency: ConcurrencyConfig,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,
}

impl Config {
    /// Validate configuration before use
    ///
    /// Call this early in startup to fail fast with clear error messages.
    pub fn validate(&self) -> Result<()> {
        if self.llm.api_key().is_none() {
            return Err(eyre::eyre!(
                "LLM API key not found. Set the {} environment variable.",
                self.llm.api_key_env
            ));
        }
        self.validate_windows()
    }

    /// Check the train and test windows without touching the environment
    pub fn validate_windows(&self) -> Result<()> {
        if self.window.train_start > self.window.train_end {
            return Err(eyre::eyre!(
                "train-start {} is after train-end {}",
                self.window.train_start,
                self.window.train_end
            ));
        }
        if self.window.train_end >= self.window.test_start {
            return Err(eyre::eyre!(
                "train-end {} must be before test-start {}",
                self.window.train_end,
                self.window.test_start
            ));
        }
        if self.window.test_days == 0 {
            return Err(eyre::eyre!("test-days must be at least 1"));
        }
        Ok(())
    }

    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .dayplanner.yml
        let local_config = PathBuf::from(".dayplanner.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/dayplanner/dayplanner.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("dayplanner").join("dayplanner.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is set up
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        Self::load(config_path).ok().and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// Generation backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name (currently only "openai" supported)
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Sampling temperature
    pub temperature: f32,

    /// HTTP request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,

    /// Rate-limit waits honoured for one request before it fails
    ///
    /// Transient network failures are retried separately inside the client.
    #[serde(rename = "max-retries")]
    pub max_retries: u32,
}

impl LlmConfig {
    /// Read the API key from the configured environment variable
    pub fn api_key(&self) -> Option<String> {
        std::env::var(&self.api_key_env).ok().filter(|k| !k.is_empty())
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            base_url: "https://api.openai.com".to_string(),
            max_tokens: 4096,
            temperature: 0.1,
            timeout_ms: 120_000,
            max_retries: 5,
        }
    }
}

/// Attempt bounds and context window sizes for the planning loop
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlannerConfig {
    /// Generation attempts before falling back
    #[serde(rename = "max-trial")]
    pub max_trial: u32,

    /// Reflect/replan rounds before falling back
    #[serde(rename = "max-reflection-try")]
    pub max_reflection_try: u32,

    /// Replan attempts per round
    #[serde(rename = "replan-trial")]
    pub replan_trial: u32,

    /// Number of nearest past days in the recent window
    #[serde(rename = "recent-days")]
    pub recent_days: usize,

    /// Deadline for each request to the generation service
    ///
    /// Covers the client's own transient retries and takes priority over
    /// them: a request still retrying when it expires fails with a deadline.
    #[serde(rename = "request-deadline-ms")]
    pub request_deadline_ms: u64,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            max_trial: 3,
            max_reflection_try: 3,
            replan_trial: 3,
            recent_days: 2,
            request_deadline_ms: 600_000,
        }
    }
}

/// Input and output file locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// Person identifiers, one per line
    #[serde(rename = "person-list")]
    pub person_list: PathBuf,

    /// JSON object mapping person id to raw routine entries
    #[serde(rename = "history-store")]
    pub history_store: PathBuf,

    /// Allowed location names, one per line
    pub vocabulary: PathBuf,

    /// Checkpoint snapshot written after every person
    pub checkpoint: PathBuf,

    /// Optional directory of `.pmt` template overrides
    #[serde(rename = "prompts-dir")]
    pub prompts_dir: Option<PathBuf>,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            person_list: PathBuf::from("user_list.csv"),
            history_store: PathBuf::from("trajectory_data.json"),
            vocabulary: PathBuf::from("subcategories.csv"),
            checkpoint: PathBuf::from("result.json"),
            prompts_dir: None,
        }
    }
}

/// What a missing test day is filled with before planning
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PlaceholderMode {
    /// "Activities at D: stay at home"
    #[default]
    StayAtHome,
    /// "Activities at D: "
    Empty,
}

impl PlaceholderMode {
    /// Body text used for the placeholder entry
    pub fn body(&self) -> &'static str {
        match self {
            Self::StayAtHome => "stay at home",
            Self::Empty => "",
        }
    }
}

/// Train/test date windows
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    /// First day of training history (inclusive)
    #[serde(rename = "train-start")]
    pub train_start: NaiveDate,

    /// Last day of training history (inclusive)
    #[serde(rename = "train-end")]
    pub train_end: NaiveDate,

    /// First simulated day
    #[serde(rename = "test-start")]
    pub test_start: NaiveDate,

    /// Number of contiguous simulated days
    #[serde(rename = "test-days")]
    pub test_days: u32,

    /// Filler for test days without ground truth
    pub placeholder: PlaceholderMode,
}

impl WindowConfig {
    /// Every date of the test window, ascending
    pub fn test_dates(&self) -> Vec<NaiveDate> {
        (0..self.test_days)
            .filter_map(|offset| self.test_start.checked_add_days(Days::new(u64::from(offset))))
            .collect()
    }
}

impl Default for WindowConfig {
    fn default() -> Self {
        let date = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap_or_default();
        Self {
            train_start: date(2020, 2, 7),
            train_end: date(2020, 4, 6),
            test_start: date(2020, 4, 7),
            test_days: 7,
            placeholder: PlaceholderMode::StayAtHome,
        }
    }
}

/// Event descriptions fed to the event prompts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EventConfig {
    /// Description used for any date without an override
    pub context: String,

    /// Per-date descriptions
    pub overrides: BTreeMap<NaiveDate, String>,
}

impl Default for EventConfig {
    fn default() -> Self {
        Self {
            context: "No notable public event is affecting the area.".to_string(),
            overrides: BTreeMap::new(),
        }
    }
}

/// Concurrency limits
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ConcurrencyConfig {
    /// Persons planned at the same time
    #[serde(rename = "max-persons")]
    pub max_persons: usize,
}

impl Default for ConcurrencyConfig {
    fn default() -> Self {
        Self { max_persons: 8 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.planner.max_trial, 3);
        assert_eq!(config.planner.max_reflection_try, 3);
        assert_eq!(config.planner.replan_trial, 3);
        assert_eq!(config.planner.recent_days, 2);
        assert_eq!(config.window.test_start, date(2020, 4, 7));
        assert!(config.validate_windows().is_ok());
    }

    #[test]
    fn test_deadline_outlasts_client_retries() {
        let attempts = u64::from(crate::llm::TRANSIENT_RETRIES + 1);
        assert!(PlannerConfig::default().request_deadline_ms > LlmConfig::default().timeout_ms * attempts);
    }

    #[test]
    fn test_test_dates_are_contiguous() {
        let window = WindowConfig::default();
        let dates = window.test_dates();
        assert_eq!(dates.len(), 7);
        assert_eq!(dates.first(), Some(&date(2020, 4, 7)));
        assert_eq!(dates.last(), Some(&date(2020, 4, 13)));
    }

    #[test]
    fn test_deserialize_config() {
        let yaml = r#"
llm:
  model: gpt-4o
  api-key-env: MY_API_KEY
  temperature: 0.3

planner:
  max-trial: 5
  recent-days: 3

window:
  train-start: 2021-01-01
  train-end: 2021-01-31
  test-start: 2021-02-01
  test-days: 3
  placeholder: empty

event:
  context: "Stay-at-home order in effect."
  overrides:
    2021-02-02: "Heavy snow."

concurrency:
  max-persons: 2

log-level: debug
"#;

        let config: Config = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(config.llm.model, "gpt-4o");
        assert_eq!(config.llm.api_key_env, "MY_API_KEY");
        assert_eq!(config.planner.max_trial, 5);
        assert_eq!(config.planner.replan_trial, 3);
        assert_eq!(config.planner.recent_days, 3);
        assert_eq!(config.window.placeholder, PlaceholderMode::Empty);
        assert_eq!(config.window.test_dates().len(), 3);
        assert_eq!(config.event.overrides.get(&date(2021, 2, 2)).map(String::as_str), Some("Heavy snow."));
        assert_eq!(config.concurrency.max_persons, 2);
        assert_eq!(config.log_level.as_deref(), Some("debug"));
    }

    #[test]
    fn test_overlapping_windows_rejected() {
        let mut config = Config::default();
        config.window.train_end = date(2020, 4, 8);
        assert!(config.validate_windows().is_err());
    }

    #[test]
    fn test_placeholder_bodies() {
        assert_eq!(PlaceholderMode::StayAtHome.body(), "stay at home");
        assert_eq!(PlaceholderMode::Empty.body(), "");
    }
}
