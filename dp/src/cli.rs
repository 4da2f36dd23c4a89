//! CLI command definitions and subcommands

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// DayPlanner - walk-forward daily plan synthesis
#[derive(Parser)]
#[command(
    name = "dp",
    about = "Synthesize daily activity plans from personal history",
    version,
    after_help = "Logs are written to: ~/.local/share/dayplanner/logs/dayplanner.log"
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true, help = "Log level (overrides config)")]
    pub log_level: Option<String>,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// CLI subcommands
#[derive(Subcommand)]
pub enum Command {
    /// Plan every test day for every listed person
    Run {
        /// Skip persons already present in the checkpoint
        #[arg(long)]
        resume: bool,

        /// Plan at most this many persons from the list
        #[arg(short = 'n', long)]
        limit: Option<usize>,
    },

    /// Load config and inputs and report what a run would do
    Check,

    /// Print one person's planned days next to the ground truth
    Show {
        /// Person identifier
        person: String,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Output format for the show command
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use: text or json", s)),
        }
    }
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => write!(f, "text"),
            Self::Json => write!(f, "json"),
        }
    }
}

/// Directory the log file is written to
pub fn get_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("dayplanner")
        .join("logs")
}

pub fn get_log_path() -> PathBuf {
    get_log_dir().join("dayplanner.log")
}
