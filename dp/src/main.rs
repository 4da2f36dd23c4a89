//! DayPlanner - walk-forward daily activity plan synthesis
//!
//! CLI entry point for running, checking and inspecting a planning run.

use std::fs;
use std::sync::Arc;

use clap::Parser;
use colored::Colorize;
use eyre::{Context, Result};
use tracing::{error, info, warn};

use dayplanner::checkpoint::{CheckpointStore, read_snapshot};
use dayplanner::cli::{Cli, Command, OutputFormat, get_log_dir};
use dayplanner::config::Config;
use dayplanner::ingest::{Inputs, build_person};
use dayplanner::llm::create_client;
use dayplanner::planner::{Collaborators, DayPlanner, EventCalendar, GenerationService, PlanValidator};
use dayplanner::prompts::{PromptLoader, Template};
use dayplanner::runner::{RunError, Runner};

/// Exit code when the generation service is unusable
const EXIT_SERVICE_FAILURE: i32 = 2;

/// Exit code after Ctrl-C
const EXIT_INTERRUPTED: i32 = 130;

fn setup_logging(level: Option<&str>) -> Result<()> {
    let log_dir = get_log_dir();
    fs::create_dir_all(&log_dir).context("Failed to create log directory")?;

    // Priority: --log-level flag > config log-level > INFO
    let level = level
        .and_then(|l| l.parse::<tracing::Level>().ok())
        .unwrap_or(tracing::Level::INFO);
    let log_file = fs::File::create(log_dir.join("dayplanner.log")).context("Failed to create log file")?;

    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = cli
        .log_level
        .clone()
        .or_else(|| Config::load_log_level(cli.config.as_ref()));
    setup_logging(level.as_deref()).context("Failed to setup logging")?;

    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    info!(
        "DayPlanner loaded config: provider={}, model={}",
        config.llm.provider, config.llm.model
    );

    match cli.command {
        Command::Run { resume, limit } => cmd_run(&config, resume, limit).await,
        Command::Check => cmd_check(&config),
        Command::Show { person, format } => cmd_show(&config, &person, &format),
    }
}

async fn cmd_run(config: &Config, resume: bool, limit: Option<usize>) -> Result<()> {
    config.validate()?;
    let inputs = Inputs::load(&config.data).context("Failed to load inputs")?;

    let client = create_client(&config.llm).context("Failed to create LLM client")?;
    let service = GenerationService::new(client, &config.llm, &config.planner);
    let prompts = PromptLoader::new(config.data.prompts_dir.as_deref())?;
    let validator = PlanValidator::new(inputs.vocabulary)?;
    let planner = Arc::new(DayPlanner::new(
        Collaborators::new(service, prompts, validator),
        EventCalendar::from(&config.event),
        config.planner.clone(),
    ));

    let checkpoint = if resume {
        CheckpointStore::resume(&config.data.checkpoint)?
    } else {
        CheckpointStore::fresh(&config.data.checkpoint)
    };
    let checkpoint = Arc::new(checkpoint);

    let persons: Vec<_> = inputs
        .person_ids
        .iter()
        .take(limit.unwrap_or(usize::MAX))
        .map(|id| build_person(id, &inputs.history, &config.window))
        .collect();
    println!(
        "Planning {} persons over {} days -> {}",
        persons.len(),
        config.window.test_days,
        config.data.checkpoint.display()
    );

    let runner = Runner::new(planner, checkpoint, config.concurrency.max_persons);
    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Cannot listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    match runner.run(persons, shutdown).await {
        Ok(summary) => {
            println!("{} {}", "Done:".green().bold(), summary);
            Ok(())
        }
        Err(e @ RunError::ServiceUnavailable { .. }) => {
            error!(error = %e, "Run aborted");
            eprintln!("{} {}", "Generation service failure:".red().bold(), e);
            eprintln!("Completed persons are saved; rerun with --resume to continue.");
            std::process::exit(EXIT_SERVICE_FAILURE);
        }
        Err(e @ RunError::Interrupted { .. }) => {
            eprintln!("{} {}", "Interrupted:".yellow().bold(), e);
            std::process::exit(EXIT_INTERRUPTED);
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_check(config: &Config) -> Result<()> {
    config.validate_windows()?;
    let inputs = Inputs::load(&config.data).context("Failed to load inputs")?;

    let known = inputs
        .person_ids
        .iter()
        .filter(|id| inputs.history.get(id).is_some())
        .count();
    let dates = config.window.test_dates();

    println!("{}", "Inputs".bold());
    println!("  persons listed:      {}", inputs.person_ids.len());
    println!("  with history:        {}", known);
    println!("  locations:           {}", inputs.vocabulary.len());
    println!(
        "  train window:        {} .. {}",
        config.window.train_start, config.window.train_end
    );
    if let (Some(first), Some(last)) = (dates.first(), dates.last()) {
        println!("  test window:         {} .. {} ({} days)", first, last, dates.len());
    }

    let prompts = PromptLoader::new(config.data.prompts_dir.as_deref())?;
    for template in Template::ALL {
        let args = vec!["None"; template.arity()];
        prompts
            .render(template, &args)
            .with_context(|| format!("Template {} does not render", template))?;
    }
    println!("  templates:           {} ok", Template::ALL.len());

    if config.llm.api_key().is_none() {
        println!(
            "{} {} is not set; `dp run` will refuse to start",
            "warning:".yellow().bold(),
            config.llm.api_key_env
        );
    }
    if known < inputs.person_ids.len() {
        println!(
            "{} {} persons have no history and will be planned from placeholders",
            "warning:".yellow().bold(),
            inputs.person_ids.len() - known
        );
    }
    println!("{}", "Check passed".green().bold());
    Ok(())
}

fn cmd_show(config: &Config, person: &str, format: &OutputFormat) -> Result<()> {
    let snapshot = read_snapshot(&config.data.checkpoint)?;
    let interaction = snapshot
        .get(person)
        .ok_or_else(|| eyre::eyre!("No results for {} in {}", person, config.data.checkpoint.display()))?;

    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(interaction)?),
        OutputFormat::Text => {
            for (date, result) in &interaction.results {
                let real = interaction.reals.get(date).map(String::as_str).unwrap_or("");
                println!("{}", date.bold());
                println!("  {} {}", "planned:".cyan(), result);
                println!("  {} {}", "real:   ".dimmed(), real);
            }
        }
    }
    Ok(())
}
