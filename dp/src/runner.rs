//! Runner - the per-person worker pool
//!
//! One task per person, bounded by a semaphore. Results are checkpointed as
//! each person finishes. A fatal service error or a shutdown signal aborts
//! everything still running.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::checkpoint::{CheckpointError, CheckpointStore};
use crate::domain::Person;
use crate::planner::{DayPlanner, PersonReport, StageError};

/// Conditions that stop a run
#[derive(Debug, Error)]
pub enum RunError {
    #[error("generation service unavailable while planning {person}: {source}")]
    ServiceUnavailable {
        person: String,
        #[source]
        source: StageError,
    },

    #[error("run interrupted after {completed} persons")]
    Interrupted { completed: usize },

    #[error(transparent)]
    Checkpoint(#[from] CheckpointError),

    #[error("person task panicked: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Totals for a finished run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    pub persons: usize,
    pub skipped: usize,
    pub days: usize,
    pub accepted: u32,
    pub fallbacks: u32,
    pub replans: u32,
    pub requests: u64,
    pub tokens: u64,
}

impl RunSummary {
    fn add(&mut self, report: &PersonReport) {
        self.persons += 1;
        self.days += report.interaction.len();
        self.accepted += report.accepted;
        self.fallbacks += report.fallbacks;
        self.replans += report.replans;
    }
}

impl std::fmt::Display for RunSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} persons planned ({} skipped), {} days: {} accepted, {} fallback, {} replans; {} requests, {} tokens",
            self.persons,
            self.skipped,
            self.days,
            self.accepted,
            self.fallbacks,
            self.replans,
            self.requests,
            self.tokens
        )
    }
}

type TaskResult = Result<PersonReport, (String, StageError)>;

pub struct Runner {
    planner: Arc<DayPlanner>,
    checkpoint: Arc<CheckpointStore>,
    max_persons: usize,
}

impl Runner {
    pub fn new(planner: Arc<DayPlanner>, checkpoint: Arc<CheckpointStore>, max_persons: usize) -> Self {
        debug!(max_persons, "Runner::new: called");
        Self {
            planner,
            checkpoint,
            max_persons: max_persons.max(1),
        }
    }

    /// Plan every person not already in the checkpoint
    ///
    /// Stops early when `shutdown` resolves.
    pub async fn run<S>(&self, persons: Vec<Person>, shutdown: S) -> Result<RunSummary, RunError>
    where
        S: Future<Output = ()>,
    {
        debug!(persons = persons.len(), "Runner::run: called");
        let mut summary = RunSummary::default();
        let semaphore = Arc::new(Semaphore::new(self.max_persons));
        let mut tasks: JoinSet<TaskResult> = JoinSet::new();

        for person in persons {
            if self.checkpoint.contains(person.id()).await {
                debug!(person = person.id(), "Runner::run: already checkpointed");
                summary.skipped += 1;
                continue;
            }
            let planner = self.planner.clone();
            let semaphore = semaphore.clone();
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let id = person.id().to_string();
                info!(person = %id, "Planning person");
                planner.plan_person(person).await.map_err(|e| (id, e))
            });
        }
        let total = tasks.len();
        info!("Planning {} persons ({} already done)", total, summary.skipped);

        tokio::pin!(shutdown);
        loop {
            tokio::select! {
                biased;
                _ = &mut shutdown => {
                    warn!("Shutdown requested, aborting {} person tasks", tasks.len());
                    tasks.abort_all();
                    return Err(RunError::Interrupted { completed: summary.persons });
                }
                joined = tasks.join_next() => {
                    let Some(joined) = joined else { break };
                    match joined {
                        Ok(Ok(report)) => {
                            let id = report.person.id().to_string();
                            self.checkpoint.record(&id, report.interaction.clone()).await?;
                            summary.add(&report);
                            info!(person = %id, done = summary.persons, total, "Person checkpointed");
                        }
                        Ok(Err((person, source))) => {
                            error!(%person, error = %source, "Fatal planning error, aborting run");
                            tasks.abort_all();
                            return Err(RunError::ServiceUnavailable { person, source });
                        }
                        Err(e) if e.is_cancelled() => continue,
                        Err(e) => {
                            tasks.abort_all();
                            return Err(RunError::Join(e));
                        }
                    }
                }
            }
        }

        let service = &self.planner.collaborators().service;
        summary.requests = service.requests();
        summary.tokens = service.tokens();
        info!(%summary, "Run complete");
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlannerConfig;
    use crate::domain::RoutineEntry;
    use crate::llm::client::mock::MockLlmClient;
    use crate::planner::{Collaborators, EventCalendar, GenerationService, PlanValidator};
    use crate::prompts::PromptLoader;
    use chrono::NaiveDate;
    use std::time::Duration;
    use tempfile::TempDir;

    fn planner(texts: &[&str]) -> Arc<DayPlanner> {
        let client = Arc::new(MockLlmClient::with_texts(texts));
        let collab = Collaborators::new(
            GenerationService::with_deadline(client, Duration::from_secs(5)),
            PromptLoader::embedded_only().unwrap(),
            PlanValidator::new(["Office"].into_iter().collect()).unwrap(),
        );
        Arc::new(DayPlanner::new(collab, EventCalendar::new("quiet"), PlannerConfig::default()))
    }

    fn person(id: &str) -> Person {
        let date = NaiveDate::from_ymd_opt(2020, 4, 7).unwrap();
        Person::new(id, vec![], vec![RoutineEntry::with_body(date, "Office#1 at 09:00")])
    }

    #[tokio::test]
    async fn test_run_checkpoints_and_skips() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("results.json");
        let checkpoint = Arc::new(CheckpointStore::fresh(&path));
        checkpoint
            .record("done", crate::domain::WorldInteraction::new())
            .await
            .unwrap();

        // Generation fails three times: the day falls back without reflection
        let runner = Runner::new(
            planner(&["s", "g", "p", "bad", "bad", "bad"]),
            checkpoint.clone(),
            2,
        );
        let summary = runner
            .run(vec![person("done"), person("u1")], std::future::pending())
            .await
            .unwrap();

        assert_eq!(summary.persons, 1);
        assert_eq!(summary.skipped, 1);
        assert_eq!(summary.days, 1);
        assert_eq!(summary.fallbacks, 1);
        assert_eq!(summary.requests, 6);
        let snapshot = checkpoint.snapshot().await;
        assert_eq!(
            snapshot["u1"].result(NaiveDate::from_ymd_opt(2020, 4, 7).unwrap()),
            Some("Activities at 2020-04-07: ")
        );
    }

    #[tokio::test]
    async fn test_fatal_error_stops_run() {
        let dir = TempDir::new().unwrap();
        let checkpoint = Arc::new(CheckpointStore::fresh(dir.path().join("results.json")));
        let runner = Runner::new(planner(&[]), checkpoint.clone(), 1);
        let err = runner.run(vec![person("u1")], std::future::pending()).await.unwrap_err();
        assert!(matches!(err, RunError::ServiceUnavailable { ref person, .. } if person == "u1"));
        assert!(checkpoint.is_empty().await);
    }

    #[tokio::test]
    async fn test_shutdown_interrupts() {
        let dir = TempDir::new().unwrap();
        let checkpoint = Arc::new(CheckpointStore::fresh(dir.path().join("results.json")));
        let runner = Runner::new(planner(&[]), checkpoint, 1);
        let err = runner.run(vec![person("u1")], async {}).await.unwrap_err();
        assert!(matches!(err, RunError::Interrupted { completed: 0 }));
    }
}
