//! One end-to-end run against a live daemon.
//!
//! `LAUNCH -> POLL -> (TIMEOUT | RECHECK_WITH_CACHE -> VALIDATE) -> EXIT`

use anyhow::Context;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

use crate::cache::CacheEquivalenceChecker;
use crate::config::Settings;
use crate::daemon::Daemon;
use crate::diagnostics::{log_dump, Diagnostics};
use crate::error::HarnessError;
use crate::launcher::{calculation, run_restart_scenario, workflow_variants, TaskLauncher};
use crate::monitor::{AwaitOutcome, CompletionMonitor, Readiness};
use crate::registry::{Origin, TaskRegistry};
use crate::task::{TaskHandle, TaskKind};
use crate::validator::{ResultValidator, ValidationReport};
use crate::{EXIT_SUCCESS, EXIT_TIMEOUT, EXIT_VALIDATION_FAILED};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    Success,
    /// Tasks were still running at the polling deadline
    Timeout,
    ValidationFailed,
}

impl Outcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            Outcome::Success => EXIT_SUCCESS,
            Outcome::Timeout => EXIT_TIMEOUT,
            Outcome::ValidationFailed => EXIT_VALIDATION_FAILED,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PollingSummary {
    pub rounds: usize,
    pub elapsed_secs: u64,
    pub cancelled: bool,
    pub pending: Vec<TaskHandle>,
}

impl From<&AwaitOutcome> for PollingSummary {
    fn from(outcome: &AwaitOutcome) -> Self {
        Self {
            rounds: outcome.rounds,
            elapsed_secs: outcome.elapsed.as_secs(),
            cancelled: outcome.cancelled,
            pending: outcome.pending.clone(),
        }
    }
}

/// Summary of a run, written out with `--report`
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub outcome: Outcome,
    pub exit_code: i32,
    pub restart_runs: usize,
    pub calculations: Vec<TaskHandle>,
    pub workflows: Vec<TaskHandle>,
    pub cached: Vec<TaskHandle>,
    pub polling: PollingSummary,
    pub validations: Vec<ValidationReport>,
}

impl RunReport {
    pub fn write_to(&self, path: &Path) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(self).context("Failed to serialize run report")?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write run report to {}", path.display()))?;
        log::info!("Run report written to {}", path.display());
        Ok(())
    }
}

pub struct Orchestrator {
    settings: Settings,
    launcher: TaskLauncher,
    monitor: CompletionMonitor,
    validator: ResultValidator,
    cache_checker: CacheEquivalenceChecker,
    diagnostics: Arc<dyn Diagnostics>,
}

impl Orchestrator {
    pub fn new(settings: Settings, daemon: Arc<dyn Daemon>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            settings,
            launcher: TaskLauncher::new(daemon.clone()),
            monitor: CompletionMonitor::new(daemon.clone(), diagnostics.clone()),
            validator: ResultValidator::new(daemon.clone()),
            cache_checker: CacheEquivalenceChecker::new(daemon),
            diagnostics,
        }
    }

    /// Drive one full run.
    ///
    /// Errors are fatal problems (a failed launch, a broken restart scenario);
    /// timeouts and validation failures are reported through the outcome. A
    /// daemon that never answers within the polling deadline is a timeout.
    pub async fn run(&self, cancel: &mut watch::Receiver<bool>) -> Result<RunReport, HarnessError> {
        let started_at = Utc::now();
        let mut registry = TaskRegistry::new();

        let readiness = self
            .monitor
            .await_daemon(
                self.settings.poll_interval(),
                self.settings.poll_deadline(),
                cancel,
            )
            .await;
        if let Readiness::Unreachable(waited) = readiness {
            log::error!(
                "No daemon reachable at {}",
                self.settings.daemon.endpoint
            );
            return Ok(self
                .conclude(started_at, &registry, 0, &waited, Vec::new())
                .await);
        }

        self.launch(&mut registry).await?;
        let restart_runs = registry.len() - registry.polling_order().len();

        let handles = registry.polling_order();
        log::info!("Waiting for {} submitted tasks to terminate", handles.len());
        let polled = self
            .monitor
            .await_all(
                &handles,
                self.settings.poll_interval(),
                self.settings.poll_deadline(),
                cancel,
            )
            .await;

        let validations = if polled.terminated {
            log::info!("All tasks terminated after {} s", polled.elapsed.as_secs());
            self.recheck_with_cache(&mut registry).await?;
            self.validate(&registry).await
        } else {
            Vec::new()
        };

        Ok(self
            .conclude(started_at, &registry, restart_runs, &polled, validations)
            .await)
    }

    async fn conclude(
        &self,
        started_at: DateTime<Utc>,
        registry: &TaskRegistry,
        restart_runs: usize,
        polled: &AwaitOutcome,
        validations: Vec<ValidationReport>,
    ) -> RunReport {
        let outcome = if !polled.terminated {
            Outcome::Timeout
        } else if validations.iter().all(ValidationReport::is_valid) {
            Outcome::Success
        } else {
            Outcome::ValidationFailed
        };

        log_dump("the daemon log", self.diagnostics.daemon_log().await);

        match outcome {
            Outcome::Success => log::info!("Daemon tests passed"),
            Outcome::Timeout => log::error!("Timeout: not all tasks terminated, exiting"),
            Outcome::ValidationFailed => log::error!("Validation failed, exiting"),
        }

        let handles = registry.polling_order();
        let handles_of = |kind: TaskKind| -> Vec<TaskHandle> {
            handles
                .iter()
                .copied()
                .filter(|h| registry.get(*h).map(|t| t.kind) == Some(kind))
                .collect()
        };

        RunReport {
            started_at,
            finished_at: Utc::now(),
            outcome,
            exit_code: outcome.exit_code(),
            restart_runs,
            calculations: handles_of(TaskKind::Calculation),
            workflows: handles_of(TaskKind::Workflow),
            cached: registry.cached_handles(),
            polling: PollingSummary::from(polled),
            validations,
        }
    }

    async fn launch(&self, registry: &mut TaskRegistry) -> Result<(), HarnessError> {
        let launch = &self.settings.launch;

        run_restart_scenario(&self.launcher, registry, &launch.add_code).await?;

        log::info!("Submitting {} calculations to the daemon", launch.calculations);
        for counter in 1..=launch.calculations {
            let spec = calculation(&launch.calculation_code, counter, counter as i64);
            self.launcher.submit(registry, spec).await?;
        }

        let workflows = workflow_variants(launch.workflows);
        log::info!("Submitting {} workflows to the daemon", workflows.len());
        for spec in workflows {
            self.launcher.submit(registry, spec).await?;
        }
        Ok(())
    }

    /// Run every calculation again, with caching enabled for its entry point
    async fn recheck_with_cache(&self, registry: &mut TaskRegistry) -> Result<(), HarnessError> {
        let launch = &self.settings.launch;
        log::info!(
            "Rerunning {} calculations with caching enabled for '{}'",
            launch.calculations,
            launch.caching_identifier
        );

        for counter in 1..=launch.calculations {
            let mut spec = calculation(&launch.calculation_code, counter, counter as i64);
            spec.label = format!("{} with caching", spec.label);
            spec.request = spec.request.with_caching(&launch.caching_identifier);
            self.launcher
                .run_sync(registry, spec, Origin::Cached)
                .await?;
        }
        Ok(())
    }

    async fn validate(&self, registry: &TaskRegistry) -> Vec<ValidationReport> {
        log::info!("Checking finished calculations");
        let calculations = self
            .validator
            .validate_calculations(&registry.calculation_expectations())
            .await;

        log::info!("Checking finished workflows");
        let workflows = self
            .validator
            .validate_workflows(&registry.workflow_expectations())
            .await;

        log::info!("Checking cached calculations");
        let cache = self
            .cache_checker
            .validate_cached(&registry.cached_handles())
            .await;

        let reports = vec![calculations, workflows, cache];
        let mut failed = BTreeSet::new();
        for report in &reports {
            report.log();
            failed.extend(report.failed_handles());
        }
        for handle in failed {
            log_dump(
                &format!("the report of pk {handle}"),
                self.diagnostics.process_report(handle).await,
            );
        }
        reports
    }
}
