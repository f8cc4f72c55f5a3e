//! Building task submissions and handing them to the daemon.
//!
//! Every submission is recorded in the [`TaskRegistry`] together with the
//! result it is expected to produce, before the call returns.

pub mod restart;
pub mod specs;

use std::sync::Arc;

use crate::daemon::Daemon;
use crate::error::HarnessError;
use crate::registry::{Origin, RegisteredTask, TaskRegistry};
use crate::task::{LaunchRequest, SubmittedTask, SyncOutcome, TaskKind};
use crate::value::ResultValue;

pub use restart::{run_restart_scenario, RestartCase, RestartExpectation};
pub use specs::{calculation, expected_calculation, workflow_variants};

/// A task ready to be launched, with the result it should produce
#[derive(Debug, Clone, PartialEq)]
pub struct TaskSpec {
    pub label: String,
    pub request: LaunchRequest,
    pub expected: ResultValue,
}

impl TaskSpec {
    pub fn kind(&self) -> TaskKind {
        self.request.kind
    }
}

pub struct TaskLauncher {
    daemon: Arc<dyn Daemon>,
}

impl TaskLauncher {
    pub fn new(daemon: Arc<dyn Daemon>) -> Self {
        Self { daemon }
    }

    /// Submit a task in the background.
    ///
    /// A daemon failure is returned as a launch error; nothing is retried.
    pub async fn submit(
        &self,
        registry: &mut TaskRegistry,
        spec: TaskSpec,
    ) -> Result<SubmittedTask, HarnessError> {
        let submitted = self
            .daemon
            .submit(&spec.request)
            .await
            .map_err(|e| HarnessError::launch(&spec.label, &e))?;

        log::info!(
            "{} launched, uuid={}, pk={}",
            spec.label,
            submitted.uuid,
            submitted.handle
        );
        Self::register(registry, &submitted, spec, Origin::Submitted)?;
        Ok(submitted)
    }

    /// Run a task to completion, blocking until the daemon reports it done
    pub async fn run_sync(
        &self,
        registry: &mut TaskRegistry,
        spec: TaskSpec,
        origin: Origin,
    ) -> Result<SyncOutcome, HarnessError> {
        let outcome = self
            .daemon
            .run_sync(&spec.request)
            .await
            .map_err(|e| HarnessError::launch(&spec.label, &e))?;

        log::info!(
            "{} ran, uuid={}, pk={}, {}",
            spec.label,
            outcome.task.uuid,
            outcome.task.handle,
            outcome.status
        );
        Self::register(registry, &outcome.task, spec, origin)?;
        Ok(outcome)
    }

    fn register(
        registry: &mut TaskRegistry,
        submitted: &SubmittedTask,
        spec: TaskSpec,
        origin: Origin,
    ) -> Result<(), HarnessError> {
        registry.insert(
            submitted.handle,
            RegisteredTask {
                kind: spec.request.kind,
                label: spec.label,
                origin,
                expected: spec.expected,
            },
        )
    }
}
