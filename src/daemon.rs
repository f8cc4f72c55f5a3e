use async_trait::async_trait;
use std::collections::BTreeSet;

use crate::error::HarnessError;
use crate::task::{CacheRecord, LaunchRequest, SubmittedTask, SyncOutcome, TaskHandle, TaskStatus};
use crate::value::ResultValue;

/// The execution daemon as seen from the harness.
///
/// Scheduling, execution and persistence all happen on the other side of this
/// trait; the harness only submits work and observes it.
#[async_trait]
pub trait Daemon: Send + Sync {
    /// Succeeds once the daemon answers requests
    async fn ping(&self) -> Result<(), HarnessError>;

    /// Hand a task to the daemon and return as soon as it is accepted
    async fn submit(&self, request: &LaunchRequest) -> Result<SubmittedTask, HarnessError>;

    /// Run a task and wait until it and all its sub-steps are done
    async fn run_sync(&self, request: &LaunchRequest) -> Result<SyncOutcome, HarnessError>;

    async fn status(&self, handle: TaskHandle) -> Result<TaskStatus, HarnessError>;

    /// Structured outputs of a task, keyed by output port
    async fn outputs(&self, handle: TaskHandle) -> Result<ResultValue, HarnessError>;

    async fn cache_metadata(&self, handle: TaskHandle) -> Result<CacheRecord, HarnessError>;

    /// Names of the raw files stored with a task
    async fn artifact_names(&self, handle: TaskHandle) -> Result<BTreeSet<String>, HarnessError>;
}
