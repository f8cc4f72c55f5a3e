//! In-process stand-ins for the daemon and its diagnostics.
//!
//! [`InMemoryDaemon`] runs the same entry points the harness launches against
//! a real daemon, with knobs to make individual tasks stall, fail or lie about
//! their results.

use async_trait::async_trait;
use dashmap::DashMap;
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::cache::content_hash;
use crate::daemon::Daemon;
use crate::diagnostics::Diagnostics;
use crate::error::HarnessError;
use crate::launcher::restart::{
    ADD_BASE_WORKFLOW, DISABLED_HANDLER, ERROR_HANDLER_DISABLED, ERROR_TOO_BIG, SUM_THRESHOLD,
};
use crate::launcher::specs::{
    CALCFUNCTION_RUNNER_WORKFLOW, DYNAMIC_DB_WORKFLOW, DYNAMIC_MIXED_WORKFLOW,
    DYNAMIC_NON_DB_WORKFLOW, INPUT_FILE_NAME, LIST_ECHO_WORKFLOW, NESTED_NAMESPACE_WORKFLOW,
    NESTED_WORKFLOW, OUTPUT_FILE_NAME, SERIALIZE_WORKFLOW, TEMPLATE_REPLACER, TRIPLE_VALUE_FILE,
    WORKFUNCTION_RUNNER_WORKFLOW,
};
use crate::task::{
    CacheRecord, LaunchRequest, ProcessState, SubmittedTask, SyncOutcome, TaskHandle, TaskKind,
    TaskStatus, TerminalStatus,
};
use crate::validator::{ARTIFACTS_FIELD, WORKFLOW_OUTPUT_PORT};
use crate::value::ResultValue;

// Default configuration constants
const DEFAULT_POLLS_TO_FINISH: usize = 1;
const DEFAULT_FIRST_PK: u64 = 100;

/// Exit status of a restart workflow whose sub-step failed and was not handled
pub const ERROR_UNHANDLED_FAILURE: i32 = 302;
/// Files every doubling calculation leaves in its repository
pub const CALCULATION_ARTIFACTS: [&str; 4] = [
    "_submit_script.sh",
    "_scheduler-stdout.txt",
    "_scheduler-stderr.txt",
    INPUT_FILE_NAME,
];

#[derive(Debug, Clone)]
struct TaskRecord {
    kind: TaskKind,
    uuid: Uuid,
    hash_objects: ResultValue,
    stored_hash: Option<String>,
    cached_from: Option<TaskHandle>,
    final_status: TaskStatus,
    outputs: Option<ResultValue>,
    artifacts: BTreeSet<String>,
    called: usize,
    polls: usize,
    polls_to_finish: usize,
    finished: bool,
    stalled: bool,
}

impl TaskRecord {
    fn submitted(&self, handle: TaskHandle) -> SubmittedTask {
        SubmittedTask {
            handle,
            uuid: self.uuid,
        }
    }
}

/// What running one process produced
struct Execution {
    status: TaskStatus,
    outputs: ResultValue,
    artifacts: BTreeSet<String>,
    called: usize,
}

impl Execution {
    fn ok(outputs: ResultValue, called: usize) -> Self {
        Self {
            status: TaskStatus::FINISHED_OK,
            outputs,
            artifacts: BTreeSet::new(),
            called,
        }
    }

    fn failed(exit_status: i32, called: usize) -> Self {
        Self {
            status: TaskStatus::from_state(ProcessState::Finished, Some(exit_status)),
            outputs: ResultValue::Mapping(Default::default()),
            artifacts: BTreeSet::new(),
            called,
        }
    }
}

pub struct InMemoryDaemon {
    tasks: DashMap<TaskHandle, TaskRecord>,
    next_pk: AtomicU64,
    polls_to_finish: usize,
    max_jitter: usize,
    submissions: AtomicUsize,
    pings: AtomicUsize,
    unanswered_pings: AtomicUsize,
    rejection: Mutex<Option<String>>,
    cache_hit_status: Mutex<Option<TerminalStatus>>,
    stall_new_tasks: AtomicBool,
    broken_restart_handler: AtomicBool,
    workflow_tampering: DashMap<String, i64>,
}

impl Default for InMemoryDaemon {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryDaemon {
    pub fn new() -> Self {
        Self {
            tasks: DashMap::new(),
            next_pk: AtomicU64::new(DEFAULT_FIRST_PK),
            polls_to_finish: DEFAULT_POLLS_TO_FINISH,
            max_jitter: 0,
            submissions: AtomicUsize::new(0),
            pings: AtomicUsize::new(0),
            unanswered_pings: AtomicUsize::new(0),
            rejection: Mutex::new(None),
            cache_hit_status: Mutex::new(None),
            stall_new_tasks: AtomicBool::new(false),
            broken_restart_handler: AtomicBool::new(false),
            workflow_tampering: DashMap::new(),
        }
    }

    /// Submitted tasks report terminal on their `polls`-th status query
    pub fn with_polls_to_finish(mut self, polls: usize) -> Self {
        self.polls_to_finish = polls.max(1);
        self
    }

    /// Each submitted task needs up to `max_extra` further status queries
    pub fn with_jitter(mut self, max_extra: usize) -> Self {
        self.max_jitter = max_extra;
        self
    }

    /// Number of accepted background submissions
    pub fn submissions(&self) -> usize {
        self.submissions.load(Ordering::SeqCst)
    }

    pub fn pings(&self) -> usize {
        self.pings.load(Ordering::SeqCst)
    }

    /// Refuse every request, as if nothing listened on the daemon's port
    pub fn go_offline(&self) {
        self.unanswered_pings.store(usize::MAX, Ordering::SeqCst);
    }

    /// Refuse requests until `pings` pings have gone unanswered
    pub fn come_online_after(&self, pings: usize) {
        self.unanswered_pings.store(pings, Ordering::SeqCst);
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Fail every following submission with `reason`
    pub fn reject_submissions(&self, reason: &str) {
        *lock(&self.rejection) = Some(reason.to_string());
    }

    /// Tasks served from the cache from now on terminate with `status`
    pub fn fail_cache_hits(&self, status: TerminalStatus) {
        *lock(&self.cache_hit_status) = Some(status);
    }

    pub fn stall_new_tasks(&self) {
        self.stall_new_tasks.store(true, Ordering::SeqCst);
    }

    /// Make the restart workflow's negative-sum handler give up instead of retrying
    pub fn break_restart_handler(&self) {
        self.broken_restart_handler.store(true, Ordering::SeqCst);
    }

    /// Workflows of `process` created from now on return `value` as their output
    pub fn tamper_workflow_output(&self, process: &str, value: i64) {
        self.workflow_tampering.insert(process.to_string(), value);
    }

    pub fn stall(&self, handle: TaskHandle) {
        self.update(handle, |task| {
            task.stalled = true;
            task.finished = false;
        });
    }

    /// Mark every task that is not stalled as terminal
    pub fn finish_all(&self) {
        for mut task in self.tasks.iter_mut() {
            if !task.stalled {
                task.finished = true;
            }
        }
    }

    pub fn fail_task(&self, handle: TaskHandle, status: TerminalStatus) {
        self.update(handle, |task| {
            task.final_status = TaskStatus::Terminal { status };
            task.finished = true;
            task.stalled = false;
        });
    }

    pub fn tamper_outputs(&self, handle: TaskHandle, outputs: ResultValue) {
        self.update(handle, |task| task.outputs = Some(outputs));
    }

    pub fn drop_outputs(&self, handle: TaskHandle) {
        self.update(handle, |task| task.outputs = None);
    }

    pub fn corrupt_hash(&self, handle: TaskHandle) {
        self.update(handle, |task| task.stored_hash = Some("0".repeat(64)));
    }

    pub fn remove_artifact(&self, handle: TaskHandle, name: &str) {
        self.update(handle, |task| {
            task.artifacts.remove(name);
        });
    }

    pub fn clear_artifacts(&self, handle: TaskHandle) {
        self.update(handle, |task| task.artifacts.clear());
    }

    fn update(&self, handle: TaskHandle, change: impl FnOnce(&mut TaskRecord)) {
        if let Some(mut task) = self.tasks.get_mut(&handle) {
            change(&mut task);
        }
    }

    fn check_online(&self) -> Result<(), HarnessError> {
        if self.unanswered_pings.load(Ordering::SeqCst) > 0 {
            return Err(tonic::Status::unavailable("connection refused").into());
        }
        Ok(())
    }

    fn check_rejection(&self) -> Result<(), HarnessError> {
        self.check_online()?;
        match lock(&self.rejection).as_ref() {
            Some(reason) => Err(tonic::Status::unavailable(reason.clone()).into()),
            None => Ok(()),
        }
    }

    fn allocate(&self) -> TaskHandle {
        TaskHandle::new(self.next_pk.fetch_add(1, Ordering::SeqCst))
    }

    /// Earliest finished-ok task with the same hash that was itself computed
    fn cache_source(&self, hash: &str) -> Option<(TaskHandle, TaskRecord)> {
        self.tasks
            .iter()
            .filter(|entry| {
                let task = entry.value();
                task.finished
                    && task.final_status.is_finished_ok()
                    && task.cached_from.is_none()
                    && task.stored_hash.as_deref() == Some(hash)
            })
            .map(|entry| (*entry.key(), entry.value().clone()))
            .min_by_key(|(handle, _)| *handle)
    }

    fn create(&self, request: &LaunchRequest, background: bool) -> Result<TaskHandle, HarnessError> {
        self.check_rejection()?;

        let hash_objects = ResultValue::mapping([
            ("process", ResultValue::str(request.process.as_str())),
            ("inputs", request.inputs.clone()),
        ]);
        let hash = content_hash(&hash_objects);

        let caching_enabled = request.caching.as_deref() == Some(request.process.as_str());
        let cached = if caching_enabled {
            self.cache_source(&hash)
        } else {
            None
        };

        let (execution, cached_from) = match cached {
            Some((original, source)) => (
                Execution {
                    status: lock(&self.cache_hit_status)
                        .map(|status| TaskStatus::Terminal { status })
                        .unwrap_or(source.final_status),
                    outputs: source.outputs.clone().unwrap_or(ResultValue::Null),
                    artifacts: source.artifacts.clone(),
                    called: source.called,
                },
                Some(original),
            ),
            None => (self.execute(request)?, None),
        };

        let stalled = background && self.stall_new_tasks.load(Ordering::SeqCst);
        let jitter = if background && self.max_jitter > 0 {
            fastrand::usize(0..=self.max_jitter)
        } else {
            0
        };

        let handle = self.allocate();
        self.tasks.insert(
            handle,
            TaskRecord {
                kind: request.kind,
                uuid: Uuid::new_v4(),
                hash_objects,
                stored_hash: Some(hash),
                cached_from,
                final_status: execution.status,
                outputs: Some(execution.outputs),
                artifacts: execution.artifacts,
                called: execution.called,
                polls: 0,
                polls_to_finish: self.polls_to_finish + jitter,
                finished: !background,
                stalled,
            },
        );
        Ok(handle)
    }

    fn execute(&self, request: &LaunchRequest) -> Result<Execution, HarnessError> {
        let inputs = &request.inputs;
        let required = |path: &str| {
            inputs.lookup(path).cloned().ok_or_else(|| {
                HarnessError::Protocol(format!("{}: missing input '{path}'", request.process))
            })
        };
        let required_int = |path: &str| {
            required(path)?.as_i64().ok_or_else(|| {
                HarnessError::Protocol(format!("{}: input '{path}' is not an integer", request.process))
            })
        };
        let int_node = |value: i64| ResultValue::node("Int", ResultValue::Int(value));
        let output = |value: ResultValue| ResultValue::mapping([(WORKFLOW_OUTPUT_PORT, value)]);

        let mut execution = match request.process.as_str() {
            TEMPLATE_REPLACER => {
                let value = required_int("parameters.value")?;
                let outputs = ResultValue::mapping([
                    ("value", ResultValue::Int(2 * value)),
                    (
                        ARTIFACTS_FIELD,
                        ResultValue::list([ResultValue::list([
                            ResultValue::str(TRIPLE_VALUE_FILE),
                            ResultValue::str((3 * value).to_string()),
                        ])]),
                    ),
                ]);
                let mut execution = Execution::ok(outputs, 0);
                execution.artifacts = CALCULATION_ARTIFACTS
                    .iter()
                    .chain([&OUTPUT_FILE_NAME])
                    .map(|name| name.to_string())
                    .collect();
                execution
            }
            NESTED_WORKFLOW => Execution::ok(output(required("inp")?), 1),
            NESTED_NAMESPACE_WORKFLOW => Execution::ok(output(required("foo.bar.baz")?), 0),
            DYNAMIC_NON_DB_WORKFLOW => Execution::ok(
                output(ResultValue::node("List", required("namespace.input")?)),
                0,
            ),
            DYNAMIC_DB_WORKFLOW => Execution::ok(output(required("namespace.input")?), 0),
            DYNAMIC_MIXED_WORKFLOW => {
                let sum = required_int("namespace.inputs.input_non_db")?
                    + required_int("namespace.inputs.input_db")?;
                Execution::ok(output(int_node(sum)), 0)
            }
            SERIALIZE_WORKFLOW => {
                let identity = required("test")?;
                Execution::ok(output(ResultValue::node("Str", identity)), 0)
            }
            LIST_ECHO_WORKFLOW => Execution::ok(output(required("list")?), 0),
            WORKFUNCTION_RUNNER_WORKFLOW => Execution::ok(output(required("input")?), 1),
            CALCFUNCTION_RUNNER_WORKFLOW => {
                Execution::ok(output(int_node(required_int("input")? + 1)), 1)
            }
            ADD_BASE_WORKFLOW => self.add_base(request)?,
            other => {
                return Err(HarnessError::Protocol(format!("unknown entry point '{other}'")));
            }
        };

        if request.kind == TaskKind::Workflow {
            if let Some(value) = self.workflow_tampering.get(&request.process) {
                execution.outputs = output(int_node(*value));
            }
        }
        Ok(execution)
    }

    /// Adder wrapped in a restarting workflow, see `launcher::restart`
    fn add_base(&self, request: &LaunchRequest) -> Result<Execution, HarnessError> {
        let inputs = &request.inputs;
        let int = |path: &str| {
            inputs.lookup(path).and_then(ResultValue::as_i64).ok_or_else(|| {
                HarnessError::Protocol(format!("{ADD_BASE_WORKFLOW}: missing input '{path}'"))
            })
        };
        let x = int("add.x")?;
        let mut y = int("add.y")?;
        let allow_negative = inputs
            .lookup("add.settings.allow_negative")
            .and_then(ResultValue::as_bool)
            .unwrap_or(true);
        let doom = inputs
            .lookup(&format!("handler_overrides.{DISABLED_HANDLER}"))
            .and_then(ResultValue::as_bool)
            .unwrap_or(false);
        let broken = self.broken_restart_handler.load(Ordering::SeqCst);

        let mut called = 0;
        loop {
            called += 1;
            let sum = x + y;

            if doom {
                return Ok(Execution::failed(ERROR_HANDLER_DISABLED, called));
            }
            if sum < 0 && !allow_negative {
                if broken || called > 1 {
                    return Ok(Execution::failed(ERROR_UNHANDLED_FAILURE, called));
                }
                y = -y;
                continue;
            }
            if sum > SUM_THRESHOLD {
                return Ok(Execution::failed(ERROR_TOO_BIG, called));
            }

            let outputs = ResultValue::mapping([("sum", ResultValue::node("Int", ResultValue::Int(sum)))]);
            return Ok(Execution::ok(outputs, called));
        }
    }

    fn record(&self, handle: TaskHandle) -> Result<TaskRecord, HarnessError> {
        self.tasks
            .get(&handle)
            .map(|task| task.value().clone())
            .ok_or(HarnessError::TaskNotFound(handle))
    }
}

#[async_trait]
impl Daemon for InMemoryDaemon {
    async fn ping(&self) -> Result<(), HarnessError> {
        self.pings.fetch_add(1, Ordering::SeqCst);
        let refused = self
            .unanswered_pings
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if refused {
            return Err(tonic::Status::unavailable("connection refused").into());
        }
        Ok(())
    }

    async fn submit(&self, request: &LaunchRequest) -> Result<SubmittedTask, HarnessError> {
        let handle = self.create(request, true)?;
        self.submissions.fetch_add(1, Ordering::SeqCst);
        Ok(self.record(handle)?.submitted(handle))
    }

    async fn run_sync(&self, request: &LaunchRequest) -> Result<SyncOutcome, HarnessError> {
        let handle = self.create(request, false)?;
        let task = self.record(handle)?;
        Ok(SyncOutcome {
            task: task.submitted(handle),
            status: task.final_status,
            outputs: task.outputs.unwrap_or(ResultValue::Null),
            called: task.called,
        })
    }

    async fn status(&self, handle: TaskHandle) -> Result<TaskStatus, HarnessError> {
        self.check_online()?;
        let mut task = self
            .tasks
            .get_mut(&handle)
            .ok_or(HarnessError::TaskNotFound(handle))?;

        if !task.finished {
            task.polls += 1;
            if !task.stalled && task.polls >= task.polls_to_finish {
                task.finished = true;
            }
        }

        if task.finished {
            return Ok(task.final_status);
        }
        let state = if task.polls == 1 {
            ProcessState::Waiting
        } else {
            ProcessState::Running
        };
        Ok(TaskStatus::Pending { state })
    }

    async fn outputs(&self, handle: TaskHandle) -> Result<ResultValue, HarnessError> {
        let task = self.record(handle)?;
        if !task.finished {
            return Err(HarnessError::result_missing(handle, "task has not terminated"));
        }
        task.outputs
            .ok_or_else(|| HarnessError::result_missing(handle, "no outputs stored"))
    }

    async fn cache_metadata(&self, handle: TaskHandle) -> Result<CacheRecord, HarnessError> {
        let task = self.record(handle)?;
        Ok(CacheRecord {
            kind: task.kind,
            cached_from: task.cached_from,
            stored_hash: task.stored_hash,
            hash_objects: task.hash_objects,
            artifacts: task.artifacts,
        })
    }

    async fn artifact_names(&self, handle: TaskHandle) -> Result<BTreeSet<String>, HarnessError> {
        Ok(self.record(handle)?.artifacts)
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Diagnostics that answer every call with a canned text and count the calls
#[derive(Debug, Default)]
pub struct RecordingDiagnostics {
    daemon_log_calls: AtomicUsize,
    process_list_calls: AtomicUsize,
    daemon_status_calls: AtomicUsize,
    reported: Mutex<Vec<TaskHandle>>,
}

impl RecordingDiagnostics {
    pub fn daemon_log_calls(&self) -> usize {
        self.daemon_log_calls.load(Ordering::SeqCst)
    }

    pub fn process_list_calls(&self) -> usize {
        self.process_list_calls.load(Ordering::SeqCst)
    }

    pub fn daemon_status_calls(&self) -> usize {
        self.daemon_status_calls.load(Ordering::SeqCst)
    }

    /// Handles a process report was requested for, in request order
    pub fn reported_handles(&self) -> Vec<TaskHandle> {
        lock(&self.reported).clone()
    }
}

#[async_trait]
impl Diagnostics for RecordingDiagnostics {
    async fn daemon_log(&self) -> Option<String> {
        self.daemon_log_calls.fetch_add(1, Ordering::SeqCst);
        Some("daemon log".to_string())
    }

    async fn process_list(&self) -> Option<String> {
        self.process_list_calls.fetch_add(1, Ordering::SeqCst);
        Some("process list".to_string())
    }

    async fn daemon_status(&self) -> Option<String> {
        self.daemon_status_calls.fetch_add(1, Ordering::SeqCst);
        None
    }

    async fn process_report(&self, handle: TaskHandle) -> Option<String> {
        lock(&self.reported).push(handle);
        Some(format!("report for {handle}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::restart::restart_cases;
    use crate::launcher::{calculation, workflow_variants};
    use crate::validator::normalize_calculation_outputs;

    #[tokio::test]
    async fn test_calculation_doubles_and_triples() {
        let daemon = InMemoryDaemon::new();
        let spec = calculation("doubler", 1, 5);
        let outcome = daemon.run_sync(&spec.request).await.unwrap();

        assert!(outcome.status.is_finished_ok());
        assert_eq!(normalize_calculation_outputs(outcome.outputs), spec.expected);
        let artifacts = daemon.artifact_names(outcome.task.handle).await.unwrap();
        assert!(artifacts.contains(INPUT_FILE_NAME));
    }

    /// Test the purpose of InMemoryDaemon: every workflow variant yields its expectation
    #[tokio::test]
    async fn test_workflow_variants_produce_expected_outputs() {
        let daemon = InMemoryDaemon::new();
        for spec in workflow_variants(3) {
            let outcome = daemon.run_sync(&spec.request).await.unwrap();
            assert!(outcome.status.is_finished_ok(), "{}", spec.label);
            assert_eq!(
                outcome.outputs.get(WORKFLOW_OUTPUT_PORT),
                Some(&spec.expected),
                "{}",
                spec.label
            );
        }
    }

    #[tokio::test]
    async fn test_restart_cases_behave_as_expected() {
        let daemon = InMemoryDaemon::new();
        for case in restart_cases() {
            let outcome = daemon
                .run_sync(&case.spec("add@localhost").request)
                .await
                .unwrap();
            case.verify(&outcome).unwrap();
        }
    }

    #[tokio::test]
    async fn test_broken_handler_fails_negative_case() {
        let daemon = InMemoryDaemon::new();
        daemon.break_restart_handler();
        let case = restart_cases()[1];
        let outcome = daemon
            .run_sync(&case.spec("add@localhost").request)
            .await
            .unwrap();
        assert_eq!(outcome.status.exit_status(), Some(ERROR_UNHANDLED_FAILURE));
        assert!(case.verify(&outcome).is_err());
    }

    #[tokio::test]
    async fn test_status_progression() {
        let daemon = InMemoryDaemon::new().with_polls_to_finish(3);
        let spec = calculation("doubler", 1, 1);
        let handle = daemon.submit(&spec.request).await.unwrap().handle;

        assert!(daemon.outputs(handle).await.unwrap_err().is_missing());
        assert_eq!(
            daemon.status(handle).await.unwrap(),
            TaskStatus::Pending {
                state: ProcessState::Waiting
            }
        );
        assert_eq!(
            daemon.status(handle).await.unwrap(),
            TaskStatus::Pending {
                state: ProcessState::Running
            }
        );
        assert!(daemon.status(handle).await.unwrap().is_finished_ok());
        assert!(daemon.outputs(handle).await.is_ok());
    }

    #[tokio::test]
    async fn test_jitter_stays_bounded() {
        let daemon = InMemoryDaemon::new().with_jitter(2);
        let spec = calculation("doubler", 1, 1);
        let handle = daemon.submit(&spec.request).await.unwrap().handle;

        let mut polls = 0;
        while !daemon.status(handle).await.unwrap().is_terminated() {
            polls += 1;
            assert!(polls < 3);
        }
    }

    /// Test the expected behavior: caching only applies to the named entry point
    #[tokio::test]
    async fn test_caching_requires_matching_identifier() {
        let daemon = InMemoryDaemon::new();
        let original = daemon
            .run_sync(&calculation("doubler", 1, 2).request)
            .await
            .unwrap();

        let other = calculation("doubler", 1, 2)
            .request
            .with_caching("calculations:arithmetic.add");
        let fresh = daemon.run_sync(&other).await.unwrap();
        let record = daemon.cache_metadata(fresh.task.handle).await.unwrap();
        assert_eq!(record.cached_from, None);

        let same = calculation("doubler", 1, 2)
            .request
            .with_caching(TEMPLATE_REPLACER);
        let cached = daemon.run_sync(&same).await.unwrap();
        let record = daemon.cache_metadata(cached.task.handle).await.unwrap();
        assert_eq!(record.cached_from, Some(original.task.handle));
        assert_eq!(record.stored_hash, Some(content_hash(&record.hash_objects)));
    }

    #[tokio::test]
    async fn test_offline_daemon_refuses_until_pinged_enough() {
        let daemon = InMemoryDaemon::new();
        daemon.come_online_after(2);
        let spec = calculation("doubler", 1, 1);

        assert!(daemon.submit(&spec.request).await.is_err());
        assert!(daemon.ping().await.is_err());
        assert!(daemon.ping().await.is_err());
        assert!(daemon.ping().await.is_ok());
        assert!(daemon.submit(&spec.request).await.is_ok());
        assert_eq!(daemon.pings(), 3);
    }

    #[tokio::test]
    async fn test_unknown_entry_point_is_rejected() {
        let daemon = InMemoryDaemon::new();
        let request = LaunchRequest::new(TaskKind::Workflow, "workflows:nope", ResultValue::Null);
        assert!(matches!(
            daemon.submit(&request).await,
            Err(HarnessError::Protocol(_))
        ));
        assert_eq!(daemon.task_count(), 0);
    }
}
