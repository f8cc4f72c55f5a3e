//! Comparing what terminal tasks produced against what was registered.
//!
//! Validation is fail-soft: every handle is checked and every problem is
//! recorded before a verdict is returned.

use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::daemon::Daemon;
use crate::error::HarnessError;
use crate::task::{TaskHandle, TaskStatus};
use crate::value::ResultValue;

/// Output port holding the single result of a workflow
pub const WORKFLOW_OUTPUT_PORT: &str = "output";
/// Calculation output field listing retrieved artifacts as `[name, content]` pairs
pub const ARTIFACTS_FIELD: &str = "artifacts";

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "failure", rename_all = "snake_case")]
pub enum Failure {
    /// The daemon could not be asked for the task status
    StatusUnavailable { reason: String },
    NotFinishedOk { status: TaskStatus },
    /// The task, or the output the check needs, cannot be loaded
    ResultMissing { reason: String },
    ValueMismatch {
        expected: ResultValue,
        actual: ResultValue,
    },
    CacheMetadataUnavailable { reason: String },
    /// No reference to the task the result was taken from
    NotCached,
    HashMismatch {
        stored: Option<String>,
        computed: String,
    },
    NoArtifacts,
    OriginalNoArtifacts { original: TaskHandle },
    OriginalArtifactsUnavailable { original: TaskHandle, reason: String },
    ArtifactSetMismatch {
        original: TaskHandle,
        cached: BTreeSet<String>,
        original_artifacts: BTreeSet<String>,
    },
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Failure::StatusUnavailable { reason } => write!(f, "status unavailable: {reason}"),
            Failure::NotFinishedOk { status } => write!(f, "not finished ok: {status}"),
            Failure::ResultMissing { reason } => write!(f, "no result: {reason}"),
            Failure::ValueMismatch { expected, actual } => {
                write!(f, "expected {expected} but got {actual}")
            }
            Failure::CacheMetadataUnavailable { reason } => {
                write!(f, "cache metadata unavailable: {reason}")
            }
            Failure::NotCached => f.write_str("not cached"),
            Failure::HashMismatch { stored, computed } => write!(
                f,
                "stored hash {} does not match computed hash {computed}",
                stored.as_deref().unwrap_or("<none>")
            ),
            Failure::NoArtifacts => f.write_str("no artifacts retrievable"),
            Failure::OriginalNoArtifacts { original } => {
                write!(f, "original {original} has no artifacts retrievable")
            }
            Failure::OriginalArtifactsUnavailable { original, reason } => {
                write!(f, "artifacts of original {original} unavailable: {reason}")
            }
            Failure::ArtifactSetMismatch {
                original,
                cached,
                original_artifacts,
            } => write!(
                f,
                "artifacts {cached:?} differ from original {original} artifacts {original_artifacts:?}"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskVerdict {
    pub handle: TaskHandle,
    pub failures: Vec<Failure>,
}

impl TaskVerdict {
    pub fn new(handle: TaskHandle) -> Self {
        Self {
            handle,
            failures: Vec::new(),
        }
    }

    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, failure: Failure) {
        self.failures.push(failure);
    }
}

/// Outcome of one validation pass, one verdict per handle in input order
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationReport {
    pub check: String,
    pub verdicts: Vec<TaskVerdict>,
}

impl ValidationReport {
    pub fn new(check: &str) -> Self {
        Self {
            check: check.to_string(),
            verdicts: Vec::new(),
        }
    }

    pub fn is_valid(&self) -> bool {
        self.verdicts.iter().all(TaskVerdict::passed)
    }

    pub fn failed_handles(&self) -> Vec<TaskHandle> {
        self.verdicts
            .iter()
            .filter(|v| !v.passed())
            .map(|v| v.handle)
            .collect()
    }

    pub fn push(&mut self, verdict: TaskVerdict) {
        self.verdicts.push(verdict);
    }

    /// Log every failure, then one summary line
    pub fn log(&self) {
        for verdict in self.verdicts.iter().filter(|v| !v.passed()) {
            for failure in &verdict.failures {
                log::error!("* [{}] pk {}: {failure}", self.check, verdict.handle);
            }
        }

        let failed = self.failed_handles().len();
        if failed == 0 {
            log::info!("[{}] all {} tasks passed", self.check, self.verdicts.len());
        } else {
            log::error!(
                "[{}] {failed} of {} tasks failed",
                self.check,
                self.verdicts.len()
            );
        }
    }
}

/// Map a lookup error to the failure it stands for
pub(crate) fn lookup_failure(error: &HarnessError) -> Failure {
    if error.is_missing() {
        Failure::ResultMissing {
            reason: error.to_string(),
        }
    } else {
        Failure::StatusUnavailable {
            reason: error.to_string(),
        }
    }
}

/// Replace a `[name, content]` artifact listing by a name to content mapping
pub fn normalize_calculation_outputs(outputs: ResultValue) -> ResultValue {
    match outputs {
        ResultValue::Mapping(mut map) => {
            if let Some(normalized) = map.get(ARTIFACTS_FIELD).and_then(ResultValue::pairs_to_mapping) {
                map.insert(ARTIFACTS_FIELD.to_string(), normalized);
            }
            ResultValue::Mapping(map)
        }
        other => other,
    }
}

pub struct ResultValidator {
    daemon: Arc<dyn Daemon>,
}

impl ResultValidator {
    pub fn new(daemon: Arc<dyn Daemon>) -> Self {
        Self { daemon }
    }

    pub async fn validate_calculations(
        &self,
        expected: &[(TaskHandle, &ResultValue)],
    ) -> ValidationReport {
        let mut report = ValidationReport::new("calculations");
        for (handle, expected) in expected {
            report.push(self.check_calculation(*handle, expected).await);
        }
        report
    }

    pub async fn validate_workflows(&self, expected: &[(TaskHandle, &ResultValue)]) -> ValidationReport {
        let mut report = ValidationReport::new("workflows");
        for (handle, expected) in expected {
            report.push(self.check_workflow(*handle, expected).await);
        }
        report
    }

    async fn check_calculation(&self, handle: TaskHandle, expected: &ResultValue) -> TaskVerdict {
        let mut verdict = TaskVerdict::new(handle);

        match self.daemon.status(handle).await {
            Ok(status) if !status.is_finished_ok() => {
                verdict.fail(Failure::NotFinishedOk { status });
            }
            Ok(_) => {}
            Err(e) => {
                let failure = lookup_failure(&e);
                let unusable = e.is_missing();
                verdict.fail(failure);
                if unusable {
                    return verdict;
                }
            }
        }

        match self.daemon.outputs(handle).await {
            Ok(outputs) => {
                let actual = normalize_calculation_outputs(outputs);
                if actual != *expected {
                    verdict.fail(Failure::ValueMismatch {
                        expected: expected.clone(),
                        actual,
                    });
                }
            }
            Err(e) => verdict.fail(Failure::ResultMissing {
                reason: e.to_string(),
            }),
        }

        verdict
    }

    /// Output first, then status, then value; the later checks are skipped once
    /// the handle is known unusable or did not finish ok.
    async fn check_workflow(&self, handle: TaskHandle, expected: &ResultValue) -> TaskVerdict {
        let mut verdict = TaskVerdict::new(handle);

        let actual = match self.daemon.outputs(handle).await {
            Ok(outputs) => match outputs.get(WORKFLOW_OUTPUT_PORT) {
                Some(value) => value.clone(),
                None => {
                    verdict.fail(Failure::ResultMissing {
                        reason: format!("no '{WORKFLOW_OUTPUT_PORT}' output"),
                    });
                    return verdict;
                }
            },
            Err(e) => {
                verdict.fail(Failure::ResultMissing {
                    reason: e.to_string(),
                });
                return verdict;
            }
        };

        match self.daemon.status(handle).await {
            Ok(status) if status.is_finished_ok() => {}
            Ok(status) => {
                verdict.fail(Failure::NotFinishedOk { status });
                return verdict;
            }
            Err(e) => {
                verdict.fail(lookup_failure(&e));
                return verdict;
            }
        }

        if actual != *expected {
            verdict.fail(Failure::ValueMismatch {
                expected: expected.clone(),
                actual,
            });
        }
        verdict
    }
}
