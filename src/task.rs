use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use uuid::Uuid;

use crate::value::ResultValue;

/// Identifier the daemon hands out for a submitted task.
///
/// Handles are the daemon's primary keys, so they are totally ordered and the
/// polling order derived from them is stable between runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskHandle(u64);

impl TaskHandle {
    pub const fn new(pk: u64) -> Self {
        Self(pk)
    }

    pub fn pk(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for TaskHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Calculation,
    Workflow,
}

impl TaskKind {
    /// Calculations leave raw input files behind; workflows do not
    pub fn has_artifacts(&self) -> bool {
        matches!(self, TaskKind::Calculation)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Calculation => write!(f, "Calculation"),
            TaskKind::Workflow => write!(f, "Workflow"),
        }
    }
}

/// Lifecycle state as reported by the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProcessState {
    Created,
    Waiting,
    Running,
    Finished,
    Excepted,
    Killed,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ProcessState::Created => "created",
            ProcessState::Waiting => "waiting",
            ProcessState::Running => "running",
            ProcessState::Finished => "finished",
            ProcessState::Excepted => "excepted",
            ProcessState::Killed => "killed",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TerminalStatus {
    FinishedOk,
    FinishedWithError { exit_status: i32 },
    /// Finished, but the daemon recorded no exit status
    FinishedWithoutExitStatus,
    Excepted,
    Killed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "phase", rename_all = "snake_case")]
pub enum TaskStatus {
    Pending { state: ProcessState },
    Terminal { status: TerminalStatus },
}

impl TaskStatus {
    pub const FINISHED_OK: TaskStatus = TaskStatus::Terminal {
        status: TerminalStatus::FinishedOk,
    };

    /// Build a status from the daemon's raw state/exit-status pair.
    ///
    /// Only a finished process with exit status zero counts as a success.
    pub fn from_state(state: ProcessState, exit_status: Option<i32>) -> Self {
        match state {
            ProcessState::Created | ProcessState::Waiting | ProcessState::Running => {
                TaskStatus::Pending { state }
            }
            ProcessState::Finished => match exit_status {
                Some(0) => TaskStatus::FINISHED_OK,
                Some(exit_status) => TaskStatus::Terminal {
                    status: TerminalStatus::FinishedWithError { exit_status },
                },
                None => TaskStatus::Terminal {
                    status: TerminalStatus::FinishedWithoutExitStatus,
                },
            },
            ProcessState::Excepted => TaskStatus::Terminal {
                status: TerminalStatus::Excepted,
            },
            ProcessState::Killed => TaskStatus::Terminal {
                status: TerminalStatus::Killed,
            },
        }
    }

    pub fn is_terminated(&self) -> bool {
        matches!(self, TaskStatus::Terminal { .. })
    }

    pub fn is_finished_ok(&self) -> bool {
        matches!(
            self,
            TaskStatus::Terminal {
                status: TerminalStatus::FinishedOk
            }
        )
    }

    pub fn process_state(&self) -> ProcessState {
        match self {
            TaskStatus::Pending { state } => *state,
            TaskStatus::Terminal { status } => match status {
                TerminalStatus::FinishedOk
                | TerminalStatus::FinishedWithError { .. }
                | TerminalStatus::FinishedWithoutExitStatus => ProcessState::Finished,
                TerminalStatus::Excepted => ProcessState::Excepted,
                TerminalStatus::Killed => ProcessState::Killed,
            },
        }
    }

    pub fn exit_status(&self) -> Option<i32> {
        match self {
            TaskStatus::Terminal {
                status: TerminalStatus::FinishedOk,
            } => Some(0),
            TaskStatus::Terminal {
                status: TerminalStatus::FinishedWithError { exit_status },
            } => Some(*exit_status),
            _ => None,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.exit_status() {
            Some(code) => write!(
                f,
                "process_state<{}> exit_status<{code}>",
                self.process_state()
            ),
            None => write!(f, "process_state<{}> exit_status<None>", self.process_state()),
        }
    }
}

/// What the daemon needs to start a task
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchRequest {
    pub kind: TaskKind,
    /// Entry point of the process to run, e.g. `calculations:templatereplacer`
    pub process: String,
    pub inputs: ResultValue,
    /// When set, the daemon may reuse a finished equivalent task of this entry point
    pub caching: Option<String>,
}

impl LaunchRequest {
    pub fn new(kind: TaskKind, process: &str, inputs: ResultValue) -> Self {
        Self {
            kind,
            process: process.to_string(),
            inputs,
            caching: None,
        }
    }

    pub fn with_caching(mut self, identifier: &str) -> Self {
        self.caching = Some(identifier.to_string());
        self
    }
}

/// Acknowledgement of a submission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubmittedTask {
    pub handle: TaskHandle,
    pub uuid: Uuid,
}

/// Result of running a task tree to completion
#[derive(Debug, Clone, PartialEq)]
pub struct SyncOutcome {
    pub task: SubmittedTask,
    pub status: TaskStatus,
    pub outputs: ResultValue,
    /// Number of sub-processes the task called
    pub called: usize,
}

/// Attributes proving a task was produced from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct CacheRecord {
    pub kind: TaskKind,
    pub cached_from: Option<TaskHandle>,
    pub stored_hash: Option<String>,
    /// The objects the daemon hashes to decide cache equivalence
    pub hash_objects: ResultValue,
    pub artifacts: BTreeSet<String>,
}
