use std::collections::BTreeMap;

use crate::error::HarnessError;
use crate::task::{TaskHandle, TaskKind};
use crate::value::ResultValue;

/// How a registered task reached the daemon
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// Submitted in the background; part of the polled set
    Submitted,
    /// Run to completion inline and checked on the spot
    Inline,
    /// Re-run with caching enabled after the batch converged
    Cached,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RegisteredTask {
    pub kind: TaskKind,
    pub label: String,
    pub origin: Origin,
    pub expected: ResultValue,
}

/// Expected result for every task handle of one run.
///
/// Entries are only ever inserted, and a handle may be inserted once.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    entries: BTreeMap<TaskHandle, RegisteredTask>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, handle: TaskHandle, task: RegisteredTask) -> Result<(), HarnessError> {
        if self.entries.contains_key(&handle) {
            return Err(HarnessError::DuplicateHandle(handle));
        }
        self.entries.insert(handle, task);
        Ok(())
    }

    pub fn get(&self, handle: TaskHandle) -> Option<&RegisteredTask> {
        self.entries.get(&handle)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Handles to poll: submitted calculations, then submitted workflows, each ascending
    pub fn polling_order(&self) -> Vec<TaskHandle> {
        let mut calculations = self.handles_where(TaskKind::Calculation, &[Origin::Submitted]);
        let workflows = self.handles_where(TaskKind::Workflow, &[Origin::Submitted]);
        calculations.extend(workflows);
        calculations
    }

    /// Calculation expectations to validate, including the cached re-runs
    pub fn calculation_expectations(&self) -> Vec<(TaskHandle, &ResultValue)> {
        self.expectations_where(TaskKind::Calculation, &[Origin::Submitted, Origin::Cached])
    }

    pub fn workflow_expectations(&self) -> Vec<(TaskHandle, &ResultValue)> {
        self.expectations_where(TaskKind::Workflow, &[Origin::Submitted])
    }

    pub fn cached_handles(&self) -> Vec<TaskHandle> {
        self.entries
            .iter()
            .filter(|(_, task)| task.origin == Origin::Cached)
            .map(|(handle, _)| *handle)
            .collect()
    }

    fn handles_where(&self, kind: TaskKind, origins: &[Origin]) -> Vec<TaskHandle> {
        self.expectations_where(kind, origins)
            .into_iter()
            .map(|(handle, _)| handle)
            .collect()
    }

    fn expectations_where(
        &self,
        kind: TaskKind,
        origins: &[Origin],
    ) -> Vec<(TaskHandle, &ResultValue)> {
        // BTreeMap iteration is already ascending by handle
        self.entries
            .iter()
            .filter(|(_, task)| task.kind == kind && origins.contains(&task.origin))
            .map(|(handle, task)| (*handle, &task.expected))
            .collect()
    }
}
