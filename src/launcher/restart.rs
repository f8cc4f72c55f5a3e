//! The error-recovery workflow scenario, run inline before the batch.
//!
//! The add workflow wraps an adder sub-step. An error handler corrects a
//! negative sum by flipping the sign of `y` and retries once; a sanity check
//! aborts when the sum exceeds [`SUM_THRESHOLD`]; a handler that is disabled
//! by default aborts unconditionally once switched on through
//! `handler_overrides`.

use crate::error::HarnessError;
use crate::launcher::{TaskLauncher, TaskSpec};
use crate::registry::{Origin, TaskRegistry};
use crate::task::{LaunchRequest, SyncOutcome, TaskKind};
use crate::value::ResultValue;

pub const ADD_BASE_WORKFLOW: &str = "workflows:arithmetic_add_base";
pub const SUM_THRESHOLD: i64 = 10;
pub const ERROR_TOO_BIG: i32 = 418;
pub const ERROR_HANDLER_DISABLED: i32 = 501;
/// Handler that is off unless enabled through `handler_overrides`
pub const DISABLED_HANDLER: &str = "disabled_handler";

/// What one run of the add workflow must look like once it returns
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartExpectation {
    pub finished_ok: bool,
    pub exit_status: i32,
    /// Number of sub-steps the workflow launched
    pub called: usize,
    /// The `sum` output; only present on success
    pub sum: Option<i64>,
}

impl RestartExpectation {
    pub const fn ok(called: usize, sum: i64) -> Self {
        Self {
            finished_ok: true,
            exit_status: 0,
            called,
            sum: Some(sum),
        }
    }

    pub const fn failed(exit_status: i32, called: usize) -> Self {
        Self {
            finished_ok: false,
            exit_status,
            called,
            sum: None,
        }
    }

    /// What a finished run actually showed, in the same terms
    pub fn observed(outcome: &SyncOutcome) -> Self {
        let finished_ok = outcome.status.is_finished_ok();
        Self {
            finished_ok,
            exit_status: outcome.status.exit_status().unwrap_or(-1),
            called: outcome.called,
            sum: if finished_ok {
                outcome.outputs.get("sum").and_then(ResultValue::as_i64)
            } else {
                None
            },
        }
    }

    pub fn to_value(&self) -> ResultValue {
        ResultValue::mapping([
            ("finished_ok", ResultValue::Bool(self.finished_ok)),
            ("exit_status", ResultValue::Int(self.exit_status as i64)),
            ("called", ResultValue::Int(self.called as i64)),
            (
                "sum",
                self.sum.map(ResultValue::Int).unwrap_or(ResultValue::Null),
            ),
        ])
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RestartCase {
    pub name: &'static str,
    pub x: i64,
    pub y: i64,
    pub enable_disabled_handler: bool,
    pub expect: RestartExpectation,
}

impl RestartCase {
    pub fn spec(&self, add_code: &str) -> TaskSpec {
        let int_node = |value: i64| ResultValue::node("Int", ResultValue::Int(value));
        let add = ResultValue::mapping([
            ("x", int_node(self.x)),
            ("y", int_node(self.y)),
            ("code", ResultValue::str(add_code)),
            (
                "settings",
                ResultValue::node(
                    "Dict",
                    ResultValue::mapping([("allow_negative", ResultValue::Bool(false))]),
                ),
            ),
        ]);

        let mut inputs = vec![("add", add)];
        if self.enable_disabled_handler {
            inputs.push((
                "handler_overrides",
                ResultValue::node(
                    "Dict",
                    ResultValue::mapping([(DISABLED_HANDLER, ResultValue::Bool(true))]),
                ),
            ));
        }

        TaskSpec {
            label: format!("restart workflow [{}] (x={}, y={})", self.name, self.x, self.y),
            request: LaunchRequest::new(
                TaskKind::Workflow,
                ADD_BASE_WORKFLOW,
                ResultValue::mapping(inputs),
            ),
            expected: self.expect.to_value(),
        }
    }

    pub fn verify(&self, outcome: &SyncOutcome) -> Result<(), HarnessError> {
        let observed = RestartExpectation::observed(outcome);
        if observed == self.expect {
            return Ok(());
        }
        Err(HarnessError::Scenario(format!(
            "case '{}' (pk {}): expected {}, got {}",
            self.name,
            outcome.task.handle,
            self.expect.to_value(),
            observed.to_value()
        )))
    }
}

pub fn restart_cases() -> [RestartCase; 4] {
    [
        RestartCase {
            name: "valid inputs",
            x: 1,
            y: 2,
            enable_disabled_handler: false,
            expect: RestartExpectation::ok(1, 3),
        },
        RestartCase {
            name: "negative sum corrected",
            x: 1,
            y: -4,
            enable_disabled_handler: false,
            expect: RestartExpectation::ok(2, 5),
        },
        RestartCase {
            name: "sum too big",
            x: 1,
            y: 10,
            enable_disabled_handler: false,
            expect: RestartExpectation::failed(ERROR_TOO_BIG, 1),
        },
        RestartCase {
            name: "disabled handler enabled",
            x: 1,
            y: 1,
            enable_disabled_handler: true,
            expect: RestartExpectation::failed(ERROR_HANDLER_DISABLED, 1),
        },
    ]
}

/// Run every restart case to completion and check it on the spot.
///
/// Stops at the first case that does not behave as expected.
pub async fn run_restart_scenario(
    launcher: &TaskLauncher,
    registry: &mut TaskRegistry,
    add_code: &str,
) -> Result<(), HarnessError> {
    log::info!("Running the add workflow restart scenario");
    for case in restart_cases() {
        let outcome = launcher
            .run_sync(registry, case.spec(add_code), Origin::Inline)
            .await?;
        case.verify(&outcome)?;
        log::info!("Restart case '{}' behaved as expected", case.name);
    }
    Ok(())
}
