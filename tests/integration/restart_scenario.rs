use std::sync::Arc;

use daemon_harness::launcher::restart::{
    restart_cases, RestartExpectation, ERROR_HANDLER_DISABLED, ERROR_TOO_BIG,
};
use daemon_harness::launcher::{run_restart_scenario, TaskLauncher};
use daemon_harness::registry::{Origin, TaskRegistry};
use daemon_harness::test_harness::InMemoryDaemon;
use daemon_harness::HarnessError;

#[tokio::test]
async fn test_each_case_is_reproduced() {
    let daemon = Arc::new(InMemoryDaemon::new());
    let launcher = TaskLauncher::new(daemon);
    let mut registry = TaskRegistry::new();

    let mut observed = Vec::new();
    for case in restart_cases() {
        let outcome = launcher
            .run_sync(&mut registry, case.spec("add@localhost"), Origin::Inline)
            .await
            .unwrap();
        observed.push(RestartExpectation::observed(&outcome));
    }

    assert_eq!(
        observed,
        vec![
            RestartExpectation::ok(1, 3),
            RestartExpectation::ok(2, 5),
            RestartExpectation::failed(ERROR_TOO_BIG, 1),
            RestartExpectation::failed(ERROR_HANDLER_DISABLED, 1),
        ]
    );
}

/// Test the expected behavior: the scenario registers its runs but never polls them
#[tokio::test]
async fn test_scenario_runs_are_inline() {
    let daemon = Arc::new(InMemoryDaemon::new());
    let launcher = TaskLauncher::new(daemon.clone());
    let mut registry = TaskRegistry::new();

    run_restart_scenario(&launcher, &mut registry, "add@localhost")
        .await
        .unwrap();

    assert_eq!(registry.len(), 4);
    assert!(registry.polling_order().is_empty());
    assert!(registry.workflow_expectations().is_empty());
    assert_eq!(daemon.submissions(), 0);
}

#[tokio::test]
async fn test_scenario_stops_at_first_broken_case() {
    let daemon = Arc::new(InMemoryDaemon::new());
    daemon.break_restart_handler();
    let launcher = TaskLauncher::new(daemon);
    let mut registry = TaskRegistry::new();

    let err = run_restart_scenario(&launcher, &mut registry, "add@localhost")
        .await
        .unwrap_err();

    match err {
        HarnessError::Scenario(message) => assert!(message.contains("negative sum corrected")),
        other => panic!("expected scenario error, got {other}"),
    }
    assert_eq!(registry.len(), 2);
}
