use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

use daemon_harness::config::Settings;
use daemon_harness::launcher::specs::NESTED_WORKFLOW;
use daemon_harness::test_harness::{InMemoryDaemon, RecordingDiagnostics};
use daemon_harness::validator::Failure;
use daemon_harness::{
    DaemonClient, Orchestrator, Outcome, EXIT_SUCCESS, EXIT_TIMEOUT, EXIT_VALIDATION_FAILED,
};

fn orchestrator(
    daemon: Arc<InMemoryDaemon>,
    settings: Settings,
) -> (Orchestrator, Arc<RecordingDiagnostics>) {
    let diagnostics = Arc::new(RecordingDiagnostics::default());
    (
        Orchestrator::new(settings, daemon, diagnostics.clone()),
        diagnostics,
    )
}

/// Test the purpose of a full run: the default batch against a nominal daemon exits 0
#[tokio::test(start_paused = true)]
async fn test_default_batch_succeeds() {
    let daemon = Arc::new(InMemoryDaemon::new().with_polls_to_finish(3).with_jitter(4));
    let (orchestrator, diagnostics) = orchestrator(daemon.clone(), Settings::default());
    let (_tx, mut rx) = watch::channel(false);

    let report = orchestrator.run(&mut rx).await.unwrap();

    assert_eq!(report.outcome, Outcome::Success, "{report:#?}");
    assert_eq!(report.exit_code, EXIT_SUCCESS);
    assert_eq!(report.calculations.len(), 15);
    assert_eq!(report.workflows.len(), 16);
    assert_eq!(report.cached.len(), 15);
    assert!(report.polling.rounds >= 3 && report.polling.rounds <= 7);
    assert_eq!(daemon.submissions(), 31);
    assert_eq!(diagnostics.process_list_calls(), report.polling.rounds);
    assert_eq!(diagnostics.daemon_status_calls(), report.polling.rounds);
}

#[tokio::test(start_paused = true)]
async fn test_polled_handles_are_sorted_calculations_first() {
    let daemon = Arc::new(InMemoryDaemon::new());
    let (orchestrator, _) = orchestrator(daemon, Settings::default());
    let (_tx, mut rx) = watch::channel(false);

    let report = orchestrator.run(&mut rx).await.unwrap();

    let mut sorted = report.calculations.clone();
    sorted.sort();
    assert_eq!(report.calculations, sorted);
    let mut sorted = report.workflows.clone();
    sorted.sort();
    assert_eq!(report.workflows, sorted);
    assert!(report.calculations.last() < report.workflows.first());
}

/// Test the expected behavior: a daemon that never runs anything times out with code 2
#[tokio::test(start_paused = true)]
async fn test_idle_daemon_exits_with_timeout() {
    let daemon = Arc::new(InMemoryDaemon::new());
    daemon.stall_new_tasks();
    let (orchestrator, diagnostics) = orchestrator(daemon, Settings::default());
    let (_tx, mut rx) = watch::channel(false);

    let report = orchestrator.run(&mut rx).await.unwrap();

    assert_eq!(report.outcome, Outcome::Timeout);
    assert_eq!(report.exit_code, EXIT_TIMEOUT);
    assert_eq!(report.polling.elapsed_secs, 240);
    assert_eq!(report.polling.pending.len(), 31);
    assert_eq!(diagnostics.daemon_log_calls(), 1);
}

/// Test the expected behavior: nothing listening on the endpoint times out with code 2
#[tokio::test]
async fn test_no_daemon_running_exits_with_timeout() {
    let mut settings = Settings::default();
    settings.daemon.endpoint = "http://127.0.0.1:1".to_string();
    settings.daemon.timeout_secs = 1;
    settings.polling.interval_secs = 1;
    settings.polling.deadline_secs = 2;
    let client = Arc::new(DaemonClient::with_config(settings.client_config()).unwrap());
    let diagnostics = Arc::new(RecordingDiagnostics::default());
    let orchestrator = Orchestrator::new(settings, client, diagnostics.clone());
    let (_tx, mut rx) = watch::channel(false);

    let report = orchestrator.run(&mut rx).await.unwrap();

    assert_eq!(report.outcome, Outcome::Timeout);
    assert_eq!(report.exit_code, EXIT_TIMEOUT);
    assert_eq!(report.restart_runs, 0);
    assert!(report.workflows.is_empty());
    assert!(report.polling.elapsed_secs >= 2);
    assert_eq!(diagnostics.daemon_log_calls(), 1);
    assert!(diagnostics.process_list_calls() >= 3);
}

#[tokio::test(start_paused = true)]
async fn test_offline_in_memory_daemon_exits_with_timeout() {
    let daemon = Arc::new(InMemoryDaemon::new());
    daemon.go_offline();
    let (orchestrator, _) = orchestrator(daemon.clone(), Settings::default());
    let (_tx, mut rx) = watch::channel(false);

    let report = orchestrator.run(&mut rx).await.unwrap();

    assert_eq!(report.exit_code, EXIT_TIMEOUT);
    assert_eq!(daemon.submissions(), 0);
    assert_eq!(daemon.pings(), 17);
}

#[tokio::test(start_paused = true)]
async fn test_deadline_and_interval_follow_settings() {
    let daemon = Arc::new(InMemoryDaemon::new());
    daemon.stall_new_tasks();
    let mut settings = Settings::default();
    settings.launch.calculations = 1;
    settings.launch.workflows = 1;
    settings.polling.interval_secs = 5;
    settings.polling.deadline_secs = 20;
    let (orchestrator, _) = orchestrator(daemon, settings);
    let (_tx, mut rx) = watch::channel(false);

    let report = orchestrator.run(&mut rx).await.unwrap();

    assert_eq!(report.outcome, Outcome::Timeout);
    assert_eq!(report.polling.rounds, 4);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_run_reports_timeout() {
    let daemon = Arc::new(InMemoryDaemon::new());
    daemon.stall_new_tasks();
    let (orchestrator, _) = orchestrator(daemon, Settings::default());
    let (tx, mut rx) = watch::channel(false);

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(40)).await;
        tx.send(true).unwrap();
    });

    let report = orchestrator.run(&mut rx).await.unwrap();
    canceller.await.unwrap();

    assert_eq!(report.outcome, Outcome::Timeout);
    assert!(report.polling.cancelled);
    assert_eq!(report.polling.rounds, 2);
}

/// Test the expected behavior: every wrong workflow is reported, not just the first
#[tokio::test(start_paused = true)]
async fn test_all_mismatches_are_reported() {
    let daemon = Arc::new(InMemoryDaemon::new());
    daemon.tamper_workflow_output(NESTED_WORKFLOW, -1);
    let mut settings = Settings::default();
    settings.launch.calculations = 2;
    settings.launch.workflows = 4;
    let (orchestrator, diagnostics) = orchestrator(daemon, settings);
    let (_tx, mut rx) = watch::channel(false);

    let report = orchestrator.run(&mut rx).await.unwrap();

    assert_eq!(report.outcome, Outcome::ValidationFailed);
    assert_eq!(report.exit_code, EXIT_VALIDATION_FAILED);

    let workflows = &report.validations[1];
    assert_eq!(workflows.failed_handles().len(), 4);
    assert!(workflows
        .verdicts
        .iter()
        .filter(|v| !v.passed())
        .all(|v| matches!(v.failures[..], [Failure::ValueMismatch { .. }])));
    assert_eq!(diagnostics.reported_handles(), workflows.failed_handles());
}

#[tokio::test(start_paused = true)]
async fn test_report_file_is_written() {
    let daemon = Arc::new(InMemoryDaemon::new());
    let mut settings = Settings::default();
    settings.launch.calculations = 1;
    settings.launch.workflows = 1;
    let (orchestrator, _) = orchestrator(daemon, settings);
    let (_tx, mut rx) = watch::channel(false);

    let report = orchestrator.run(&mut rx).await.unwrap();
    let path = std::env::temp_dir().join(format!("harness-report-{}.json", uuid::Uuid::new_v4()));
    report.write_to(&path).unwrap();

    let written: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(written["outcome"], "success");
    assert_eq!(written["calculations"].as_array().map(Vec::len), Some(1));
    assert!(written["started_at"].is_string());
}
