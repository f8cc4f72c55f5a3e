use std::sync::Arc;
use std::time::Duration;

use daemon_harness::cache::{content_hash, CacheEquivalenceChecker};
use daemon_harness::launcher::specs::TEMPLATE_REPLACER;
use daemon_harness::launcher::{calculation, TaskLauncher};
use daemon_harness::registry::{Origin, TaskRegistry};
use daemon_harness::task::TaskHandle;
use daemon_harness::test_harness::InMemoryDaemon;
use daemon_harness::validator::{Failure, ResultValidator};
use daemon_harness::Daemon;

use super::poll_until;

async fn wait_terminated(daemon: &InMemoryDaemon, handle: TaskHandle) -> bool {
    poll_until(Duration::from_secs(5), Duration::from_millis(10), || async move {
        match daemon.status(handle).await {
            Ok(status) if status.is_terminated() => Some(()),
            _ => None,
        }
    })
    .await
    .is_some()
}

/// Test the purpose of the cache re-run: cached calculations pass both the
/// result and the cache checks
#[tokio::test]
async fn test_cached_reruns_are_equivalent() {
    let daemon = Arc::new(InMemoryDaemon::new().with_polls_to_finish(2));
    let launcher = TaskLauncher::new(daemon.clone());
    let mut registry = TaskRegistry::new();

    let mut originals = Vec::new();
    for value in 1..=3 {
        let submitted = launcher
            .submit(&mut registry, calculation("doubler", value as usize, value))
            .await
            .unwrap();
        originals.push(submitted.handle);
    }
    for handle in &originals {
        assert!(wait_terminated(&daemon, *handle).await);
    }

    for value in 1..=3 {
        let mut spec = calculation("doubler", value as usize, value);
        spec.request = spec.request.with_caching(TEMPLATE_REPLACER);
        launcher
            .run_sync(&mut registry, spec, Origin::Cached)
            .await
            .unwrap();
    }

    let cached = registry.cached_handles();
    assert_eq!(cached.len(), 3);
    for (handle, original) in cached.iter().zip(&originals) {
        let record = daemon.cache_metadata(*handle).await.unwrap();
        assert_eq!(record.cached_from, Some(*original));
        assert_eq!(record.stored_hash, Some(content_hash(&record.hash_objects)));
    }

    let results = ResultValidator::new(daemon.clone())
        .validate_calculations(&registry.calculation_expectations())
        .await;
    assert!(results.is_valid(), "{results:?}");
    assert_eq!(results.verdicts.len(), 6);

    let cache = CacheEquivalenceChecker::new(daemon).validate_cached(&cached).await;
    assert!(cache.is_valid(), "{cache:?}");
}

/// Test the expected behavior: every cache-integrity problem is reported per task
#[tokio::test]
async fn test_integrity_failures_accumulate() {
    let daemon = Arc::new(InMemoryDaemon::new());
    let launcher = TaskLauncher::new(daemon.clone());
    let mut registry = TaskRegistry::new();

    let mut originals = Vec::new();
    for value in 1..=2 {
        let outcome = launcher
            .run_sync(&mut registry, calculation("doubler", value as usize, value), Origin::Inline)
            .await
            .unwrap();
        originals.push(outcome.task.handle);
    }
    let mut cached = Vec::new();
    for value in 1..=2 {
        let mut spec = calculation("doubler", value as usize, value);
        spec.request = spec.request.with_caching(TEMPLATE_REPLACER);
        let outcome = launcher
            .run_sync(&mut registry, spec, Origin::Cached)
            .await
            .unwrap();
        cached.push(outcome.task.handle);
    }

    daemon.corrupt_hash(cached[0]);
    for name in daemon.artifact_names(originals[1]).await.unwrap() {
        daemon.remove_artifact(originals[1], &name);
    }

    let report = CacheEquivalenceChecker::new(daemon).validate_cached(&cached).await;

    assert_eq!(report.failed_handles(), cached);
    assert!(matches!(
        report.verdicts[0].failures[..],
        [Failure::HashMismatch { .. }]
    ));
    assert_eq!(
        report.verdicts[1].failures,
        vec![Failure::OriginalNoArtifacts {
            original: originals[1]
        }]
    );
}
