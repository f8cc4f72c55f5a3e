//! End-to-end runs of the harness against the in-memory daemon.
//!
//! ## Test Organization
//!
//! - **end_to_end**: full runs and the exit code each kind of daemon behaviour maps to
//! - **restart_scenario**: the inline error-recovery workflow cases
//! - **cache_equivalence**: re-runs served from the cache
//!
//! ## Running Integration Tests
//!
//! ```bash
//! cargo test --features test-harness
//! ```

pub mod cache_equivalence;
pub mod end_to_end;
pub mod restart_scenario;

use tokio::time::Instant;

pub async fn poll_until<T, F, Fut>(
    timeout: std::time::Duration,
    interval: std::time::Duration,
    mut check: F,
) -> Option<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Option<T>>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if let Some(value) = check().await {
            return Some(value);
        }

        if Instant::now() >= deadline {
            return None;
        }

        tokio::time::sleep(interval).await;
    }
}
