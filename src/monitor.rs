//! Polling submitted tasks until all of them terminate or the deadline passes.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::Instant;

use crate::daemon::Daemon;
use crate::diagnostics::{log_dump, Diagnostics};
use crate::task::TaskHandle;

/// How an interval wait ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wait {
    Elapsed,
    Cancelled,
}

/// Sleep for `interval` unless `cancel` flips to `true` first.
///
/// A dropped sender never cancels.
pub async fn wait_interval(interval: Duration, cancel: &mut watch::Receiver<bool>) -> Wait {
    if *cancel.borrow_and_update() {
        return Wait::Cancelled;
    }

    let sleep = tokio::time::sleep(interval);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            _ = &mut sleep => return Wait::Elapsed,
            changed = cancel.changed() => match changed {
                Ok(()) if *cancel.borrow_and_update() => return Wait::Cancelled,
                Ok(()) => continue,
                Err(_) => {
                    (&mut sleep).await;
                    return Wait::Elapsed;
                }
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AwaitOutcome {
    pub terminated: bool,
    pub cancelled: bool,
    pub rounds: usize,
    pub elapsed: Duration,
    /// Handles still not terminal after the last round
    pub pending: Vec<TaskHandle>,
}

/// Result of waiting for the daemon to answer at all
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness {
    Ready { waited: Duration },
    /// Nothing answered before the deadline (or the wait was cancelled)
    Unreachable(AwaitOutcome),
}

pub struct CompletionMonitor {
    daemon: Arc<dyn Daemon>,
    diagnostics: Arc<dyn Diagnostics>,
}

impl CompletionMonitor {
    pub fn new(daemon: Arc<dyn Daemon>, diagnostics: Arc<dyn Diagnostics>) -> Self {
        Self {
            daemon,
            diagnostics,
        }
    }

    /// Ping the daemon once per `interval` until it answers.
    ///
    /// The first ping goes out immediately. Every unanswered ping dumps the
    /// process list and daemon status; the wait gives up like `await_all` does.
    pub async fn await_daemon(
        &self,
        interval: Duration,
        deadline: Duration,
        cancel: &mut watch::Receiver<bool>,
    ) -> Readiness {
        let start = Instant::now();
        let mut rounds = 0;

        loop {
            let error = match self.daemon.ping().await {
                Ok(()) => {
                    if rounds > 0 {
                        log::info!("Daemon answered after {} s", start.elapsed().as_secs());
                    }
                    return Readiness::Ready {
                        waited: start.elapsed(),
                    };
                }
                Err(e) => e,
            };

            let elapsed = start.elapsed();
            log::warn!(
                "Daemon not answering after {} s: {error}",
                elapsed.as_secs()
            );
            log_dump("'process list'", self.diagnostics.process_list().await);
            log_dump("'daemon status'", self.diagnostics.daemon_status().await);

            let unreachable = |cancelled| {
                Readiness::Unreachable(AwaitOutcome {
                    terminated: false,
                    cancelled,
                    rounds,
                    elapsed: start.elapsed(),
                    pending: Vec::new(),
                })
            };

            if elapsed >= deadline {
                log::error!("No daemon answered within {} s", elapsed.as_secs());
                return unreachable(false);
            }
            if wait_interval(interval, cancel).await == Wait::Cancelled {
                log::warn!("Waiting for the daemon cancelled");
                return unreachable(true);
            }
            rounds += 1;
        }
    }

    /// Poll `handles` once per `interval` until every one of them is terminal.
    ///
    /// Gives up with `terminated == false` on the first round that ends at or
    /// past `deadline`. Cancellation is only observed between rounds.
    pub async fn await_all(
        &self,
        handles: &[TaskHandle],
        interval: Duration,
        deadline: Duration,
        cancel: &mut watch::Receiver<bool>,
    ) -> AwaitOutcome {
        let start = Instant::now();
        let mut rounds = 0;

        loop {
            if wait_interval(interval, cancel).await == Wait::Cancelled {
                log::warn!("Polling cancelled after {rounds} rounds");
                return AwaitOutcome {
                    terminated: false,
                    cancelled: true,
                    rounds,
                    elapsed: start.elapsed(),
                    pending: handles.to_vec(),
                };
            }

            rounds += 1;
            let elapsed = start.elapsed();
            log::info!("{}", "#".repeat(78));
            log::info!("####### TIME ELAPSED: {} s", elapsed.as_secs());
            log::info!("{}", "#".repeat(78));

            log_dump("'process list'", self.diagnostics.process_list().await);
            log_dump("'daemon status'", self.diagnostics.daemon_status().await);

            let pending = self.pending(handles).await;
            log::info!(
                "{}/{} finished",
                handles.len() - pending.len(),
                handles.len()
            );

            if pending.is_empty() {
                return AwaitOutcome {
                    terminated: true,
                    cancelled: false,
                    rounds,
                    elapsed,
                    pending,
                };
            }

            if elapsed >= deadline {
                log::error!(
                    "Timeout after {} s, {} tasks not terminated",
                    elapsed.as_secs(),
                    pending.len()
                );
                return AwaitOutcome {
                    terminated: false,
                    cancelled: false,
                    rounds,
                    elapsed,
                    pending,
                };
            }
        }
    }

    /// One status query per handle; a failed query counts as not terminated
    async fn pending(&self, handles: &[TaskHandle]) -> Vec<TaskHandle> {
        let mut pending = Vec::new();
        for handle in handles {
            match self.daemon.status(*handle).await {
                Ok(status) if status.is_terminated() => {}
                Ok(status) => {
                    log::info!("pk {handle} not terminated [{}]", status.process_state());
                    pending.push(*handle);
                }
                Err(e) => {
                    log::warn!("pk {handle} status unavailable: {e}");
                    pending.push(*handle);
                }
            }
        }
        pending
    }
}
