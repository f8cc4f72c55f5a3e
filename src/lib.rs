pub mod cache;
pub mod client;
pub mod config;
pub mod daemon;
pub mod diagnostics;
pub mod error;
pub mod launcher;
pub mod monitor;
pub mod orchestrator;
pub mod proto;
pub mod registry;
pub mod task;
pub mod validator;
pub mod value;

#[cfg(any(test, feature = "test-harness"))]
pub mod test_harness;

pub use client::{ClientConfig, DaemonClient};
pub use daemon::Daemon;
pub use error::HarnessError;
pub use orchestrator::{Orchestrator, Outcome, RunReport};

// Process exit codes
pub const EXIT_SUCCESS: i32 = 0;
/// Configuration, launch or restart-scenario failure
pub const EXIT_FATAL: i32 = 1;
pub const EXIT_TIMEOUT: i32 = 2;
pub const EXIT_VALIDATION_FAILED: i32 = 3;
