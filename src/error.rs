use thiserror::Error;

use crate::task::TaskHandle;

/// Main error type for harness operations
#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("gRPC error: {0}")]
    Grpc(tonic::Status),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Launch failed for {label}: {reason}")]
    Launch { label: String, reason: String },

    #[error("Task not found: {0}")]
    TaskNotFound(TaskHandle),

    #[error("No result available for task {handle}: {reason}")]
    ResultMissing { handle: TaskHandle, reason: String },

    #[error("Task {0} is already registered")]
    DuplicateHandle(TaskHandle),

    #[error("Restart scenario failed: {0}")]
    Scenario(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Protocol error: {0}")]
    Protocol(String),
}

impl From<tonic::Status> for HarnessError {
    fn from(status: tonic::Status) -> Self {
        HarnessError::Grpc(status)
    }
}

impl HarnessError {
    /// Wrap a daemon failure that happened while submitting `label`
    pub fn launch(label: &str, source: &HarnessError) -> Self {
        HarnessError::Launch {
            label: label.to_string(),
            reason: source.to_string(),
        }
    }

    pub fn result_missing(handle: TaskHandle, reason: impl Into<String>) -> Self {
        HarnessError::ResultMissing {
            handle,
            reason: reason.into(),
        }
    }

    /// True for errors that mean the task or its outputs cannot be loaded
    pub fn is_missing(&self) -> bool {
        matches!(
            self,
            HarnessError::TaskNotFound(_) | HarnessError::ResultMissing { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Display strings are what ends up in the validation log, keep them stable
    #[test]
    fn test_harness_error_display() {
        let handle = TaskHandle::new(42);
        assert_eq!(
            HarnessError::TaskNotFound(handle).to_string(),
            "Task not found: 42"
        );
        assert_eq!(
            HarnessError::result_missing(handle, "no output port").to_string(),
            "No result available for task 42: no output port"
        );
        assert_eq!(
            HarnessError::DuplicateHandle(handle).to_string(),
            "Task 42 is already registered"
        );
    }

    #[test]
    fn test_launch_error_wraps_source() {
        let source = HarnessError::Protocol("daemon closed the stream".to_string());
        let error = HarnessError::launch("calculation #3", &source);
        assert_eq!(
            error.to_string(),
            "Launch failed for calculation #3: Protocol error: daemon closed the stream"
        );
        assert!(!error.is_missing());
    }

    #[test]
    fn test_missing_classification() {
        let handle = TaskHandle::new(7);
        assert!(HarnessError::TaskNotFound(handle).is_missing());
        assert!(HarnessError::result_missing(handle, "gone").is_missing());
        assert!(!HarnessError::Scenario("x".to_string()).is_missing());
        assert!(!HarnessError::Grpc(tonic::Status::unavailable("down")).is_missing());
    }

    #[test]
    fn test_harness_error_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HarnessError>();
    }
}
