use async_trait::async_trait;
use std::collections::BTreeSet;
use std::future::Future;
use std::time::Duration;
use uuid::Uuid;

use crate::daemon::Daemon;
use crate::error::HarnessError;
use crate::proto::daemon::daemon_service_client::DaemonServiceClient;
use crate::proto::daemon::{
    LaunchTaskRequest, PingRequest, ProcessState as WireState, TaskKind as WireKind, TaskRef,
};
use crate::task::{
    CacheRecord, LaunchRequest, ProcessState, SubmittedTask, SyncOutcome, TaskHandle, TaskKind,
    TaskStatus,
};
use crate::value::ResultValue;

/// gRPC client for the execution daemon
#[derive(Debug, Clone)]
pub struct DaemonClient {
    grpc_client: DaemonServiceClient,
    config: ClientConfig,
}

/// Configuration for the daemon client
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub endpoint: String,
    /// Deadline for a single status/output query or submission
    pub timeout: Duration,
    /// Deadline for a synchronous run of a whole task tree
    pub sync_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            endpoint: "http://127.0.0.1:52720".to_string(),
            timeout: Duration::from_secs(30),
            sync_timeout: Duration::from_secs(600),
        }
    }
}

impl DaemonClient {
    /// Create a client without touching the network.
    ///
    /// The channel connects on first use and reconnects after failures, so a
    /// daemon that is not up yet surfaces as failing calls rather than here.
    pub fn with_config(config: ClientConfig) -> Result<Self, HarnessError> {
        let endpoint = tonic::transport::Endpoint::from_shared(config.endpoint.clone())
            .map_err(|e| HarnessError::InvalidConfig(format!("Invalid endpoint {e}")))?
            .connect_timeout(config.timeout);

        let grpc_client = DaemonServiceClient::new(endpoint.connect_lazy());

        Ok(Self {
            grpc_client,
            config,
        })
    }

    fn launch_request(request: &LaunchRequest) -> LaunchTaskRequest {
        LaunchTaskRequest {
            kind: wire_kind(request.kind) as i32,
            process: request.process.clone(),
            inputs_json: request.inputs.to_json_string(),
            caching_identifier: request.caching.clone(),
        }
    }

    async fn with_deadline<T, F>(&self, deadline: Duration, fut: F) -> Result<T, HarnessError>
    where
        F: Future<Output = Result<T, tonic::Status>>,
    {
        match tokio::time::timeout(deadline, fut).await {
            Ok(res) => res.map_err(HarnessError::from),
            Err(_) => Err(HarnessError::Grpc(tonic::Status::deadline_exceeded(
                format!("no answer from {} within {deadline:?}", self.config.endpoint),
            ))),
        }
    }
}

#[async_trait]
impl Daemon for DaemonClient {
    async fn ping(&self) -> Result<(), HarnessError> {
        let mut grpc_client = self.grpc_client.clone();
        let response = self
            .with_deadline(self.config.timeout, grpc_client.ping(PingRequest {}))
            .await?
            .into_inner();
        log::debug!("Daemon at {} answered, version {}", self.config.endpoint, response.version);
        Ok(())
    }

    async fn submit(&self, request: &LaunchRequest) -> Result<SubmittedTask, HarnessError> {
        let message = Self::launch_request(request);
        let mut grpc_client = self.grpc_client.clone();
        let response = self
            .with_deadline(self.config.timeout, grpc_client.launch_task(message))
            .await?
            .into_inner();

        Ok(SubmittedTask {
            handle: TaskHandle::new(response.pk),
            uuid: parse_uuid(&response.uuid)?,
        })
    }

    async fn run_sync(&self, request: &LaunchRequest) -> Result<SyncOutcome, HarnessError> {
        let message = Self::launch_request(request);
        let mut grpc_client = self.grpc_client.clone();
        let response = self
            .with_deadline(self.config.sync_timeout, grpc_client.run_task(message))
            .await?
            .into_inner();

        let outputs = if response.outputs_json.is_empty() {
            ResultValue::Mapping(Default::default())
        } else {
            ResultValue::from_json_str(&response.outputs_json)?
        };

        Ok(SyncOutcome {
            task: SubmittedTask {
                handle: TaskHandle::new(response.pk),
                uuid: parse_uuid(&response.uuid)?,
            },
            status: task_status(response.state, response.exit_status)?,
            outputs,
            called: response.called as usize,
        })
    }

    async fn status(&self, handle: TaskHandle) -> Result<TaskStatus, HarnessError> {
        let mut grpc_client = self.grpc_client.clone();
        let response = self
            .with_deadline(
                self.config.timeout,
                grpc_client.get_task_status(TaskRef { pk: handle.pk() }),
            )
            .await
            .map_err(|e| not_found_as(e, || HarnessError::TaskNotFound(handle)))?
            .into_inner();

        task_status(response.state, response.exit_status)
    }

    async fn outputs(&self, handle: TaskHandle) -> Result<ResultValue, HarnessError> {
        let mut grpc_client = self.grpc_client.clone();
        let response = self
            .with_deadline(
                self.config.timeout,
                grpc_client.get_task_outputs(TaskRef { pk: handle.pk() }),
            )
            .await
            .map_err(|e| {
                let reason = e.to_string();
                not_found_as(e, || HarnessError::result_missing(handle, reason))
            })?
            .into_inner();

        if response.outputs_json.is_empty() {
            return Err(HarnessError::result_missing(handle, "daemon returned no outputs"));
        }
        Ok(ResultValue::from_json_str(&response.outputs_json)?)
    }

    async fn cache_metadata(&self, handle: TaskHandle) -> Result<CacheRecord, HarnessError> {
        let mut grpc_client = self.grpc_client.clone();
        let response = self
            .with_deadline(
                self.config.timeout,
                grpc_client.get_cache_metadata(TaskRef { pk: handle.pk() }),
            )
            .await
            .map_err(|e| not_found_as(e, || HarnessError::TaskNotFound(handle)))?
            .into_inner();

        let kind = match WireKind::try_from(response.kind) {
            Ok(WireKind::Calculation) => TaskKind::Calculation,
            Ok(WireKind::Workflow) => TaskKind::Workflow,
            _ => {
                return Err(HarnessError::Protocol(format!(
                    "unknown task kind {} for task {handle}",
                    response.kind
                )))
            }
        };
        let hash_objects = if response.hash_objects_json.is_empty() {
            ResultValue::Null
        } else {
            ResultValue::from_json_str(&response.hash_objects_json)?
        };

        Ok(CacheRecord {
            kind,
            cached_from: response.cached_from.map(TaskHandle::new),
            stored_hash: response.stored_hash,
            hash_objects,
            artifacts: response.artifacts.into_iter().collect(),
        })
    }

    async fn artifact_names(&self, handle: TaskHandle) -> Result<BTreeSet<String>, HarnessError> {
        let mut grpc_client = self.grpc_client.clone();
        let response = self
            .with_deadline(
                self.config.timeout,
                grpc_client.list_artifacts(TaskRef { pk: handle.pk() }),
            )
            .await
            .map_err(|e| not_found_as(e, || HarnessError::TaskNotFound(handle)))?
            .into_inner();

        Ok(response.names.into_iter().collect())
    }
}

fn wire_kind(kind: TaskKind) -> WireKind {
    match kind {
        TaskKind::Calculation => WireKind::Calculation,
        TaskKind::Workflow => WireKind::Workflow,
    }
}

fn task_status(state: i32, exit_status: Option<i32>) -> Result<TaskStatus, HarnessError> {
    let state = match WireState::try_from(state) {
        Ok(WireState::Created) => ProcessState::Created,
        Ok(WireState::Waiting) => ProcessState::Waiting,
        Ok(WireState::Running) => ProcessState::Running,
        Ok(WireState::Finished) => ProcessState::Finished,
        Ok(WireState::Excepted) => ProcessState::Excepted,
        Ok(WireState::Killed) => ProcessState::Killed,
        Ok(WireState::Unspecified) | Err(_) => {
            return Err(HarnessError::Protocol(format!(
                "daemon reported unknown process state {state}"
            )))
        }
    };
    Ok(TaskStatus::from_state(state, exit_status))
}

fn parse_uuid(raw: &str) -> Result<Uuid, HarnessError> {
    Uuid::parse_str(raw)
        .map_err(|e| HarnessError::Protocol(format!("daemon returned invalid uuid {raw}: {e}")))
}

/// Map a gRPC `NotFound` to a domain error, keep anything else as is
fn not_found_as(error: HarnessError, missing: impl FnOnce() -> HarnessError) -> HarnessError {
    match error {
        HarnessError::Grpc(status) if status.code() == tonic::Code::NotFound => missing(),
        other => other,
    }
}
