//! Wire types and client stub for the daemon's control service
//! (`harness.daemon.DaemonService`).
//!
//! Structured values travel as JSON strings so the message set stays small.

pub mod daemon {
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum TaskKind {
        Unspecified = 0,
        Calculation = 1,
        Workflow = 2,
    }

    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, ::prost::Enumeration)]
    #[repr(i32)]
    pub enum ProcessState {
        Unspecified = 0,
        Created = 1,
        Waiting = 2,
        Running = 3,
        Finished = 4,
        Excepted = 5,
        Killed = 6,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PingRequest {}

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct PingResponse {
        #[prost(string, tag = "1")]
        pub version: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct LaunchTaskRequest {
        #[prost(enumeration = "TaskKind", tag = "1")]
        pub kind: i32,
        #[prost(string, tag = "2")]
        pub process: ::prost::alloc::string::String,
        #[prost(string, tag = "3")]
        pub inputs_json: ::prost::alloc::string::String,
        #[prost(string, optional, tag = "4")]
        pub caching_identifier: ::core::option::Option<::prost::alloc::string::String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct LaunchTaskResponse {
        #[prost(uint64, tag = "1")]
        pub pk: u64,
        #[prost(string, tag = "2")]
        pub uuid: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct RunTaskResponse {
        #[prost(uint64, tag = "1")]
        pub pk: u64,
        #[prost(string, tag = "2")]
        pub uuid: ::prost::alloc::string::String,
        #[prost(enumeration = "ProcessState", tag = "3")]
        pub state: i32,
        #[prost(int32, optional, tag = "4")]
        pub exit_status: ::core::option::Option<i32>,
        #[prost(string, tag = "5")]
        pub outputs_json: ::prost::alloc::string::String,
        #[prost(uint32, tag = "6")]
        pub called: u32,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TaskRef {
        #[prost(uint64, tag = "1")]
        pub pk: u64,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TaskStatusResponse {
        #[prost(enumeration = "ProcessState", tag = "1")]
        pub state: i32,
        #[prost(int32, optional, tag = "2")]
        pub exit_status: ::core::option::Option<i32>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct TaskOutputsResponse {
        #[prost(string, tag = "1")]
        pub outputs_json: ::prost::alloc::string::String,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct CacheMetadataResponse {
        #[prost(enumeration = "TaskKind", tag = "1")]
        pub kind: i32,
        #[prost(uint64, optional, tag = "2")]
        pub cached_from: ::core::option::Option<u64>,
        #[prost(string, optional, tag = "3")]
        pub stored_hash: ::core::option::Option<::prost::alloc::string::String>,
        #[prost(string, tag = "4")]
        pub hash_objects_json: ::prost::alloc::string::String,
        #[prost(string, repeated, tag = "5")]
        pub artifacts: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    }

    #[derive(Clone, PartialEq, ::prost::Message)]
    pub struct ArtifactListResponse {
        #[prost(string, repeated, tag = "1")]
        pub names: ::prost::alloc::vec::Vec<::prost::alloc::string::String>,
    }

    pub mod daemon_service_client {
        use tonic::codegen::http::uri::PathAndQuery;
        use tonic::transport::Channel;

        #[derive(Debug, Clone)]
        pub struct DaemonServiceClient {
            inner: tonic::client::Grpc<Channel>,
        }

        impl DaemonServiceClient {
            pub fn new(channel: Channel) -> Self {
                Self {
                    inner: tonic::client::Grpc::new(channel),
                }
            }

            async fn unary<Req, Resp>(
                &mut self,
                request: tonic::Request<Req>,
                path: &'static str,
            ) -> Result<tonic::Response<Resp>, tonic::Status>
            where
                Req: ::prost::Message + Send + Sync + 'static,
                Resp: ::prost::Message + Default + Send + Sync + 'static,
            {
                self.inner.ready().await.map_err(|e| {
                    tonic::Status::new(
                        tonic::Code::Unknown,
                        format!("Service was not ready: {e}"),
                    )
                })?;
                let codec = tonic::codec::ProstCodec::default();
                self.inner
                    .unary(request, PathAndQuery::from_static(path), codec)
                    .await
            }

            pub async fn ping(
                &mut self,
                request: impl tonic::IntoRequest<super::PingRequest>,
            ) -> Result<tonic::Response<super::PingResponse>, tonic::Status> {
                self.unary(request.into_request(), "/harness.daemon.DaemonService/Ping")
                    .await
            }

            pub async fn launch_task(
                &mut self,
                request: impl tonic::IntoRequest<super::LaunchTaskRequest>,
            ) -> Result<tonic::Response<super::LaunchTaskResponse>, tonic::Status> {
                self.unary(
                    request.into_request(),
                    "/harness.daemon.DaemonService/LaunchTask",
                )
                .await
            }

            pub async fn run_task(
                &mut self,
                request: impl tonic::IntoRequest<super::LaunchTaskRequest>,
            ) -> Result<tonic::Response<super::RunTaskResponse>, tonic::Status> {
                self.unary(
                    request.into_request(),
                    "/harness.daemon.DaemonService/RunTask",
                )
                .await
            }

            pub async fn get_task_status(
                &mut self,
                request: impl tonic::IntoRequest<super::TaskRef>,
            ) -> Result<tonic::Response<super::TaskStatusResponse>, tonic::Status> {
                self.unary(
                    request.into_request(),
                    "/harness.daemon.DaemonService/GetTaskStatus",
                )
                .await
            }

            pub async fn get_task_outputs(
                &mut self,
                request: impl tonic::IntoRequest<super::TaskRef>,
            ) -> Result<tonic::Response<super::TaskOutputsResponse>, tonic::Status> {
                self.unary(
                    request.into_request(),
                    "/harness.daemon.DaemonService/GetTaskOutputs",
                )
                .await
            }

            pub async fn get_cache_metadata(
                &mut self,
                request: impl tonic::IntoRequest<super::TaskRef>,
            ) -> Result<tonic::Response<super::CacheMetadataResponse>, tonic::Status> {
                self.unary(
                    request.into_request(),
                    "/harness.daemon.DaemonService/GetCacheMetadata",
                )
                .await
            }

            pub async fn list_artifacts(
                &mut self,
                request: impl tonic::IntoRequest<super::TaskRef>,
            ) -> Result<tonic::Response<super::ArtifactListResponse>, tonic::Status> {
                self.unary(
                    request.into_request(),
                    "/harness.daemon.DaemonService/ListArtifacts",
                )
                .await
            }
        }
    }
}
