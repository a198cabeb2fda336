//! gRPC transport: the `Inference` service over tonic.
//!
//! Thin front half of the gateway. Decode and encode delegate to
//! [`crate::codec::grpc`]; failures leave as a `tonic::Status` carrying
//! the same taxonomy the REST transport uses.

use std::net::SocketAddr;
use std::sync::Arc;

use tonic::{Request, Response, Status};

use tensorgate_common::Status as ResponseStatus;

use crate::codec;
use crate::error;
use crate::AppState;

pub mod proto {
    tonic::include_proto!("tensorgate.v1");
}

use proto::inference_server::{Inference, InferenceServer};

pub struct InferenceService {
    state: Arc<AppState>,
}

impl InferenceService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

#[tonic::async_trait]
impl Inference for InferenceService {
    async fn predict(
        &self,
        request: Request<proto::PredictRequest>,
    ) -> Result<Response<proto::PredictReply>, Status> {
        // Decode failures fail fast; the component is never invoked.
        let canonical = codec::grpc::decode_request(request.into_inner())
            .map_err(|e| error::grpc_status(&e.failure()))?;
        let request_id = canonical.request_id.clone();
        tracing::debug!(request_id = %request_id, "decoded gRPC predict request");

        let response = self.state.invoker.invoke(canonical).await;
        match &response.status {
            ResponseStatus::Ok => {
                let reply = codec::grpc::encode_response(&response).map_err(|e| {
                    tracing::error!(
                        request_id = %request_id,
                        kind = e.kind().as_str(),
                        "failed to encode gRPC reply: {e}"
                    );
                    error::grpc_status(&e.failure())
                })?;
                Ok(Response::new(reply))
            }
            ResponseStatus::Failed(failure) => Err(error::grpc_status(failure)),
        }
    }
}

/// Serve the gRPC transport until the process exits.
pub async fn serve(state: Arc<AppState>, addr: SocketAddr) -> Result<(), tonic::transport::Error> {
    tonic::transport::Server::builder()
        .add_service(InferenceServer::new(InferenceService::new(state)))
        .serve(addr)
        .await
}
