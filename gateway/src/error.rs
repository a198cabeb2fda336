//! Error types for the gateway.
//!
//! One taxonomy covers every transport; the per-protocol status mappings
//! live here so REST and gRPC can never drift apart.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tensorgate_common::{Failure, FailureKind, ValidationError};
use tonic::metadata::MetadataValue;

/// Failures raised by the codec layer: decoding a wire request or
/// encoding a canonical response. Decode failures fail fast and never
/// reach the component; invocation-time failures never appear here, they
/// travel as the `Failed` status inside a canonical response.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("duplicate tensor name: {0}")]
    DuplicateName(String),

    #[error("encoding error: {0}")]
    Encoding(String),
}

impl Error {
    pub fn kind(&self) -> FailureKind {
        match self {
            Error::MalformedInput(_) => FailureKind::MalformedInput,
            Error::ShapeMismatch(_) => FailureKind::ShapeMismatch,
            Error::DuplicateName(_) => FailureKind::DuplicateName,
            Error::Encoding(_) => FailureKind::EncodingError,
        }
    }

    pub fn failure(&self) -> Failure {
        Failure::new(self.kind(), self.to_string())
    }
}

impl From<ValidationError> for Error {
    fn from(e: ValidationError) -> Self {
        match e {
            ValidationError::ShapeMismatch(message) => Error::ShapeMismatch(message),
            ValidationError::DuplicateName(name) => Error::DuplicateName(name),
        }
    }
}

/// HTTP status for a failure kind (REST mapping).
pub fn http_status(kind: FailureKind) -> StatusCode {
    match kind {
        FailureKind::MalformedInput | FailureKind::ShapeMismatch | FailureKind::DuplicateName => {
            StatusCode::BAD_REQUEST
        }
        FailureKind::EncodingError
        | FailureKind::ComponentError
        | FailureKind::InvalidComponentOutput => StatusCode::INTERNAL_SERVER_ERROR,
        FailureKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        FailureKind::ServiceOverloaded => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// gRPC status for a failure, mirroring the HTTP mapping. The failure kind
/// travels in `x-error-kind` metadata so clients keep a machine-readable
/// classification.
pub fn grpc_status(failure: &Failure) -> tonic::Status {
    let code = match failure.kind {
        FailureKind::MalformedInput | FailureKind::ShapeMismatch | FailureKind::DuplicateName => {
            tonic::Code::InvalidArgument
        }
        FailureKind::EncodingError
        | FailureKind::ComponentError
        | FailureKind::InvalidComponentOutput => tonic::Code::Internal,
        FailureKind::Timeout => tonic::Code::DeadlineExceeded,
        FailureKind::ServiceOverloaded => tonic::Code::ResourceExhausted,
    };

    let mut status = tonic::Status::new(code, failure.message.clone());
    status
        .metadata_mut()
        .insert("x-error-kind", MetadataValue::from_static(failure.kind.as_str()));
    status
}

/// JSON error body shared by every REST failure path.
pub fn error_body(failure: &Failure) -> serde_json::Value {
    json!({
        "error": {
            "kind": failure.kind.as_str(),
            "message": failure.message,
        }
    })
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let failure = self.failure();
        (http_status(failure.kind), Json(error_body(&failure))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, Error>;
