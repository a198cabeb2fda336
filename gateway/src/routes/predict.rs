//! Predict endpoint: decode, invoke, encode on one codec.

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use bytes::Bytes;
use tensorgate_common::{CanonicalResponse, Status};

use crate::codec;
use crate::error::{self, Error};
use crate::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/predict", post(predict))
}

/// POST /predict - the reply always uses the codec that the declared
/// content type selected; the body is never sniffed.
async fn predict(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let declared = headers
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or(codec::JSON_CONTENT_TYPE);

    let Some(codec) = codec::for_content_type(declared) else {
        let failure = Error::MalformedInput(format!("unsupported content type {declared:?}"))
            .failure();
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            Json(error::error_body(&failure)),
        )
            .into_response();
    };

    let response = match codec.decode(&body) {
        Ok(request) => {
            tracing::debug!(
                request_id = %request.request_id,
                codec = codec.content_type(),
                "decoded predict request"
            );
            state.invoker.invoke(request).await
        }
        // Decode failures fail fast; the component is never invoked.
        Err(e) => CanonicalResponse::failed(e.failure()),
    };

    let status = match &response.status {
        Status::Ok => StatusCode::OK,
        Status::Failed(failure) => error::http_status(failure.kind),
    };

    match codec.encode(&response) {
        Ok(bytes) => (
            status,
            [(header::CONTENT_TYPE, codec.content_type())],
            bytes,
        )
            .into_response(),
        Err(e) => {
            // Failing to encode a response we already produced is a
            // gateway defect, not a client error.
            tracing::error!(kind = e.kind().as_str(), "failed to encode response: {e}");
            e.into_response()
        }
    }
}
