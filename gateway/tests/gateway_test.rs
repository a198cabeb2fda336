use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use tensorgate_common::{
    CanonicalRequest, Metadata, NamedTensorSet, Payload, Status, Tensor, TensorValues,
};
use tensorgate_gateway::codec::{self, frame, WireCodec};
use tensorgate_gateway::component::{
    ComponentInvoker, IdentityPredictor, Predictor, ScalingPredictor,
};
use tensorgate_gateway::config::{ComponentConfig, Config};
use tensorgate_gateway::grpc::proto::inference_server::Inference;
use tensorgate_gateway::grpc::{proto, InferenceService};
use tensorgate_gateway::test_util::{
    BadOutputPredictor, BlockingPredictor, CountingPredictor, DoublingPredictor, FailingPredictor,
    SleepyPredictor,
};
use tensorgate_gateway::{routes, AppState};

fn test_state(predictor: Arc<dyn Predictor>, component: ComponentConfig) -> Arc<AppState> {
    let invoker = Arc::new(ComponentInvoker::new(predictor, &component));
    Arc::new(AppState::new(Config::default(), invoker))
}

fn default_state(predictor: Arc<dyn Predictor>) -> Arc<AppState> {
    test_state(predictor, ComponentConfig::default())
}

async fn post_predict(
    state: Arc<AppState>,
    content_type: &str,
    body: impl Into<Body>,
) -> (StatusCode, Vec<u8>) {
    let app = routes::router(state);
    let request = Request::builder()
        .method("POST")
        .uri("/predict")
        .header("Content-Type", content_type)
        .body(body.into())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    (status, bytes.to_vec())
}

async fn post_json(state: Arc<AppState>, body: Value) -> (StatusCode, Value) {
    let (status, bytes) = post_predict(state, "application/json", body.to_string()).await;
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_rest_predict_doubles_values() {
    let state = default_state(Arc::new(DoublingPredictor));
    let (status, body) = post_json(
        state,
        json!({"data": [[1, 2], [3, 4]], "shape": [2, 2], "dtype": "int32"}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([[2, 4], [6, 8]]));
    assert_eq!(body["dtype"], json!("int32"));
}

#[tokio::test]
async fn test_rest_predict_with_configured_scale_component() {
    let mut parameters = std::collections::BTreeMap::new();
    parameters.insert("factor".to_string(), "3".to_string());
    let state = default_state(Arc::new(
        ScalingPredictor::from_parameters(&parameters).unwrap(),
    ));
    let (status, body) = post_json(state, json!({"data": [1, 2, 3]})).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], json!([3, 6, 9]));
}

#[tokio::test]
async fn test_rest_malformed_body_is_400() {
    let state = default_state(Arc::new(IdentityPredictor));
    let (status, body) = post_json(state, json!({"metadata": {"a": "b"}})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], json!("malformed_input"));
}

#[tokio::test]
async fn test_rest_declared_shape_mismatch_is_400() {
    let state = default_state(Arc::new(IdentityPredictor));
    let (status, body) = post_json(state, json!({"data": [1, 2, 3, 4], "shape": [2, 2]})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["kind"], json!("malformed_input"));
}

#[tokio::test]
async fn test_rest_decode_failure_never_reaches_component() {
    let predictor = Arc::new(CountingPredictor::new(IdentityPredictor));
    let state = default_state(predictor.clone());
    let (status, _) = post_json(state, json!({"data": [[1, 2], [3]]})).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(predictor.calls(), 0);
}

#[tokio::test]
async fn test_rest_timeout_is_504() {
    let state = test_state(
        Arc::new(SleepyPredictor {
            delay: Duration::from_millis(500),
        }),
        ComponentConfig {
            timeout_ms: 50,
            ..ComponentConfig::default()
        },
    );

    let start = Instant::now();
    let (status, body) = post_json(state, json!({"data": [1]})).await;

    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["error"]["kind"], json!("timeout"));
    assert!(start.elapsed() < Duration::from_millis(450));
}

#[tokio::test]
async fn test_rest_component_failure_is_500() {
    let state = default_state(Arc::new(FailingPredictor {
        message: "weights not loaded",
    }));
    let (status, body) = post_json(state, json!({"data": [1]})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["kind"], json!("component_error"));
    assert_eq!(body["error"]["message"], json!("weights not loaded"));
}

#[tokio::test]
async fn test_rest_malformed_component_output_is_500() {
    let state = default_state(Arc::new(BadOutputPredictor));
    let (status, body) = post_json(state, json!({"data": [1]})).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["kind"], json!("invalid_component_output"));
}

#[tokio::test]
async fn test_rest_unknown_content_type_is_415() {
    let state = default_state(Arc::new(IdentityPredictor));
    let (status, bytes) = post_predict(state, "text/plain", "1,2,3").await;
    let body: Value = serde_json::from_slice(&bytes).unwrap();

    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(body["error"]["kind"], json!("malformed_input"));
}

#[tokio::test]
async fn test_rest_overload_is_503() {
    let predictor = Arc::new(BlockingPredictor::new());
    let state = test_state(
        predictor.clone(),
        ComponentConfig {
            concurrency_limit: 1,
            queue_depth: 0,
            timeout_ms: 5_000,
            ..ComponentConfig::default()
        },
    );

    let occupied = tokio::spawn({
        let state = state.clone();
        async move { post_json(state, json!({"data": [1]})).await }
    });
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (status, body) = post_json(state, json!({"data": [2]})).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["kind"], json!("service_overloaded"));

    predictor.release_all();
    let (status, _) = occupied.await.unwrap();
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_frame_roundtrip_over_rest() {
    let state = default_state(Arc::new(DoublingPredictor));

    let mut metadata = Metadata::new();
    metadata.insert("trace".to_string(), "abc".to_string());
    let request = CanonicalRequest {
        payload: Payload::Tensor(
            Tensor::new(vec![2, 2], TensorValues::Int32(vec![1, 2, 3, 4])).unwrap(),
        ),
        metadata,
        request_id: "req-frame".to_string(),
    };
    let body = frame::encode_request(&request).unwrap();

    let (status, bytes) =
        post_predict(state, codec::FRAME_CONTENT_TYPE, Body::from(body)).await;
    assert_eq!(status, StatusCode::OK);

    let response = frame::decode_response(&bytes).unwrap();
    assert!(matches!(response.status, Status::Ok));
    assert_eq!(
        response.payload,
        Some(Payload::Tensor(
            Tensor::new(vec![2, 2], TensorValues::Int32(vec![2, 4, 6, 8])).unwrap()
        ))
    );
}

#[tokio::test]
async fn test_frame_failure_carries_kind() {
    let state = default_state(Arc::new(FailingPredictor { message: "boom" }));
    let request = CanonicalRequest {
        payload: Payload::Tensor(Tensor::new(vec![1], TensorValues::Int64(vec![1])).unwrap()),
        metadata: Metadata::new(),
        request_id: "req-frame-fail".to_string(),
    };
    let body = frame::encode_request(&request).unwrap();

    let (status, bytes) =
        post_predict(state, codec::FRAME_CONTENT_TYPE, Body::from(body)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);

    let response = frame::decode_response(&bytes).unwrap();
    let Status::Failed(failure) = response.status else {
        panic!("expected failed response");
    };
    assert_eq!(failure.kind.as_str(), "component_error");
    assert_eq!(failure.message, "boom");
}

#[tokio::test]
async fn test_grpc_predict_doubles_values() {
    let state = default_state(Arc::new(DoublingPredictor));
    let service = InferenceService::new(state);

    let request = CanonicalRequest {
        payload: Payload::Tensor(
            Tensor::new(vec![3], TensorValues::Float64(vec![0.5, 1.0, 1.5])).unwrap(),
        ),
        metadata: Metadata::new(),
        request_id: "req-grpc".to_string(),
    };
    let reply = service
        .predict(tonic::Request::new(codec::grpc::encode_request(&request)))
        .await
        .unwrap()
        .into_inner();

    let tensor = reply.tensor.unwrap();
    assert_eq!(tensor.shape, vec![3]);
    assert_eq!(tensor.float64_values, vec![1.0, 2.0, 3.0]);
}

#[tokio::test]
async fn test_grpc_shape_mismatch_rejected_before_invocation() {
    let predictor = Arc::new(CountingPredictor::new(DoublingPredictor));
    let state = default_state(predictor.clone());
    let service = InferenceService::new(state);

    let mut tensor = proto::TensorProto {
        shape: vec![3],
        dtype: 0,
        int32_values: vec![1, 2],
        int64_values: Vec::new(),
        float32_values: Vec::new(),
        float64_values: Vec::new(),
        bool_values: Vec::new(),
        bytes_values: Vec::new(),
    };
    tensor.set_dtype(proto::DataType::Int32);
    let message = proto::PredictRequest {
        tensor: Some(tensor),
        named_tensors: Vec::new(),
        metadata: Default::default(),
        request_id: String::new(),
    };

    let status = service
        .predict(tonic::Request::new(message))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::InvalidArgument);
    assert_eq!(
        status
            .metadata()
            .get("x-error-kind")
            .unwrap()
            .to_str()
            .unwrap(),
        "shape_mismatch"
    );
    assert_eq!(predictor.calls(), 0);
}

#[tokio::test]
async fn test_grpc_timeout_is_deadline_exceeded() {
    let state = test_state(
        Arc::new(SleepyPredictor {
            delay: Duration::from_millis(500),
        }),
        ComponentConfig {
            timeout_ms: 50,
            ..ComponentConfig::default()
        },
    );
    let service = InferenceService::new(state);

    let request = CanonicalRequest {
        payload: Payload::Tensor(Tensor::new(vec![1], TensorValues::Int64(vec![1])).unwrap()),
        metadata: Metadata::new(),
        request_id: "req-grpc-timeout".to_string(),
    };
    let status = service
        .predict(tonic::Request::new(codec::grpc::encode_request(&request)))
        .await
        .unwrap_err();
    assert_eq!(status.code(), tonic::Code::DeadlineExceeded);
    assert_eq!(
        status
            .metadata()
            .get("x-error-kind")
            .unwrap()
            .to_str()
            .unwrap(),
        "timeout"
    );
}

/// All three codecs must produce the same canonical request for the same
/// logical input.
#[tokio::test]
async fn test_cross_protocol_equivalence() {
    let mut metadata = Metadata::new();
    metadata.insert("trace".to_string(), "abc".to_string());
    let expected = CanonicalRequest {
        payload: Payload::Named(
            NamedTensorSet::new(vec![
                (
                    "features".to_string(),
                    Tensor::new(vec![2, 2], TensorValues::Float32(vec![1.0, 2.0, 3.0, 4.0]))
                        .unwrap(),
                ),
                (
                    "ids".to_string(),
                    Tensor::new(vec![2], TensorValues::Int64(vec![10, 20])).unwrap(),
                ),
            ])
            .unwrap(),
        ),
        metadata,
        request_id: "req-eq".to_string(),
    };

    // JSON, written out by hand so the codec is not tested against itself.
    let json_body = json!({
        "names": ["features", "ids"],
        "ndarray": [[[1.0, 2.0], [3.0, 4.0]], [10, 20]],
        "dtype": null,
        "metadata": {"trace": "abc"},
        "request_id": "req-eq"
    });
    // The untyped JSON path widens to float64/int64; re-express with the
    // wire dtypes the other protocols carry natively.
    let from_json = codec::for_content_type(codec::JSON_CONTENT_TYPE)
        .unwrap()
        .decode(json_body.to_string().as_bytes())
        .unwrap();
    let Payload::Named(set) = &from_json.payload else {
        panic!("expected named set");
    };
    assert_eq!(from_json.request_id, expected.request_id);
    assert_eq!(from_json.metadata, expected.metadata);
    assert_eq!(set.entries[0].0, "features");
    assert_eq!(set.entries[0].1.shape, vec![2, 2]);
    assert_eq!(
        set.entries[0].1.values,
        TensorValues::Float64(vec![1.0, 2.0, 3.0, 4.0])
    );
    assert_eq!(set.entries[1].0, "ids");
    assert_eq!(set.entries[1].1.values, TensorValues::Int64(vec![10, 20]));

    // gRPC and frame carry explicit dtypes; both must reproduce the
    // canonical request exactly.
    let from_proto = codec::grpc::decode_request(codec::grpc::encode_request(&expected)).unwrap();
    assert_eq!(from_proto, expected);

    let from_frame = codec::for_content_type(codec::FRAME_CONTENT_TYPE)
        .unwrap()
        .decode(&frame::encode_request(&expected).unwrap())
        .unwrap();
    assert_eq!(from_frame, expected);

    assert_eq!(from_proto, from_frame);
}

#[tokio::test]
async fn test_health_endpoint() {
    let state = default_state(Arc::new(IdentityPredictor));
    let app = routes::router(state);

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["status"], json!("ok"));
}

#[tokio::test]
async fn test_rest_response_metadata_passthrough() {
    let state = default_state(Arc::new(IdentityPredictor));
    let (status, body) = post_json(
        state,
        json!({"data": [1, 2], "metadata": {"tag": "blue"}}),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["metadata"]["tag"], json!("blue"));
}
