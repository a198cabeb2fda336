//! Component invocation adapter.
//!
//! Owns the only shared resource in the gateway: access to the prediction
//! component. Enforces the per-request timeout, the declared concurrency
//! capability and the bounded queue, and folds every component failure
//! into a canonical failed response so codecs have one uniform shape to
//! encode.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::timeout;

use tensorgate_common::{CanonicalRequest, CanonicalResponse, Failure, FailureKind};

use crate::config::{ComponentAccess, ComponentConfig};

use super::Predictor;

pub struct ComponentInvoker {
    predictor: Arc<dyn Predictor>,
    /// Calls allowed to run inside the component at once.
    slots: Arc<Semaphore>,
    /// Running plus queued calls; anything beyond is shed immediately.
    admission: Arc<Semaphore>,
    timeout: Duration,
}

impl ComponentInvoker {
    pub fn new(predictor: Arc<dyn Predictor>, config: &ComponentConfig) -> Self {
        let slots = match config.access {
            ComponentAccess::Exclusive => 1,
            ComponentAccess::Concurrent => config.concurrency_limit.max(1),
        };
        Self {
            predictor,
            slots: Arc::new(Semaphore::new(slots)),
            admission: Arc::new(Semaphore::new(slots + config.queue_depth)),
            timeout: Duration::from_millis(config.timeout_ms),
        }
    }

    /// Invoke the component exactly once for `request`.
    ///
    /// Always returns a response; failures travel in its status. A timeout
    /// abandons the caller's wait only: the component call keeps running in
    /// its task, holding its slot until it actually finishes, and its
    /// eventual result is dropped.
    pub async fn invoke(&self, request: CanonicalRequest) -> CanonicalResponse {
        let Ok(_admission) = self.admission.try_acquire() else {
            return CanonicalResponse::failed(Failure::new(
                FailureKind::ServiceOverloaded,
                "concurrency limit and queue are full",
            ));
        };
        let slot = match Arc::clone(&self.slots).acquire_owned().await {
            Ok(permit) => permit,
            Err(_) => {
                return CanonicalResponse::failed(Failure::new(
                    FailureKind::ComponentError,
                    "component slots closed",
                ))
            }
        };

        let predictor = Arc::clone(&self.predictor);
        let CanonicalRequest {
            payload,
            metadata,
            request_id,
        } = request;
        let task = tokio::spawn(async move {
            let _slot = slot;
            predictor.predict(&payload, &metadata).await
        });

        let outcome = match timeout(self.timeout, task).await {
            Err(_) => {
                tracing::warn!(
                    request_id = %request_id,
                    timeout_ms = self.timeout.as_millis() as u64,
                    "component call timed out; abandoning wait"
                );
                return CanonicalResponse::failed(Failure::new(
                    FailureKind::Timeout,
                    format!(
                        "component did not answer within {}ms",
                        self.timeout.as_millis()
                    ),
                ));
            }
            Ok(Err(join_error)) => {
                let reason = if join_error.is_panic() {
                    "component panicked"
                } else {
                    "component task cancelled"
                };
                tracing::error!(request_id = %request_id, "{reason}");
                return CanonicalResponse::failed(Failure::new(
                    FailureKind::ComponentError,
                    reason,
                ));
            }
            Ok(Ok(outcome)) => outcome,
        };

        match outcome {
            Err(e) => {
                tracing::warn!(request_id = %request_id, "component failed: {e}");
                CanonicalResponse::failed(Failure::new(FailureKind::ComponentError, e.to_string()))
            }
            Ok(prediction) => {
                if let Err(e) = prediction.payload.validate() {
                    tracing::error!(request_id = %request_id, "component returned malformed output: {e}");
                    return CanonicalResponse::failed(Failure::new(
                        FailureKind::InvalidComponentOutput,
                        e.to_string(),
                    ));
                }
                CanonicalResponse::ok(prediction.payload, prediction.metadata)
            }
        }
    }
}
