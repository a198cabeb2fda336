//! Prediction component abstraction.
//!
//! The gateway treats the model as an opaque capability: given a payload
//! and metadata, return a payload and metadata, or fail. Implementations
//! provide [`Predictor`]; the [`ComponentInvoker`] wraps every call with
//! timeout, backpressure and output validation so the rest of the gateway
//! only ever sees canonical responses.

mod builtin;
mod invoker;

pub use builtin::{IdentityPredictor, ScalingPredictor};
pub use invoker::ComponentInvoker;

use async_trait::async_trait;
use tensorgate_common::{Metadata, Payload};

/// Opaque failure raised by a prediction component.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct PredictorError(pub String);

/// Output of one component call.
#[derive(Debug, Clone)]
pub struct Prediction {
    pub payload: Payload,
    pub metadata: Metadata,
}

/// The external prediction capability.
///
/// Implementations must be shareable across calls; whether two calls may
/// run at the same time is declared in configuration
/// ([`crate::config::ComponentAccess`]), never assumed.
#[async_trait]
pub trait Predictor: Send + Sync {
    /// Identifier used in logs.
    fn name(&self) -> &'static str;

    /// Run one prediction.
    async fn predict(
        &self,
        payload: &Payload,
        metadata: &Metadata,
    ) -> Result<Prediction, PredictorError>;
}
