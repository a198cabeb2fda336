pub mod codec;
pub mod component;
pub mod config;
pub mod error;
pub mod grpc;
pub mod logging;
pub mod routes;
pub mod test_util;

pub use codec::WireCodec;
pub use component::{
    ComponentInvoker, IdentityPredictor, Prediction, Predictor, PredictorError, ScalingPredictor,
};
pub use config::{ComponentAccess, ComponentConfig, Config, GrpcConfig, RestConfig};
pub use error::{Error, Result};

use std::sync::Arc;

/// Shared application state passed to all handlers.
pub struct AppState {
    pub config: Config,
    /// The single shared resource: guarded access to the prediction component.
    pub invoker: Arc<ComponentInvoker>,
}

impl AppState {
    pub fn new(config: Config, invoker: Arc<ComponentInvoker>) -> Self {
        Self { config, invoker }
    }
}
