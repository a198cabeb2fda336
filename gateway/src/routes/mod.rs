//! REST transport: the predict endpoint plus the health side-channel.

pub mod health;
pub mod predict;

use std::sync::Arc;

use axum::middleware;
use axum::Router;

use crate::logging::request_logger;
use crate::AppState;

/// Build the full REST router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(predict::router())
        .merge(health::router())
        .layer(middleware::from_fn(request_logger))
        .with_state(state)
}
