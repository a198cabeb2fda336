//! Tensorgate - protocol-translating inference gateway.
//!
//! Composition root: builds the predictor from configuration, wraps it in
//! the invocation adapter and starts one listener per enabled transport.

use std::env;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tensorgate_gateway::component::{
    ComponentInvoker, IdentityPredictor, Predictor, ScalingPredictor,
};
use tensorgate_gateway::{grpc, routes, AppState, Config};

const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    println!("tensorgate {}", VERSION);
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Handle --version / -V
    let args: Vec<String> = env::args().collect();
    if args.iter().any(|a| a == "--version" || a == "-V") {
        print_version();
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::load().map_err(|e| {
        format!(
            "Failed to load configuration: {}. \
             Make sure config.toml is valid or use GATEWAY__SECTION__KEY environment variables.",
            e
        )
    })?;

    // Wire the prediction component. Deployments with a real model embed
    // the gateway as a library and install their own Predictor here.
    let predictor: Arc<dyn Predictor> = match config.component.kind.as_str() {
        "identity" => Arc::new(IdentityPredictor),
        "scale" => Arc::new(
            ScalingPredictor::from_parameters(&config.component.parameters)
                .map_err(|e| e.to_string())?,
        ),
        other => {
            return Err(format!(
                "unknown component kind {other:?}; built-in kinds: identity, scale"
            )
            .into())
        }
    };
    tracing::info!(
        component = predictor.name(),
        access = ?config.component.access,
        concurrency_limit = config.component.concurrency_limit,
        queue_depth = config.component.queue_depth,
        timeout_ms = config.component.timeout_ms,
        "component ready"
    );

    let invoker = Arc::new(ComponentInvoker::new(predictor, &config.component));
    let state = Arc::new(AppState::new(config.clone(), invoker));

    let mut servers = Vec::new();

    if config.grpc.enabled {
        let addr: SocketAddr = format!("{}:{}", config.grpc.host, config.grpc.port).parse()?;
        let grpc_state = state.clone();
        tracing::info!("gRPC transport listening on {}", addr);
        servers.push(tokio::spawn(async move {
            grpc::serve(grpc_state, addr).await.map_err(|e| e.to_string())
        }));
    }

    if config.rest.enabled {
        let addr = format!("{}:{}", config.rest.host, config.rest.port);
        let app = routes::router(state.clone()).layer(CorsLayer::permissive());
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!("REST transport listening on {}", addr);
        servers.push(tokio::spawn(async move {
            axum::serve(listener, app).await.map_err(|e| e.to_string())
        }));
    }

    if servers.is_empty() {
        return Err("no transports enabled; enable rest or grpc in configuration".into());
    }

    for server in servers {
        server.await??;
    }

    Ok(())
}
