//! Configuration for the gateway.

use config::{Config as ConfigLoader, ConfigError, Environment, File};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Main configuration structure for the gateway.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub rest: RestConfig,
    #[serde(default)]
    pub grpc: GrpcConfig,
    #[serde(default)]
    pub component: ComponentConfig,
}

/// REST transport listener (also carries the binary-frame content type).
#[derive(Debug, Clone, Deserialize)]
pub struct RestConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_rest_port")]
    pub port: u16,
}

impl Default for RestConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_rest_port(),
        }
    }
}

/// gRPC transport listener.
#[derive(Debug, Clone, Deserialize)]
pub struct GrpcConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_grpc_port")]
    pub port: u16,
}

impl Default for GrpcConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: default_host(),
            port: default_grpc_port(),
        }
    }
}

/// Declared concurrency capability of the prediction component. The
/// invoker never assumes thread-safety; it has to be stated here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComponentAccess {
    /// Safe for concurrent use up to the configured limit.
    Concurrent,
    /// Must never see two calls at once; access is serialized.
    Exclusive,
}

/// Prediction component wiring and backpressure limits.
#[derive(Debug, Clone, Deserialize)]
pub struct ComponentConfig {
    /// Built-in component to load ("identity", "scale"). Deployments with
    /// a real model embed the gateway as a library and install their own
    /// `Predictor` instead.
    #[serde(default = "default_component_kind")]
    pub kind: String,
    /// Opaque parameters handed to the component at construction.
    /// Example: `{ factor = "2.0" }` for the scale component.
    #[serde(default)]
    pub parameters: BTreeMap<String, String>,
    #[serde(default = "default_access")]
    pub access: ComponentAccess,
    /// Concurrent calls admitted to the component (ignored when access is
    /// exclusive).
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Calls allowed to wait for a slot before the gateway sheds load.
    #[serde(default = "default_queue_depth")]
    pub queue_depth: usize,
    /// Per-request component timeout.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for ComponentConfig {
    fn default() -> Self {
        Self {
            kind: default_component_kind(),
            parameters: BTreeMap::new(),
            access: default_access(),
            concurrency_limit: default_concurrency_limit(),
            queue_depth: default_queue_depth(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

// Default values
fn default_true() -> bool {
    true
}
fn default_host() -> String {
    "0.0.0.0".to_string()
}
fn default_rest_port() -> u16 {
    8080
}
fn default_grpc_port() -> u16 {
    9090
}
fn default_component_kind() -> String {
    "identity".to_string()
}
fn default_access() -> ComponentAccess {
    ComponentAccess::Concurrent
}
fn default_concurrency_limit() -> usize {
    8
}
fn default_queue_depth() -> usize {
    32
}
fn default_timeout_ms() -> u64 {
    10_000
}

impl Config {
    /// Load configuration from file and environment variables.
    ///
    /// Configuration sources (in order of precedence):
    /// 1. Environment variables (GATEWAY__SECTION__KEY format)
    /// 2. config.toml file (if present)
    /// 3. Built-in defaults
    pub fn load() -> Result<Self, ConfigError> {
        let config = ConfigLoader::builder()
            .add_source(File::with_name("config").required(false))
            .add_source(
                Environment::with_prefix("GATEWAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}
