//! Platform configuration types.
//!
//! Deserialized from `config.toml` by the infra layer. Every field has a
//! default so a missing or partial file still yields a usable configuration.

use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Backend selection
// ---------------------------------------------------------------------------

/// Which compute backend runs user workflow code.
///
/// Chosen once from static configuration at registry initialization; never
/// switched at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    Container,
    Serverless,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Container => write!(f, "container"),
            Self::Serverless => write!(f, "serverless"),
        }
    }
}

// ---------------------------------------------------------------------------
// Per-backend configuration
// ---------------------------------------------------------------------------

/// Container backend configuration.
///
/// The invoke timeout is deliberately longer than the definitions timeout:
/// trigger handling may do real workflow work, while definitions extraction
/// sits on an interactive deployment path and must stay responsive.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ContainerBackendConfig {
    /// Container engine control-plane URL.
    pub engine_url: String,
    /// Port the runtime image listens on inside the shared network.
    pub runtime_port: u16,
    /// Hard deadline for trigger invocation delivery.
    pub invoke_timeout_secs: u64,
    /// Hard deadline for definitions extraction.
    pub definitions_timeout_secs: u64,
    /// Containers idle beyond this are stopped by the teardown sweep.
    pub idle_timeout_secs: u64,
}

impl Default for ContainerBackendConfig {
    fn default() -> Self {
        Self {
            engine_url: "http://localhost:2375".to_string(),
            runtime_port: 8000,
            invoke_timeout_secs: 60,
            definitions_timeout_secs: 30,
            idle_timeout_secs: 300,
        }
    }
}

/// Serverless backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ServerlessBackendConfig {
    /// Function management API base URL.
    pub api_url: String,
    /// OAuth token endpoint for control-plane credentials.
    pub token_url: String,
    /// Client identifier for the token endpoint. The client secret is
    /// supplied out of band (environment), never via config file.
    pub client_id: String,
    /// Hard deadline for the synchronous definitions invocation.
    pub definitions_timeout_secs: u64,
}

impl Default for ServerlessBackendConfig {
    fn default() -> Self {
        Self {
            api_url: "http://localhost:9090".to_string(),
            token_url: "http://localhost:9090/oauth/token".to_string(),
            client_id: "lattice".to_string(),
            definitions_timeout_secs: 30,
        }
    }
}

// ---------------------------------------------------------------------------
// Top-level configuration
// ---------------------------------------------------------------------------

/// Top-level Lattice configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct LatticeConfig {
    /// Active compute backend.
    pub backend: BackendKind,
    /// Public base URL webhook paths are resolved against.
    pub webhook_base_url: String,
    pub container: ContainerBackendConfig,
    pub serverless: ServerlessBackendConfig,
}

impl Default for LatticeConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Container,
            webhook_base_url: "http://localhost:8080".to_string(),
            container: ContainerBackendConfig::default(),
            serverless: ServerlessBackendConfig::default(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
