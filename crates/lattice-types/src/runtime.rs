//! Runtime lifecycle types.
//!
//! A *runtime* is one deployed instance of a compute backend (container or
//! serverless function) bound to a specific code image. These types describe
//! its configuration, provisioning state, and the payloads delivered to it.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::ProviderDeclaration;
use crate::trigger::TriggerDefinition;

// ---------------------------------------------------------------------------
// RuntimeConfig / UserCode
// ---------------------------------------------------------------------------

/// Configuration of a single runtime instance.
///
/// Immutable once the runtime is created; owned by the runtime registry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RuntimeConfig {
    /// Opaque runtime identifier (container name / function name).
    pub runtime_id: String,
    /// Image to run: a bare digest or a fully-qualified image reference.
    pub image_digest: String,
}

/// User workflow code, passed by value into every invocation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserCode {
    /// Relative path -> source text.
    pub files: HashMap<String, String>,
    /// Path into `files` naming the entry module.
    pub entrypoint: String,
}

// ---------------------------------------------------------------------------
// Provisioning status
// ---------------------------------------------------------------------------

/// Provisioning state of a runtime.
///
/// Lifecycle: `InProgress` at creation, then exactly one transition to
/// `Completed` (backend reports healthy) or `Failed` (terminal provisioning
/// error). A failed runtime is destroyed and recreated, never retried in
/// place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuntimeCreationStatus {
    InProgress,
    Completed,
    Failed,
}

impl RuntimeCreationStatus {
    /// Whether this status admits no further transitions.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Result of a create or status-poll call against a backend.
///
/// Poll failures are reported as `Failed` status with a `reason`, never as
/// errors, so callers have one uniform way to detect "this runtime no longer
/// exists".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuntimeStatusReport {
    pub status: RuntimeCreationStatus,
    /// Log lines emitted by the backend since the previous poll.
    #[serde(default)]
    pub new_logs: Vec<String>,
    /// Human-readable failure reason, set when `status` is `Failed`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl RuntimeStatusReport {
    pub fn in_progress() -> Self {
        Self {
            status: RuntimeCreationStatus::InProgress,
            new_logs: Vec::new(),
            reason: None,
        }
    }

    pub fn completed() -> Self {
        Self {
            status: RuntimeCreationStatus::Completed,
            new_logs: Vec::new(),
            reason: None,
        }
    }

    pub fn failed(reason: impl Into<String>) -> Self {
        Self {
            status: RuntimeCreationStatus::Failed,
            new_logs: Vec::new(),
            reason: Some(reason.into()),
        }
    }

    /// Attach log lines collected during the call.
    pub fn with_logs(mut self, logs: Vec<String>) -> Self {
        self.new_logs = logs;
        self
    }
}

// ---------------------------------------------------------------------------
// Invocation payload
// ---------------------------------------------------------------------------

/// Payload delivered to a running instance for one trigger invocation.
///
/// Constructed per invocation; never persisted. Serialized with camelCase
/// keys because it crosses the wire into the instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RuntimePayload {
    /// The trigger descriptor that matched the inbound event.
    pub trigger: TriggerDefinition,
    /// The event data to hand to the workflow.
    pub data: Value,
    /// Short-lived token the instance uses to call back into the platform.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    /// Execution identifier for correlating logs and results.
    pub execution_id: String,
    /// Decrypted provider configurations keyed by `type:alias`.
    pub provider_configs: Value,
}

// ---------------------------------------------------------------------------
// Definitions extraction
// ---------------------------------------------------------------------------

/// Error raised by the user code itself while extracting definitions or
/// handling a trigger. Expected/ordinary -- carried inside a
/// `success: false` result, never thrown.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceError {
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

/// Result of asking an instance to statically extract its declared triggers
/// and providers.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DefinitionsResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub triggers: Option<Vec<TriggerDefinition>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub providers: Option<Vec<ProviderDeclaration>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<InstanceError>,
}

impl DefinitionsResult {
    pub fn ok(triggers: Vec<TriggerDefinition>, providers: Vec<ProviderDeclaration>) -> Self {
        Self {
            success: true,
            triggers: Some(triggers),
            providers: Some(providers),
            error: None,
        }
    }

    pub fn instance_error(error: InstanceError) -> Self {
        Self {
            success: false,
            triggers: None,
            providers: None,
            error: Some(error),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
