//! Trigger domain types.
//!
//! A *trigger definition* is the desired-state description of an event source
//! extracted statically from user code. A *registered trigger* (and its
//! optional *webhook*) is the persisted, externally reachable counterpart.
//! The trigger synchronizer keeps the two in 1:1 correspondence.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// Provider types that are built into the platform: they resolve without a
/// provider configuration record and are never webhook-backed.
pub const BUILTIN_PROVIDER_TYPES: &[&str] = &["cron", "schedule", "manual"];

// ---------------------------------------------------------------------------
// Trigger definitions (desired state)
// ---------------------------------------------------------------------------

/// Reference to the provider backing a trigger, as declared in user code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderRef {
    /// Provider type (e.g. "jira", "slack", "cron").
    #[serde(rename = "type")]
    pub provider_type: String,
    /// Code-level alias distinguishing multiple configurations of one type.
    pub alias: String,
}

/// Desired-state description of one trigger, extracted from user code.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TriggerDefinition {
    pub provider: ProviderRef,
    /// Provider-scoped trigger name (e.g. "onIssueCreated", "onCron").
    pub trigger_type: String,
    /// Scalar-valued filter/configuration mapping declared in code.
    #[serde(default)]
    pub input: Map<String, Value>,
}

impl TriggerDefinition {
    pub fn new(
        provider_type: impl Into<String>,
        alias: impl Into<String>,
        trigger_type: impl Into<String>,
        input: Map<String, Value>,
    ) -> Self {
        Self {
            provider: ProviderRef {
                provider_type: provider_type.into(),
                alias: alias.into(),
            },
            trigger_type: trigger_type.into(),
            input,
        }
    }

    /// Whether this trigger needs an externally reachable webhook
    /// registration. Built-in providers (cron, schedule, manual) fire from
    /// inside the platform and never do.
    pub fn requires_webhook(&self) -> bool {
        !BUILTIN_PROVIDER_TYPES.contains(&self.provider.provider_type.as_str())
    }
}

// ---------------------------------------------------------------------------
// Registered state (persisted)
// ---------------------------------------------------------------------------

/// Persisted trigger record for one workflow deployment.
///
/// Created/updated/deleted exclusively by the trigger synchronizer; route
/// handlers only read it when dispatching inbound events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisteredTrigger {
    pub id: Uuid,
    pub workflow_id: Uuid,
    pub definition: TriggerDefinition,
}

/// Persisted webhook registration backing a webhook-style trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Webhook {
    pub id: Uuid,
    pub workflow_id: Uuid,
    /// Ingress path, relative to the public webhook base URL.
    pub path: String,
    /// HTTP method the ingress accepts for this registration.
    pub method: String,
    /// The registered trigger this webhook is bound to.
    pub trigger_id: Uuid,
    pub provider_type: String,
    pub provider_alias: String,
    pub created_at: DateTime<Utc>,
}

/// Webhook record as returned to the service layer after synchronization,
/// with the externally reachable URL resolved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookInfo {
    pub id: Uuid,
    pub url: String,
    pub path: String,
    pub method: String,
    pub trigger_id: Uuid,
    pub provider_type: String,
    pub provider_alias: String,
}

impl Webhook {
    /// Resolve this record against the public base URL.
    pub fn info(&self, base_url: &str) -> WebhookInfo {
        WebhookInfo {
            id: self.id,
            url: format!("{}{}", base_url.trim_end_matches('/'), self.path),
            path: self.path.clone(),
            method: self.method.clone(),
            trigger_id: self.trigger_id,
            provider_type: self.provider_type.clone(),
            provider_alias: self.provider_alias.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Inbound event dispatch
// ---------------------------------------------------------------------------

/// Normalized metadata describing one inbound event, produced by a webhook
/// processor (or the cron dispatcher) and handed to the trigger matcher.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventMetadata {
    #[serde(rename = "type")]
    pub provider_type: String,
    pub alias: String,
    pub trigger_type: String,
    #[serde(default)]
    pub input: Map<String, Value>,
}

/// One matched trigger for an inbound webhook event, with the enriched event
/// payload to forward to the runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerMatch {
    pub trigger_id: Uuid,
    pub event: Value,
}

/// Transport-agnostic view of an inbound webhook request, as presented to a
/// webhook processor by the ingress layer.
#[derive(Debug, Clone)]
pub struct WebhookRequest {
    pub path: String,
    pub method: String,
    /// Header names lowercased by the ingress layer.
    pub headers: HashMap<String, String>,
    pub body: Vec<u8>,
}

impl WebhookRequest {
    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(|v| v.as_str())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
