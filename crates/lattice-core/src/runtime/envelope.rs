//! Invocation envelope and per-call deadlines.
//!
//! Both backends accept the same JSON shape over their respective transports:
//!
//! ```json
//! { "type": "invoke_trigger" | "get_definitions",
//!   "userCode": { ... }, "trigger": { ... }, "data": { ... },
//!   "authToken": "...", "executionId": "...", "providerConfigs": { ... } }
//! ```
//!
//! The deadline helper enforces hard per-call timeouts at the transport
//! layer; a call is not cancellable mid-flight beyond that deadline.

use std::future::Future;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use lattice_types::error::RuntimeError;
use lattice_types::runtime::{RuntimePayload, UserCode};
use lattice_types::trigger::TriggerDefinition;

// ---------------------------------------------------------------------------
// Wire shape
// ---------------------------------------------------------------------------

/// The JSON payload sent to a running backend instance.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InvocationEnvelope {
    /// Deliver an event to a trigger handler inside the instance.
    #[serde(rename_all = "camelCase")]
    InvokeTrigger {
        user_code: UserCode,
        trigger: TriggerDefinition,
        data: Value,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        auth_token: Option<String>,
        execution_id: String,
        provider_configs: Value,
    },
    /// Ask the instance to statically extract its declared triggers and
    /// providers.
    #[serde(rename_all = "camelCase")]
    GetDefinitions {
        user_code: UserCode,
        provider_configs: Value,
    },
}

impl InvocationEnvelope {
    /// Build the trigger-invocation envelope. Trigger, data, auth token and
    /// execution id are carried through unmodified.
    pub fn invoke_trigger(code: &UserCode, payload: &RuntimePayload) -> Self {
        Self::InvokeTrigger {
            user_code: code.clone(),
            trigger: payload.trigger.clone(),
            data: payload.data.clone(),
            auth_token: payload.auth_token.clone(),
            execution_id: payload.execution_id.clone(),
            provider_configs: payload.provider_configs.clone(),
        }
    }

    /// Build the definitions-extraction envelope.
    pub fn get_definitions(code: &UserCode, provider_configs: &Value) -> Self {
        Self::GetDefinitions {
            user_code: code.clone(),
            provider_configs: provider_configs.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Deadlines
// ---------------------------------------------------------------------------

/// Run `fut` under a hard deadline.
///
/// Elapsing maps to [`RuntimeError::Timeout`] tagged with the operation name
/// so a timed-out definitions call reads as a deployment validation failure
/// rather than a generic transport error.
pub async fn with_deadline<T, F>(
    operation: &str,
    timeout_secs: u64,
    fut: F,
) -> Result<T, RuntimeError>
where
    F: Future<Output = Result<T, RuntimeError>> + Send,
{
    match tokio::time::timeout(Duration::from_secs(timeout_secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(RuntimeError::Timeout {
            operation: operation.to_string(),
            timeout_secs,
        }),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn user_code() -> UserCode {
        let mut files = HashMap::new();
        files.insert("index.ts".to_string(), "export default {}".to_string());
        UserCode {
            files,
            entrypoint: "index.ts".to_string(),
        }
    }

    fn payload() -> RuntimePayload {
        let mut input = serde_json::Map::new();
        input.insert("project_key".to_string(), json!("ENG"));
        RuntimePayload {
            trigger: TriggerDefinition::new("jira", "default", "onIssueCreated", input),
            data: json!({"issue": {"key": "ENG-1"}}),
            auth_token: Some("token-123".to_string()),
            execution_id: "exec-9".to_string(),
            provider_configs: json!({"jira:default": {"site": "https://jira.example.com"}}),
        }
    }

    #[test]
    fn test_invoke_envelope_wire_shape() {
        let envelope = InvocationEnvelope::invoke_trigger(&user_code(), &payload());
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["type"], json!("invoke_trigger"));
        assert_eq!(value["userCode"]["entrypoint"], json!("index.ts"));
        // Original fields carried through unmodified.
        assert_eq!(value["trigger"]["triggerType"], json!("onIssueCreated"));
        assert_eq!(value["trigger"]["input"]["project_key"], json!("ENG"));
        assert_eq!(value["data"]["issue"]["key"], json!("ENG-1"));
        assert_eq!(value["authToken"], json!("token-123"));
        assert_eq!(value["executionId"], json!("exec-9"));
        assert!(value["providerConfigs"]["jira:default"].is_object());
    }

    #[test]
    fn test_definitions_envelope_wire_shape() {
        let envelope =
            InvocationEnvelope::get_definitions(&user_code(), &json!({"slack:default": {}}));
        let value = serde_json::to_value(&envelope).unwrap();

        assert_eq!(value["type"], json!("get_definitions"));
        assert!(value["userCode"]["files"]["index.ts"].is_string());
        assert!(value["providerConfigs"]["slack:default"].is_object());
        // No trigger fields on a definitions call.
        assert!(value.get("trigger").is_none());
    }

    #[test]
    fn test_invoke_envelope_omits_absent_auth_token() {
        let mut p = payload();
        p.auth_token = None;
        let value =
            serde_json::to_value(InvocationEnvelope::invoke_trigger(&user_code(), &p)).unwrap();
        assert!(value.get("authToken").is_none());
    }

    #[tokio::test]
    async fn test_deadline_passes_through_completed_calls() {
        let result = with_deadline("invoke_trigger", 5, async { Ok::<_, RuntimeError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_deadline_maps_elapse_to_timeout_error() {
        let result: Result<(), _> =
            with_deadline("get_definitions", 0, std::future::pending()).await;

        match result {
            Err(RuntimeError::Timeout {
                operation,
                timeout_secs,
            }) => {
                assert_eq!(operation, "get_definitions");
                assert_eq!(timeout_secs, 0);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
