//! ServerlessDriver -- concrete `RuntimeController` backed by a managed
//! functions control plane.
//!
//! One function per runtime, named after the runtime id, deployed from the
//! same image the container backend runs. Trigger invocations go through the
//! asynchronous invocation API (the platform queues and retries);
//! definitions extraction uses the synchronous path with a hard deadline.
//! The platform scales idle functions to zero on its own, so the teardown
//! sweep is a no-op here.

use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use serde_json::Value;
use uuid::Uuid;

use lattice_core::runtime::RuntimeController;
use lattice_core::runtime::envelope::{InvocationEnvelope, with_deadline};
use lattice_types::config::{BackendKind, ServerlessBackendConfig};
use lattice_types::error::RuntimeError;
use lattice_types::runtime::{
    DefinitionsResult, RuntimeConfig, RuntimePayload, RuntimeStatusReport, UserCode,
};

use super::credentials::ControlPlaneCredentials;

/// Serverless functions backed runtime driver.
pub struct ServerlessDriver {
    client: reqwest::Client,
    config: ServerlessBackendConfig,
    credentials: ControlPlaneCredentials,
}

impl ServerlessDriver {
    pub fn new(config: ServerlessBackendConfig, credentials: ControlPlaneCredentials) -> Self {
        // Client-level backstop so a stalled body read can never outlive the
        // per-call deadlines.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.definitions_timeout_secs + 5))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            config,
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    async fn invoke(
        &self,
        runtime_id: &str,
        invocation_type: &str,
        envelope: &InvocationEnvelope,
    ) -> Result<reqwest::Response, RuntimeError> {
        let token = self.credentials.bearer_token().await?;
        self.client
            .post(self.url(&format!(
                "/functions/{runtime_id}/invocations?type={invocation_type}"
            )))
            .bearer_auth(token)
            .json(envelope)
            .send()
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))
    }
}

impl RuntimeController for ServerlessDriver {
    fn backend(&self) -> BackendKind {
        BackendKind::Serverless
    }

    async fn create_runtime(
        &self,
        config: &RuntimeConfig,
    ) -> Result<RuntimeStatusReport, RuntimeError> {
        let token = self.credentials.bearer_token().await?;
        let body = serde_json::json!({
            "functionName": config.runtime_id,
            "imageUri": config.image_digest,
        });

        let response = self
            .client
            .post(self.url("/functions"))
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| RuntimeError::provisioning("create", e.to_string()))?;

        match response.status().as_u16() {
            201 | 202 => {
                tracing::info!(runtime_id = %config.runtime_id, "function creation accepted");
            }
            // Function already exists: a previous create got this far.
            // Status polling settles the outcome.
            409 => {
                tracing::debug!(runtime_id = %config.runtime_id, "function already exists");
            }
            status => {
                let detail = response.text().await.unwrap_or_default();
                return Err(RuntimeError::provisioning(
                    "create",
                    format!("control plane answered {status}: {detail}"),
                ));
            }
        }

        Ok(RuntimeStatusReport::in_progress())
    }

    async fn get_runtime_status(&self, runtime_id: &str) -> RuntimeStatusReport {
        let token = match self.credentials.bearer_token().await {
            Ok(token) => token,
            Err(err) => return RuntimeStatusReport::failed(format!("credential failure: {err}")),
        };

        let response = self
            .client
            .get(self.url(&format!("/functions/{runtime_id}")))
            .bearer_auth(token)
            .send()
            .await;

        match response {
            Ok(r) if r.status().as_u16() == 404 => {
                RuntimeStatusReport::failed(format!("Function not found: {runtime_id}"))
            }
            Ok(r) if r.status().is_success() => match r.json::<Value>().await {
                Ok(function) => map_function_state(&function),
                Err(err) => {
                    RuntimeStatusReport::failed(format!("unreadable function response: {err}"))
                }
            },
            Ok(r) => RuntimeStatusReport::failed(format!("control plane answered {}", r.status())),
            Err(err) => RuntimeStatusReport::failed(format!("control plane unreachable: {err}")),
        }
    }

    async fn invoke_trigger(
        &self,
        trigger_id: Uuid,
        config: &RuntimeConfig,
        code: &UserCode,
        payload: &RuntimePayload,
    ) -> Result<(), RuntimeError> {
        let envelope = InvocationEnvelope::invoke_trigger(code, payload);
        let response = self.invoke(&config.runtime_id, "event", &envelope).await?;

        // Asynchronous invocations are accepted, not completed; the platform
        // owns execution and retries from here.
        if response.status().as_u16() != 202 && !response.status().is_success() {
            return Err(RuntimeError::Transport(format!(
                "invocation rejected with {}",
                response.status()
            )));
        }

        tracing::info!(
            %trigger_id,
            runtime_id = %config.runtime_id,
            execution_id = %payload.execution_id,
            "trigger queued on function"
        );
        Ok(())
    }

    async fn get_definitions(
        &self,
        config: &RuntimeConfig,
        code: &UserCode,
        provider_configs: &Value,
    ) -> Result<DefinitionsResult, RuntimeError> {
        let envelope = InvocationEnvelope::get_definitions(code, provider_configs);

        // The deadline spans the whole round trip: credential refresh,
        // request, and body read. Headers arriving in time must not excuse a
        // body that stalls.
        with_deadline(
            "get_definitions",
            self.config.definitions_timeout_secs,
            async {
                let response = self.invoke(&config.runtime_id, "sync", &envelope).await?;

                if !response.status().is_success() {
                    return Err(RuntimeError::Transport(format!(
                        "definitions invocation rejected with {}",
                        response.status()
                    )));
                }

                if let Some(encoded) = response
                    .headers()
                    .get("x-log-result")
                    .and_then(|v| v.to_str().ok())
                {
                    for line in decode_log_result(encoded) {
                        tracing::debug!(runtime_id = %config.runtime_id, log = %line, "instance log");
                    }
                }

                let body: Value = response
                    .json()
                    .await
                    .map_err(|e| RuntimeError::MalformedResponse(e.to_string()))?;

                serde_json::from_value(unwrap_response_envelope(body))
                    .map_err(|e| RuntimeError::MalformedResponse(e.to_string()))
            },
        )
        .await
    }

    async fn destroy_runtime(&self, config: &RuntimeConfig) -> Result<(), RuntimeError> {
        let token = self.credentials.bearer_token().await?;
        let response = self
            .client
            .delete(self.url(&format!("/functions/{}", config.runtime_id)))
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| RuntimeError::provisioning("destroy", e.to_string()))?;

        // 404 means already gone, which is the desired end state.
        match response.status().as_u16() {
            200 | 202 | 204 | 404 => {
                tracing::info!(runtime_id = %config.runtime_id, "function destroyed");
                Ok(())
            }
            status => Err(RuntimeError::provisioning(
                "destroy",
                format!("control plane answered {status}"),
            )),
        }
    }

    async fn teardown_unused_runtimes(&self) -> Result<(), RuntimeError> {
        // The platform scales idle functions to zero; nothing to sweep.
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pure control-plane interpretation
// ---------------------------------------------------------------------------

/// Map a function description onto a provisioning status report.
///
/// The control plane exposes a coarse `state` plus a `lastUpdateStatus` for
/// the most recent configuration change. Total over every combination:
/// anything not recognizably terminal stays in progress.
pub fn map_function_state(function: &Value) -> RuntimeStatusReport {
    let state = function.get("state").and_then(Value::as_str).unwrap_or("");
    let last_update = function
        .get("lastUpdateStatus")
        .and_then(Value::as_str)
        .unwrap_or("");

    if state == "Failed" || last_update == "Failed" {
        let reason = function
            .get("stateReason")
            .and_then(Value::as_str)
            .unwrap_or("function entered Failed state");
        return RuntimeStatusReport::failed(reason);
    }

    if state == "Active" && last_update != "InProgress" {
        return RuntimeStatusReport::completed();
    }

    RuntimeStatusReport::in_progress()
}

/// Peel the platform's response envelope when present.
///
/// A synchronous invocation may come back wrapped as
/// `{"statusCode": ..., "body": "<json string>"}`; the instance's actual
/// result is the parsed `body`. Unwrapped responses pass through untouched.
pub fn unwrap_response_envelope(value: Value) -> Value {
    if let Some(body) = value.get("body").and_then(Value::as_str) {
        if let Ok(inner) = serde_json::from_str(body) {
            return inner;
        }
    }
    value
}

fn decode_log_result(encoded: &str) -> Vec<String> {
    match BASE64.decode(encoded) {
        Ok(bytes) => String::from_utf8_lossy(&bytes)
            .lines()
            .filter(|l| !l.is_empty())
            .map(str::to_string)
            .collect(),
        Err(_) => Vec::new(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
