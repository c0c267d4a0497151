//! ContainerDriver -- concrete `RuntimeController` backed by a container
//! engine's HTTP control plane.
//!
//! One container per runtime, named after the runtime id. Provisioning goes
//! through the engine API; invocation goes directly to the container over
//! the shared network (`http://{runtime_id}:{port}/`). Health is read from
//! the image's healthcheck via container inspection.
//!
//! All control-plane interpretation lives in pure helpers
//! ([`map_inspection`], [`demux_log_stream`], status-code mappers) so the
//! state machine is testable without an engine.

use std::time::Duration;

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde_json::{Value, json};

use lattice_core::runtime::envelope::{InvocationEnvelope, with_deadline};
use lattice_core::runtime::RuntimeController;
use lattice_types::config::{BackendKind, ContainerBackendConfig};
use lattice_types::error::RuntimeError;
use lattice_types::runtime::{
    DefinitionsResult, RuntimeConfig, RuntimePayload, RuntimeStatusReport, UserCode,
};
use uuid::Uuid;

/// Container-engine backed runtime driver.
pub struct ContainerDriver {
    client: reqwest::Client,
    config: ContainerBackendConfig,
    /// Per-container log cursor: unix seconds of the last fetched line, so
    /// each status poll returns only new output.
    log_cursors: DashMap<String, i64>,
    /// Per-container last-invocation timestamp for the idle teardown sweep.
    last_activity: DashMap<String, DateTime<Utc>>,
}

impl ContainerDriver {
    pub fn new(config: ContainerBackendConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.invoke_timeout_secs.max(
                config.definitions_timeout_secs,
            ) + 5))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            config,
            log_cursors: DashMap::new(),
            last_activity: DashMap::new(),
        }
    }

    /// Build an engine control-plane URL.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.engine_url.trim_end_matches('/'), path)
    }

    /// Build the in-network invocation URL for a container.
    fn invoke_url(&self, runtime_id: &str) -> String {
        format!("http://{}:{}/", runtime_id, self.config.runtime_port)
    }

    /// Start a container; the engine answers 204 (started) or 304 (already
    /// running), both fine.
    async fn start_container(&self, runtime_id: &str) -> Result<(), RuntimeError> {
        let response = self
            .client
            .post(self.url(&format!("/containers/{runtime_id}/start")))
            .send()
            .await
            .map_err(|e| RuntimeError::provisioning("start", e.to_string()))?;

        interpret_start_status(response.status().as_u16())
            .map_err(|message| RuntimeError::provisioning("start", message))
    }

    /// Fetch log lines emitted since the previous poll and advance the
    /// cursor.
    async fn collect_new_logs(&self, runtime_id: &str) -> Vec<String> {
        let since = self
            .log_cursors
            .get(runtime_id)
            .map(|c| *c)
            .unwrap_or_default();
        let now = Utc::now().timestamp();

        let response = self
            .client
            .get(self.url(&format!(
                "/containers/{runtime_id}/logs?stdout=true&stderr=true&since={since}"
            )))
            .send()
            .await;

        let bytes = match response {
            Ok(r) if r.status().is_success() => match r.bytes().await {
                Ok(bytes) => bytes,
                Err(err) => {
                    tracing::debug!(runtime_id, error = %err, "log body read failed");
                    return Vec::new();
                }
            },
            Ok(r) => {
                tracing::debug!(runtime_id, status = %r.status(), "log fetch rejected");
                return Vec::new();
            }
            Err(err) => {
                tracing::debug!(runtime_id, error = %err, "log fetch failed");
                return Vec::new();
            }
        };

        self.log_cursors.insert(runtime_id.to_string(), now);
        demux_log_stream(&bytes)
    }

    /// Send an invocation envelope to the container and return the parsed
    /// JSON response body.
    async fn post_envelope(
        &self,
        runtime_id: &str,
        envelope: &InvocationEnvelope,
    ) -> Result<Value, RuntimeError> {
        let response = self
            .client
            .post(self.invoke_url(runtime_id))
            .json(envelope)
            .send()
            .await
            .map_err(|e| RuntimeError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RuntimeError::Transport(format!(
                "instance answered {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| RuntimeError::MalformedResponse(e.to_string()))
    }
}

impl RuntimeController for ContainerDriver {
    fn backend(&self) -> BackendKind {
        BackendKind::Container
    }

    async fn create_runtime(
        &self,
        config: &RuntimeConfig,
    ) -> Result<RuntimeStatusReport, RuntimeError> {
        let body = json!({
            "Image": config.image_digest,
            "ExposedPorts": { format!("{}/tcp", self.config.runtime_port): {} },
        });

        let response = self
            .client
            .post(self.url(&format!(
                "/containers/create?name={}",
                config.runtime_id
            )))
            .json(&body)
            .send()
            .await
            .map_err(|e| RuntimeError::provisioning("create", e.to_string()))?;

        match response.status().as_u16() {
            201 => {
                tracing::info!(runtime_id = %config.runtime_id, "container created");
            }
            // Name already taken: a previous create got this far. Start it
            // again and let status polling settle the outcome.
            409 => {
                tracing::debug!(runtime_id = %config.runtime_id, "container already exists");
            }
            status => {
                let detail = response.text().await.unwrap_or_default();
                return Err(RuntimeError::provisioning(
                    "create",
                    format!("engine answered {status}: {detail}"),
                ));
            }
        }

        self.start_container(&config.runtime_id).await?;
        self.log_cursors
            .insert(config.runtime_id.clone(), Utc::now().timestamp());

        Ok(RuntimeStatusReport::in_progress())
    }

    async fn get_runtime_status(&self, runtime_id: &str) -> RuntimeStatusReport {
        let response = self
            .client
            .get(self.url(&format!("/containers/{runtime_id}/json")))
            .send()
            .await;

        let report = match response {
            Ok(r) if r.status().as_u16() == 404 => {
                RuntimeStatusReport::failed(format!("Container not found: {runtime_id}"))
            }
            Ok(r) if r.status().is_success() => match r.json::<Value>().await {
                Ok(inspection) => map_inspection(&inspection),
                Err(err) => RuntimeStatusReport::failed(format!(
                    "unreadable inspection response: {err}"
                )),
            },
            Ok(r) => RuntimeStatusReport::failed(format!("engine answered {}", r.status())),
            Err(err) => RuntimeStatusReport::failed(format!("engine unreachable: {err}")),
        };

        report.with_logs(self.collect_new_logs(runtime_id).await)
    }

    async fn invoke_trigger(
        &self,
        trigger_id: Uuid,
        config: &RuntimeConfig,
        code: &UserCode,
        payload: &RuntimePayload,
    ) -> Result<(), RuntimeError> {
        // A stopped-but-present container restarts transparently.
        self.start_container(&config.runtime_id).await?;
        self.last_activity
            .insert(config.runtime_id.clone(), Utc::now());

        let envelope = InvocationEnvelope::invoke_trigger(code, payload);
        with_deadline("invoke_trigger", self.config.invoke_timeout_secs, async {
            self.post_envelope(&config.runtime_id, &envelope).await
        })
        .await?;

        tracing::info!(
            %trigger_id,
            runtime_id = %config.runtime_id,
            execution_id = %payload.execution_id,
            "trigger delivered to container"
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
        let body = with_deadline(
            "get_definitions",
            self.config.definitions_timeout_secs,
            async { self.post_envelope(&config.runtime_id, &envelope).await },
        )
        .await?;

        serde_json::from_value(body).map_err(|e| RuntimeError::MalformedResponse(e.to_string()))
    }

    async fn destroy_runtime(&self, config: &RuntimeConfig) -> Result<(), RuntimeError> {
        let response = self
            .client
            .delete(self.url(&format!("/containers/{}?force=true", config.runtime_id)))
            .send()
            .await
            .map_err(|e| RuntimeError::provisioning("destroy", e.to_string()))?;

        interpret_destroy_status(response.status().as_u16())
            .map_err(|message| RuntimeError::provisioning("destroy", message))?;

        self.log_cursors.remove(&config.runtime_id);
        self.last_activity.remove(&config.runtime_id);
        tracing::info!(runtime_id = %config.runtime_id, "container destroyed");
        Ok(())
    }

    async fn teardown_unused_runtimes(&self) -> Result<(), RuntimeError> {
        let idle = idle_runtimes(
            &self.last_activity,
            Utc::now(),
            self.config.idle_timeout_secs,
        );

        for runtime_id in idle {
            let response = self
                .client
                .post(self.url(&format!("/containers/{runtime_id}/stop")))
                .send()
                .await;

            match response {
                Ok(r) if matches!(r.status().as_u16(), 204 | 304 | 404) => {
                    self.last_activity.remove(&runtime_id);
                    tracing::info!(runtime_id, "stopped idle container");
                }
                Ok(r) => {
                    tracing::warn!(runtime_id, status = %r.status(), "idle stop rejected");
                }
                Err(err) => {
                    tracing::warn!(runtime_id, error = %err, "idle stop failed");
                }
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Pure control-plane interpretation
// ---------------------------------------------------------------------------

/// Map a container inspection document onto a provisioning status report.
///
/// Healthcheck `healthy` means the instance accepted its readiness probe;
/// a dead or exited container is a terminal provisioning failure. Everything
/// else stays in progress -- including `unhealthy`, since the healthcheck
/// may flap while the instance warms up and a failed runtime gets destroyed
/// rather than re-polled.
pub fn map_inspection(inspection: &Value) -> RuntimeStatusReport {
    let state = inspection.pointer("/State/Status").and_then(Value::as_str);
    let health = inspection
        .pointer("/State/Health/Status")
        .and_then(Value::as_str);

    match (state, health) {
        (_, Some("healthy")) => RuntimeStatusReport::completed(),
        (Some("exited"), _) | (Some("dead"), _) => {
            let exit_code = inspection
                .pointer("/State/ExitCode")
                .and_then(Value::as_i64)
                .unwrap_or_default();
            RuntimeStatusReport::failed(format!("container exited with code {exit_code}"))
        }
        _ => RuntimeStatusReport::in_progress(),
    }
}

/// Demultiplex a container log stream.
///
/// The engine frames non-TTY output as 8-byte headers (stream type, three
/// zero bytes, big-endian payload length) followed by the payload. TTY
/// streams arrive raw; a first byte outside the stream-type range means raw.
pub fn demux_log_stream(bytes: &[u8]) -> Vec<String> {
    if bytes.is_empty() {
        return Vec::new();
    }

    let framed = matches!(bytes[0], 0..=2) && bytes.len() >= 8 && bytes[1..4] == [0, 0, 0];
    let mut text = String::new();

    if framed {
        let mut rest = bytes;
        while rest.len() >= 8 {
            let len = u32::from_be_bytes([rest[4], rest[5], rest[6], rest[7]]) as usize;
            let end = (8 + len).min(rest.len());
            text.push_str(&String::from_utf8_lossy(&rest[8..end]));
            rest = &rest[end..];
        }
    } else {
        text.push_str(&String::from_utf8_lossy(bytes));
    }

    text.lines()
        .map(str::trim_end)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

/// 204 means started, 304 means already running.
fn interpret_start_status(status: u16) -> Result<(), String> {
    match status {
        204 | 304 => Ok(()),
        404 => Err("container not found".to_string()),
        other => Err(format!("engine answered {other}")),
    }
}

/// 404 on delete means the container is already gone, which is the desired
/// end state. Destroy is idempotent.
fn interpret_destroy_status(status: u16) -> Result<(), String> {
    match status {
        204 | 404 => Ok(()),
        other => Err(format!("engine answered {other}")),
    }
}

/// Runtimes whose last invocation is older than the idle timeout.
fn idle_runtimes(
    last_activity: &DashMap<String, DateTime<Utc>>,
    now: DateTime<Utc>,
    idle_timeout_secs: u64,
) -> Vec<String> {
    last_activity
        .iter()
        .filter(|entry| {
            (now - *entry.value()).num_seconds() >= idle_timeout_secs as i64
        })
        .map(|entry| entry.key().clone())
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
