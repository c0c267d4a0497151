//! RuntimeController trait definition.
//!
//! This is the core abstraction every compute backend driver implements.
//! Uses native async fn in traits (RPITIT, Rust 2024 edition); the
//! object-safe wrapper lives in `box_controller`.

use serde_json::Value;
use uuid::Uuid;

use lattice_types::config::BackendKind;
use lattice_types::error::RuntimeError;
use lattice_types::runtime::{
    DefinitionsResult, RuntimeConfig, RuntimePayload, RuntimeStatusReport, UserCode,
};

/// Uniform lifecycle contract for runtime backends (container engine,
/// serverless functions).
///
/// Concurrency: no global lock serializes these operations. Concurrent
/// `invoke_trigger` calls against the same runtime are expected; drivers must
/// make start-if-stopped idempotent under concurrent callers.
///
/// Implementations live in lattice-infra (`ContainerDriver`,
/// `ServerlessDriver`).
pub trait RuntimeController: Send + Sync {
    /// Which backend this driver talks to.
    fn backend(&self) -> BackendKind;

    /// Begin asynchronous provisioning of a runtime. Never blocks until the
    /// runtime is ready.
    ///
    /// Fails only on a synchronous rejection from the control plane (e.g. a
    /// malformed image reference); all later failures surface through
    /// [`get_runtime_status`](Self::get_runtime_status).
    fn create_runtime(
        &self,
        config: &RuntimeConfig,
    ) -> impl std::future::Future<Output = Result<RuntimeStatusReport, RuntimeError>> + Send;

    /// Poll current provisioning state.
    ///
    /// Total: every backend-reported state (including "not found" and query
    /// failures) maps onto exactly one of the three statuses. Never errors --
    /// poll failures come back as a `Failed` report with a reason.
    fn get_runtime_status(
        &self,
        runtime_id: &str,
    ) -> impl std::future::Future<Output = RuntimeStatusReport> + Send;

    /// Deliver a [`RuntimePayload`] to a running instance, starting it first
    /// if it is stopped or cold.
    ///
    /// Returns `Ok` once the backend accepts the invocation, even if the
    /// instance subsequently errors -- instance errors are reported
    /// out-of-band. Only transport-level failures (the backend never accepted
    /// the request) are errors here.
    fn invoke_trigger(
        &self,
        trigger_id: Uuid,
        config: &RuntimeConfig,
        code: &UserCode,
        payload: &RuntimePayload,
    ) -> impl std::future::Future<Output = Result<(), RuntimeError>> + Send;

    /// Synchronous round-trip: boot (or reuse) the instance and ask it to
    /// statically extract its declared triggers and providers.
    ///
    /// Enforces a timeout distinct from -- and shorter than -- the trigger
    /// invocation timeout, since this call sits on a user-facing deployment
    /// path. A timed-out call is a deployment validation failure, never
    /// silently retried.
    fn get_definitions(
        &self,
        config: &RuntimeConfig,
        code: &UserCode,
        provider_configs: &Value,
    ) -> impl std::future::Future<Output = Result<DefinitionsResult, RuntimeError>> + Send;

    /// Destroy the runtime. Idempotent: "already gone" is success.
    fn destroy_runtime(
        &self,
        config: &RuntimeConfig,
    ) -> impl std::future::Future<Output = Result<(), RuntimeError>> + Send;

    /// Backend-specific garbage collection sweep (e.g. stop containers idle
    /// beyond a threshold). A no-op is a valid implementation for backends
    /// with no persistent idle state.
    fn teardown_unused_runtimes(
        &self,
    ) -> impl std::future::Future<Output = Result<(), RuntimeError>> + Send;
}
