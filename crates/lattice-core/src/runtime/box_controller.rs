//! BoxRuntimeController -- object-safe dynamic dispatch wrapper for
//! RuntimeController.
//!
//! 1. Define an object-safe `RuntimeControllerDyn` trait with boxed futures
//! 2. Blanket-impl `RuntimeControllerDyn` for all `T: RuntimeController`
//! 3. `BoxRuntimeController` wraps `Box<dyn RuntimeControllerDyn>` and
//!    delegates

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use uuid::Uuid;

use lattice_types::config::BackendKind;
use lattice_types::error::RuntimeError;
use lattice_types::runtime::{
    DefinitionsResult, RuntimeConfig, RuntimeCreationStatus, RuntimePayload, RuntimeStatusReport,
    UserCode,
};

use super::controller::RuntimeController;

/// Object-safe version of [`RuntimeController`] with boxed futures.
///
/// Exists solely to enable dynamic dispatch (`dyn RuntimeControllerDyn`).
/// A blanket implementation is provided for all types implementing
/// `RuntimeController`.
pub trait RuntimeControllerDyn: Send + Sync {
    fn backend(&self) -> BackendKind;

    fn create_runtime_boxed<'a>(
        &'a self,
        config: &'a RuntimeConfig,
    ) -> Pin<Box<dyn Future<Output = Result<RuntimeStatusReport, RuntimeError>> + Send + 'a>>;

    fn get_runtime_status_boxed<'a>(
        &'a self,
        runtime_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = RuntimeStatusReport> + Send + 'a>>;

    fn invoke_trigger_boxed<'a>(
        &'a self,
        trigger_id: Uuid,
        config: &'a RuntimeConfig,
        code: &'a UserCode,
        payload: &'a RuntimePayload,
    ) -> Pin<Box<dyn Future<Output = Result<(), RuntimeError>> + Send + 'a>>;

    fn get_definitions_boxed<'a>(
        &'a self,
        config: &'a RuntimeConfig,
        code: &'a UserCode,
        provider_configs: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<DefinitionsResult, RuntimeError>> + Send + 'a>>;

    fn destroy_runtime_boxed<'a>(
        &'a self,
        config: &'a RuntimeConfig,
    ) -> Pin<Box<dyn Future<Output = Result<(), RuntimeError>> + Send + 'a>>;

    fn teardown_unused_runtimes_boxed<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), RuntimeError>> + Send + 'a>>;
}

/// Blanket implementation: any `RuntimeController` automatically implements
/// `RuntimeControllerDyn`.
impl<T: RuntimeController> RuntimeControllerDyn for T {
    fn backend(&self) -> BackendKind {
        RuntimeController::backend(self)
    }

    fn create_runtime_boxed<'a>(
        &'a self,
        config: &'a RuntimeConfig,
    ) -> Pin<Box<dyn Future<Output = Result<RuntimeStatusReport, RuntimeError>> + Send + 'a>> {
        Box::pin(self.create_runtime(config))
    }

    fn get_runtime_status_boxed<'a>(
        &'a self,
        runtime_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = RuntimeStatusReport> + Send + 'a>> {
        Box::pin(self.get_runtime_status(runtime_id))
    }

    fn invoke_trigger_boxed<'a>(
        &'a self,
        trigger_id: Uuid,
        config: &'a RuntimeConfig,
        code: &'a UserCode,
        payload: &'a RuntimePayload,
    ) -> Pin<Box<dyn Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(self.invoke_trigger(trigger_id, config, code, payload))
    }

    fn get_definitions_boxed<'a>(
        &'a self,
        config: &'a RuntimeConfig,
        code: &'a UserCode,
        provider_configs: &'a Value,
    ) -> Pin<Box<dyn Future<Output = Result<DefinitionsResult, RuntimeError>> + Send + 'a>> {
        Box::pin(self.get_definitions(config, code, provider_configs))
    }

    fn destroy_runtime_boxed<'a>(
        &'a self,
        config: &'a RuntimeConfig,
    ) -> Pin<Box<dyn Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(self.destroy_runtime(config))
    }

    fn teardown_unused_runtimes_boxed<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), RuntimeError>> + Send + 'a>> {
        Box::pin(self.teardown_unused_runtimes())
    }
}

/// Type-erased runtime controller for backend selection at startup.
///
/// Since `RuntimeController` uses RPITIT, it cannot be used as a trait object
/// directly. `BoxRuntimeController` provides equivalent methods that delegate
/// to the inner `RuntimeControllerDyn` trait object.
pub struct BoxRuntimeController {
    inner: Box<dyn RuntimeControllerDyn + Send + Sync>,
}

impl BoxRuntimeController {
    /// Wrap a concrete `RuntimeController` in a type-erased box.
    pub fn new<T: RuntimeController + 'static>(controller: T) -> Self {
        Self {
            inner: Box::new(controller),
        }
    }

    /// Which backend this driver talks to.
    pub fn backend(&self) -> BackendKind {
        self.inner.backend()
    }

    /// Begin asynchronous provisioning of a runtime.
    pub async fn create_runtime(
        &self,
        config: &RuntimeConfig,
    ) -> Result<RuntimeStatusReport, RuntimeError> {
        self.inner.create_runtime_boxed(config).await
    }

    /// Poll current provisioning state. Never errors.
    pub async fn get_runtime_status(&self, runtime_id: &str) -> RuntimeStatusReport {
        self.inner.get_runtime_status_boxed(runtime_id).await
    }

    /// Deliver a payload to a running instance, starting it if stopped.
    pub async fn invoke_trigger(
        &self,
        trigger_id: Uuid,
        config: &RuntimeConfig,
        code: &UserCode,
        payload: &RuntimePayload,
    ) -> Result<(), RuntimeError> {
        self.inner
            .invoke_trigger_boxed(trigger_id, config, code, payload)
            .await
    }

    /// Ask the instance to statically extract its declared triggers.
    pub async fn get_definitions(
        &self,
        config: &RuntimeConfig,
        code: &UserCode,
        provider_configs: &Value,
    ) -> Result<DefinitionsResult, RuntimeError> {
        self.inner
            .get_definitions_boxed(config, code, provider_configs)
            .await
    }

    /// Destroy the runtime. Idempotent.
    pub async fn destroy_runtime(&self, config: &RuntimeConfig) -> Result<(), RuntimeError> {
        self.inner.destroy_runtime_boxed(config).await
    }

    /// Convenience wrapper: the runtime is healthy when its status polls as
    /// `Completed`.
    pub async fn is_healthy(&self, config: &RuntimeConfig) -> bool {
        self.get_runtime_status(&config.runtime_id).await.status
            == RuntimeCreationStatus::Completed
    }

    /// Backend-specific garbage collection sweep.
    pub async fn teardown_unused_runtimes(&self) -> Result<(), RuntimeError> {
        self.inner.teardown_unused_runtimes_boxed().await
    }
}
