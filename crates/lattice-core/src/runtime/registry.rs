//! Runtime registry: backend driver selection and runtime-record lookup.
//!
//! Drivers are constructed once at startup from static configuration and
//! registered here; nothing is reflected or re-selected at runtime. Runtime
//! records (`RuntimeConfig`) are immutable once registered.

use std::collections::HashMap;

use dashmap::DashMap;

use lattice_types::config::BackendKind;
use lattice_types::error::RegistryError;
use lattice_types::runtime::RuntimeConfig;

use super::box_controller::BoxRuntimeController;

/// Process-wide lookup resolving a runtime identifier to its backing
/// configuration and selecting the correct driver instance.
pub struct RuntimeRegistry {
    /// One driver per backend kind, fixed after startup.
    controllers: HashMap<BackendKind, BoxRuntimeController>,
    /// Runtime id -> immutable runtime record.
    runtimes: DashMap<String, RuntimeConfig>,
    /// The backend new deployments are placed on.
    active: BackendKind,
}

impl RuntimeRegistry {
    /// Create a registry with the given active backend. Drivers are added
    /// with [`register_controller`](Self::register_controller) during
    /// startup.
    pub fn new(active: BackendKind) -> Self {
        Self {
            controllers: HashMap::new(),
            runtimes: DashMap::new(),
            active,
        }
    }

    /// Register a driver under its backend kind. Replaces any previous
    /// driver for that kind (only meaningful during startup wiring).
    pub fn register_controller(&mut self, controller: BoxRuntimeController) {
        let kind = controller.backend();
        tracing::debug!(backend = %kind, "registered runtime controller");
        self.controllers.insert(kind, controller);
    }

    /// The backend new deployments are placed on.
    pub fn active_backend(&self) -> BackendKind {
        self.active
    }

    /// Resolve the driver for a backend kind.
    pub fn controller_for(
        &self,
        kind: BackendKind,
    ) -> Result<&BoxRuntimeController, RegistryError> {
        self.controllers
            .get(&kind)
            .ok_or(RegistryError::ControllerNotRegistered(kind))
    }

    /// Resolve the driver for the active backend.
    pub fn active_controller(&self) -> Result<&BoxRuntimeController, RegistryError> {
        self.controller_for(self.active)
    }

    /// Record a newly created runtime. Records are immutable: registering an
    /// id twice is a conflict, not an update.
    pub fn register_runtime(&self, config: RuntimeConfig) -> Result<(), RegistryError> {
        if self.runtimes.contains_key(&config.runtime_id) {
            return Err(RegistryError::DuplicateRuntime(config.runtime_id));
        }
        tracing::info!(runtime_id = %config.runtime_id, "registered runtime");
        self.runtimes.insert(config.runtime_id.clone(), config);
        Ok(())
    }

    /// Look up a runtime record by id.
    pub fn runtime_config(&self, runtime_id: &str) -> Result<RuntimeConfig, RegistryError> {
        self.runtimes
            .get(runtime_id)
            .map(|r| r.value().clone())
            .ok_or_else(|| RegistryError::RuntimeNotFound(runtime_id.to_string()))
    }

    /// Remove a runtime record after its backend resources are destroyed.
    pub fn unregister_runtime(&self, runtime_id: &str) -> Option<RuntimeConfig> {
        self.runtimes.remove(runtime_id).map(|(_, v)| v)
    }

    /// Number of registered runtime records.
    pub fn runtime_count(&self) -> usize {
        self.runtimes.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::controller::RuntimeController;
    use lattice_types::error::RuntimeError;
    use lattice_types::runtime::{
        DefinitionsResult, RuntimePayload, RuntimeStatusReport, UserCode,
    };
    use serde_json::Value;
    use uuid::Uuid;

    struct NullDriver(BackendKind);

    impl RuntimeController for NullDriver {
        fn backend(&self) -> BackendKind {
            self.0
        }

        async fn create_runtime(
            &self,
            _config: &RuntimeConfig,
        ) -> Result<RuntimeStatusReport, RuntimeError> {
            Ok(RuntimeStatusReport::in_progress())
        }

        async fn get_runtime_status(&self, _runtime_id: &str) -> RuntimeStatusReport {
            RuntimeStatusReport::completed()
        }

        async fn invoke_trigger(
            &self,
            _trigger_id: Uuid,
            _config: &RuntimeConfig,
            _code: &UserCode,
            _payload: &RuntimePayload,
        ) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn get_definitions(
            &self,
            _config: &RuntimeConfig,
            _code: &UserCode,
            _provider_configs: &Value,
        ) -> Result<DefinitionsResult, RuntimeError> {
            Ok(DefinitionsResult::ok(Vec::new(), Vec::new()))
        }

        async fn destroy_runtime(&self, _config: &RuntimeConfig) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn teardown_unused_runtimes(&self) -> Result<(), RuntimeError> {
            Ok(())
        }
    }

    #[test]
    fn test_controller_lookup() {
        let mut registry = RuntimeRegistry::new(BackendKind::Container);
        registry.register_controller(BoxRuntimeController::new(NullDriver(
            BackendKind::Container,
        )));

        assert!(registry.controller_for(BackendKind::Container).is_ok());
        assert!(matches!(
            registry.controller_for(BackendKind::Serverless),
            Err(RegistryError::ControllerNotRegistered(BackendKind::Serverless))
        ));
        assert_eq!(
            registry.active_controller().unwrap().backend(),
            BackendKind::Container
        );
    }

    #[test]
    fn test_runtime_records_are_immutable() {
        let registry = RuntimeRegistry::new(BackendKind::Container);
        let config = RuntimeConfig {
            runtime_id: "wf-1".into(),
            image_digest: "sha256:abc".into(),
        };

        registry.register_runtime(config.clone()).unwrap();
        assert!(matches!(
            registry.register_runtime(config),
            Err(RegistryError::DuplicateRuntime(_))
        ));
        assert_eq!(registry.runtime_count(), 1);
    }

    #[test]
    fn test_runtime_lookup_and_unregister() {
        let registry = RuntimeRegistry::new(BackendKind::Container);
        registry
            .register_runtime(RuntimeConfig {
                runtime_id: "wf-1".into(),
                image_digest: "sha256:abc".into(),
            })
            .unwrap();

        assert_eq!(
            registry.runtime_config("wf-1").unwrap().image_digest,
            "sha256:abc"
        );
        assert!(matches!(
            registry.runtime_config("missing"),
            Err(RegistryError::RuntimeNotFound(_))
        ));

        assert!(registry.unregister_runtime("wf-1").is_some());
        assert_eq!(registry.runtime_count(), 0);
    }
}
