//! Deployment creation flow.
//!
//! Ties the runtime controller and trigger synchronizer together: extract
//! the declared triggers from user code via the active backend, then
//! reconcile trigger/webhook registrations against the store.
//!
//! Degradation rule: definitions extraction is authoritative (a deployment
//! whose code cannot be evaluated does not exist), but trigger
//! synchronization failure only degrades the deployment -- it is created
//! with no webhook registrations and the failure is logged for a later
//! redeploy to repair.

use serde_json::Value;
use uuid::Uuid;

use lattice_types::error::DeployError;
use lattice_types::provider::ProviderDeclaration;
use lattice_types::runtime::{RuntimeConfig, UserCode};
use lattice_types::trigger::{TriggerDefinition, WebhookInfo};

use crate::repository::{ProviderConfigStore, TriggerRepository};
use crate::runtime::BoxRuntimeController;
use crate::trigger::{ProviderMapping, TriggerSynchronizer};

// ---------------------------------------------------------------------------
// Request / outcome
// ---------------------------------------------------------------------------

/// Everything needed to create one workflow deployment.
#[derive(Debug, Clone)]
pub struct DeploymentRequest {
    pub workflow_id: Uuid,
    pub namespace_id: Uuid,
    pub runtime: RuntimeConfig,
    pub code: UserCode,
    /// Decrypted provider configurations handed to the instance for
    /// definitions extraction.
    pub provider_configs: Value,
    pub provider_mapping: Option<ProviderMapping>,
}

/// What a successful deployment creation produced.
#[derive(Debug, Clone)]
pub struct DeploymentOutcome {
    /// Trigger definitions the code declared.
    pub triggers: Vec<TriggerDefinition>,
    /// Provider declarations the code referenced.
    pub providers: Vec<ProviderDeclaration>,
    /// Webhook registrations backing the declared triggers. Empty when no
    /// trigger needs one, or when synchronization degraded.
    pub webhooks: Vec<WebhookInfo>,
}

// ---------------------------------------------------------------------------
// Creation
// ---------------------------------------------------------------------------

/// Create a deployment: extract definitions through the active backend, then
/// synchronize triggers and webhooks.
pub async fn create_deployment<R, P>(
    controller: &BoxRuntimeController,
    synchronizer: &TriggerSynchronizer<R, P>,
    request: &DeploymentRequest,
) -> Result<DeploymentOutcome, DeployError>
where
    R: TriggerRepository,
    P: ProviderConfigStore,
{
    let result = controller
        .get_definitions(&request.runtime, &request.code, &request.provider_configs)
        .await?;

    if !result.success {
        let error = result.error.unwrap_or_else(|| {
            lattice_types::runtime::InstanceError {
                message: "definitions extraction failed without detail".to_string(),
                stack: None,
            }
        });
        tracing::info!(
            workflow_id = %request.workflow_id,
            message = %error.message,
            "user code rejected during definitions extraction"
        );
        return Err(DeployError::Validation {
            message: error.message,
            stack: error.stack,
        });
    }

    let triggers = result.triggers.unwrap_or_default();
    let providers = result.providers.unwrap_or_default();

    // Availability over consistency: a store outage during synchronization
    // leaves the deployment live with no webhooks rather than failing it.
    let webhooks = match synchronizer
        .sync_triggers(
            request.workflow_id,
            request.namespace_id,
            &triggers,
            request.provider_mapping.as_ref(),
        )
        .await
    {
        Ok(webhooks) => webhooks,
        Err(err) => {
            tracing::error!(
                workflow_id = %request.workflow_id,
                error = %err,
                "trigger synchronization failed, deployment created without webhooks"
            );
            Vec::new()
        }
    };

    tracing::info!(
        workflow_id = %request.workflow_id,
        triggers = triggers.len(),
        webhooks = webhooks.len(),
        "deployment created"
    );

    Ok(DeploymentOutcome {
        triggers,
        providers,
        webhooks,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use lattice_types::config::BackendKind;
    use lattice_types::error::{RepositoryError, RuntimeError};
    use lattice_types::provider::ProviderConfigRecord;
    use lattice_types::runtime::{
        DefinitionsResult, InstanceError, RuntimePayload, RuntimeStatusReport,
    };
    use lattice_types::trigger::{RegisteredTrigger, Webhook};

    use crate::runtime::RuntimeController;

    /// Controller double returning a canned definitions result. The result
    /// is handed out once; each test makes a single extraction call.
    struct StubController {
        definitions: Mutex<Option<Result<DefinitionsResult, RuntimeError>>>,
    }

    impl StubController {
        fn returning(definitions: Result<DefinitionsResult, RuntimeError>) -> Self {
            Self {
                definitions: Mutex::new(Some(definitions)),
            }
        }
    }

    impl RuntimeController for StubController {
        fn backend(&self) -> BackendKind {
            BackendKind::Container
        }

        async fn create_runtime(
            &self,
            _config: &RuntimeConfig,
        ) -> Result<RuntimeStatusReport, RuntimeError> {
            Ok(RuntimeStatusReport::completed())
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
            self.definitions
                .lock()
                .unwrap()
                .take()
                .expect("stub supports a single extraction call")
        }

        async fn destroy_runtime(&self, _config: &RuntimeConfig) -> Result<(), RuntimeError> {
            Ok(())
        }

        async fn teardown_unused_runtimes(&self) -> Result<(), RuntimeError> {
            Ok(())
        }
    }

    /// Repository double; can be wired to fail all listing calls.
    #[derive(Default)]
    struct TestRepository {
        triggers: Mutex<Vec<RegisteredTrigger>>,
        webhooks: Mutex<Vec<Webhook>>,
        fail_listing: bool,
    }

    impl TriggerRepository for TestRepository {
        async fn create_trigger(&self, trigger: &RegisteredTrigger) -> Result<(), RepositoryError> {
            self.triggers.lock().unwrap().push(trigger.clone());
            Ok(())
        }

        async fn list_triggers(
            &self,
            workflow_id: &Uuid,
        ) -> Result<Vec<RegisteredTrigger>, RepositoryError> {
            if self.fail_listing {
                return Err(RepositoryError::Connection);
            }
            Ok(self
                .triggers
                .lock()
                .unwrap()
                .iter()
                .filter(|t| t.workflow_id == *workflow_id)
                .cloned()
                .collect())
        }

        async fn delete_trigger(&self, id: &Uuid) -> Result<bool, RepositoryError> {
            let mut triggers = self.triggers.lock().unwrap();
            let before = triggers.len();
            triggers.retain(|t| t.id != *id);
            Ok(triggers.len() < before)
        }

        async fn create_webhook(&self, webhook: &Webhook) -> Result<(), RepositoryError> {
            self.webhooks.lock().unwrap().push(webhook.clone());
            Ok(())
        }

        async fn list_webhooks(&self, workflow_id: &Uuid) -> Result<Vec<Webhook>, RepositoryError> {
            if self.fail_listing {
                return Err(RepositoryError::Connection);
            }
            Ok(self
                .webhooks
                .lock()
                .unwrap()
                .iter()
                .filter(|w| w.workflow_id == *workflow_id)
                .cloned()
                .collect())
        }

        async fn delete_webhook(&self, id: &Uuid) -> Result<bool, RepositoryError> {
            let mut webhooks = self.webhooks.lock().unwrap();
            let before = webhooks.len();
            webhooks.retain(|w| w.id != *id);
            Ok(webhooks.len() < before)
        }
    }

    #[derive(Default)]
    struct TestProviderStore {
        records: Vec<ProviderConfigRecord>,
    }

    impl ProviderConfigStore for TestProviderStore {
        async fn get_provider_config(
            &self,
            id: &Uuid,
        ) -> Result<Option<ProviderConfigRecord>, RepositoryError> {
            Ok(self.records.iter().find(|r| r.id == *id).cloned())
        }

        async fn find_by_alias(
            &self,
            namespace_id: &Uuid,
            provider_type: &str,
            alias: &str,
        ) -> Result<Option<ProviderConfigRecord>, RepositoryError> {
            Ok(self
                .records
                .iter()
                .find(|r| {
                    r.namespace_id == *namespace_id
                        && r.provider_type == provider_type
                        && r.alias == alias
                })
                .cloned())
        }
    }

    fn request() -> DeploymentRequest {
        DeploymentRequest {
            workflow_id: Uuid::now_v7(),
            namespace_id: Uuid::now_v7(),
            runtime: RuntimeConfig {
                runtime_id: "wf-1".into(),
                image_digest: "sha256:abc".into(),
            },
            code: UserCode {
                files: HashMap::from([("main.ts".to_string(), "export default {}".to_string())]),
                entrypoint: "main.ts".into(),
            },
            provider_configs: json!({}),
            provider_mapping: None,
        }
    }

    fn synchronizer(
        repo: Arc<TestRepository>,
    ) -> TriggerSynchronizer<TestRepository, TestProviderStore> {
        TriggerSynchronizer::new(
            repo,
            Arc::new(TestProviderStore::default()),
            "https://hooks.example.com",
        )
    }

    #[tokio::test]
    async fn test_cron_deployment_registers_trigger_without_webhooks() {
        let mut input = serde_json::Map::new();
        input.insert("expression".into(), json!("*/10 * * * *"));
        let cron = TriggerDefinition::new("cron", "default", "onCron", input);

        let controller = BoxRuntimeController::new(StubController::returning(Ok(
            DefinitionsResult::ok(vec![cron], Vec::new()),
        )));
        let repo = Arc::new(TestRepository::default());

        let outcome = create_deployment(&controller, &synchronizer(repo.clone()), &request())
            .await
            .unwrap();

        assert_eq!(outcome.triggers.len(), 1);
        assert_eq!(outcome.triggers[0].trigger_type, "onCron");
        assert_eq!(
            outcome.triggers[0].input.get("expression"),
            Some(&json!("*/10 * * * *"))
        );
        assert!(outcome.webhooks.is_empty());
        assert_eq!(repo.triggers.lock().unwrap().len(), 1);
        assert!(repo.webhooks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_instance_validation_failure_rejects_deployment() {
        let controller = BoxRuntimeController::new(StubController::returning(Ok(
            DefinitionsResult::instance_error(InstanceError {
                message: "SyntaxError: unexpected token".into(),
                stack: Some("at main.ts:3".into()),
            }),
        )));
        let repo = Arc::new(TestRepository::default());

        let err = create_deployment(&controller, &synchronizer(repo), &request())
            .await
            .unwrap_err();

        match err {
            DeployError::Validation { message, stack } => {
                assert_eq!(message, "SyntaxError: unexpected token");
                assert_eq!(stack.as_deref(), Some("at main.ts:3"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_runtime_failure_propagates() {
        let controller = BoxRuntimeController::new(StubController::returning(Err(RuntimeError::Timeout {
            operation: "get_definitions".into(),
            timeout_secs: 30,
        })));
        let repo = Arc::new(TestRepository::default());

        let err = create_deployment(&controller, &synchronizer(repo), &request())
            .await
            .unwrap_err();
        assert!(matches!(err, DeployError::Runtime(RuntimeError::Timeout { .. })));
    }

    #[tokio::test]
    async fn test_sync_failure_degrades_to_empty_webhooks() {
        let cron = TriggerDefinition::new("cron", "default", "onCron", serde_json::Map::new());
        let controller = BoxRuntimeController::new(StubController::returning(Ok(
            DefinitionsResult::ok(vec![cron], Vec::new()),
        )));
        let repo = Arc::new(TestRepository {
            fail_listing: true,
            ..Default::default()
        });

        let outcome = create_deployment(&controller, &synchronizer(repo), &request())
            .await
            .unwrap();

        assert_eq!(outcome.triggers.len(), 1);
        assert!(outcome.webhooks.is_empty());
    }
}
