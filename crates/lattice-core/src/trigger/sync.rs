//! Trigger synchronizer.
//!
//! Reconciles a workflow deployment's desired trigger set (extracted from
//! user code) against persisted trigger/webhook state: creating what is
//! missing, reusing what already matches (per the matcher's normalized
//! equality), and removing what is no longer declared.
//!
//! Per-trigger isolation: a trigger whose backing provider cannot be
//! resolved is skipped with a warning -- it never aborts synchronization of
//! the rest. Repository failures do abort (they indicate a store outage, not
//! a per-trigger condition); the deployment layer decides how far to degrade.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use uuid::Uuid;

use lattice_types::error::RepositoryError;
use lattice_types::provider::ProviderConfigRecord;
use lattice_types::trigger::{RegisteredTrigger, TriggerDefinition, Webhook, WebhookInfo};

use crate::repository::{ProviderConfigStore, TriggerRepository};

use super::matcher;

// ---------------------------------------------------------------------------
// Provider mapping
// ---------------------------------------------------------------------------

/// Optional deployment-scoped mapping of provider type -> code alias ->
/// concrete provider record id.
///
/// When supplied, aliases declared in code resolve through it instead of the
/// namespace-wide type+alias lookup.
#[derive(Debug, Clone, Default)]
pub struct ProviderMapping {
    map: HashMap<String, HashMap<String, Uuid>>,
}

impl ProviderMapping {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(
        &mut self,
        provider_type: impl Into<String>,
        alias: impl Into<String>,
        id: Uuid,
    ) {
        self.map
            .entry(provider_type.into())
            .or_default()
            .insert(alias.into(), id);
    }

    pub fn resolve(&self, provider_type: &str, alias: &str) -> Option<Uuid> {
        self.map.get(provider_type)?.get(alias).copied()
    }
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

/// Reconciles desired trigger definitions with registered triggers and
/// webhooks. Runs once per deployment creation, synchronously within that
/// request; the per-workflow trigger counts involved do not justify parallel
/// fan-out.
pub struct TriggerSynchronizer<R, P> {
    repository: Arc<R>,
    providers: Arc<P>,
    /// Public base URL webhook paths are resolved against in the returned
    /// [`WebhookInfo`] records.
    webhook_base_url: String,
}

impl<R: TriggerRepository, P: ProviderConfigStore> TriggerSynchronizer<R, P> {
    pub fn new(repository: Arc<R>, providers: Arc<P>, webhook_base_url: impl Into<String>) -> Self {
        Self {
            repository,
            providers,
            webhook_base_url: webhook_base_url.into(),
        }
    }

    /// Bring registered trigger/webhook state in line with `desired`.
    ///
    /// Returns the webhook registrations backing the desired set after
    /// reconciliation. Triggers on built-in providers (cron, schedule,
    /// manual) get a registered-trigger row but no webhook.
    pub async fn sync_triggers(
        &self,
        workflow_id: Uuid,
        namespace_id: Uuid,
        desired: &[TriggerDefinition],
        mapping: Option<&ProviderMapping>,
    ) -> Result<Vec<WebhookInfo>, RepositoryError> {
        let existing_triggers = self.repository.list_triggers(&workflow_id).await?;
        let existing_webhooks = self.repository.list_webhooks(&workflow_id).await?;

        let mut webhooks = Vec::new();
        let mut kept: HashSet<Uuid> = HashSet::new();

        for definition in desired {
            let trigger = match existing_triggers
                .iter()
                .find(|t| matcher::descriptors_match(&t.definition, definition))
            {
                Some(existing) => existing.clone(),
                None => {
                    let trigger = RegisteredTrigger {
                        id: Uuid::now_v7(),
                        workflow_id,
                        definition: definition.clone(),
                    };
                    self.repository.create_trigger(&trigger).await?;
                    tracing::info!(
                        %workflow_id,
                        trigger_id = %trigger.id,
                        provider = %definition.provider.provider_type,
                        trigger_type = %definition.trigger_type,
                        "registered trigger"
                    );
                    trigger
                }
            };
            kept.insert(trigger.id);

            if !definition.requires_webhook() {
                tracing::debug!(
                    trigger_id = %trigger.id,
                    provider = %definition.provider.provider_type,
                    "built-in trigger, no webhook registration"
                );
                continue;
            }

            // Per-trigger isolation: an unresolvable provider skips this
            // trigger, never the batch.
            let provider = match self
                .resolve_provider(namespace_id, definition, mapping)
                .await
            {
                Ok(Some(provider)) => provider,
                Ok(None) => {
                    tracing::warn!(
                        %workflow_id,
                        provider = %definition.provider.provider_type,
                        alias = %definition.provider.alias,
                        trigger_type = %definition.trigger_type,
                        "skipping trigger: no provider configuration found"
                    );
                    continue;
                }
                Err(err) => {
                    tracing::warn!(
                        %workflow_id,
                        provider = %definition.provider.provider_type,
                        alias = %definition.provider.alias,
                        error = %err,
                        "skipping trigger: provider lookup failed"
                    );
                    continue;
                }
            };

            let webhook = match existing_webhooks.iter().find(|w| w.trigger_id == trigger.id) {
                Some(existing) => existing.clone(),
                None => {
                    let webhook = Webhook {
                        id: Uuid::now_v7(),
                        workflow_id,
                        path: format!("/webhooks/{}", Uuid::now_v7()),
                        method: "POST".to_string(),
                        trigger_id: trigger.id,
                        provider_type: provider.provider_type.clone(),
                        provider_alias: definition.provider.alias.clone(),
                        created_at: Utc::now(),
                    };
                    self.repository.create_webhook(&webhook).await?;
                    tracing::info!(
                        %workflow_id,
                        webhook_id = %webhook.id,
                        path = %webhook.path,
                        "registered webhook"
                    );
                    webhook
                }
            };

            webhooks.push(webhook.info(&self.webhook_base_url));
        }

        self.remove_stale(&existing_triggers, &existing_webhooks, &kept)
            .await?;

        Ok(webhooks)
    }

    /// Resolve the provider record backing a definition: by id mapping when
    /// supplied, else by namespace-wide type+alias lookup.
    async fn resolve_provider(
        &self,
        namespace_id: Uuid,
        definition: &TriggerDefinition,
        mapping: Option<&ProviderMapping>,
    ) -> Result<Option<ProviderConfigRecord>, RepositoryError> {
        let provider_type = &definition.provider.provider_type;
        let alias = &definition.provider.alias;

        if let Some(id) = mapping.and_then(|m| m.resolve(provider_type, alias)) {
            return self.providers.get_provider_config(&id).await;
        }

        self.providers
            .find_by_alias(&namespace_id, provider_type, alias)
            .await
    }

    /// Delete registered triggers (and their webhooks) no longer present in
    /// the desired set.
    async fn remove_stale(
        &self,
        existing_triggers: &[RegisteredTrigger],
        existing_webhooks: &[Webhook],
        kept: &HashSet<Uuid>,
    ) -> Result<(), RepositoryError> {
        for trigger in existing_triggers.iter().filter(|t| !kept.contains(&t.id)) {
            for webhook in existing_webhooks.iter().filter(|w| w.trigger_id == trigger.id) {
                self.repository.delete_webhook(&webhook.id).await?;
            }
            self.repository.delete_trigger(&trigger.id).await?;
            tracing::info!(
                workflow_id = %trigger.workflow_id,
                trigger_id = %trigger.id,
                trigger_type = %trigger.definition.trigger_type,
                "removed stale trigger"
            );
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Mutex;

    /// Mutex-backed repository double.
    #[derive(Default)]
    struct TestRepository {
        triggers: Mutex<Vec<RegisteredTrigger>>,
        webhooks: Mutex<Vec<Webhook>>,
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

    /// Provider store double: records keyed by (type, alias); one alias can
    /// be wired to fail its lookup outright.
    #[derive(Default)]
    struct TestProviderStore {
        records: Vec<ProviderConfigRecord>,
        failing_alias: Option<String>,
    }

    impl TestProviderStore {
        fn with_provider(mut self, namespace_id: Uuid, provider_type: &str, alias: &str) -> Self {
            self.records.push(ProviderConfigRecord {
                id: Uuid::now_v7(),
                namespace_id,
                provider_type: provider_type.to_string(),
                alias: alias.to_string(),
                fields: HashMap::new(),
            });
            self
        }

        fn failing_on(mut self, alias: &str) -> Self {
            self.failing_alias = Some(alias.to_string());
            self
        }
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
            if self.failing_alias.as_deref() == Some(alias) {
                return Err(RepositoryError::Query("lookup blew up".into()));
            }
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

    fn definition(provider_type: &str, alias: &str, trigger_type: &str) -> TriggerDefinition {
        TriggerDefinition::new(provider_type, alias, trigger_type, serde_json::Map::new())
    }

    fn synchronizer(
        repo: Arc<TestRepository>,
        providers: Arc<TestProviderStore>,
    ) -> TriggerSynchronizer<TestRepository, TestProviderStore> {
        TriggerSynchronizer::new(repo, providers, "https://hooks.example.com")
    }

    #[tokio::test]
    async fn test_sync_creates_webhooks_for_resolvable_providers() {
        let workflow_id = Uuid::now_v7();
        let namespace_id = Uuid::now_v7();
        let repo = Arc::new(TestRepository::default());
        let providers = Arc::new(
            TestProviderStore::default().with_provider(namespace_id, "slack", "default"),
        );

        let desired = vec![definition("slack", "default", "onMessage")];
        let webhooks = synchronizer(repo.clone(), providers)
            .sync_triggers(workflow_id, namespace_id, &desired, None)
            .await
            .unwrap();

        assert_eq!(webhooks.len(), 1);
        assert_eq!(webhooks[0].method, "POST");
        assert!(webhooks[0].url.starts_with("https://hooks.example.com/webhooks/"));
        assert_eq!(repo.triggers.lock().unwrap().len(), 1);
        assert_eq!(repo.webhooks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_skips_unresolvable_provider_without_failing_batch() {
        // Three desired triggers; provider resolution fails for exactly one.
        let workflow_id = Uuid::now_v7();
        let namespace_id = Uuid::now_v7();
        let repo = Arc::new(TestRepository::default());
        let providers = Arc::new(
            TestProviderStore::default()
                .with_provider(namespace_id, "slack", "default")
                .with_provider(namespace_id, "jira", "default"),
        );

        let desired = vec![
            definition("slack", "default", "onMessage"),
            definition("github", "default", "onPush"), // no provider record
            definition("jira", "default", "onIssueCreated"),
        ];

        let webhooks = synchronizer(repo, providers)
            .sync_triggers(workflow_id, namespace_id, &desired, None)
            .await
            .unwrap();

        assert_eq!(webhooks.len(), 2);
        let types: Vec<_> = webhooks.iter().map(|w| w.provider_type.as_str()).collect();
        assert!(types.contains(&"slack"));
        assert!(types.contains(&"jira"));
    }

    #[tokio::test]
    async fn test_sync_isolates_provider_lookup_errors() {
        let workflow_id = Uuid::now_v7();
        let namespace_id = Uuid::now_v7();
        let repo = Arc::new(TestRepository::default());
        let providers = Arc::new(
            TestProviderStore::default()
                .with_provider(namespace_id, "slack", "default")
                .failing_on("broken"),
        );

        let desired = vec![
            definition("jira", "broken", "onIssueCreated"), // lookup errors
            definition("slack", "default", "onMessage"),
        ];

        let webhooks = synchronizer(repo, providers)
            .sync_triggers(workflow_id, namespace_id, &desired, None)
            .await
            .unwrap();

        assert_eq!(webhooks.len(), 1);
        assert_eq!(webhooks[0].provider_type, "slack");
    }

    #[tokio::test]
    async fn test_sync_is_idempotent_and_reuses_equivalent_registrations() {
        let workflow_id = Uuid::now_v7();
        let namespace_id = Uuid::now_v7();
        let repo = Arc::new(TestRepository::default());
        let providers = Arc::new(
            TestProviderStore::default().with_provider(namespace_id, "slack", "default"),
        );
        let sync = synchronizer(repo.clone(), providers);

        // Same desired set, reordered input keys on the second pass.
        let mut input_a = serde_json::Map::new();
        input_a.insert("channel".into(), json!("C1"));
        input_a.insert("thread".into(), json!(true));
        let mut input_b = serde_json::Map::new();
        input_b.insert("thread".into(), json!(true));
        input_b.insert("channel".into(), json!("C1"));

        let first = vec![TriggerDefinition::new("slack", "default", "onMessage", input_a)];
        let second = vec![TriggerDefinition::new("slack", "default", "onMessage", input_b)];

        let hooks_first = sync
            .sync_triggers(workflow_id, namespace_id, &first, None)
            .await
            .unwrap();
        let hooks_second = sync
            .sync_triggers(workflow_id, namespace_id, &second, None)
            .await
            .unwrap();

        assert_eq!(hooks_first.len(), 1);
        assert_eq!(hooks_second.len(), 1);
        assert_eq!(hooks_first[0].id, hooks_second[0].id, "webhook must be reused");
        assert_eq!(repo.triggers.lock().unwrap().len(), 1);
        assert_eq!(repo.webhooks.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_sync_removes_undeclared_triggers() {
        let workflow_id = Uuid::now_v7();
        let namespace_id = Uuid::now_v7();
        let repo = Arc::new(TestRepository::default());
        let providers = Arc::new(
            TestProviderStore::default()
                .with_provider(namespace_id, "slack", "default")
                .with_provider(namespace_id, "jira", "default"),
        );
        let sync = synchronizer(repo.clone(), providers);

        let both = vec![
            definition("slack", "default", "onMessage"),
            definition("jira", "default", "onIssueCreated"),
        ];
        sync.sync_triggers(workflow_id, namespace_id, &both, None)
            .await
            .unwrap();
        assert_eq!(repo.triggers.lock().unwrap().len(), 2);

        // Redeploy declaring only the slack trigger.
        let slack_only = vec![definition("slack", "default", "onMessage")];
        let webhooks = sync
            .sync_triggers(workflow_id, namespace_id, &slack_only, None)
            .await
            .unwrap();

        assert_eq!(webhooks.len(), 1);
        assert_eq!(repo.triggers.lock().unwrap().len(), 1);
        assert_eq!(repo.webhooks.lock().unwrap().len(), 1);
        assert_eq!(repo.webhooks.lock().unwrap()[0].provider_type, "slack");
    }

    #[tokio::test]
    async fn test_sync_resolves_through_provider_mapping_first() {
        let workflow_id = Uuid::now_v7();
        let namespace_id = Uuid::now_v7();
        let other_namespace = Uuid::now_v7();
        let repo = Arc::new(TestRepository::default());

        // The record lives in a different namespace, so only the explicit id
        // mapping can reach it.
        let providers =
            Arc::new(TestProviderStore::default().with_provider(other_namespace, "jira", "prod"));
        let record_id = providers.records[0].id;

        let mut mapping = ProviderMapping::new();
        mapping.insert("jira", "prod", record_id);

        let desired = vec![definition("jira", "prod", "onIssueCreated")];
        let webhooks = synchronizer(repo, providers)
            .sync_triggers(workflow_id, namespace_id, &desired, Some(&mapping))
            .await
            .unwrap();

        assert_eq!(webhooks.len(), 1);
        assert_eq!(webhooks[0].provider_type, "jira");
    }

    #[tokio::test]
    async fn test_sync_cron_trigger_registers_without_webhook() {
        let workflow_id = Uuid::now_v7();
        let namespace_id = Uuid::now_v7();
        let repo = Arc::new(TestRepository::default());
        let providers = Arc::new(TestProviderStore::default());

        let mut input = serde_json::Map::new();
        input.insert("expression".into(), json!("*/10 * * * *"));
        let desired = vec![TriggerDefinition::new("cron", "default", "onCron", input)];

        let webhooks = synchronizer(repo.clone(), providers)
            .sync_triggers(workflow_id, namespace_id, &desired, None)
            .await
            .unwrap();

        assert!(webhooks.is_empty());
        assert_eq!(repo.triggers.lock().unwrap().len(), 1);
        assert!(repo.webhooks.lock().unwrap().is_empty());
    }
}
