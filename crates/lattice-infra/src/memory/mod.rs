//! In-memory implementations of the lattice-core repository traits.
//!
//! DashMap-backed stores for single-node deployments and tests. Durable
//! backends implement the same traits without the core crate noticing.

use dashmap::DashMap;
use uuid::Uuid;

use lattice_core::repository::{ProviderConfigStore, TriggerRepository};
use lattice_types::error::RepositoryError;
use lattice_types::provider::ProviderConfigRecord;
use lattice_types::trigger::{RegisteredTrigger, Webhook};

// ---------------------------------------------------------------------------
// Trigger / webhook store
// ---------------------------------------------------------------------------

/// In-memory trigger and webhook store.
#[derive(Default)]
pub struct InMemoryTriggerRepository {
    triggers: DashMap<Uuid, RegisteredTrigger>,
    webhooks: DashMap<Uuid, Webhook>,
}

impl InMemoryTriggerRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look a webhook up by its public path, for inbound request routing.
    pub fn webhook_by_path(&self, path: &str) -> Option<Webhook> {
        self.webhooks
            .iter()
            .find(|entry| entry.value().path == path)
            .map(|entry| entry.value().clone())
    }
}

impl TriggerRepository for InMemoryTriggerRepository {
    async fn create_trigger(&self, trigger: &RegisteredTrigger) -> Result<(), RepositoryError> {
        if self.triggers.contains_key(&trigger.id) {
            return Err(RepositoryError::Conflict(format!(
                "trigger {} already exists",
                trigger.id
            )));
        }
        self.triggers.insert(trigger.id, trigger.clone());
        Ok(())
    }

    async fn list_triggers(
        &self,
        workflow_id: &Uuid,
    ) -> Result<Vec<RegisteredTrigger>, RepositoryError> {
        Ok(self
            .triggers
            .iter()
            .filter(|entry| entry.value().workflow_id == *workflow_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn delete_trigger(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.triggers.remove(id).is_some())
    }

    async fn create_webhook(&self, webhook: &Webhook) -> Result<(), RepositoryError> {
        if self.webhooks.contains_key(&webhook.id) {
            return Err(RepositoryError::Conflict(format!(
                "webhook {} already exists",
                webhook.id
            )));
        }
        self.webhooks.insert(webhook.id, webhook.clone());
        Ok(())
    }

    async fn list_webhooks(&self, workflow_id: &Uuid) -> Result<Vec<Webhook>, RepositoryError> {
        Ok(self
            .webhooks
            .iter()
            .filter(|entry| entry.value().workflow_id == *workflow_id)
            .map(|entry| entry.value().clone())
            .collect())
    }

    async fn delete_webhook(&self, id: &Uuid) -> Result<bool, RepositoryError> {
        Ok(self.webhooks.remove(id).is_some())
    }
}

// ---------------------------------------------------------------------------
// Provider configuration store
// ---------------------------------------------------------------------------

/// In-memory provider configuration store. Records are inserted decrypted;
/// the repository traits only ever read them.
#[derive(Default)]
pub struct InMemoryProviderConfigStore {
    records: DashMap<Uuid, ProviderConfigRecord>,
}

impl InMemoryProviderConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, record: ProviderConfigRecord) {
        self.records.insert(record.id, record);
    }
}

impl ProviderConfigStore for InMemoryProviderConfigStore {
    async fn get_provider_config(
        &self,
        id: &Uuid,
    ) -> Result<Option<ProviderConfigRecord>, RepositoryError> {
        Ok(self.records.get(id).map(|entry| entry.value().clone()))
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
            .find(|entry| {
                let record = entry.value();
                record.namespace_id == *namespace_id
                    && record.provider_type == provider_type
                    && record.alias == alias
            })
            .map(|entry| entry.value().clone()))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
