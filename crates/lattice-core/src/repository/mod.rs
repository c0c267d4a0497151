//! Repository trait definitions.
//!
//! Storage interfaces for registered triggers, webhooks, and provider
//! configurations. The infrastructure layer implements these; from this
//! crate's perspective the store is an opaque CRUD collaborator. The
//! provider-configuration store is read-only: records arrive decrypted and
//! are never mutated by synchronization.
//!
//! Uses native async fn in traits (Rust 2024 edition, no async_trait macro).

use uuid::Uuid;

use lattice_types::error::RepositoryError;
use lattice_types::provider::ProviderConfigRecord;
use lattice_types::trigger::{RegisteredTrigger, Webhook};

/// Persistence for trigger and webhook records.
///
/// Only the trigger synchronizer writes through this trait; route handlers
/// read registered triggers when dispatching inbound events.
pub trait TriggerRepository: Send + Sync {
    // -----------------------------------------------------------------------
    // Registered triggers
    // -----------------------------------------------------------------------

    /// Persist a new registered trigger.
    fn create_trigger(
        &self,
        trigger: &RegisteredTrigger,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List all registered triggers for a workflow.
    fn list_triggers(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<RegisteredTrigger>, RepositoryError>> + Send;

    /// Delete a registered trigger by id. Returns `true` if it existed.
    fn delete_trigger(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    // -----------------------------------------------------------------------
    // Webhooks
    // -----------------------------------------------------------------------

    /// Persist a new webhook registration.
    fn create_webhook(
        &self,
        webhook: &Webhook,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List all webhook registrations for a workflow.
    fn list_webhooks(
        &self,
        workflow_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Vec<Webhook>, RepositoryError>> + Send;

    /// Delete a webhook by id. Returns `true` if it existed.
    fn delete_webhook(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}

/// Read-only access to decrypted provider configuration records.
pub trait ProviderConfigStore: Send + Sync {
    /// Fetch a record by its concrete id (provider-mapping path).
    fn get_provider_config(
        &self,
        id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ProviderConfigRecord>, RepositoryError>> + Send;

    /// Namespace-wide lookup by provider type and alias (fallback path when
    /// no mapping is supplied).
    fn find_by_alias(
        &self,
        namespace_id: &Uuid,
        provider_type: &str,
        alias: &str,
    ) -> impl std::future::Future<Output = Result<Option<ProviderConfigRecord>, RepositoryError>> + Send;
}
