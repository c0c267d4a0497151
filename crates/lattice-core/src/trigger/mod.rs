//! Trigger synchronization and matching.
//!
//! [`matcher`] holds the normalized-equality rule that is the single source
//! of truth for trigger identity, used both for deduplicating registrations
//! during synchronization and for matching inbound webhook events.
//! [`sync`] reconciles a deployment's desired trigger set against persisted
//! state. [`processor`] adds provider-specific filtering and signature
//! verification on top of the base match for inbound webhooks.

pub mod matcher;
pub mod processor;
pub mod sync;

pub use matcher::matching_triggers;
pub use sync::{ProviderMapping, TriggerSynchronizer};
