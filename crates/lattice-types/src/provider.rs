//! Provider configuration types.
//!
//! A provider configuration record is the concrete, namespace-scoped
//! configuration of an external provider (Jira site, Slack workspace, ...)
//! that a code-level provider alias resolves to. The store behind it is
//! read-only from this crate's perspective: records arrive already decrypted
//! and are never mutated by synchronization.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A decrypted provider configuration record.
///
/// `fields` holds provider-specific credentials and settings (API tokens,
/// signing secrets, site URLs). Treat the whole bag as sensitive: never log
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderConfigRecord {
    pub id: Uuid,
    pub namespace_id: Uuid,
    pub provider_type: String,
    pub alias: String,
    pub fields: HashMap<String, String>,
}

/// A provider declaration extracted from user code alongside the trigger
/// definitions.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ProviderDeclaration {
    #[serde(rename = "type")]
    pub provider_type: String,
    pub alias: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_wire_shape() {
        let decl = ProviderDeclaration {
            provider_type: "slack".into(),
            alias: "default".into(),
        };
        let value = serde_json::to_value(&decl).unwrap();
        assert_eq!(value["type"], serde_json::json!("slack"));
    }
}
