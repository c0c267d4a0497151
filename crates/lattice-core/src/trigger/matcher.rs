//! Trigger matcher: normalized equality of trigger descriptors.
//!
//! Two descriptors {providerType, providerAlias, triggerType, input} are
//! equal when type, alias and triggerType compare by exact string equality
//! and `input` compares by normalized deep equality: keys sorted, null-valued
//! keys dropped, then structurally compared. Key order and explicit-null
//! noise never cause false mismatches.

use serde_json::{Map, Value};

use lattice_types::trigger::{EventMetadata, RegisteredTrigger, TriggerDefinition};

// ---------------------------------------------------------------------------
// Normalization
// ---------------------------------------------------------------------------

/// Recursively normalize a JSON value: object keys are sorted (the map
/// representation is ordered by key) and null-valued entries dropped; arrays
/// are normalized element-wise; scalars pass through.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut normalized = Map::new();
            for (key, inner) in map {
                if inner.is_null() {
                    continue;
                }
                normalized.insert(key.clone(), normalize_value(inner));
            }
            Value::Object(normalized)
        }
        Value::Array(items) => Value::Array(items.iter().map(normalize_value).collect()),
        other => other.clone(),
    }
}

/// Normalize a trigger input mapping.
pub fn normalize_input(input: &Map<String, Value>) -> Value {
    normalize_value(&Value::Object(input.clone()))
}

/// Normalized deep equality of two input mappings.
pub fn inputs_match(a: &Map<String, Value>, b: &Map<String, Value>) -> bool {
    normalize_input(a) == normalize_input(b)
}

// ---------------------------------------------------------------------------
// Descriptor and event matching
// ---------------------------------------------------------------------------

/// Normalized equality of two trigger descriptors. This is the identity rule
/// used to deduplicate registrations during synchronization.
pub fn descriptors_match(a: &TriggerDefinition, b: &TriggerDefinition) -> bool {
    a.provider.provider_type == b.provider.provider_type
        && a.provider.alias == b.provider.alias
        && a.trigger_type == b.trigger_type
        && inputs_match(&a.input, &b.input)
}

/// Whether a trigger definition matches an inbound event's metadata.
pub fn matches_event(definition: &TriggerDefinition, event: &EventMetadata) -> bool {
    definition.provider.provider_type == event.provider_type
        && definition.provider.alias == event.alias
        && definition.trigger_type == event.trigger_type
        && inputs_match(&definition.input, &event.input)
}

/// Select the registered triggers matching an inbound event.
pub fn matching_triggers<'a>(
    triggers: &'a [RegisteredTrigger],
    event: &EventMetadata,
) -> Vec<&'a RegisteredTrigger> {
    triggers
        .iter()
        .filter(|t| matches_event(&t.definition, event))
        .collect()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
