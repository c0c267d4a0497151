//! Provider webhook processors.
//!
//! One processor per provider type. Each turns a raw inbound webhook request
//! into [`EventMetadata`] per candidate trigger, applies the base match (the
//! matcher's normalized equality) plus provider-specific domain filters, and
//! returns the matched trigger ids with the enriched event payload to
//! forward.
//!
//! Provides:
//! - `WebhookProcessor` -- the polymorphic contract
//! - `GenericProcessor` -- header/body event typing, input projection
//! - `IssueTrackerProcessor` -- Jira-style events with project/issue-type
//!   filters
//! - `ChatProcessor` -- Slack-style events with HMAC-SHA256 request
//!   signature verification
//! - `WebhookProcessorRegistry` -- provider type -> processor lookup with a
//!   generic fallback

use std::collections::HashMap;

use hmac::{Hmac, Mac};
use serde_json::{Map, Value};
use sha2::Sha256;

use lattice_types::error::WebhookProcessorError;
use lattice_types::trigger::{EventMetadata, RegisteredTrigger, TriggerMatch, WebhookRequest};

use super::matcher;

type HmacSha256 = Hmac<Sha256>;

// ---------------------------------------------------------------------------
// Contract
// ---------------------------------------------------------------------------

/// Provider-specific webhook processing.
///
/// `candidates` are the registered triggers bound to the webhook that
/// received the request; `secrets` is the decrypted field bag of the backing
/// provider configuration.
pub trait WebhookProcessor: Send + Sync {
    /// The provider type this processor handles.
    fn provider_type(&self) -> &str;

    fn process_webhook(
        &self,
        request: &WebhookRequest,
        candidates: &[RegisteredTrigger],
        secrets: &HashMap<String, String>,
    ) -> Result<Vec<TriggerMatch>, WebhookProcessorError>;
}

/// Project the keys a trigger declares in its input out of a fact bag,
/// producing the event-side input the matcher compares against. Keys the
/// event cannot supply stay absent and fail the match naturally.
fn project_input(declared: &Map<String, Value>, facts: &Map<String, Value>) -> Map<String, Value> {
    declared
        .keys()
        .filter_map(|key| facts.get(key).map(|v| (key.clone(), v.clone())))
        .collect()
}

/// Run the base match for each candidate against per-candidate metadata
/// derived from a shared fact bag.
fn match_candidates(
    candidates: &[RegisteredTrigger],
    trigger_type: &str,
    facts: &Map<String, Value>,
    event: &Value,
) -> Vec<TriggerMatch> {
    candidates
        .iter()
        .filter(|candidate| {
            let metadata = EventMetadata {
                provider_type: candidate.definition.provider.provider_type.clone(),
                alias: candidate.definition.provider.alias.clone(),
                trigger_type: trigger_type.to_string(),
                input: project_input(&candidate.definition.input, facts),
            };
            matcher::matches_event(&candidate.definition, &metadata)
        })
        .map(|candidate| TriggerMatch {
            trigger_id: candidate.id,
            event: event.clone(),
        })
        .collect()
}

fn parse_json_body(request: &WebhookRequest) -> Result<Value, WebhookProcessorError> {
    if request.body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(&request.body)
        .map_err(|e| WebhookProcessorError::InvalidPayload(e.to_string()))
}

// ---------------------------------------------------------------------------
// Generic processor
// ---------------------------------------------------------------------------

/// Fallback processor for providers without dedicated handling.
///
/// The event's trigger type comes from the `x-event-type` header or, failing
/// that, a top-level `event` or `type` field in the JSON body. Trigger input
/// filters compare against same-named top-level body fields.
pub struct GenericProcessor;

impl WebhookProcessor for GenericProcessor {
    fn provider_type(&self) -> &str {
        "generic"
    }

    fn process_webhook(
        &self,
        request: &WebhookRequest,
        candidates: &[RegisteredTrigger],
        _secrets: &HashMap<String, String>,
    ) -> Result<Vec<TriggerMatch>, WebhookProcessorError> {
        let body = parse_json_body(request)?;

        let trigger_type = request
            .header("x-event-type")
            .map(str::to_string)
            .or_else(|| body.get("event").and_then(Value::as_str).map(str::to_string))
            .or_else(|| body.get("type").and_then(Value::as_str).map(str::to_string));

        let Some(trigger_type) = trigger_type else {
            tracing::debug!(path = %request.path, "webhook carries no event type, nothing matched");
            return Ok(Vec::new());
        };

        let facts = body.as_object().cloned().unwrap_or_default();
        Ok(match_candidates(candidates, &trigger_type, &facts, &body))
    }
}

// ---------------------------------------------------------------------------
// Issue-tracker processor (Jira-style)
// ---------------------------------------------------------------------------

/// Jira-style issue events with project-key and issue-type domain filters.
pub struct IssueTrackerProcessor;

impl IssueTrackerProcessor {
    /// Map a Jira webhook event name onto the trigger types user code
    /// declares.
    fn trigger_type_for(webhook_event: &str) -> Option<&'static str> {
        match webhook_event {
            "jira:issue_created" => Some("onIssueCreated"),
            "jira:issue_updated" => Some("onIssueUpdated"),
            "jira:issue_deleted" => Some("onIssueDeleted"),
            "comment_created" => Some("onCommentCreated"),
            _ => None,
        }
    }
}

impl WebhookProcessor for IssueTrackerProcessor {
    fn provider_type(&self) -> &str {
        "jira"
    }

    fn process_webhook(
        &self,
        request: &WebhookRequest,
        candidates: &[RegisteredTrigger],
        _secrets: &HashMap<String, String>,
    ) -> Result<Vec<TriggerMatch>, WebhookProcessorError> {
        let body = parse_json_body(request)?;

        let webhook_event = body
            .get("webhookEvent")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                WebhookProcessorError::InvalidPayload("missing webhookEvent field".into())
            })?;

        let Some(trigger_type) = Self::trigger_type_for(webhook_event) else {
            tracing::debug!(webhook_event, "unmapped issue-tracker event, nothing matched");
            return Ok(Vec::new());
        };

        // Facts the domain filters can bind against.
        let mut facts = Map::new();
        if let Some(key) = body.pointer("/issue/fields/project/key") {
            facts.insert("project_key".to_string(), key.clone());
        }
        if let Some(name) = body.pointer("/issue/fields/issuetype/name") {
            facts.insert("issue_type".to_string(), name.clone());
        }

        let event = serde_json::json!({
            "event": webhook_event,
            "issue": body.get("issue").cloned().unwrap_or(Value::Null),
        });

        Ok(match_candidates(candidates, trigger_type, &facts, &event))
    }
}

// ---------------------------------------------------------------------------
// Chat processor (Slack-style)
// ---------------------------------------------------------------------------

/// Slack-style event callbacks with request signature verification and a
/// channel domain filter.
pub struct ChatProcessor;

impl ChatProcessor {
    fn trigger_type_for(event_type: &str) -> Option<&'static str> {
        match event_type {
            "message" => Some("onMessage"),
            "app_mention" => Some("onAppMention"),
            "reaction_added" => Some("onReactionAdded"),
            _ => None,
        }
    }

    /// Verify the `v0` request signature: HMAC-SHA256 over
    /// `"v0:{timestamp}:{body}"` with the provider's signing secret,
    /// constant-time comparison via the hmac crate's `verify_slice`.
    fn verify_signature(
        request: &WebhookRequest,
        secrets: &HashMap<String, String>,
    ) -> Result<(), WebhookProcessorError> {
        let secret = secrets
            .get("signing_secret")
            .ok_or_else(|| WebhookProcessorError::MissingSecret("signing_secret".into()))?;
        let signature = request
            .header("x-slack-signature")
            .ok_or_else(|| WebhookProcessorError::MissingHeader("x-slack-signature".into()))?;
        let timestamp = request
            .header("x-slack-request-timestamp")
            .ok_or_else(|| {
                WebhookProcessorError::MissingHeader("x-slack-request-timestamp".into())
            })?;

        let expected = hex_decode(signature.strip_prefix("v0=").unwrap_or(signature))
            .map_err(|_| WebhookProcessorError::SignatureVerificationFailed)?;

        let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
            .map_err(|_| WebhookProcessorError::SignatureVerificationFailed)?;
        mac.update(format!("v0:{timestamp}:").as_bytes());
        mac.update(&request.body);
        mac.verify_slice(&expected)
            .map_err(|_| WebhookProcessorError::SignatureVerificationFailed)
    }
}

impl WebhookProcessor for ChatProcessor {
    fn provider_type(&self) -> &str {
        "slack"
    }

    fn process_webhook(
        &self,
        request: &WebhookRequest,
        candidates: &[RegisteredTrigger],
        secrets: &HashMap<String, String>,
    ) -> Result<Vec<TriggerMatch>, WebhookProcessorError> {
        Self::verify_signature(request, secrets)?;
        let body = parse_json_body(request)?;

        // URL-verification handshakes never match triggers; the ingress
        // layer answers the challenge.
        if body.get("type").and_then(Value::as_str) == Some("url_verification") {
            return Ok(Vec::new());
        }

        let inner = body.get("event").cloned().unwrap_or(Value::Null);
        let Some(event_type) = inner.get("type").and_then(Value::as_str) else {
            return Ok(Vec::new());
        };
        let Some(trigger_type) = Self::trigger_type_for(event_type) else {
            tracing::debug!(event_type, "unmapped chat event, nothing matched");
            return Ok(Vec::new());
        };

        let mut facts = Map::new();
        if let Some(channel) = inner.get("channel") {
            facts.insert("channel".to_string(), channel.clone());
        }

        Ok(match_candidates(candidates, trigger_type, &facts, &inner))
    }
}

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Provider type -> processor lookup. Unknown types fall back to the generic
/// processor.
pub struct WebhookProcessorRegistry {
    processors: HashMap<String, Box<dyn WebhookProcessor>>,
    fallback: GenericProcessor,
}

impl WebhookProcessorRegistry {
    pub fn new() -> Self {
        Self {
            processors: HashMap::new(),
            fallback: GenericProcessor,
        }
    }

    /// Registry preloaded with the built-in provider processors.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(IssueTrackerProcessor));
        registry.register(Box::new(ChatProcessor));
        registry
    }

    pub fn register(&mut self, processor: Box<dyn WebhookProcessor>) {
        self.processors
            .insert(processor.provider_type().to_string(), processor);
    }

    pub fn processor_for(&self, provider_type: &str) -> &dyn WebhookProcessor {
        self.processors
            .get(provider_type)
            .map(|p| p.as_ref())
            .unwrap_or(&self.fallback)
    }
}

impl Default for WebhookProcessorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Decode over byte pairs, never string slices: header values are
/// attacker-controlled and may carry multi-byte UTF-8 that a byte-offset
/// slice would panic on.
fn hex_decode(hex: &str) -> Result<Vec<u8>, ()> {
    if hex.len() % 2 != 0 {
        return Err(());
    }
    hex.as_bytes()
        .chunks_exact(2)
        .map(|pair| {
            let digits = std::str::from_utf8(pair).map_err(|_| ())?;
            u8::from_str_radix(digits, 16).map_err(|_| ())
        })
        .collect()
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Compute the Slack-style `v0` signature for a body. Used by tests and by
/// operators generating probe requests.
pub fn compute_chat_signature(secret: &str, timestamp: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts keys of any length");
    mac.update(format!("v0:{timestamp}:").as_bytes());
    mac.update(body);
    format!("v0={}", hex_encode(&mac.finalize().into_bytes()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
