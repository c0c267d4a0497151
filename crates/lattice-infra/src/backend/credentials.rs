//! Control-plane credential cache for the serverless backend.
//!
//! The functions API authenticates with an OAuth client-credentials token.
//! Tokens are cached until shortly before expiry; the secret itself is
//! wrapped in [`secrecy::SecretString`] and never logged or Debug-printed.

use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::Mutex;

use lattice_types::error::RuntimeError;

/// Refresh this long before the advertised expiry, so an in-flight request
/// never carries a token that dies mid-call.
const EXPIRY_SKEW_SECS: i64 = 30;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - TimeDelta::seconds(EXPIRY_SKEW_SECS) > now
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: i64,
}

/// OAuth client-credentials source with token caching.
pub struct ControlPlaneCredentials {
    client: reqwest::Client,
    token_url: String,
    client_id: String,
    client_secret: SecretString,
    cached: Mutex<Option<CachedToken>>,
}

impl ControlPlaneCredentials {
    pub fn new(
        token_url: impl Into<String>,
        client_id: impl Into<String>,
        client_secret: SecretString,
    ) -> Self {
        // Token refreshes sit on invocation paths; never let one hang.
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            token_url: token_url.into(),
            client_id: client_id.into(),
            client_secret,
            cached: Mutex::new(None),
        }
    }

    /// A valid bearer token, refreshed through the token endpoint when the
    /// cached one is missing or near expiry.
    pub async fn bearer_token(&self) -> Result<String, RuntimeError> {
        let mut cached = self.cached.lock().await;

        if let Some(token) = cached.as_ref() {
            if token.is_fresh(Utc::now()) {
                return Ok(token.token.clone());
            }
        }

        let response = self
            .client
            .post(&self.token_url)
            .form(&[
                ("grant_type", "client_credentials"),
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.expose_secret()),
            ])
            .send()
            .await
            .map_err(|e| RuntimeError::Credential(e.to_string()))?;

        if !response.status().is_success() {
            return Err(RuntimeError::Credential(format!(
                "token endpoint answered {}",
                response.status()
            )));
        }

        let body: TokenResponse = response
            .json()
            .await
            .map_err(|e| RuntimeError::Credential(format!("unreadable token response: {e}")))?;

        tracing::debug!(client_id = %self.client_id, "control-plane token refreshed");

        let token = CachedToken {
            token: body.access_token,
            expires_at: Utc::now() + TimeDelta::seconds(body.expires_in),
        };
        let bearer = token.token.clone();
        *cached = Some(token);
        Ok(bearer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_freshness_window() {
        let now = Utc::now();
        let fresh = CachedToken {
            token: "t".into(),
            expires_at: now + TimeDelta::seconds(300),
        };
        assert!(fresh.is_fresh(now));

        // Inside the skew window counts as expired.
        let near_expiry = CachedToken {
            token: "t".into(),
            expires_at: now + TimeDelta::seconds(EXPIRY_SKEW_SECS - 1),
        };
        assert!(!near_expiry.is_fresh(now));

        let expired = CachedToken {
            token: "t".into(),
            expires_at: now - TimeDelta::seconds(1),
        };
        assert!(!expired.is_fresh(now));
    }
}
