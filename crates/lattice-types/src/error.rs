//! Error taxonomy for runtime and trigger operations.
//!
//! The split mirrors how failures are handled, not where they occur:
//! - [`RuntimeError`] -- thrown to the caller (provisioning rejections,
//!   transport failures, timeouts). Status-poll failures are *not* here:
//!   they surface as a `Failed` status report instead.
//! - Instance errors (user code threw) are data, not errors -- see
//!   `runtime::InstanceError`.
//! - [`RepositoryError`] -- persistence-layer failures behind the trait
//!   seams.
//! - [`DeployError`] -- deployment-path classification: validation failures
//!   are terminal for the request, synchronization failures are downgraded
//!   to warnings by the deployment pipeline.

use thiserror::Error;

use crate::config::BackendKind;

/// Errors surfaced by runtime controller operations.
#[derive(Debug, Error)]
pub enum RuntimeError {
    /// The backend control plane synchronously rejected a create/destroy
    /// call. Fatal for that operation.
    #[error("control plane rejected {operation}: {message}")]
    Provisioning { operation: String, message: String },

    /// Payload delivery failed before the instance could accept it. The
    /// caller's retry policy applies.
    #[error("invocation transport failure: {0}")]
    Transport(String),

    /// A hard per-call deadline elapsed.
    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout { operation: String, timeout_secs: u64 },

    /// The backend answered with something we could not interpret.
    #[error("malformed backend response: {0}")]
    MalformedResponse(String),

    /// Control-plane credential acquisition failed.
    #[error("control plane credential refresh failed: {0}")]
    Credential(String),
}

impl RuntimeError {
    pub fn provisioning(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Provisioning {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Errors from the runtime registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("no driver registered for backend '{0}'")]
    ControllerNotRegistered(BackendKind),

    #[error("runtime '{0}' is already registered")]
    DuplicateRuntime(String),

    #[error("runtime '{0}' not found")]
    RuntimeNotFound(String),
}

/// Errors from repository operations (trait definitions live in
/// lattice-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("store connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from deployment creation.
#[derive(Debug, Error)]
pub enum DeployError {
    /// The user code failed definitions extraction. 400-class: reported to
    /// the deployer, never retried.
    #[error("deployment validation failed: {message}")]
    Validation {
        message: String,
        stack: Option<String>,
    },

    /// The backend itself failed before the instance could answer.
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

/// Errors from provider webhook processors.
#[derive(Debug, Error)]
pub enum WebhookProcessorError {
    #[error("missing required header: {0}")]
    MissingHeader(String),

    #[error("webhook signature verification failed")]
    SignatureVerificationFailed,

    #[error("missing provider secret: {0}")]
    MissingSecret(String),

    #[error("invalid webhook payload: {0}")]
    InvalidPayload(String),
}
