//! Runtime execution abstraction.
//!
//! [`controller::RuntimeController`] is the uniform lifecycle contract the
//! container and serverless drivers implement. [`box_controller`] provides
//! the object-safe wrapper used for runtime backend selection, and
//! [`registry`] resolves runtime identifiers to their configuration and the
//! active driver. [`envelope`] owns the invocation wire shape and per-call
//! deadlines.

pub mod box_controller;
pub mod controller;
pub mod envelope;
pub mod registry;

pub use box_controller::BoxRuntimeController;
pub use controller::RuntimeController;
pub use envelope::InvocationEnvelope;
pub use registry::RuntimeRegistry;
