//! Backend drivers implementing [`lattice_core::runtime::RuntimeController`].
//!
//! [`container`] drives a container-engine HTTP control plane (one container
//! per runtime, invoked over a shared network). [`serverless`] drives a
//! managed functions control plane (one function per runtime, invoked
//! through its invocation API). [`credentials`] caches the OAuth
//! client-credentials token the serverless control plane requires.

pub mod container;
pub mod credentials;
pub mod serverless;

pub use container::ContainerDriver;
pub use serverless::ServerlessDriver;
