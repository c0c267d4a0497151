//! Business logic and repository trait definitions for Lattice.
//!
//! This crate defines the runtime controller contract (the polymorphic
//! lifecycle every compute backend implements), the trigger synchronization
//! engine, webhook processors, and the "ports" (repository traits) that the
//! infrastructure layer implements. It depends only on `lattice-types` --
//! never on `lattice-infra` or any HTTP/database crate.

pub mod deploy;
pub mod repository;
pub mod runtime;
pub mod trigger;
