//! Shared domain types for Lattice.
//!
//! This crate contains the core domain types used across the Lattice runtime
//! platform: runtime lifecycle types, trigger definitions, provider records,
//! configuration, and their associated error types.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, uuid, chrono,
//! thiserror.

pub mod config;
pub mod error;
pub mod provider;
pub mod runtime;
pub mod trigger;
