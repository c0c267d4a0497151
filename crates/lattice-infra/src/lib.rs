//! Infrastructure implementations for Lattice.
//!
//! Concrete backend drivers for the runtime controller contract (container
//! engine and serverless functions control planes), in-memory stores
//! implementing the lattice-core repository traits, and the configuration
//! loader.

pub mod backend;
pub mod config;
pub mod memory;
