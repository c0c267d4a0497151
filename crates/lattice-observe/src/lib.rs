//! Observability setup for Lattice.

pub mod tracing_setup;
