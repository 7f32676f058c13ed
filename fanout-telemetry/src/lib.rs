//! Tracing and metrics initialisation for the fanout binaries and tests.

pub mod metrics;
pub mod tracing;
