//! Sinks receiving replicated records.

mod base;
pub mod memory;

pub use base::Sink;
