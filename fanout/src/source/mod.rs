//! Sources of replicated records.

mod base;
pub mod memory;

pub use base::Source;
