//! Persistence of job batches, raw facts and aggregates.
//!
//! The three store traits are implemented together by [`memory::MemoryAggregationStore`]
//! and by the Postgres store of the `fanout-postgres` crate, since job batches, staged
//! aggregates and the live table have to share transactions.

mod base;
pub mod memory;

pub use base::{AggregateStore, FactStore, JobStore};
