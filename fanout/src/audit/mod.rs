//! Consistency audit of replicated data.
//!
//! The audit samples keys from the source of truth and compares the sampled records in every
//! target, and recomputes sampled aggregates from the raw facts to compare them against the
//! live table. It only reads.

mod aggregate;
mod base;
mod record;
mod report;
mod sample;

pub use aggregate::AggregateAuditor;
pub use base::{AuditReader, AuditSource, Auditable};
pub use record::RecordAuditor;
pub use report::{AuditReport, Mismatch};
pub use sample::{sample_keys, sample_size};
