//! MySQL adapters reading the source of truth.

pub mod pool;
pub mod source;
pub mod sqlx;
