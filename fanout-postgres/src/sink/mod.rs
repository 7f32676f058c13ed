//! Sinks writing replicated records into the `movies` schema.

mod movies;
mod ratings;

pub use movies::PostgresMovieSink;
pub use ratings::PostgresRatingSink;

use fanout::error::{ErrorKind, FanoutError};

/// Maximum number of rows written by a single statement, which keeps the bind parameter
/// count far below the protocol limit.
const MAX_ROWS_PER_STATEMENT: usize = 1000;

/// Classifies a failure while applying a batch.
fn apply_error(err: sqlx::Error) -> FanoutError {
    FanoutError::from(err).rekind(ErrorKind::ApplyError)
}

/// Classifies a failure while reading the sink's own rows.
fn query_error(err: sqlx::Error) -> FanoutError {
    FanoutError::from(err).rekind(ErrorKind::SinkQueryFailed)
}
