//! Sources reading the MovieLens tables.

mod movies;
mod ratings;

pub use movies::MySqlMovieSource;
pub use ratings::MySqlRatingSource;

use fanout::error::{ErrorKind, FanoutError};

/// Classifies a failure while reading the source.
fn source_error(err: sqlx::Error) -> FanoutError {
    FanoutError::from(err).rekind(ErrorKind::SourceQueryFailed)
}

/// Converts a batch size into a `LIMIT` argument.
fn limit(batch_size: usize) -> i64 {
    i64::try_from(batch_size).unwrap_or(i64::MAX)
}
