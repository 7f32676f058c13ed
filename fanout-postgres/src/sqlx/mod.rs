//! Helpers built on [`sqlx`].

#[cfg(feature = "test-utils")]
pub mod test_utils;
