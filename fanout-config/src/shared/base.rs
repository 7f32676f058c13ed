use thiserror::Error;

/// Configuration validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A field holds a value outside its allowed range.
    #[error("Invalid value for `{field}`: {constraint}")]
    InvalidFieldValue { field: String, constraint: String },
    /// TLS is enabled but no trusted root certificates are provided.
    #[error("Invalid TLS config: `trusted_root_certs` must be set when `enabled` is true")]
    MissingTrustedRootCerts,
    /// No sink is configured, so replication would have nothing to do.
    #[error("At least one sink must be configured")]
    NoSinks,
    /// Two sinks share a name, which would make their reports indistinguishable.
    #[error("Sink name `{0}` is used more than once")]
    DuplicateSinkName(String),
}
