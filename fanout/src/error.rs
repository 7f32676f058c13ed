//! Error types and result definitions for replication and aggregation.
//!
//! Provides a single error type with classification, aggregation, and captured diagnostic
//! metadata. The [`FanoutError`] type supports single errors, errors with additional detail,
//! and multiple aggregated errors, which is how per-sink and per-batch failures are reported
//! together once every task has returned.

use std::backtrace::Backtrace;
use std::borrow::Cow;
use std::error;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::panic::Location;
use std::sync::Arc;

/// Convenient result type for fallible operations using [`FanoutError`] as the error type.
pub type FanoutResult<T> = Result<T, FanoutError>;

/// Detailed payload stored for single [`FanoutError`] instances.
#[derive(Debug, Clone)]
struct ErrorPayload {
    kind: ErrorKind,
    description: Cow<'static, str>,
    detail: Option<Cow<'static, str>>,
    source: Option<Arc<dyn error::Error + Send + Sync>>,
    location: &'static Location<'static>,
    backtrace: Arc<Backtrace>,
}

/// Main error type for replication and aggregation operations.
///
/// [`FanoutError`] is cheap to clone, which lets the same failure be logged, persisted as a
/// batch failure reason, and returned in a report without re-creating it.
#[derive(Debug, Clone)]
pub struct FanoutError {
    repr: ErrorRepr,
}

/// Internal representation of error data.
#[derive(Debug, Clone)]
enum ErrorRepr {
    /// Single error payload holding rich metadata.
    Single(ErrorPayload),
    /// Multiple aggregated errors.
    ///
    /// Used to capture the failures of several sinks or job batches at once.
    Many {
        errors: Vec<FanoutError>,
        location: &'static Location<'static>,
    },
}

/// Specific categories of errors that can occur.
///
/// The first four kinds form the failure taxonomy of the replication and aggregation
/// contracts. The rest classify the plumbing around them.
#[derive(PartialEq, Eq, Copy, Clone, Debug, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    // Contract taxonomy
    /// A store could not be reached. Transient.
    ConnectivityError,
    /// A sink rejected a write (schema or constraint violation).
    ApplyError,
    /// The key domain to aggregate could not be determined.
    PartitionError,
    /// A raw fact could not be aggregated.
    AggregationComputeError,

    // Aggregation lifecycle
    PromotionError,
    InvalidBatch,
    InvalidState,

    // Concurrency
    DeadlineExceeded,
    ConcurrentRunDetected,
    SinkWorkerPanic,
    AggregationWorkerPanic,

    // Query errors
    SourceQueryFailed,
    SinkQueryFailed,
    StoreQueryFailed,

    // Configuration & decoding
    ConfigError,
    ConversionError,

    // Unknown / Uncategorized
    Unknown,
}

impl FanoutError {
    /// Returns the [`ErrorKind`] of this error.
    ///
    /// For multiple errors, returns the kind of the first error or [`ErrorKind::Unknown`]
    /// if the error list is empty.
    pub fn kind(&self) -> ErrorKind {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.kind,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.kind())
                .unwrap_or(ErrorKind::Unknown),
        }
    }

    /// Returns all [`ErrorKind`]s present in this error.
    pub fn kinds(&self) -> Vec<ErrorKind> {
        match self.repr {
            ErrorRepr::Single(ref payload) => vec![payload.kind],
            ErrorRepr::Many { ref errors, .. } => errors
                .iter()
                .flat_map(|err| err.kinds())
                .collect::<Vec<_>>(),
        }
    }

    /// Returns the static description of this error.
    ///
    /// For multiple errors, returns the description of the first one.
    pub fn description(&self) -> &str {
        match self.repr {
            ErrorRepr::Single(ref payload) => &payload.description,
            ErrorRepr::Many { ref errors, .. } => errors
                .first()
                .map(|err| err.description())
                .unwrap_or("multiple errors"),
        }
    }

    /// Returns the detailed error information if available.
    pub fn detail(&self) -> Option<&str> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.detail.as_deref(),
            ErrorRepr::Many { ref errors, .. } => errors.iter().find_map(|e| e.detail()),
        }
    }

    /// Returns the captured backtrace for this error.
    pub fn backtrace(&self) -> Option<&Backtrace> {
        match self.repr {
            ErrorRepr::Single(ref payload) => Some(payload.backtrace.as_ref()),
            ErrorRepr::Many { .. } => None,
        }
    }

    /// Returns the captured callsite location for this error.
    pub fn location(&self) -> &'static Location<'static> {
        match self.repr {
            ErrorRepr::Single(ref payload) => payload.location,
            ErrorRepr::Many { location, .. } => location,
        }
    }

    /// Returns a one line summary suitable for persisting next to a failed job batch.
    pub fn summary(&self) -> String {
        match self.detail() {
            Some(detail) => format!("[{:?}] {}: {}", self.kind(), self.description(), detail),
            None => format!("[{:?}] {}", self.kind(), self.description()),
        }
    }

    /// Attaches an originating [`error::Error`] to this error and returns the modified instance.
    ///
    /// Has no effect when called on aggregated errors because aggregates forward the first
    /// contained error as their source.
    pub fn with_source<E>(mut self, source: E) -> Self
    where
        E: error::Error + Send + Sync + 'static,
    {
        if let ErrorRepr::Single(ref mut payload) = self.repr {
            payload.source = Some(Arc::new(source));
        }
        self
    }

    /// Returns the same error reclassified under `kind`.
    ///
    /// Adapters use this to turn a generic query failure into the contract kind that matches
    /// where it happened, e.g. a failed upsert becomes [`ErrorKind::ApplyError`]. Connectivity
    /// failures keep their kind since they are transient regardless of the call site.
    pub fn rekind(mut self, kind: ErrorKind) -> Self {
        if let ErrorRepr::Single(ref mut payload) = self.repr
            && payload.kind != ErrorKind::ConnectivityError
        {
            payload.kind = kind;
        }
        self
    }

    /// Creates a [`FanoutError`] from its components.
    #[track_caller]
    fn from_components(
        kind: ErrorKind,
        description: Cow<'static, str>,
        detail: Option<Cow<'static, str>>,
        source: Option<Arc<dyn error::Error + Send + Sync>>,
    ) -> Self {
        FanoutError {
            repr: ErrorRepr::Single(ErrorPayload {
                kind,
                description,
                detail,
                source,
                location: Location::caller(),
                backtrace: Arc::new(Backtrace::capture()),
            }),
        }
    }
}

impl PartialEq for FanoutError {
    fn eq(&self, other: &FanoutError) -> bool {
        match (&self.repr, &other.repr) {
            (ErrorRepr::Single(a), ErrorRepr::Single(b)) => a.kind == b.kind,
            (
                ErrorRepr::Many {
                    errors: errors_a, ..
                },
                ErrorRepr::Many {
                    errors: errors_b, ..
                },
            ) => {
                errors_a.len() == errors_b.len()
                    && errors_a.iter().zip(errors_b.iter()).all(|(a, b)| a == b)
            }
            _ => false,
        }
    }
}

impl Hash for FanoutError {
    /// Hashes the error using only its stable identifying components.
    ///
    /// Location, detail, source and backtrace are excluded so that errors of the same
    /// category hash the same across occurrences.
    fn hash<H: Hasher>(&self, state: &mut H) {
        std::mem::discriminant(&self.repr).hash(state);
        match &self.repr {
            ErrorRepr::Single(payload) => {
                payload.kind.hash(state);
                payload.description.hash(state);
            }
            ErrorRepr::Many { errors, .. } => {
                errors.len().hash(state);
                for error in errors {
                    error.hash(state);
                }
            }
        }
    }
}

impl fmt::Display for FanoutError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> Result<(), fmt::Error> {
        match &self.repr {
            ErrorRepr::Single(payload) => {
                let location = payload.location;
                write!(
                    f,
                    "[{:?}] {} @ {}:{}:{}",
                    payload.kind,
                    payload.description,
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                write_detail(payload.detail.as_deref(), f, 1)?;
                write_backtrace(payload.backtrace.as_ref(), f, 1)?;

                Ok(())
            }
            ErrorRepr::Many { errors, location } => {
                let count = errors.len();
                write!(
                    f,
                    "[Many] {} error{} aggregated @ {}:{}:{}",
                    count,
                    if count == 1 { "" } else { "s" },
                    location.file(),
                    location.line(),
                    location.column()
                )?;

                if errors.is_empty() {
                    write!(f, "\n  (no inner errors provided)")?;
                }

                for (index, error) in errors.iter().enumerate() {
                    let rendered = format!("{error}");
                    let mut lines = rendered.lines();
                    match lines.next() {
                        Some(first_line) => write!(f, "\n  {}. {}", index + 1, first_line)?,
                        None => write!(f, "\n  {}.", index + 1)?,
                    }

                    for line in lines {
                        if line.is_empty() {
                            write!(f, "\n     ")?;
                        } else {
                            write!(f, "\n     {line}")?;
                        }
                    }
                }

                Ok(())
            }
        }
    }
}

impl error::Error for FanoutError {
    fn source(&self) -> Option<&(dyn error::Error + 'static)> {
        match &self.repr {
            ErrorRepr::Single(payload) => payload
                .source
                .as_ref()
                .map(|source| source as &(dyn error::Error + 'static)),
            ErrorRepr::Many { errors, .. } => errors
                .first()
                .map(|error| error as &(dyn error::Error + 'static)),
        }
    }
}

/// Writes the captured backtrace with indentation.
fn write_backtrace(
    backtrace: &Backtrace,
    f: &mut fmt::Formatter<'_>,
    indent: usize,
) -> fmt::Result {
    let indent_str = "  ".repeat(indent);

    let rendered_backtrace = format!("{backtrace}");
    if !rendered_backtrace.trim().is_empty() {
        write!(f, "\n{indent_str}Backtrace:")?;
        for line in rendered_backtrace.lines() {
            if line.trim().is_empty() {
                write!(f, "\n{indent_str}  ")?;
            } else {
                write!(f, "\n{indent_str}  {line}")?;
            }
        }
    }

    Ok(())
}

/// Writes the detail block with indentation.
fn write_detail(detail: Option<&str>, f: &mut fmt::Formatter<'_>, indent: usize) -> fmt::Result {
    let Some(detail) = detail else {
        return Ok(());
    };

    let indent_str = "  ".repeat(indent);
    if detail.trim().is_empty() {
        return write!(f, "\n{indent_str}Detail: <empty>");
    }

    write!(f, "\n{indent_str}Detail:")?;
    for line in detail.lines() {
        if line.trim().is_empty() {
            write!(f, "\n{indent_str}  ")?;
        } else {
            write!(f, "\n{indent_str}  {line}")?;
        }
    }

    Ok(())
}

/// Creates a [`FanoutError`] from an error kind and static description.
impl From<(ErrorKind, &'static str)> for FanoutError {
    #[track_caller]
    fn from((kind, desc): (ErrorKind, &'static str)) -> FanoutError {
        FanoutError::from_components(kind, Cow::Borrowed(desc), None, None)
    }
}

/// Creates a [`FanoutError`] from an error kind, static description, and dynamic detail.
impl<D> From<(ErrorKind, &'static str, D)> for FanoutError
where
    D: Into<Cow<'static, str>>,
{
    #[track_caller]
    fn from((kind, desc, detail): (ErrorKind, &'static str, D)) -> FanoutError {
        FanoutError::from_components(kind, Cow::Borrowed(desc), Some(detail.into()), None)
    }
}

/// Creates a [`FanoutError`] from a vector of errors for aggregation.
///
/// If the vector contains exactly one error, returns that error directly without wrapping
/// it in the [`ErrorRepr::Many`] variant.
impl<E> From<Vec<E>> for FanoutError
where
    E: Into<FanoutError>,
{
    #[track_caller]
    fn from(errors: Vec<E>) -> FanoutError {
        let location = Location::caller();

        let mut errors: Vec<FanoutError> = errors.into_iter().map(Into::into).collect();

        if errors.len() == 1
            && let Some(error) = errors.pop()
        {
            return error;
        }

        FanoutError {
            repr: ErrorRepr::Many { errors, location },
        }
    }
}

/// Converts [`sqlx::Error`] to [`FanoutError`] with the appropriate error kind.
///
/// Pool, I/O, TLS and protocol failures mean the store could not be reached and map to
/// [`ErrorKind::ConnectivityError`]. Everything else maps to [`ErrorKind::StoreQueryFailed`];
/// adapters narrow it further with [`FanoutError::rekind`].
impl From<sqlx::Error> for FanoutError {
    #[track_caller]
    fn from(err: sqlx::Error) -> FanoutError {
        let (kind, description) = match &err {
            sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolClosed
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::WorkerCrashed => {
                (ErrorKind::ConnectivityError, "Database connection failed")
            }
            sqlx::Error::Configuration(_) => {
                (ErrorKind::ConfigError, "Database configuration is invalid")
            }
            sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
                (ErrorKind::ConversionError, "Database value decoding failed")
            }
            _ => (ErrorKind::StoreQueryFailed, "Database operation failed"),
        };

        let detail = err.to_string();
        FanoutError::from_components(
            kind,
            Cow::Borrowed(description),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}

/// Converts [`sqlx::migrate::MigrateError`] to [`FanoutError`] with
/// [`ErrorKind::StoreQueryFailed`].
impl From<sqlx::migrate::MigrateError> for FanoutError {
    #[track_caller]
    fn from(err: sqlx::migrate::MigrateError) -> FanoutError {
        let detail = err.to_string();
        FanoutError::from_components(
            ErrorKind::StoreQueryFailed,
            Cow::Borrowed("Database migration failed"),
            Some(Cow::Owned(detail)),
            Some(Arc::new(err)),
        )
    }
}
