use std::sync::Once;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{EnvFilter, fmt};

/// Filter used when `RUST_LOG` is unset or invalid.
const DEFAULT_LOG_FILTER: &str = "info";

/// Flushes buffered log lines when dropped.
///
/// Keep it alive for the whole lifetime of the process, otherwise the last lines written
/// before exit may be lost.
pub type LogFlusher = WorkerGuard;

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("failed to install the global tracing subscriber: {0}")]
    Init(#[from] TryInitError),
}

static INIT_TEST_TRACING: Once = Once::new();

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER))
}

/// Installs the global subscriber: JSON lines on a non-blocking stdout writer, filtered by
/// `RUST_LOG`.
pub fn init_tracing(app_name: &str) -> Result<LogFlusher, TracingError> {
    let (writer, flusher) = tracing_appender::non_blocking(std::io::stdout());

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(writer),
        )
        .try_init()?;

    ::tracing::info!(app = app_name, "tracing initialized");

    Ok(flusher)
}

/// Installs a human readable subscriber for tests, once per process.
///
/// Output goes through the test writer, so it is only shown for failing tests or with
/// `--nocapture`.
pub fn init_test_tracing() {
    INIT_TEST_TRACING.call_once(|| {
        let _ = fmt()
            .with_env_filter(env_filter())
            .with_test_writer()
            .pretty()
            .try_init();
    });
}
