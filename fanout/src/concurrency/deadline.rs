use std::future::Future;
use std::time::Duration;

use crate::error::{ErrorKind, FanoutResult};
use crate::fanout_error;

/// Awaits `future`, failing with [`ErrorKind::DeadlineExceeded`] once `timeout` elapses.
///
/// Without a timeout the future is awaited until it completes. An elapsed deadline drops the
/// future, which cancels the underlying operation at its next await point.
pub async fn with_deadline<F, T>(timeout: Option<Duration>, future: F) -> FanoutResult<T>
where
    F: Future<Output = FanoutResult<T>>,
{
    let Some(timeout) = timeout else {
        return future.await;
    };

    match tokio::time::timeout(timeout, future).await {
        Ok(result) => result,
        Err(_) => Err(fanout_error!(
            ErrorKind::DeadlineExceeded,
            "Operation did not complete before its deadline",
            format!("no result after {} ms", timeout.as_millis())
        )),
    }
}
