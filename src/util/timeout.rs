//! Timeout helper.

use std::future::Future;
use std::time::Duration;

use crate::error::RelayError;

/// Wrap a fallible future with a timeout.
pub async fn with_timeout<T>(
    duration: Duration,
    future: impl Future<Output = Result<T, RelayError>>,
) -> Result<T, RelayError> {
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => Err(RelayError::Timeout(duration.as_millis() as u64)),
    }
}

/// Like [`with_timeout`], but a `None` budget waits forever.
pub async fn with_optional_timeout<T>(
    duration: Option<Duration>,
    future: impl Future<Output = Result<T, RelayError>>,
) -> Result<T, RelayError> {
    match duration {
        Some(d) => with_timeout(d, future).await,
        None => future.await,
    }
}
