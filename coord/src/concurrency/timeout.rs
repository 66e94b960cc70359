use std::future::Future;
use std::time::Duration;

use crate::error::CoordResult;

/// Runs `future` for at most `duration`.
///
/// Elapsing yields [`crate::error::ErrorKind::OperationTimedOut`] and drops the future at its
/// current suspension point.
pub async fn with_timeout<F>(duration: Duration, future: F) -> CoordResult<F::Output>
where
    F: Future,
{
    Ok(tokio::time::timeout(duration, future).await?)
}
