//! Call deadlines

use std::{future::Future, time::Duration};

use tokio::time::timeout;

/// Run `fut`, failing with `timed_out` if it does not finish within `limit`.
///
/// The future is dropped on expiry; a pending database transaction is rolled back.
pub(crate) async fn bounded<T, E>(
    limit: Duration,
    timed_out: E,
    fut: impl Future<Output = Result<T, E>>,
) -> Result<T, E> {
    timeout(limit, fut).await.unwrap_or(Err(timed_out))
}
