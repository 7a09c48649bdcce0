//! Race blocking work against the shared shutdown token.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::{NaraslaError, Result};

/// Run `fut` unless `cancel` fires first, in which case `Cancelled` is returned
/// and `fut` is dropped.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NaraslaError::Cancelled),
        res = fut => res,
    }
}

/// Sleep for `duration`, returning early with `Cancelled` on shutdown.
pub async fn sleep(cancel: &CancellationToken, duration: Duration) -> Result<()> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(NaraslaError::Cancelled),
        _ = tokio::time::sleep(duration) => Ok(()),
    }
}
