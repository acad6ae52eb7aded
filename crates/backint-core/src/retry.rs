// SPDX-License-Identifier: MIT OR Apache-2.0
//! Exponential backoff for retriable adapter failures.

use crate::config::RetryBackoff;
use backint_store::StoreError;
use std::future::Future;
use tracing::warn;

/// Run `op` up to `retries + 1` times, retrying only while `is_retriable`
/// judges the error retriable, with exponential backoff between attempts.
///
/// Returns the first success, or the last failure once attempts are
/// exhausted. A non-retriable error is returned immediately.
pub async fn with_retry<T, E, F, Fut>(
    retries: u32,
    backoff: &RetryBackoff,
    is_retriable: impl Fn(&E) -> bool,
    mut op: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 0;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) if attempt < retries && is_retriable(&err) => {
                let delay = backoff.delay_for(attempt);
                warn!(attempt, ?delay, error = %err, "retrying after transfer error");
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// `is_retriable` classifier for [`StoreError`], used for adapter calls
/// that return it directly (`open_reader`, `open_writer`, `list`, `delete`,
/// `attrs`).
pub fn store_error_is_retriable(err: &StoreError) -> bool {
    err.is_retriable()
}

/// `is_retriable` classifier for raw `io::Error`, used while copying
/// chunks through an already-open reader/writer pair, where the original
/// `StoreError` has already been erased by `tokio::io`.
pub fn io_error_is_retriable(err: &std::io::Error) -> bool {
    use std::io::ErrorKind::*;
    matches!(
        err.kind(),
        TimedOut | ConnectionReset | ConnectionAborted | BrokenPipe | Interrupted | WouldBlock
    )
}
