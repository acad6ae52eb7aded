// SPDX-License-Identifier: MIT OR Apache-2.0
//! Streaming copy with chunking, rate limiting, retries, and progress
//! logging.

use crate::cancel::CancelToken;
use crate::config::RetryBackoff;
use crate::ratelimit::RateLimiter;
use crate::retry::io_error_is_retriable;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::info;

/// Errors a [`copy`] can fail with.
#[derive(Debug, thiserror::Error)]
pub enum CopyError {
    /// The surrounding context was cancelled at a suspension point.
    #[error("transfer cancelled")]
    Cancelled,
    /// Reading from the source or writing to the destination failed and
    /// either wasn't retriable or exhausted its retry budget.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A periodic progress record, emitted at `info` level every `log_delay`.
#[derive(Clone, Copy, Debug)]
pub struct Progress {
    /// Bytes copied so far.
    pub bytes_so_far: u64,
    /// Total bytes expected, if known up front.
    pub total_bytes: Option<u64>,
    /// Wall-clock time elapsed since the copy began.
    pub elapsed: Duration,
}

/// Stream `source` into `dest` in `chunk_size`-byte chunks, pacing
/// throughput through `rate_limiter`, retrying destination writes per
/// `retries`/`backoff`, and logging [`Progress`] every `log_delay`.
///
/// Returns the total number of bytes transferred.
#[allow(clippy::too_many_arguments)]
pub async fn copy(
    source: &mut (dyn AsyncRead + Send + Unpin),
    dest: &mut (dyn AsyncWrite + Send + Unpin),
    total_bytes: Option<u64>,
    chunk_size: usize,
    rate_limiter: &mut RateLimiter,
    retries: u32,
    backoff: &RetryBackoff,
    log_delay: Duration,
    cancel: &CancelToken,
) -> Result<u64, CopyError> {
    let started = Instant::now();
    let mut last_log = started;
    let mut transferred: u64 = 0;
    let mut buf = vec![0u8; chunk_size.max(1)];

    loop {
        if cancel.is_cancelled() {
            return Err(CopyError::Cancelled);
        }

        let n = source.read(&mut buf).await?;
        if n == 0 {
            break;
        }

        rate_limiter.acquire(n as u64).await;

        write_chunk_with_retry(dest, &buf[..n], retries, backoff, cancel).await?;
        transferred += n as u64;

        if last_log.elapsed() >= log_delay {
            info!(
                bytes_so_far = transferred,
                total_bytes = ?total_bytes,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "backint transfer progress"
            );
            last_log = Instant::now();
        }
    }

    dest.flush().await?;
    Ok(transferred)
}

async fn write_chunk_with_retry(
    dest: &mut (dyn AsyncWrite + Send + Unpin),
    chunk: &[u8],
    retries: u32,
    backoff: &RetryBackoff,
    cancel: &CancelToken,
) -> Result<(), CopyError> {
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            return Err(CopyError::Cancelled);
        }
        match dest.write_all(chunk).await {
            Ok(()) => return Ok(()),
            Err(err) if attempt < retries && io_error_is_retriable(&err) => {
                let delay = backoff.delay_for(attempt);
                tracing::warn!(attempt, ?delay, error = %err, "retrying chunk write");
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = cancel.cancelled() => return Err(CopyError::Cancelled),
                }
                attempt += 1;
            }
            Err(err) => return Err(CopyError::Io(err)),
        }
    }
}
