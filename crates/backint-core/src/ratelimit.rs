// SPDX-License-Identifier: MIT OR Apache-2.0
//! Per-task throughput cap with a 1-second window.
//!
//! A plain "bytes transferred / elapsed" average lets a task burst an
//! entire second's budget instantly and then idle; this limiter instead
//! tracks bytes spent within the *current* one-second window and sleeps
//! until the window rolls over once the budget is exhausted, so
//! throughput stays non-bursty at sub-second granularity.

use std::time::Duration;
use tokio::time::Instant;

/// A token-bucket limiter with a one-second refill window.
///
/// `rate_limit_mb = 0` means uncapped: [`RateLimiter::acquire`] never
/// sleeps.
pub struct RateLimiter {
    budget_bytes: u64,
    window_start: Instant,
    spent_in_window: u64,
}

impl RateLimiter {
    /// Create a limiter capped at `rate_limit_mb` MiB/s. `0` disables
    /// pacing entirely.
    pub fn new(rate_limit_mb: u64) -> Self {
        Self {
            budget_bytes: rate_limit_mb * 1024 * 1024,
            window_start: Instant::now(),
            spent_in_window: 0,
        }
    }

    /// `true` if this limiter imposes no pacing.
    pub fn is_unbounded(&self) -> bool {
        self.budget_bytes == 0
    }

    /// Account for `n` bytes about to be transferred, sleeping first if
    /// sending them now would exceed this window's budget.
    ///
    /// A chunk larger than the whole per-window budget is split against
    /// it rather than spent in one go: each window absorbs at most
    /// `budget_bytes`, so a single oversized chunk can't blow through
    /// several seconds' worth of budget in one window.
    pub async fn acquire(&mut self, mut n: u64) {
        if self.is_unbounded() {
            return;
        }
        while n > 0 {
            self.roll_window_if_expired();
            let available = self.budget_bytes.saturating_sub(self.spent_in_window);
            if available == 0 {
                self.sleep_until_window_rolls().await;
                continue;
            }
            let take = n.min(available);
            self.spent_in_window += take;
            n -= take;
            if n > 0 {
                self.sleep_until_window_rolls().await;
            }
        }
    }

    fn roll_window_if_expired(&mut self) {
        if self.window_start.elapsed() >= Duration::from_secs(1) {
            self.window_start = Instant::now();
            self.spent_in_window = 0;
        }
    }

    async fn sleep_until_window_rolls(&mut self) {
        let remaining = Duration::from_secs(1).saturating_sub(self.window_start.elapsed());
        if !remaining.is_zero() {
            tokio::time::sleep(remaining).await;
        }
        self.window_start = Instant::now();
        self.spent_in_window = 0;
    }
}
