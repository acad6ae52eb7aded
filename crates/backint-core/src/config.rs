// SPDX-License-Identifier: MIT OR Apache-2.0
//! `BackintConfiguration` — the validated configuration the core receives.
//!
//! Parsing and validating this from a JSON or legacy text config file is
//! out of scope for this crate: callers hand over an already validated
//! value.

use std::path::PathBuf;
use std::time::Duration;

/// Which top-level dispatcher an invocation runs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Function {
    /// Persist new backups (`#SAVE` / `#PIPE`).
    Backup,
    /// List/describe existing backups (`#EBID` / `#NULL`).
    Inquire,
    /// Download previously stored backups.
    Restore,
    /// Remove stored backups.
    Delete,
    /// Run the end-to-end self-check against a live bucket.
    Diagnose,
}

/// Exponential backoff parameters for `ReadWriter` retries.
#[derive(Clone, Debug)]
pub struct RetryBackoff {
    /// Delay before the first retry.
    pub initial: Duration,
    /// Upper bound on any single delay.
    pub max: Duration,
    /// Multiplier applied to the delay after each failed attempt.
    pub multiplier: f64,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_millis(500),
            max: Duration::from_secs(30),
            multiplier: 2.0,
        }
    }
}

impl RetryBackoff {
    /// Delay to apply before retry attempt `attempt` (0-indexed).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let scaled = self.initial.as_secs_f64() * self.multiplier.powi(attempt as i32);
        Duration::from_secs_f64(scaled.min(self.max.as_secs_f64()))
    }
}

/// Which encryption mode is configured, pre-validated so that at most one
/// of CSEK/KMS is ever set — configuring both is rejected during
/// preflight, before the request stream is read.
#[derive(Clone, Debug, Default)]
pub struct EncryptionConfig {
    /// Path to a JSON key file containing `EncryptionKeyEntry` records.
    pub encryption_key_file: Option<PathBuf>,
    /// URI of the resource this invocation's CSEK entry must match.
    pub encryption_key_uri: Option<String>,
    /// KMS key resource name, mutually exclusive with `encryption_key_file`.
    pub kms_key: Option<String>,
}

/// Read-only configuration injected once per invocation.
#[derive(Clone, Debug)]
pub struct BackintConfiguration {
    /// Prefix prepended to every object key.
    pub user_id: String,
    /// Primary bucket name, written by `Backup` and read by the others.
    pub bucket: String,
    /// Read-only recovery bucket name; never written to.
    pub recovery_bucket: Option<String>,
    /// Folder prefix under the primary bucket.
    pub folder_prefix: Option<String>,
    /// Folder prefix under the recovery bucket.
    pub recovery_folder_prefix: Option<String>,
    /// Which dispatcher this invocation runs.
    pub function: Function,
    /// Worker pool size, minimum 1.
    pub threads: usize,
    /// Chunk size for uploads/downloads, in MiB.
    pub buffer_size_mb: u64,
    /// Max retry attempts per chunk transfer.
    pub retries: u32,
    /// Local file-open timeout.
    pub file_read_timeout: Duration,
    /// Per-task throughput cap in MiB/s; `0` means uncapped.
    pub rate_limit_mb: u64,
    /// Interval between progress log lines.
    pub log_delay: Duration,
    /// Encryption selection, validated once up front.
    pub encryption: EncryptionConfig,
    /// Path to a service-account credential file, if configured.
    pub service_account_key: Option<PathBuf>,
    /// Override for the object-store endpoint.
    pub client_endpoint: Option<String>,
    /// Reserved for forward compatibility with callers that still set it;
    /// no semantic in the core.
    pub compress: bool,
    /// Exponential backoff parameters for `ReadWriter` retries.
    pub retry_backoff: RetryBackoff,
}

impl BackintConfiguration {
    /// Chunk size in bytes.
    pub fn chunk_size_bytes(&self) -> usize {
        (self.buffer_size_mb * 1024 * 1024) as usize
    }

    /// Effective folder prefix to splice between `user_id` and the cleaned
    /// path when targeting the primary bucket.
    pub fn primary_prefix(&self) -> &str {
        self.folder_prefix.as_deref().unwrap_or("")
    }

    /// Effective folder prefix for the recovery bucket.
    pub fn recovery_prefix(&self) -> &str {
        self.recovery_folder_prefix.as_deref().unwrap_or("")
    }
}
