// SPDX-License-Identifier: MIT OR Apache-2.0
//! Stream/configuration-level errors that abort the whole invocation.
//!
//! These are the only errors that propagate out of the dispatcher: a
//! malformed request line, or a configuration problem (encryption
//! mismatch, unreadable key file) detected before any bytes move.
//! Per-request failures are [`crate::response::Response::Error`] /
//! [`crate::response::Response::NotFound`] values, not `Err`.

use thiserror::Error;

/// Errors that abort stream processing entirely.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A request line had the wrong number of tokens for its directive.
    #[error("malformed request on line: {0}")]
    Malformed(String),

    /// Both CSEK and KMS encryption were configured.
    #[error("encryption misconfigured: both a key file and a KMS key were set")]
    EncryptionConflict,

    /// The key file had no entry matching the configured resource URI.
    #[error("no encryption key entry matches uri {0}")]
    EncryptionKeyNotFound(String),

    /// The encryption key file could not be read or parsed.
    #[error("failed to load encryption key file: {0}")]
    EncryptionKeyFile(String),

    /// The configured bucket has an active retention policy; `Delete`
    /// would never be able to clean up, so the whole invocation is
    /// rejected before any transfer begins.
    #[error("bucket retention policy would block deletion: {0}")]
    RetentionPolicyActive(String),

    /// The input or output stream could not be opened.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
