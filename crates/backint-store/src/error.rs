// SPDX-License-Identifier: MIT OR Apache-2.0
//! Error type returned by [`crate::ObjectStoreAdapter`] operations.

use thiserror::Error;

/// Failures an [`crate::ObjectStoreAdapter`] can report.
///
/// These map onto the handler-level `#ERROR` / `#NOTFOUND` distinction in
/// the wire protocol: [`StoreError::NotFound`] becomes `#NOTFOUND`, every
/// other variant becomes `#ERROR` for the request in flight.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No object exists at the requested key or prefix.
    #[error("object not found: {0}")]
    NotFound(String),

    /// The bucket handle required for this operation was not configured.
    ///
    /// Distinct from `NotFound`: the bucket itself is unreachable, so the
    /// caller must emit `#ERROR`, never `#NOTFOUND`.
    #[error("bucket handle unavailable")]
    Unavailable,

    /// The bucket has a retention policy that would make `Delete` unable
    /// to clean up after itself.
    #[error("bucket has an active retention policy")]
    RetentionPolicyActive,

    /// Local filesystem I/O failed while staging a transfer.
    #[error("local I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote transport (HTTP, auth, quota) failed after retries were
    /// exhausted by the caller.
    #[error("transport error: {0}")]
    Transport(String),

    /// Both CSEK and KMS encryption were configured for one operation.
    #[error("customer-supplied and KMS encryption keys cannot both be set")]
    EncryptionConflict,
}

impl StoreError {
    /// `true` for an error that a caller may usefully retry.
    pub fn is_retriable(&self) -> bool {
        matches!(self, StoreError::Transport(_) | StoreError::Io(_))
    }
}
