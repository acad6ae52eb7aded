// SPDX-License-Identifier: MIT OR Apache-2.0
//! The [`ObjectStoreAdapter`] capability trait.

use crate::error::StoreError;
use crate::types::{BackupObject, BucketAttrs, Encryption};
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::io::{AsyncRead, AsyncWrite};

/// A boxed, send + unpin async reader returned by [`ObjectStoreAdapter::open_reader`].
pub type BoxedReader = Box<dyn AsyncRead + Send + Unpin>;

/// A boxed, send + unpin async writer returned by [`ObjectStoreAdapter::open_writer`].
pub type BoxedWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// Thin capability interface over a bucket, hiding SDK/transport details
/// from the protocol engine.
///
/// Implementations must be safe for concurrent use: the worker pool calls
/// these methods from many tasks at once with no external synchronization.
#[async_trait]
pub trait ObjectStoreAdapter: Send + Sync {
    /// Open a reader for the object at `key`, returning the stream, its
    /// size in bytes, and its stored metadata.
    async fn open_reader(
        &self,
        key: &str,
    ) -> Result<(BoxedReader, u64, BTreeMap<String, String>), StoreError>;

    /// Open a writer for a new object at `key` with the given metadata,
    /// chunk size, and encryption mode. The object is only visible to
    /// `list`/`open_reader` once the writer has been fully flushed and
    /// dropped/shut down.
    async fn open_writer(
        &self,
        key: &str,
        metadata: BTreeMap<String, String>,
        chunk_size: usize,
        encryption: Encryption,
    ) -> Result<BoxedWriter, StoreError>;

    /// List objects whose key starts with `prefix`, newest-first.
    async fn list(&self, prefix: &str) -> Result<Vec<BackupObject>, StoreError>;

    /// Delete the object at `key`. Returns [`StoreError::NotFound`] if it
    /// does not exist.
    async fn delete(&self, key: &str) -> Result<(), StoreError>;

    /// Read bucket-level attributes, used only by Diagnose and the
    /// retention-policy preflight in `Backup`.
    async fn attrs(&self) -> Result<BucketAttrs, StoreError>;
}
