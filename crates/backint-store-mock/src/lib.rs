// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! In-memory [`ObjectStoreAdapter`] for tests and self-diagnostics.
//!
//! Objects only become visible to [`InMemoryStore::list`] /
//! [`InMemoryStore::open_reader`] once their writer has been shut down,
//! mirroring the "commit on close" semantics a real bucket upload has —
//! this is what lets the `ReadWriter` invariant ("`#SAVED` only after the
//! upload is fully committed") be exercised against a mock.

use async_trait::async_trait;
use backint_store::{BackupObject, BucketAttrs, Encryption, ObjectStoreAdapter, StoreError};
use backint_store::{BoxedReader, BoxedWriter};
use chrono::Utc;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::AsyncWrite;

struct Entry {
    bytes: Vec<u8>,
    metadata: BTreeMap<String, String>,
    created_at: chrono::DateTime<Utc>,
}

#[derive(Default)]
struct State {
    objects: BTreeMap<String, Entry>,
}

/// An in-memory bucket. Cloning shares the underlying storage.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<State>>,
    retention_policy: Option<String>,
}

impl InMemoryStore {
    /// Create an empty store with no retention policy.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store that reports the given retention policy from
    /// `attrs()`, for exercising the preflight-rejection path.
    pub fn with_retention_policy(policy: impl Into<String>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            retention_policy: Some(policy.into()),
        }
    }

    /// Number of committed objects currently stored.
    pub fn len(&self) -> usize {
        self.state.lock().expect("mock store lock poisoned").objects.len()
    }

    /// `true` if no objects are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ObjectStoreAdapter for InMemoryStore {
    async fn open_reader(
        &self,
        key: &str,
    ) -> Result<(BoxedReader, u64, BTreeMap<String, String>), StoreError> {
        let state = self.state.lock().expect("mock store lock poisoned");
        let entry = state
            .objects
            .get(key)
            .ok_or_else(|| StoreError::NotFound(key.to_string()))?;
        let size = entry.bytes.len() as u64;
        let metadata = entry.metadata.clone();
        let reader: BoxedReader = Box::new(Cursor::new(entry.bytes.clone()));
        Ok((reader, size, metadata))
    }

    async fn open_writer(
        &self,
        key: &str,
        metadata: BTreeMap<String, String>,
        _chunk_size: usize,
        encryption: Encryption,
    ) -> Result<BoxedWriter, StoreError> {
        if let Encryption::Csek { key: k } = &encryption {
            if k.iter().all(|b| *b == 0) {
                return Err(StoreError::Transport("refusing all-zero CSEK key".into()));
            }
        }
        Ok(Box::new(MemWriter {
            state: self.state.clone(),
            key: key.to_string(),
            metadata,
            buf: Vec::new(),
        }))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BackupObject>, StoreError> {
        let state = self.state.lock().expect("mock store lock poisoned");
        let mut objects: Vec<BackupObject> = state
            .objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .map(|(key, entry)| BackupObject {
                object_key: key.clone(),
                size: entry.bytes.len() as u64,
                created_at: entry.created_at,
                metadata: entry.metadata.clone(),
            })
            .collect();
        // Newest-first; ties broken by key ascending.
        objects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.object_key.cmp(&b.object_key)));
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let mut state = self.state.lock().expect("mock store lock poisoned");
        state
            .objects
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    async fn attrs(&self) -> Result<BucketAttrs, StoreError> {
        Ok(BucketAttrs {
            retention_policy: self.retention_policy.clone(),
        })
    }
}

struct MemWriter {
    state: Arc<Mutex<State>>,
    key: String,
    metadata: BTreeMap<String, String>,
    buf: Vec<u8>,
}

impl AsyncWrite for MemWriter {
    fn poll_write(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        self.buf.extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        let this = self.get_mut();
        let mut state = this.state.lock().expect("mock store lock poisoned");
        state.objects.insert(
            this.key.clone(),
            Entry {
                bytes: std::mem::take(&mut this.buf),
                metadata: std::mem::take(&mut this.metadata),
                created_at: Utc::now(),
            },
        );
        Poll::Ready(Ok(()))
    }
}
