// SPDX-License-Identifier: MIT OR Apache-2.0
#![deny(unsafe_code)]
#![warn(missing_docs)]
//! `reqwest`-backed [`ObjectStoreAdapter`] for a real bucket endpoint.

mod error;
mod writer;

use async_trait::async_trait;
use backint_store::{
    BackupObject, BoxedReader, BoxedWriter, BucketAttrs, Encryption, ObjectStoreAdapter,
    StoreError,
};
use base64::Engine;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

const ENCRYPTION_KEY_HEADER: &str = "X-Backint-Encryption-Key";
const ENCRYPTION_KEY_SHA256_HEADER: &str = "X-Backint-Encryption-Key-Sha256";
const KMS_KEY_HEADER: &str = "X-Backint-Kms-Key";
const METADATA_HEADER: &str = "X-Backint-Metadata";

/// Credentials and endpoint configuration for [`HttpStore`].
#[derive(Clone, Debug, Default)]
pub struct HttpStoreConfig {
    /// Base URL of the object-store endpoint, e.g. `https://storage.example.com`.
    pub base_url: String,
    /// Bucket name this adapter operates against.
    pub bucket: String,
    /// Bearer token attached to every request, if a service account
    /// credential was configured. `None` means ambient credentials (a
    /// reverse proxy or sidecar attaches auth instead).
    pub bearer_token: Option<String>,
}

/// A real object-store adapter speaking a generic bucket HTTP API over
/// `reqwest`. See the crate README for the exact wire contract.
pub struct HttpStore {
    client: reqwest::Client,
    config: HttpStoreConfig,
}

#[derive(Deserialize)]
struct ListedObject {
    key: String,
    size: u64,
    created_at: DateTime<Utc>,
    #[serde(default)]
    metadata: BTreeMap<String, String>,
}

#[derive(Deserialize)]
struct AttrsResponse {
    #[serde(default)]
    retention_policy: Option<String>,
}

impl HttpStore {
    /// Build an adapter from a validated configuration.
    pub fn new(config: HttpStoreConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.config.base_url, self.config.bucket, key)
    }

    fn bucket_url(&self) -> String {
        format!("{}/{}", self.config.base_url, self.config.bucket)
    }

    fn auth(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.bearer_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    fn encryption_headers(
        builder: reqwest::RequestBuilder,
        encryption: &Encryption,
    ) -> Result<reqwest::RequestBuilder, StoreError> {
        match encryption {
            Encryption::None => Ok(builder),
            Encryption::Csek { key } => {
                let mut hasher = Sha256::new();
                hasher.update(key);
                let digest = hasher.finalize();
                let b64 = base64::engine::general_purpose::STANDARD;
                Ok(builder
                    .header(ENCRYPTION_KEY_HEADER, b64.encode(key))
                    .header(ENCRYPTION_KEY_SHA256_HEADER, b64.encode(digest)))
            }
            Encryption::Kms { key_name } => Ok(builder.header(KMS_KEY_HEADER, key_name.as_str())),
        }
    }
}

#[async_trait]
impl ObjectStoreAdapter for HttpStore {
    async fn open_reader(
        &self,
        key: &str,
    ) -> Result<(BoxedReader, u64, BTreeMap<String, String>), StoreError> {
        let resp = self
            .auth(self.client.get(self.object_url(key)))
            .send()
            .await
            .map_err(error::from_reqwest)?;
        if !resp.status().is_success() {
            return Err(error::from_status(resp.status(), key));
        }
        let size = resp.content_length().unwrap_or(0);
        let metadata = resp
            .headers()
            .get(METADATA_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default();
        let stream = resp
            .bytes_stream()
            .map(|r| r.map_err(std::io::Error::other));
        let reader: BoxedReader = Box::new(tokio_util::io::StreamReader::new(stream));
        Ok((reader, size, metadata))
    }

    async fn open_writer(
        &self,
        key: &str,
        metadata: BTreeMap<String, String>,
        _chunk_size: usize,
        encryption: Encryption,
    ) -> Result<BoxedWriter, StoreError> {
        let (tx, rx) = mpsc::channel::<std::io::Result<Bytes>>(8);
        let (result_tx, result_rx) = oneshot::channel();
        let body = reqwest::Body::wrap_stream(ReceiverStream::new(rx));

        let metadata_header =
            serde_json::to_string(&metadata).map_err(|e| StoreError::Transport(e.to_string()))?;
        let mut builder = self
            .auth(self.client.put(self.object_url(key)))
            .header(METADATA_HEADER, metadata_header);
        builder = Self::encryption_headers(builder, &encryption)?;
        let request = builder.body(body);

        let task = tokio::spawn(async move {
            let result = request
                .send()
                .await
                .map_err(|e| std::io::Error::other(e.to_string()))
                .and_then(|resp| {
                    if resp.status().is_success() {
                        Ok(())
                    } else {
                        Err(std::io::Error::other(format!(
                            "upload rejected with status {}",
                            resp.status()
                        )))
                    }
                });
            if result.is_err() {
                warn!(?result, "backint-store-http upload failed");
            }
            let _ = result_tx.send(result);
        });

        Ok(Box::new(writer::HttpWriter::new(tx, result_rx, task)))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<BackupObject>, StoreError> {
        let resp = self
            .auth(self.client.get(self.bucket_url()))
            .query(&[("prefix", prefix)])
            .send()
            .await
            .map_err(error::from_reqwest)?;
        if !resp.status().is_success() {
            return Err(error::from_status(resp.status(), prefix));
        }
        let listed: Vec<ListedObject> = resp.json().await.map_err(error::from_reqwest)?;
        debug!(count = listed.len(), prefix, "listed objects");
        let mut objects: Vec<BackupObject> = listed
            .into_iter()
            .map(|o| BackupObject {
                object_key: o.key,
                size: o.size,
                created_at: o.created_at,
                metadata: o.metadata,
            })
            .collect();
        objects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.object_key.cmp(&b.object_key)));
        Ok(objects)
    }

    async fn delete(&self, key: &str) -> Result<(), StoreError> {
        let resp = self
            .auth(self.client.delete(self.object_url(key)))
            .send()
            .await
            .map_err(error::from_reqwest)?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(error::from_status(resp.status(), key))
        }
    }

    async fn attrs(&self) -> Result<BucketAttrs, StoreError> {
        let resp = self
            .auth(self.client.get(self.bucket_url()))
            .header("Accept", "application/vnd.bucket-attrs+json")
            .send()
            .await
            .map_err(error::from_reqwest)?;
        if !resp.status().is_success() {
            return Err(error::from_status(resp.status(), &self.config.bucket));
        }
        let attrs: AttrsResponse = resp.json().await.map_err(error::from_reqwest)?;
        Ok(BucketAttrs {
            retention_policy: attrs.retention_policy,
        })
    }
}
