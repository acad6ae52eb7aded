// SPDX-License-Identifier: MIT OR Apache-2.0
//! `#EBID` / `#NULL` handler for the Restore function: download a stored
//! backup into a local file or named pipe.

use super::find_exact;
use crate::cancel::CancelToken;
use crate::config::BackintConfiguration;
use crate::naming::{self, Target};
use crate::ratelimit::RateLimiter;
use crate::readwriter::copy;
use crate::response::Response;
use crate::retry::{store_error_is_retriable, with_retry};
use backint_store::{BackupObject, ObjectStoreAdapter, StoreError};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Which object a Restore request resolves to.
pub enum Lookup {
    /// `#EBID <id> <path> [dest]` — the single object with this id.
    Ebid(String),
    /// `#NULL <path> [dest]` — the newest object at `path`.
    Latest,
}

/// Restore one backup to `dest` (or `path` if no destination was given).
///
/// The response always echoes the bucket-derived id, never the
/// caller-supplied one — consistent with Inquire.
pub async fn handle(
    store: &dyn ObjectStoreAdapter,
    config: &BackintConfiguration,
    cancel: &CancelToken,
    lookup: Lookup,
    path: String,
    dest: Option<String>,
) -> Vec<Response> {
    let requested_id = match &lookup {
        Lookup::Ebid(id) => Some(id.clone()),
        Lookup::Latest => None,
    };

    let object = match resolve(store, config, &lookup, &path).await {
        Ok(Some(object)) => object,
        Ok(None) => {
            return vec![Response::NotFound {
                ebid: requested_id,
                path,
            }]
        }
        Err(err) => {
            warn!(%path, error = %err, "restore lookup failed");
            return vec![Response::Error {
                ebid: requested_id,
                path,
            }];
        }
    };

    let dest_path = dest.unwrap_or_else(|| path.clone());
    let ebid = object.ebid().to_string();

    let open_result = with_retry(config.retries, &config.retry_backoff, store_error_is_retriable, || {
        store.open_reader(&object.object_key)
    })
    .await;
    let (mut reader, size, _metadata) = match open_result {
        Ok(opened) => opened,
        Err(err) => {
            warn!(%path, %dest_path, error = %err, "failed to open remote reader");
            return vec![Response::Error {
                ebid: Some(ebid),
                path,
            }];
        }
    };

    let mut dest_file = if object.is_pipe() {
        // A named pipe must already exist; truncating it makes no sense.
        match OpenOptions::new().write(true).open(&dest_path).await {
            Ok(file) => file,
            Err(err) => {
                warn!(%dest_path, error = %err, "failed to open destination pipe");
                return vec![Response::Error {
                    ebid: Some(ebid),
                    path,
                }];
            }
        }
    } else {
        match OpenOptions::new().write(true).create(true).truncate(true).open(&dest_path).await {
            Ok(file) => file,
            Err(err) => {
                warn!(%dest_path, error = %err, "failed to open destination file");
                return vec![Response::Error {
                    ebid: Some(ebid),
                    path,
                }];
            }
        }
    };

    let mut limiter = RateLimiter::new(config.rate_limit_mb);
    let copied = copy(
        &mut reader,
        &mut dest_file,
        Some(size),
        config.chunk_size_bytes(),
        &mut limiter,
        config.retries,
        &config.retry_backoff,
        config.log_delay,
        cancel,
    )
    .await;
    if let Err(err) = copied {
        warn!(%path, %dest_path, error = %err, "restore transfer failed");
        return vec![Response::Error {
            ebid: Some(ebid),
            path,
        }];
    }
    if let Err(err) = dest_file.shutdown().await {
        warn!(%dest_path, error = %err, "failed to finalise restored file");
        return vec![Response::Error {
            ebid: Some(ebid),
            path,
        }];
    }

    vec![Response::Restored { ebid, path }]
}

async fn resolve(
    store: &dyn ObjectStoreAdapter,
    config: &BackintConfiguration,
    lookup: &Lookup,
    path: &str,
) -> Result<Option<BackupObject>, StoreError> {
    match lookup {
        Lookup::Ebid(id) => find_exact(store, config, path, id).await,
        Lookup::Latest => {
            let prefix = naming::object_prefix(config, path, Target::Primary);
            let mut objects = store.list(&prefix).await?;
            Ok(if objects.is_empty() { None } else { Some(objects.remove(0)) })
        }
    }
}
