// SPDX-License-Identifier: MIT OR Apache-2.0
//! `#EBID` / `#NULL` handler for the Delete function.

use crate::config::BackintConfiguration;
use crate::naming::{self, Target};
use crate::response::Response;
use crate::retry::{store_error_is_retriable, with_retry};
use backint_store::{ObjectStoreAdapter, StoreError};
use tracing::warn;

/// `#EBID <id> <path>` — delete the single object with the given id.
pub async fn handle_ebid(
    store: &dyn ObjectStoreAdapter,
    config: &BackintConfiguration,
    id: String,
    path: String,
) -> Vec<Response> {
    let key = naming::object_key(config, &path, &id, Target::Primary);
    match with_retry(config.retries, &config.retry_backoff, store_error_is_retriable, || store.delete(&key)).await {
        Ok(()) => vec![Response::Deleted { ebid: id, path }],
        Err(StoreError::NotFound(_)) => vec![Response::NotFound { ebid: Some(id), path }],
        Err(err) => {
            warn!(%path, %id, error = %err, "delete by id failed");
            vec![Response::Error { ebid: Some(id), path }]
        }
    }
}

/// `#NULL <path>` — delete every object stored at `path`.
///
/// Each object deletes independently; one object's transport failure
/// doesn't stop the rest, so the result is a mix of `#DELETED`/`#ERROR`
/// lines rather than an all-or-nothing outcome.
pub async fn handle_null(store: &dyn ObjectStoreAdapter, config: &BackintConfiguration, path: String) -> Vec<Response> {
    let prefix = naming::object_prefix(config, &path, Target::Primary);
    let objects = match store.list(&prefix).await {
        Ok(objects) => objects,
        Err(err) => {
            warn!(%path, error = %err, "delete-all listing failed");
            return vec![Response::Error { ebid: None, path }];
        }
    };
    if objects.is_empty() {
        return vec![Response::NotFound { ebid: None, path }];
    }

    let mut responses = Vec::with_capacity(objects.len());
    for object in objects {
        let ebid = object.ebid().to_string();
        match with_retry(config.retries, &config.retry_backoff, store_error_is_retriable, || {
            store.delete(&object.object_key)
        })
        .await
        {
            Ok(()) => responses.push(Response::Deleted {
                ebid,
                path: path.clone(),
            }),
            Err(err) => {
                warn!(%path, %ebid, error = %err, "delete-all item failed");
                responses.push(Response::Error {
                    ebid: Some(ebid),
                    path: path.clone(),
                });
            }
        }
    }
    responses
}
