// SPDX-License-Identifier: MIT OR Apache-2.0
//! `#EBID` / `#NULL` handler for the Inquire function: list or look up
//! stored backups without transferring any bytes.

use super::find_exact;
use crate::config::BackintConfiguration;
use crate::naming::{self, Target};
use crate::response::Response;
use backint_store::ObjectStoreAdapter;
use tracing::warn;

/// `#EBID <id> <path>` — describe the single backup with the given id.
///
/// The response always echoes the bucket-derived id from the matched
/// object, not `id`: a caller that guessed wrong gets `#NOTFOUND` against
/// their own id, never a silently-corrected one.
pub async fn handle_ebid(
    store: &dyn ObjectStoreAdapter,
    config: &BackintConfiguration,
    id: String,
    path: String,
    extended_format: bool,
) -> Vec<Response> {
    match find_exact(store, config, &path, &id).await {
        Ok(Some(object)) => vec![Response::Backup {
            ebid: object.ebid().to_string(),
            path,
            created_at: extended_format.then_some(object.created_at),
        }],
        Ok(None) => vec![Response::NotFound { ebid: Some(id), path }],
        Err(err) => {
            warn!(%path, %id, error = %err, "inquire by id failed");
            vec![Response::Error { ebid: Some(id), path }]
        }
    }
}

/// `#NULL <path>` — describe every backup stored at `path`, newest first.
///
/// One `#BACKUP` line per matching object, emitted as a single task result
/// so the worker pool writes them as one contiguous block; an empty result
/// set is `#NOTFOUND`, never an empty success.
pub async fn handle_null(
    store: &dyn ObjectStoreAdapter,
    config: &BackintConfiguration,
    path: String,
    extended_format: bool,
) -> Vec<Response> {
    let prefix = naming::object_prefix(config, &path, Target::Primary);
    match store.list(&prefix).await {
        Ok(objects) if objects.is_empty() => vec![Response::NotFound { ebid: None, path }],
        Ok(objects) => objects
            .into_iter()
            .map(|object| Response::Backup {
                ebid: object.ebid().to_string(),
                path: path.clone(),
                created_at: extended_format.then_some(object.created_at),
            })
            .collect(),
        Err(err) => {
            warn!(%path, error = %err, "inquire by path failed");
            vec![Response::Error { ebid: None, path }]
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EncryptionConfig, Function, RetryBackoff};
    use backint_store::Encryption;
    use backint_store_mock::InMemoryStore;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tokio::io::AsyncWriteExt;

    fn config() -> BackintConfiguration {
        BackintConfiguration {
            user_id: "user1".into(),
            bucket: "primary".into(),
            recovery_bucket: None,
            folder_prefix: Some("backup".into()),
            recovery_folder_prefix: None,
            function: Function::Inquire,
            threads: 2,
            buffer_size_mb: 1,
            retries: 1,
            file_read_timeout: Duration::from_secs(5),
            rate_limit_mb: 0,
            log_delay: Duration::from_secs(3600),
            encryption: EncryptionConfig::default(),
            service_account_key: None,
            client_endpoint: None,
            compress: false,
            retry_backoff: RetryBackoff::default(),
        }
    }

    async fn seed(store: &InMemoryStore, config: &BackintConfiguration, path: &str, ebid: &str) {
        let key = naming::object_key(config, path, ebid, Target::Primary);
        let mut w = store
            .open_writer(key.as_str(), BTreeMap::new(), 1024, Encryption::None)
            .await
            .unwrap();
        w.write_all(b"x").await.unwrap();
        w.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn ebid_lookup_finds_exact_match() {
        let store = InMemoryStore::new();
        let config = config();
        seed(&store, &config, "/tmp/a.dat", "e1").await;

        let responses = handle_ebid(&store, &config, "e1".to_string(), "/tmp/a.dat".to_string(), false).await;
        assert_eq!(
            responses,
            vec![Response::Backup {
                ebid: "e1".to_string(),
                path: "/tmp/a.dat".to_string(),
                created_at: None,
            }]
        );
    }

    #[tokio::test]
    async fn ebid_lookup_reports_not_found_with_requested_id() {
        let store = InMemoryStore::new();
        let config = config();
        let responses = handle_ebid(&store, &config, "e404".to_string(), "/tmp/a.dat".to_string(), false).await;
        assert_eq!(
            responses,
            vec![Response::NotFound {
                ebid: Some("e404".to_string()),
                path: "/tmp/a.dat".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn null_lookup_lists_every_object_newest_first() {
        let store = InMemoryStore::new();
        let config = config();
        seed(&store, &config, "/tmp/a.dat", "e1").await;
        tokio::time::sleep(Duration::from_millis(2)).await;
        seed(&store, &config, "/tmp/a.dat", "e2").await;

        let responses = handle_null(&store, &config, "/tmp/a.dat".to_string(), false).await;
        assert_eq!(responses.len(), 2);
        assert_eq!(
            responses[0],
            Response::Backup {
                ebid: "e2".to_string(),
                path: "/tmp/a.dat".to_string(),
                created_at: None,
            }
        );
    }

    #[tokio::test]
    async fn null_lookup_on_empty_path_is_not_found() {
        let store = InMemoryStore::new();
        let config = config();
        let responses = handle_null(&store, &config, "/tmp/empty.dat".to_string(), false).await;
        assert_eq!(
            responses,
            vec![Response::NotFound {
                ebid: None,
                path: "/tmp/empty.dat".to_string(),
            }]
        );
    }
}
