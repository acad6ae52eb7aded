// SPDX-License-Identifier: MIT OR Apache-2.0
//! `#SAVE` / `#PIPE` handler: stream a local file or named pipe into the
//! primary bucket.

use crate::cancel::CancelToken;
use crate::config::BackintConfiguration;
use crate::naming::{self, Target};
use crate::ratelimit::RateLimiter;
use crate::readwriter::copy;
use crate::response::Response;
use crate::retry::{store_error_is_retriable, with_retry};
use backint_store::{Encryption, ObjectStoreAdapter, BACKUP_TYPE_FILE, BACKUP_TYPE_KEY, BACKUP_TYPE_PIPE};
use std::collections::BTreeMap;
use tokio::io::AsyncWriteExt;
use tracing::warn;

/// Run one `#SAVE`/`#PIPE` request to completion, returning exactly one
/// response.
///
/// Opening the local source and opening the remote writer are each
/// independent failure points; both surface as a plain `#ERROR` since
/// neither a file-open failure nor an adapter failure carries a
/// caller-assigned id for `#SAVE`/`#PIPE` (there is none yet).
pub async fn handle(
    store: &dyn ObjectStoreAdapter,
    config: &BackintConfiguration,
    encryption: Encryption,
    cancel: &CancelToken,
    is_pipe: bool,
    path: String,
    size: String,
) -> Vec<Response> {
    let declared_size: Option<u64> = size.parse().ok();
    if declared_size.is_none() {
        warn!(%path, %size, "non-numeric size on save/pipe request");
        return vec![Response::Error { ebid: None, path }];
    }

    let file = match tokio::time::timeout(config.file_read_timeout, tokio::fs::File::open(&path)).await {
        Ok(Ok(file)) => file,
        Ok(Err(err)) => {
            warn!(%path, error = %err, "failed to open local source");
            return vec![Response::Error { ebid: None, path }];
        }
        Err(_) => {
            warn!(%path, "timed out opening local source");
            return vec![Response::Error { ebid: None, path }];
        }
    };

    let ebid = naming::generate_ebid();
    let object_key = naming::object_key(config, &path, &ebid, Target::Primary);

    let mut metadata = BTreeMap::new();
    metadata.insert(
        BACKUP_TYPE_KEY.to_string(),
        if is_pipe { BACKUP_TYPE_PIPE } else { BACKUP_TYPE_FILE }.to_string(),
    );

    let writer = with_retry(config.retries, &config.retry_backoff, store_error_is_retriable, || {
        store.open_writer(&object_key, metadata.clone(), config.chunk_size_bytes(), encryption.clone())
    })
    .await;
    let mut writer = match writer {
        Ok(writer) => writer,
        Err(err) => {
            warn!(%path, %object_key, error = %err, "failed to open remote writer");
            return vec![Response::Error { ebid: None, path }];
        }
    };

    let mut source = file;
    let mut limiter = RateLimiter::new(config.rate_limit_mb);
    let transferred = copy(
        &mut source,
        &mut *writer,
        declared_size,
        config.chunk_size_bytes(),
        &mut limiter,
        config.retries,
        &config.retry_backoff,
        config.log_delay,
        cancel,
    )
    .await;
    let transferred = match transferred {
        Ok(n) => n,
        Err(err) => {
            warn!(%path, %object_key, error = %err, "transfer failed");
            return vec![Response::Error { ebid: None, path }];
        }
    };

    if let Err(err) = writer.shutdown().await {
        warn!(%path, %object_key, error = %err, "failed to commit upload");
        return vec![Response::Error { ebid: None, path }];
    }

    vec![Response::Saved {
        ebid,
        path,
        size: transferred,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;
    use backint_store_mock::InMemoryStore;
    use std::io::Write as _;

    #[tokio::test]
    async fn saves_a_file_and_commits_it() {
        let store = InMemoryStore::new();
        let mut tmp = tempfile::NamedTempFile::new().unwrap();
        tmp.write_all(b"hello world").unwrap();
        let config = test_config();
        let cancel = CancelToken::new();

        let responses = handle(
            &store,
            &config,
            Encryption::None,
            &cancel,
            false,
            tmp.path().to_string_lossy().into_owned(),
            "11".to_string(),
        )
        .await;

        match &responses[..] {
            [Response::Saved { size, .. }] => assert_eq!(*size, 11),
            other => panic!("unexpected responses: {other:?}"),
        }
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn missing_local_file_is_an_error() {
        let store = InMemoryStore::new();
        let config = test_config();
        let cancel = CancelToken::new();

        let responses = handle(
            &store,
            &config,
            Encryption::None,
            &cancel,
            false,
            "/no/such/path.dat".to_string(),
            "11".to_string(),
        )
        .await;
        assert_eq!(
            responses,
            vec![Response::Error {
                ebid: None,
                path: "/no/such/path.dat".to_string(),
            }]
        );
    }

    #[tokio::test]
    async fn non_numeric_size_is_an_error_without_opening_the_file() {
        let store = InMemoryStore::new();
        let config = test_config();
        let cancel = CancelToken::new();

        let responses = handle(
            &store,
            &config,
            Encryption::None,
            &cancel,
            false,
            "/tmp/whatever.dat".to_string(),
            "not-a-number".to_string(),
        )
        .await;
        assert_eq!(
            responses,
            vec![Response::Error {
                ebid: None,
                path: "/tmp/whatever.dat".to_string(),
            }]
        );
        assert_eq!(store.len(), 0);
    }

    fn test_config() -> BackintConfiguration {
        use crate::config::{EncryptionConfig, Function, RetryBackoff};
        use std::time::Duration;
        BackintConfiguration {
            user_id: "user1".into(),
            bucket: "primary".into(),
            recovery_bucket: None,
            folder_prefix: Some("backup".into()),
            recovery_folder_prefix: None,
            function: Function::Backup,
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
}
