// SPDX-License-Identifier: MIT OR Apache-2.0
//! Top-level orchestration: read request lines, preflight the invocation
//! once, then fan requests out across the worker pool.

use crate::cancel::CancelToken;
use crate::config::{BackintConfiguration, Function};
use crate::error::EngineError;
use crate::handlers::{backup, delete, inquire, restore};
use crate::keyfile;
use crate::pool::WorkerPool;
use crate::request::{parse_line, Request};
use crate::response::Response;
use backint_store::{Encryption, ObjectStoreAdapter};
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite};
use tracing::{info, warn};

/// Run one Backint invocation to completion: echo `#SOFTWAREID` when the
/// caller sends one, preflight encryption/retention configuration, then
/// stream every remaining request line into the worker pool.
///
/// `#SOFTWAREID` is optional, not mandatory — a caller that only ever
/// issues one directive per invocation (a lone `#SAVE`, `#NULL`, `#PIPE`,
/// or `#EBID`) is handled the same as a session that opens with one; the
/// first line is only treated specially when it actually parses as
/// `#SOFTWAREID`, in which case it sets `extended_format` for every
/// `#BACKUP` line this invocation produces. Otherwise the first line is
/// just the first request, and `extended_format` defaults to `false`.
///
/// Returns `Err` only for conditions that abort the whole stream before
/// — or instead of — producing any more response lines: a malformed
/// request line, or a configuration problem caught before any transfer.
pub async fn run<R, W>(
    config: Arc<BackintConfiguration>,
    store: Arc<dyn ObjectStoreAdapter>,
    input: R,
    output: W,
) -> Result<(), EngineError>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin + Send + 'static,
{
    let encryption = resolve_encryption(&config).await?;
    preflight_retention(&config, &store).await?;

    let mut pool = WorkerPool::new(config.threads, output);
    let cancel = CancelToken::new();

    let mut lines = input.lines();
    let extended_format = match lines.next_line().await? {
        Some(first) => {
            process_first_line(&config, &store, &encryption, &cancel, &mut pool, &first).await?
        }
        None => return Ok(()),
    };

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let request = parse_line(&line).map_err(|err| EngineError::Malformed(err.to_string()))?;
        dispatch(
            &config,
            &store,
            &encryption,
            &cancel,
            &mut pool,
            extended_format,
            request,
        )
        .await;
    }

    pool.drain().await;
    info!("backint invocation complete");
    Ok(())
}

/// Peek the invocation's first line. A `#SOFTWAREID` is echoed
/// synchronously and establishes `extended_format`; anything else is
/// dispatched as an ordinary request with `extended_format = false`.
async fn process_first_line<W>(
    config: &Arc<BackintConfiguration>,
    store: &Arc<dyn ObjectStoreAdapter>,
    encryption: &Encryption,
    cancel: &CancelToken,
    pool: &mut WorkerPool<W>,
    line: &str,
) -> Result<bool, EngineError>
where
    W: AsyncWrite + Unpin + Send + 'static,
{
    let request = parse_line(line).map_err(|err| EngineError::Malformed(err.to_string()))?;
    if let Request::SoftwareId { version, agent_info } = request {
        let extended_format = is_extended_format(&version);
        pool.write_line_now(&Response::SoftwareId { version, agent_info }).await?;
        return Ok(extended_format);
    }
    dispatch(config, store, encryption, cancel, pool, false, request).await;
    Ok(false)
}

/// `#BACKUP` lines gained a quoted ISO-8601 timestamp in protocol version
/// 1.50; older callers expect the short two-field form.
fn is_extended_format(version: &str) -> bool {
    let mut parts = version.splitn(2, '.');
    let major: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    let minor: u32 = parts.next().and_then(|p| p.parse().ok()).unwrap_or(0);
    (major, minor) >= (1, 50)
}

async fn dispatch<W>(
    config: &Arc<BackintConfiguration>,
    store: &Arc<dyn ObjectStoreAdapter>,
    encryption: &Encryption,
    cancel: &CancelToken,
    pool: &mut WorkerPool<W>,
    extended_format: bool,
    request: Request,
) where
    W: AsyncWrite + Unpin + Send + 'static,
{
    match (config.function, request) {
        (Function::Backup, Request::Save { path, size }) => {
            let (config, store, encryption, cancel) = (config.clone(), store.clone(), encryption.clone(), cancel.clone());
            pool.submit(async move { backup::handle(&*store, &config, encryption, &cancel, false, path, size).await })
                .await;
        }
        (Function::Backup, Request::Pipe { path, size }) => {
            let (config, store, encryption, cancel) = (config.clone(), store.clone(), encryption.clone(), cancel.clone());
            pool.submit(async move { backup::handle(&*store, &config, encryption, &cancel, true, path, size).await })
                .await;
        }
        (Function::Inquire, Request::Ebid { id, path, .. }) => {
            let (config, store) = (config.clone(), store.clone());
            pool.submit(async move { inquire::handle_ebid(&*store, &config, id, path, extended_format).await })
                .await;
        }
        (Function::Inquire, Request::Null { path, .. }) => {
            let (config, store) = (config.clone(), store.clone());
            pool.submit(async move { inquire::handle_null(&*store, &config, path, extended_format).await })
                .await;
        }
        (Function::Restore, Request::Ebid { id, path, dest }) => {
            let (config, store, cancel) = (config.clone(), store.clone(), cancel.clone());
            pool.submit(async move {
                restore::handle(&*store, &config, &cancel, restore::Lookup::Ebid(id), path, dest).await
            })
            .await;
        }
        (Function::Restore, Request::Null { path, dest }) => {
            let (config, store, cancel) = (config.clone(), store.clone(), cancel.clone());
            pool.submit(async move {
                restore::handle(&*store, &config, &cancel, restore::Lookup::Latest, path, dest).await
            })
            .await;
        }
        (Function::Delete, Request::Ebid { id, path, .. }) => {
            let (config, store) = (config.clone(), store.clone());
            pool.submit(async move { delete::handle_ebid(&*store, &config, id, path).await }).await;
        }
        (Function::Delete, Request::Null { path, .. }) => {
            let (config, store) = (config.clone(), store.clone());
            pool.submit(async move { delete::handle_null(&*store, &config, path).await }).await;
        }
        (_, Request::SoftwareId { .. }) => {
            warn!("ignoring #SOFTWAREID line after session start");
        }
        (_, Request::Comment(_)) => {}
        (function, other) => {
            warn!(?function, request = ?other, "request does not apply to this invocation's function, skipping");
        }
    }
}

async fn resolve_encryption(config: &BackintConfiguration) -> Result<Encryption, EngineError> {
    let enc = &config.encryption;
    if enc.encryption_key_file.is_some() && enc.kms_key.is_some() {
        return Err(EngineError::EncryptionConflict);
    }
    if let Some(kms_key) = &enc.kms_key {
        return Ok(Encryption::Kms {
            key_name: kms_key.clone(),
        });
    }
    if let Some(key_file) = &enc.encryption_key_file {
        let uri = enc
            .encryption_key_uri
            .clone()
            .ok_or_else(|| EngineError::EncryptionKeyFile("encryption key file set without a target uri".into()))?;
        let contents = tokio::fs::read_to_string(key_file)
            .await
            .map_err(|err| EngineError::EncryptionKeyFile(err.to_string()))?;
        let entry = keyfile::load_matching_key(&contents, &uri)?;
        let key = keyfile::decode_raw_key(&entry)?;
        return Ok(Encryption::Csek { key });
    }
    Ok(Encryption::None)
}

async fn preflight_retention(
    config: &BackintConfiguration,
    store: &Arc<dyn ObjectStoreAdapter>,
) -> Result<(), EngineError> {
    if config.function != Function::Delete {
        return Ok(());
    }
    let attrs = store
        .attrs()
        .await
        .map_err(|err| EngineError::RetentionPolicyActive(format!("could not read bucket attributes: {err}")))?;
    if let Some(policy) = attrs.retention_policy {
        return Err(EngineError::RetentionPolicyActive(policy));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{EncryptionConfig, RetryBackoff};
    use backint_store_mock::InMemoryStore;
    use std::time::Duration;

    fn config(function: Function) -> Arc<BackintConfiguration> {
        Arc::new(BackintConfiguration {
            user_id: "user1".into(),
            bucket: "primary".into(),
            recovery_bucket: None,
            folder_prefix: Some("backup".into()),
            recovery_folder_prefix: None,
            function,
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
        })
    }

    #[test]
    fn version_1_50_and_above_is_extended_format() {
        assert!(is_extended_format("1.50"));
        assert!(is_extended_format("2.0"));
        assert!(!is_extended_format("1.49"));
        assert!(!is_extended_format("1"));
    }

    #[derive(Clone, Default)]
    struct SharedVec(Arc<std::sync::Mutex<Vec<u8>>>);

    impl AsyncWrite for SharedVec {
        fn poll_write(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
            buf: &[u8],
        ) -> std::task::Poll<std::io::Result<usize>> {
            self.0.lock().expect("lock poisoned").extend_from_slice(buf);
            std::task::Poll::Ready(Ok(buf.len()))
        }
        fn poll_flush(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
        fn poll_shutdown(
            self: std::pin::Pin<&mut Self>,
            _cx: &mut std::task::Context<'_>,
        ) -> std::task::Poll<std::io::Result<()>> {
            std::task::Poll::Ready(Ok(()))
        }
    }

    #[tokio::test]
    async fn echoes_software_id_then_reports_missing_backup() {
        let store: Arc<dyn ObjectStoreAdapter> = Arc::new(InMemoryStore::new());
        let config = config(Function::Inquire);
        let input = b"#SOFTWAREID \"1.50\" \"test-agent\"\n#EBID \"e1\" \"/tmp/a.dat\"\n".to_vec();
        let output = SharedVec::default();
        let observe = output.clone();
        run(config, store, &input[..], output).await.unwrap();

        let written = observe.0.lock().unwrap();
        let text = String::from_utf8_lossy(&written);
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), r#"#SOFTWAREID "1.50" "test-agent""#);
        assert_eq!(lines.next().unwrap(), r#"#NOTFOUND "e1" "/tmp/a.dat""#);
    }

    #[tokio::test]
    async fn malformed_line_aborts_the_stream() {
        let store: Arc<dyn ObjectStoreAdapter> = Arc::new(InMemoryStore::new());
        let config = config(Function::Backup);
        let input = b"#SOFTWAREID \"1.50\" \"test-agent\"\n#SAVE \"/tmp/a.dat\"\n".to_vec();
        let result = run(config, store, &input[..], SharedVec::default()).await;
        assert!(matches!(result, Err(EngineError::Malformed(_))));
    }

    #[tokio::test]
    async fn a_session_with_no_software_id_dispatches_its_first_line_normally() {
        let store: Arc<dyn ObjectStoreAdapter> = Arc::new(InMemoryStore::new());
        let config = config(Function::Inquire);
        let input = b"#EBID \"e1\" \"/tmp/a.dat\"\n".to_vec();
        let output = SharedVec::default();
        let observe = output.clone();
        run(config, store, &input[..], output).await.unwrap();

        let written = observe.0.lock().unwrap();
        let text = String::from_utf8_lossy(&written);
        let mut lines = text.lines();
        assert_eq!(lines.next().unwrap(), r#"#NOTFOUND "e1" "/tmp/a.dat""#);
        assert!(lines.next().is_none());
    }
}
