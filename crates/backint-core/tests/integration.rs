// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end coverage of the dispatcher against an in-memory bucket,
//! exercising each function as a fresh invocation the way a real caller
//! would run it.

use backint_core::config::{BackintConfiguration, EncryptionConfig, Function, RetryBackoff};
use backint_core::dispatcher::run;
use backint_core::error::EngineError;
use backint_store::ObjectStoreAdapter;
use backint_store_mock::InMemoryStore;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncWrite;

#[derive(Clone, Default)]
struct SharedVec(Arc<Mutex<Vec<u8>>>);

impl SharedVec {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }
}

impl AsyncWrite for SharedVec {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }
    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

fn config(function: Function) -> Arc<BackintConfiguration> {
    Arc::new(BackintConfiguration {
        user_id: "user1".into(),
        bucket: "primary-bucket".into(),
        recovery_bucket: None,
        folder_prefix: Some("backup".into()),
        recovery_folder_prefix: None,
        function,
        threads: 4,
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

async fn run_lines(config: Arc<BackintConfiguration>, store: Arc<dyn ObjectStoreAdapter>, lines: &str) -> (Result<(), EngineError>, String) {
    let output = SharedVec::default();
    let observe = output.clone();
    let result = run(config, store, lines.as_bytes(), output).await;
    (result, observe.text())
}

#[tokio::test]
async fn save_then_restore_round_trips_the_original_bytes() {
    let store: Arc<dyn ObjectStoreAdapter> = Arc::new(InMemoryStore::new());
    let source = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(source.path(), b"round trip payload").unwrap();

    let save_lines = format!(
        "#SOFTWAREID \"1.50\" \"integration-test\"\n#SAVE \"{}\" 19\n",
        source.path().display()
    );
    let (result, out) = run_lines(config(Function::Backup), store.clone(), &save_lines).await;
    result.unwrap();
    let saved_line = out.lines().nth(1).unwrap();
    assert!(saved_line.starts_with("#SAVED "));
    let ebid = saved_line.split('"').nth(1).unwrap().to_string();

    let dest = tempfile::NamedTempFile::new().unwrap();
    let restore_lines = format!(
        "#SOFTWAREID \"1.50\" \"integration-test\"\n#EBID \"{ebid}\" \"{}\" \"{}\"\n",
        source.path().display(),
        dest.path().display()
    );
    let (result, out) = run_lines(config(Function::Restore), store, &restore_lines).await;
    result.unwrap();
    assert!(out.lines().nth(1).unwrap().starts_with("#RESTORED "));
    assert_eq!(std::fs::read(dest.path()).unwrap(), b"round trip payload");
}

#[tokio::test]
async fn extended_null_inquire_lists_every_backup_newest_first() {
    let store: Arc<dyn ObjectStoreAdapter> = Arc::new(InMemoryStore::new());
    let source = tempfile::NamedTempFile::new().unwrap();

    for payload in ["first", "second-copy"] {
        std::fs::write(source.path(), payload.as_bytes()).unwrap();
        let lines = format!(
            "#SOFTWAREID \"1.50\" \"integration-test\"\n#SAVE \"{}\" {}\n",
            source.path().display(),
            payload.len()
        );
        run_lines(config(Function::Backup), store.clone(), &lines).await.0.unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
    }

    let inquire_lines = format!(
        "#SOFTWAREID \"1.50\" \"integration-test\"\n#NULL \"{}\"\n",
        source.path().display()
    );
    let (result, out) = run_lines(config(Function::Inquire), store, &inquire_lines).await;
    result.unwrap();
    let backup_lines: Vec<&str> = out.lines().skip(1).collect();
    assert_eq!(backup_lines.len(), 2, "one #BACKUP line per saved object: {backup_lines:?}");
    for line in &backup_lines {
        assert!(line.starts_with("#BACKUP "));
        assert!(
            line.matches('"').count() == 6,
            "extended format quotes ebid, path, and timestamp: {line}"
        );
    }

    // #NULL against a path with no saved backups reports #NOTFOUND.
    let empty_store: Arc<dyn ObjectStoreAdapter> = Arc::new(InMemoryStore::new());
    let empty_lines = "#SOFTWAREID \"1.50\" \"integration-test\"\n#NULL \"/no/such/path\"\n";
    let (result, out) = run_lines(config(Function::Inquire), empty_store, empty_lines).await;
    result.unwrap();
    assert_eq!(out.lines().nth(1).unwrap(), r#"#NOTFOUND "/no/such/path""#);
}

#[tokio::test]
async fn pipe_against_a_missing_path_reports_error_not_panic() {
    let store: Arc<dyn ObjectStoreAdapter> = Arc::new(InMemoryStore::new());
    let lines = "#SOFTWAREID \"1.50\" \"integration-test\"\n#PIPE \"/no/such/pipe\" 4\n";
    let (result, out) = run_lines(config(Function::Backup), store, lines).await;
    result.unwrap();
    assert_eq!(out.lines().nth(1).unwrap(), r#"#ERROR "/no/such/pipe""#);
}

#[tokio::test]
async fn a_lone_save_with_no_software_id_line_still_saves() {
    let store: Arc<dyn ObjectStoreAdapter> = Arc::new(InMemoryStore::new());
    let source = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(source.path(), b"no header at all").unwrap();

    let lines = format!("#SAVE \"{}\" 17\n", source.path().display());
    let (result, out) = run_lines(config(Function::Backup), store, &lines).await;
    result.unwrap();
    assert!(out.lines().next().unwrap().starts_with("#SAVED "));
}

#[tokio::test]
async fn a_lone_null_with_no_software_id_line_still_inquires() {
    let store: Arc<dyn ObjectStoreAdapter> = Arc::new(InMemoryStore::new());
    let lines = "#NULL \"/no/such/path\"\n";
    let (result, out) = run_lines(config(Function::Inquire), store, lines).await;
    result.unwrap();
    assert_eq!(out.lines().next().unwrap(), r#"#NOTFOUND "/no/such/path""#);
}

#[tokio::test]
async fn a_lone_pipe_with_no_software_id_line_reports_error_not_panic() {
    let store: Arc<dyn ObjectStoreAdapter> = Arc::new(InMemoryStore::new());
    let lines = "#PIPE \"/no/such/pipe\" 4\n";
    let (result, out) = run_lines(config(Function::Backup), store, lines).await;
    result.unwrap();
    assert_eq!(out.lines().next().unwrap(), r#"#ERROR "/no/such/pipe""#);
}

#[tokio::test]
async fn a_lone_ebid_with_no_software_id_line_still_inquires() {
    let store: Arc<dyn ObjectStoreAdapter> = Arc::new(InMemoryStore::new());
    let lines = "#EBID \"e1\" \"/tmp/a.dat\"\n";
    let (result, out) = run_lines(config(Function::Inquire), store, lines).await;
    result.unwrap();
    assert_eq!(out.lines().next().unwrap(), r#"#NOTFOUND "e1" "/tmp/a.dat""#);
}

#[tokio::test]
async fn delete_then_inquire_reports_not_found() {
    let store: Arc<dyn ObjectStoreAdapter> = Arc::new(InMemoryStore::new());
    let source = tempfile::NamedTempFile::new().unwrap();
    std::fs::write(source.path(), b"to be deleted").unwrap();

    let save_lines = format!(
        "#SOFTWAREID \"1.50\" \"integration-test\"\n#SAVE \"{}\" 13\n",
        source.path().display()
    );
    let (_, out) = run_lines(config(Function::Backup), store.clone(), &save_lines).await;
    let ebid = out.lines().nth(1).unwrap().split('"').nth(1).unwrap().to_string();

    let delete_lines = format!(
        "#SOFTWAREID \"1.50\" \"integration-test\"\n#EBID \"{ebid}\" \"{}\"\n",
        source.path().display()
    );
    let (result, out) = run_lines(config(Function::Delete), store.clone(), &delete_lines).await;
    result.unwrap();
    assert!(out.lines().nth(1).unwrap().starts_with("#DELETED "));

    let inquire_lines = format!(
        "#SOFTWAREID \"1.50\" \"integration-test\"\n#EBID \"{ebid}\" \"{}\"\n",
        source.path().display()
    );
    let (result, out) = run_lines(config(Function::Inquire), store, &inquire_lines).await;
    result.unwrap();
    assert_eq!(out.lines().nth(1).unwrap(), format!(r#"#NOTFOUND "{ebid}" "{}""#, source.path().display()));
}

#[tokio::test]
async fn retention_policy_blocks_delete_invocations_before_any_request_runs() {
    let store: Arc<dyn ObjectStoreAdapter> = Arc::new(InMemoryStore::with_retention_policy("locked for 30 days"));
    let lines = "#SOFTWAREID \"1.50\" \"integration-test\"\n#EBID \"e1\" \"/tmp/a.dat\"\n";
    let (result, out) = run_lines(config(Function::Delete), store, lines).await;
    assert!(matches!(result, Err(EngineError::RetentionPolicyActive(_))));
    assert!(out.is_empty(), "no response should be written once preflight rejects the invocation");
}
