// SPDX-License-Identifier: MIT OR Apache-2.0
//! End-to-end self-check: drives every handler against the configured
//! bucket using real scratch files, exercising duplicate-version ordering
//! and the `#NULL`/absent-handle corners each function's tests can't reach
//! on their own, then confirms the bucket and scratch directory are clean.

use crate::cancel::CancelToken;
use crate::config::BackintConfiguration;
use crate::handlers::{backup, delete, inquire, restore};
use crate::naming::{self, Target};
use crate::response::Response;
use async_trait::async_trait;
use backint_store::{BackupObject, BoxedReader, BoxedWriter, BucketAttrs, Encryption, ObjectStoreAdapter, StoreError};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;

/// Outcome of one diagnostic step.
#[derive(Debug, Clone)]
pub struct DiagnoseStep {
    /// Short name of the step, e.g. `"save-dup-1"`.
    pub name: &'static str,
    /// Whether the step produced the response it was expected to.
    pub ok: bool,
    /// Free-form detail for operator-facing output.
    pub detail: String,
}

/// Full self-check result: one entry per step, in execution order.
#[derive(Debug, Clone, Default)]
pub struct DiagnoseReport {
    /// Every step attempted, successes and failures alike.
    pub steps: Vec<DiagnoseStep>,
}

impl DiagnoseReport {
    /// `true` if every step succeeded.
    pub fn all_passed(&self) -> bool {
        self.steps.iter().all(|s| s.ok)
    }
}

/// Default size of the scratch file registered twice to exercise
/// duplicate-version ordering.
pub const DEFAULT_DUP_FILE_SIZE: u64 = 1024 * 1024 * 1024;
/// Default size of the second scratch file, registered once.
pub const DEFAULT_LARGE_FILE_SIZE: u64 = 16 * 1024 * 1024 * 1024;

/// Run the self-check against `store` with the production default scratch
/// sizes (1 GiB / 16 GiB, both sparsely allocated).
pub async fn run(config: &BackintConfiguration, store: Arc<dyn ObjectStoreAdapter>) -> DiagnoseReport {
    run_with_sizes(config, store, DEFAULT_DUP_FILE_SIZE, DEFAULT_LARGE_FILE_SIZE).await
}

/// Run the self-check with caller-chosen scratch sizes. Exposed so callers
/// that want a faster check (or tests) can shrink the defaults; the wire
/// behaviour exercised is identical regardless of file size.
///
/// Two local scratch files are created, sparsely, in [`std::env::temp_dir`]:
/// `dup_path` is registered twice so two versions of the same logical path
/// coexist, and `large_path` is registered once. Backup, Inquire, Restore,
/// and Delete are each driven directly against `store`, including the
/// duplicate-version `#NULL` ordering check, a `#PIPE` against a path that
/// was never created, and one absent-handle probe per phase against a
/// store that always reports itself unavailable. Every local scratch file
/// is removed on every exit path, and every step failing still lets later
/// steps run so one report shows every problem at once.
pub async fn run_with_sizes(
    config: &BackintConfiguration,
    store: Arc<dyn ObjectStoreAdapter>,
    dup_file_size: u64,
    large_file_size: u64,
) -> DiagnoseReport {
    let mut report = DiagnoseReport::default();

    let dup_path = scratch_path("dup-source");
    let large_path = scratch_path("large-source");
    let missing_path = scratch_path("never-saved");
    let pipe_probe_path = scratch_path("pipe-probe");
    let dest_dup_1 = scratch_path("restored-dup-1");
    let dest_dup_2 = scratch_path("restored-dup-2");
    let dest_dup_latest = scratch_path("restored-dup-latest");
    let dest_large = scratch_path("restored-large");

    let cleanup = ScratchGuard {
        paths: vec![
            dup_path.clone(),
            large_path.clone(),
            dest_dup_1.clone(),
            dest_dup_2.clone(),
            dest_dup_latest.clone(),
            dest_large.clone(),
        ],
    };

    if let Err(err) = create_sparse_file(&dup_path, dup_file_size).await {
        report.steps.push(step_fail("prepare-dup-scratch-file", format!("{err}")));
        return report;
    }
    if let Err(err) = create_sparse_file(&large_path, large_file_size).await {
        report.steps.push(step_fail("prepare-large-scratch-file", format!("{err}")));
        return report;
    }

    let cancel = CancelToken::new();
    let unavailable_store = UnavailableStore;

    // --- Backup phase ---------------------------------------------------

    let dup_ebid_1 = match save_and_check(&mut report, &*store, config, &cancel, "save-dup-1", &dup_path, dup_file_size).await {
        Some(ebid) => ebid,
        None => return finish(report, cleanup),
    };
    tokio::time::sleep(std::time::Duration::from_millis(2)).await;
    let dup_ebid_2 = match save_and_check(&mut report, &*store, config, &cancel, "save-dup-2", &dup_path, dup_file_size).await {
        Some(ebid) => ebid,
        None => return finish(report, cleanup),
    };
    let large_ebid = match save_and_check(&mut report, &*store, config, &cancel, "save-large", &large_path, large_file_size).await {
        Some(ebid) => ebid,
        None => return finish(report, cleanup),
    };

    let pipe_responses = backup::handle(&*store, config, Encryption::None, &cancel, true, pipe_probe_path.clone(), "4".to_string()).await;
    match pipe_responses.first() {
        Some(Response::Error { .. }) => report.steps.push(step_ok("pipe-against-missing-path", "correctly reported #ERROR".into())),
        other => report.steps.push(step_fail("pipe-against-missing-path", format!("expected #ERROR, got {other:?}"))),
    }

    // --- Inquire phase ----------------------------------------------------

    for (name, ebid, path) in [
        ("inquire-dup-1", &dup_ebid_1, &dup_path),
        ("inquire-dup-2", &dup_ebid_2, &dup_path),
        ("inquire-large", &large_ebid, &large_path),
    ] {
        let responses = inquire::handle_ebid(&*store, config, ebid.clone(), path.clone(), false).await;
        match responses.first() {
            Some(Response::Backup { ebid: found, .. }) if found == ebid => {
                report.steps.push(step_ok(name, format!("found {ebid}")));
            }
            other => report.steps.push(step_fail(name, format!("unexpected response: {other:?}"))),
        }
    }

    let dup_versions = inquire::handle_null(&*store, config, dup_path.clone(), true).await;
    match &dup_versions[..] {
        [Response::Backup {
            ebid: newest,
            created_at: Some(newest_ts),
            ..
        }, Response::Backup {
            ebid: oldest,
            created_at: Some(oldest_ts),
            ..
        }] if newest == &dup_ebid_2 && oldest == &dup_ebid_1 && newest_ts > oldest_ts => {
            report.steps.push(step_ok("null-inquire-duplicate-versions", "newest-first, strictly decreasing timestamps".into()));
        }
        other => report.steps.push(step_fail("null-inquire-duplicate-versions", format!("unexpected response: {other:?}"))),
    }

    let missing_inquire = inquire::handle_null(&*store, config, missing_path.clone(), false).await;
    match missing_inquire.first() {
        Some(Response::NotFound { .. }) => report.steps.push(step_ok("null-inquire-missing-path", "correctly reported #NOTFOUND".into())),
        other => report.steps.push(step_fail("null-inquire-missing-path", format!("unexpected response: {other:?}"))),
    }

    let absent_handle_inquire = inquire::handle_null(&unavailable_store, config, missing_path.clone(), false).await;
    match absent_handle_inquire.first() {
        Some(Response::Error { .. }) => report.steps.push(step_ok("null-inquire-absent-handle", "correctly reported #ERROR".into())),
        other => report.steps.push(step_fail("null-inquire-absent-handle", format!("unexpected response: {other:?}"))),
    }

    // --- Restore phase ------------------------------------------------

    restore_and_check(&mut report, &*store, config, &cancel, "restore-dup-1", &dup_ebid_1, &dup_path, &dest_dup_1).await;
    restore_and_check(&mut report, &*store, config, &cancel, "restore-dup-2", &dup_ebid_2, &dup_path, &dest_dup_2).await;
    restore_and_check(&mut report, &*store, config, &cancel, "restore-large", &large_ebid, &large_path, &dest_large).await;

    let latest_responses = restore::handle(
        &*store,
        config,
        &cancel,
        restore::Lookup::Latest,
        dup_path.clone(),
        Some(dest_dup_latest.clone()),
    )
    .await;
    match latest_responses.first() {
        Some(Response::Restored { ebid, .. }) if *ebid == dup_ebid_2 => {
            report.steps.push(step_ok("null-restore-newest-wins", format!("restored newest version {ebid}")));
        }
        other => report.steps.push(step_fail("null-restore-newest-wins", format!("unexpected response: {other:?}"))),
    }

    let missing_restore = restore::handle(&*store, config, &cancel, restore::Lookup::Latest, missing_path.clone(), None).await;
    match missing_restore.first() {
        Some(Response::NotFound { .. }) => report.steps.push(step_ok("null-restore-missing-path", "correctly reported #NOTFOUND".into())),
        other => report.steps.push(step_fail("null-restore-missing-path", format!("unexpected response: {other:?}"))),
    }

    let absent_handle_restore = restore::handle(&unavailable_store, config, &cancel, restore::Lookup::Latest, missing_path.clone(), None).await;
    match absent_handle_restore.first() {
        Some(Response::Error { .. }) => report.steps.push(step_ok("null-restore-absent-handle", "correctly reported #ERROR".into())),
        other => report.steps.push(step_fail("null-restore-absent-handle", format!("unexpected response: {other:?}"))),
    }

    // --- Delete phase -------------------------------------------------

    for (name, ebid, path) in [
        ("delete-dup-1", dup_ebid_1.clone(), dup_path.clone()),
        ("delete-dup-2", dup_ebid_2.clone(), dup_path.clone()),
        ("delete-large", large_ebid.clone(), large_path.clone()),
    ] {
        let responses = delete::handle_ebid(&*store, config, ebid, path).await;
        match responses.first() {
            Some(Response::Deleted { .. }) => report.steps.push(step_ok(name, "removed".into())),
            other => report.steps.push(step_fail(name, format!("unexpected response: {other:?}"))),
        }
    }

    for (name, ebid, path) in [
        ("delete-dup-1-second-pass", dup_ebid_1.clone(), dup_path.clone()),
        ("delete-dup-2-second-pass", dup_ebid_2.clone(), dup_path.clone()),
        ("delete-large-second-pass", large_ebid.clone(), large_path.clone()),
    ] {
        let responses = delete::handle_ebid(&*store, config, ebid, path).await;
        match responses.first() {
            Some(Response::NotFound { .. }) => report.steps.push(step_ok(name, "already gone".into())),
            other => report.steps.push(step_fail(name, format!("unexpected response: {other:?}"))),
        }
    }

    let absent_handle_delete = delete::handle_ebid(&unavailable_store, config, dup_ebid_1.clone(), dup_path.clone()).await;
    match absent_handle_delete.first() {
        Some(Response::Error { .. }) => report.steps.push(step_ok("delete-absent-handle", "correctly reported #ERROR".into())),
        other => report.steps.push(step_fail("delete-absent-handle", format!("unexpected response: {other:?}"))),
    }

    // --- Cleanup verification ------------------------------------------

    for (name, path) in [("cleanup-verify-dup-path", &dup_path), ("cleanup-verify-large-path", &large_path)] {
        let prefix = naming::object_prefix(config, path, Target::Primary);
        match store.list(&prefix).await {
            Ok(objects) if objects.is_empty() => report.steps.push(step_ok(name, "no objects left under this prefix".into())),
            Ok(objects) => report.steps.push(step_fail(name, format!("{} objects still present", objects.len()))),
            Err(err) => report.steps.push(step_fail(name, format!("failed to verify cleanup: {err}"))),
        }
    }

    finish(report, cleanup)
}

fn finish(report: DiagnoseReport, cleanup: ScratchGuard) -> DiagnoseReport {
    info!(passed = report.all_passed(), steps = report.steps.len(), "diagnose run complete");
    drop(cleanup);
    report
}

async fn save_and_check(
    report: &mut DiagnoseReport,
    store: &dyn ObjectStoreAdapter,
    config: &BackintConfiguration,
    cancel: &CancelToken,
    name: &'static str,
    path: &str,
    expected_size: u64,
) -> Option<String> {
    let responses = backup::handle(store, config, Encryption::None, cancel, false, path.to_string(), expected_size.to_string()).await;
    match responses.first() {
        Some(Response::Saved { ebid, size, .. }) if *size == expected_size => {
            report.steps.push(step_ok(name, format!("saved as {ebid}")));
            Some(ebid.clone())
        }
        other => {
            report.steps.push(step_fail(name, format!("unexpected response: {other:?}")));
            None
        }
    }
}

async fn restore_and_check(
    report: &mut DiagnoseReport,
    store: &dyn ObjectStoreAdapter,
    config: &BackintConfiguration,
    cancel: &CancelToken,
    name: &'static str,
    ebid: &str,
    path: &str,
    dest: &str,
) {
    let responses = restore::handle(
        store,
        config,
        cancel,
        restore::Lookup::Ebid(ebid.to_string()),
        path.to_string(),
        Some(dest.to_string()),
    )
    .await;
    match responses.first() {
        Some(Response::Restored { .. }) => match tokio::fs::metadata(dest).await {
            Ok(meta) => match tokio::fs::metadata(path).await {
                Ok(source_meta) if source_meta.len() == meta.len() => {
                    report.steps.push(step_ok(name, "restored file size matched the original".into()));
                }
                Ok(source_meta) => report.steps.push(step_fail(
                    name,
                    format!("restored size {} did not match original size {}", meta.len(), source_meta.len()),
                )),
                Err(err) => report.steps.push(step_fail(name, format!("could not stat original scratch file: {err}"))),
            },
            Err(err) => report.steps.push(step_fail(name, format!("could not stat restored file: {err}"))),
        },
        other => report.steps.push(step_fail(name, format!("unexpected response: {other:?}"))),
    }
}

async fn create_sparse_file(path: &str, size: u64) -> std::io::Result<()> {
    let file = tokio::fs::File::create(path).await?;
    file.set_len(size).await
}

fn scratch_path(label: &str) -> String {
    std::env::temp_dir()
        .join(format!("backint-diagnose-{label}-{}.dat", naming::generate_ebid()))
        .to_string_lossy()
        .into_owned()
}

fn step_ok(name: &'static str, detail: String) -> DiagnoseStep {
    DiagnoseStep { name, ok: true, detail }
}

fn step_fail(name: &'static str, detail: String) -> DiagnoseStep {
    DiagnoseStep { name, ok: false, detail }
}

struct ScratchGuard {
    paths: Vec<String>,
}

impl Drop for ScratchGuard {
    fn drop(&mut self) {
        for path in &self.paths {
            let _ = std::fs::remove_file(path);
        }
    }
}

/// A bucket handle that is never reachable, used to exercise the
/// "handle absent" error path without needing a real outage.
struct UnavailableStore;

#[async_trait]
impl ObjectStoreAdapter for UnavailableStore {
    async fn open_reader(&self, _key: &str) -> Result<(BoxedReader, u64, BTreeMap<String, String>), StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn open_writer(
        &self,
        _key: &str,
        _metadata: BTreeMap<String, String>,
        _chunk_size: usize,
        _encryption: Encryption,
    ) -> Result<BoxedWriter, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn list(&self, _prefix: &str) -> Result<Vec<BackupObject>, StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn delete(&self, _key: &str) -> Result<(), StoreError> {
        Err(StoreError::Unavailable)
    }

    async fn attrs(&self) -> Result<BucketAttrs, StoreError> {
        Err(StoreError::Unavailable)
    }
}
