//! Pipeline integration tests
//!
//! Runs the two-phase upload against an in-memory backend over a temporary
//! collection directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use assert_matches::assert_matches;
use async_trait::async_trait;
use parking_lot::Mutex;
use pinforge::backend::{DirectoryUpload, UploadBackend, UploadReceipt};
use pinforge::config::ResolvedLayout;
use pinforge::pipeline::{CallPolicy, Phase, Pipeline, PipelineState};
use pinforge::progress::{ProgressSink, UploadProgress};
use pinforge_common::{ContentAddress, Error, Result, UploadOptions};
use tempfile::{tempdir, TempDir};

// ---------------------------------------------------------------------------
// Fake backend
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
struct RecordedUpload {
    root: PathBuf,
    label: String,
    entries: Vec<String>,
}

#[derive(Default)]
struct FakeBackend {
    uploads: Mutex<Vec<RecordedUpload>>,
    /// Errors keyed by the 1-based call that returns them.
    failures: Mutex<Vec<(usize, Error)>>,
    delay: Option<Duration>,
}

impl FakeBackend {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn failing_at(call: usize, error: Error) -> Arc<Self> {
        Arc::new(Self {
            failures: Mutex::new(vec![(call, error)]),
            ..Default::default()
        })
    }

    fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Default::default()
        })
    }

    fn uploads(&self) -> Vec<RecordedUpload> {
        self.uploads.lock().clone()
    }
}

#[async_trait]
impl UploadBackend for FakeBackend {
    fn name(&self) -> &'static str {
        "fake"
    }

    async fn upload_directory(
        &self,
        upload: &DirectoryUpload,
        progress: Option<ProgressSink>,
    ) -> Result<UploadReceipt> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        let mut entries: Vec<String> = upload
            .entries
            .iter()
            .map(|p| p.to_string_lossy().to_string())
            .collect();
        entries.sort();

        let index = {
            let mut uploads = self.uploads.lock();
            uploads.push(RecordedUpload {
                root: upload.root.clone(),
                label: upload.options.label.clone(),
                entries,
            });
            uploads.len()
        };

        {
            let mut failures = self.failures.lock();
            if let Some(pos) = failures.iter().position(|(call, _)| *call == index) {
                return Err(failures.remove(pos).1);
            }
        }

        if let Some(sink) = progress {
            sink(UploadProgress {
                bytes_sent: 1,
                total_bytes: 1,
            });
        }

        Ok(UploadReceipt::new(ContentAddress::new(format!(
            "CID{index}"
        ))))
    }

    async fn upload_file(
        &self,
        _path: &Path,
        _options: &UploadOptions,
        _progress: Option<ProgressSink>,
    ) -> Result<UploadReceipt> {
        Err(Error::invalid_input("not used"))
    }

    async fn unpin(&self, _cid: &ContentAddress) -> Result<()> {
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn collection(media: &[&str], stubs: &[(&str, &str)]) -> TempDir {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("images")).unwrap();
    fs::create_dir_all(dir.path().join("metadata")).unwrap();
    for name in media {
        fs::write(dir.path().join("images").join(name), b"pixels").unwrap();
    }
    for (name, body) in stubs {
        fs::write(dir.path().join("metadata").join(name), body).unwrap();
    }
    dir
}

fn fast_policy() -> CallPolicy {
    CallPolicy {
        timeout: Duration::from_secs(5),
        max_retries: 2,
        initial_backoff: Duration::from_millis(1),
    }
}

fn pipeline(dir: &TempDir, backend: Arc<FakeBackend>) -> Pipeline {
    Pipeline::new(ResolvedLayout::under(dir.path()), backend)
        .with_policy(fast_policy())
        .with_status_check(false)
}

fn staged(dir: &TempDir, name: &str) -> String {
    fs::read_to_string(dir.path().join("upload").join(name)).unwrap()
}

// ---------------------------------------------------------------------------
// Full runs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn two_phase_run_stages_one_record_per_asset() {
    let dir = collection(&["a.png", "b.png"], &[("a.json", r#"{"name":"A"}"#)]);
    let backend = FakeBackend::new();
    let pipeline = pipeline(&dir, backend.clone());

    let outcome = pipeline.run("Test").await.unwrap();

    assert_eq!(outcome.media_cid().as_str(), "CID1");
    assert_eq!(outcome.metadata_cid().as_str(), "CID2");
    assert_eq!(
        staged(&dir, "a"),
        "{\"name\":\"A\",\"image\":\"ipfs://CID1/a.png\"}\n"
    );
    assert_eq!(staged(&dir, "b"), "{\"image\":\"ipfs://CID1/b.png\"}\n");
    assert_eq!(outcome.report.missing.names(), ["b".to_string()]);

    let uploads = backend.uploads();
    assert_eq!(uploads.len(), 2);
    assert_eq!(uploads[0].label, "Test : medias");
    assert_eq!(uploads[0].root, dir.path().join("images"));
    assert_eq!(uploads[0].entries, ["a.png", "b.png"]);
    assert_eq!(uploads[1].label, "Test : metadata");
    assert_eq!(uploads[1].root, dir.path().join("upload"));
    assert_eq!(uploads[1].entries, ["a", "b"]);
}

#[tokio::test]
async fn state_walks_through_every_phase() {
    let dir = collection(&["a.png"], &[]);
    let pipeline = pipeline(&dir, FakeBackend::new());
    assert_eq!(pipeline.state(), PipelineState::Idle);

    pipeline.run("Test").await.unwrap();

    assert_eq!(pipeline.state(), PipelineState::Done);
    assert_eq!(
        pipeline.history(),
        vec![
            PipelineState::Idle,
            PipelineState::Running(Phase::UploadingMedia),
            PipelineState::Running(Phase::Reconciling),
            PipelineState::Running(Phase::UploadingMetadata),
            PipelineState::Done,
        ]
    );
}

#[tokio::test]
async fn metadata_batch_matches_media_count() {
    let media: Vec<String> = (0..10).map(|i| format!("{i}.png")).collect();
    let media: Vec<&str> = media.iter().map(String::as_str).collect();
    let stubs: Vec<(String, String)> = (0..7)
        .map(|i| (format!("{i}.json"), format!(r#"{{"edition":{i}}}"#)))
        .collect();
    let stubs: Vec<(&str, &str)> = stubs
        .iter()
        .map(|(n, b)| (n.as_str(), b.as_str()))
        .collect();

    let dir = collection(&media, &stubs);
    // Leftover from an earlier run, not part of this batch.
    fs::create_dir_all(dir.path().join("upload")).unwrap();
    fs::write(dir.path().join("upload").join("stale"), "{}").unwrap();

    let backend = FakeBackend::new();
    let outcome = pipeline(&dir, backend.clone()).run("Ten").await.unwrap();

    assert_eq!(outcome.report.staged.len(), 10);
    assert_eq!(outcome.report.missing.len(), 3);
    assert_eq!(backend.uploads()[1].entries.len(), 10);
    assert!(!backend.uploads()[1].entries.contains(&"stale".to_string()));
}

#[tokio::test]
async fn ignored_entries_are_not_uploaded() {
    let dir = collection(&["a.png", ".DS_Store"], &[]);
    let backend = FakeBackend::new();

    let outcome = pipeline(&dir, backend.clone()).run("Test").await.unwrap();

    assert_eq!(backend.uploads()[0].entries, ["a.png"]);
    assert_eq!(outcome.report.staged.len(), 1);
}

#[tokio::test]
async fn progress_factory_sees_both_upload_phases() {
    let dir = collection(&["a.png"], &[]);
    let phases = Arc::new(Mutex::new(Vec::new()));
    let seen = phases.clone();

    let pipeline = pipeline(&dir, FakeBackend::new()).with_progress(Arc::new(move |phase: Phase| {
        seen.lock().push(phase);
        Arc::new(|_: UploadProgress| {}) as ProgressSink
    }));
    pipeline.run("Test").await.unwrap();

    assert_eq!(
        *phases.lock(),
        vec![Phase::UploadingMedia, Phase::UploadingMetadata]
    );
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn media_failure_aborts_before_reconciling() {
    let dir = collection(&["a.png"], &[("a.json", r#"{"name":"A"}"#)]);
    let backend = FakeBackend::failing_at(1, Error::backend(Some(401), "bad key"));
    let pipeline = pipeline(&dir, backend.clone());

    let result = pipeline.run("Test").await;

    assert_matches!(result, Err(Error::Backend { status: Some(401), .. }));
    assert_eq!(pipeline.state(), PipelineState::Failed(Phase::UploadingMedia));
    assert_eq!(backend.uploads().len(), 1);
    assert!(!dir.path().join("upload").exists());
}

#[tokio::test]
async fn media_timeout_aborts_the_run() {
    let dir = collection(&["a.png"], &[]);
    let backend = FakeBackend::slow(Duration::from_secs(10));
    let pipeline = Pipeline::new(ResolvedLayout::under(dir.path()), backend)
        .with_status_check(false)
        .with_policy(CallPolicy {
            timeout: Duration::from_millis(50),
            max_retries: 3,
            initial_backoff: Duration::from_millis(1),
        });

    let result = pipeline.run("Test").await;

    assert_matches!(result, Err(Error::Timeout { .. }));
    assert_eq!(pipeline.state(), PipelineState::Failed(Phase::UploadingMedia));
    assert!(!dir.path().join("upload").exists());
}

#[tokio::test]
async fn transient_failures_are_retried() {
    let dir = collection(&["a.png"], &[]);
    let backend = FakeBackend::failing_at(1, Error::backend(Some(503), "busy"));

    let outcome = pipeline(&dir, backend.clone()).run("Test").await;

    let outcome = tokio_test::assert_ok!(outcome);
    // One failed and one successful media call, then the metadata call.
    assert_eq!(backend.uploads().len(), 3);
    assert_eq!(outcome.metadata_cid().as_str(), "CID3");
}

#[tokio::test]
async fn metadata_failure_keeps_staged_records() {
    let dir = collection(&["a.png"], &[("a.json", r#"{"name":"A"}"#)]);
    let backend = FakeBackend::failing_at(2, Error::backend(Some(400), "too many files"));
    let pipeline = pipeline(&dir, backend.clone());

    let result = pipeline.run("Test").await;

    assert_matches!(result, Err(Error::Backend { status: Some(400), .. }));
    assert_eq!(
        pipeline.state(),
        PipelineState::Failed(Phase::UploadingMetadata)
    );
    assert_eq!(
        staged(&dir, "a"),
        "{\"name\":\"A\",\"image\":\"ipfs://CID1/a.png\"}\n"
    );
}

#[tokio::test]
async fn empty_collection_name_is_rejected() {
    let dir = collection(&["a.png"], &[]);
    let backend = FakeBackend::new();
    let pipeline = pipeline(&dir, backend.clone());

    assert_matches!(pipeline.run("  ").await, Err(Error::InvalidInput(_)));
    assert_eq!(pipeline.state(), PipelineState::Idle);
    assert!(backend.uploads().is_empty());
}

#[tokio::test]
async fn missing_media_directory_fails_first_phase() {
    let dir = tempdir().unwrap();
    let backend = FakeBackend::new();
    let pipeline = pipeline(&dir, backend.clone());

    assert_matches!(
        pipeline.run("Test").await,
        Err(Error::DirectoryNotFound(p)) if p == dir.path().join("images")
    );
    assert!(backend.uploads().is_empty());
}

#[tokio::test]
async fn empty_media_directory_is_rejected() {
    let dir = collection(&[], &[]);
    let backend = FakeBackend::new();

    assert_matches!(
        pipeline(&dir, backend.clone()).run("Test").await,
        Err(Error::InvalidInput(_))
    );
    assert!(backend.uploads().is_empty());
}

#[tokio::test]
async fn duplicate_base_names_fail_before_upload() {
    let dir = collection(&["a.png", "a.jpg"], &[]);
    let backend = FakeBackend::new();

    assert_matches!(
        pipeline(&dir, backend.clone()).run("Test").await,
        Err(Error::DuplicateAsset { base_name, .. }) if base_name == "a"
    );
    assert!(backend.uploads().is_empty());
}

// ---------------------------------------------------------------------------
// Stage only
// ---------------------------------------------------------------------------

#[tokio::test]
async fn stage_reconciles_without_uploading() {
    let dir = collection(&["a.png", "b.png"], &[("b.json", r#"{"name":"B"}"#)]);
    let backend = FakeBackend::new();
    let pipeline = pipeline(&dir, backend.clone());

    let (assets, report) = pipeline
        .stage(&ContentAddress::from("QmEarlier"))
        .await
        .unwrap();

    assert_eq!(assets.len(), 2);
    assert_eq!(report.missing.names(), ["a".to_string()]);
    assert_eq!(
        staged(&dir, "b"),
        "{\"name\":\"B\",\"image\":\"ipfs://QmEarlier/b.png\"}\n"
    );
    assert!(backend.uploads().is_empty());
    assert_eq!(pipeline.state(), PipelineState::Done);
}
