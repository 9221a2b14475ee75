use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use pinforge_common::paths::{EntryFilter, IgnoreList};
use pinforge_common::{CidVersion, ContentAddress, Error, Result, UploadOptions};
use tracing::{info, warn};

use crate::assets::{list_assets, Asset};
use crate::backend::{DirectoryUpload, UploadBackend, UploadReceipt};
use crate::config::{Config, ResolvedLayout};
use crate::metadata::{MetadataStore, ReconcileReport, Reconciler};
use crate::progress::ProgressSink;

use super::retry::{call_with_policy, CallPolicy};

/// Step of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    UploadingMedia,
    Reconciling,
    UploadingMetadata,
}

impl Phase {
    fn as_str(&self) -> &'static str {
        match self {
            Phase::UploadingMedia => "upload medias",
            Phase::Reconciling => "create metadata",
            Phase::UploadingMetadata => "upload metadata",
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle of a [`Pipeline`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Idle,
    Running(Phase),
    Done,
    Failed(Phase),
}

/// Builds the progress sink for an upload phase.
pub type ProgressFactory = Arc<dyn Fn(Phase) -> ProgressSink + Send + Sync>;

/// Result of a completed run.
#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub media: UploadReceipt,
    pub metadata: UploadReceipt,
    pub report: ReconcileReport,
}

impl PipelineOutcome {
    pub fn media_cid(&self) -> &ContentAddress {
        &self.media.cid
    }

    pub fn metadata_cid(&self) -> &ContentAddress {
        &self.metadata.cid
    }
}

/// Two-phase upload: media, then one metadata record per media file.
pub struct Pipeline {
    layout: ResolvedLayout,
    backend: Arc<dyn UploadBackend>,
    reconciler: Reconciler,
    filter: Arc<dyn EntryFilter>,
    policy: CallPolicy,
    cid_version: CidVersion,
    check_status: bool,
    progress: Option<ProgressFactory>,
    state: Mutex<PipelineState>,
    history: Mutex<Vec<PipelineState>>,
}

impl Pipeline {
    /// Pipeline over `layout` with default settings.
    pub fn new(layout: ResolvedLayout, backend: Arc<dyn UploadBackend>) -> Self {
        let store = MetadataStore::new(&layout.metadata_dir, &layout.staging_dir);
        Self {
            reconciler: Reconciler::new(Arc::new(store)),
            layout,
            backend,
            filter: IgnoreList::default().into_filter(),
            policy: CallPolicy::default(),
            cid_version: CidVersion::default(),
            check_status: true,
            progress: None,
            state: Mutex::new(PipelineState::Idle),
            history: Mutex::new(vec![PipelineState::Idle]),
        }
    }

    /// Pipeline configured from a loaded [`Config`].
    ///
    /// Relative layout paths resolve against `layout.base_dir` when the config
    /// sets one (the CLI's `--dir` is written there), otherwise against
    /// `base_dir`.
    pub fn from_config(config: &Config, base_dir: &Path, backend: Arc<dyn UploadBackend>) -> Self {
        let layout = config.layout.resolve(base_dir);
        let store = MetadataStore::new(&layout.metadata_dir, &layout.staging_dir)
            .with_pretty(config.reconcile.pretty);
        let reconciler = Reconciler::new(Arc::new(store))
            .with_missing_threshold(config.reconcile.missing_threshold)
            .with_concurrency(config.reconcile.concurrency);

        Self {
            reconciler,
            filter: IgnoreList::new(config.layout.ignore.iter().cloned()).into_filter(),
            policy: CallPolicy::from(&config.upload),
            cid_version: config.upload.cid_version,
            check_status: config.upload.check_status,
            ..Self::new(layout, backend)
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn EntryFilter>) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_policy(mut self, policy: CallPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_reconciler(mut self, reconciler: Reconciler) -> Self {
        self.reconciler = reconciler;
        self
    }

    pub fn with_status_check(mut self, enabled: bool) -> Self {
        self.check_status = enabled;
        self
    }

    pub fn with_progress(mut self, factory: ProgressFactory) -> Self {
        self.progress = Some(factory);
        self
    }

    pub fn layout(&self) -> &ResolvedLayout {
        &self.layout
    }

    pub fn state(&self) -> PipelineState {
        *self.state.lock()
    }

    /// Every state entered so far, starting with `Idle`.
    pub fn history(&self) -> Vec<PipelineState> {
        self.history.lock().clone()
    }

    fn enter(&self, state: PipelineState) {
        *self.state.lock() = state;
        self.history.lock().push(state);
    }

    /// Run all phases for `collection`.
    ///
    /// The first failing phase aborts the run; nothing already uploaded or
    /// staged is rolled back.
    pub async fn run(&self, collection: &str) -> Result<PipelineOutcome> {
        let collection = collection.trim();
        if collection.is_empty() {
            return Err(Error::invalid_input("collection name cannot be empty"));
        }

        let mut phase = Phase::UploadingMedia;
        let result = self.run_phases(collection, &mut phase).await;

        match &result {
            Ok(outcome) => {
                self.enter(PipelineState::Done);
                info!(
                    media = %outcome.media.cid,
                    metadata = %outcome.metadata.cid,
                    "Collection '{}' uploaded",
                    collection
                );
            }
            Err(e) => {
                self.enter(PipelineState::Failed(phase));
                warn!("Pipeline aborted during {}: {}", phase, e);
            }
        }

        result
    }

    async fn run_phases(&self, collection: &str, phase: &mut Phase) -> Result<PipelineOutcome> {
        *phase = Phase::UploadingMedia;
        self.enter(PipelineState::Running(*phase));

        let assets = list_assets(&self.layout.media_dir, self.filter.clone()).await?;
        if assets.is_empty() {
            return Err(Error::invalid_input(format!(
                "no media files in {:?}",
                self.layout.media_dir
            )));
        }

        let media_upload = DirectoryUpload::new(
            &self.layout.media_dir,
            assets.iter().map(|a| PathBuf::from(&a.file_name)).collect(),
            UploadOptions::new(format!("{collection} : medias"), self.cid_version),
        );
        info!("Uploading {} files...", assets.len());
        let media = self.upload(&media_upload, *phase).await?;
        info!("Content IPFS hash: {}", media.cid);
        self.report_status(&media.cid).await;

        *phase = Phase::Reconciling;
        self.enter(PipelineState::Running(*phase));
        let report = self.reconciler.reconcile(&assets, &media.cid).await?;

        *phase = Phase::UploadingMetadata;
        self.enter(PipelineState::Running(*phase));
        let metadata_upload = DirectoryUpload::new(
            &self.layout.staging_dir,
            report.staged_names(),
            UploadOptions::new(format!("{collection} : metadata"), self.cid_version),
        );
        info!("Storing {} metadata files...", report.staged.len());
        let metadata = self.upload(&metadata_upload, *phase).await?;
        info!("Metadata IPFS hash: {}", metadata.cid);
        self.report_status(&metadata.cid).await;

        Ok(PipelineOutcome {
            media,
            metadata,
            report,
        })
    }

    /// Reconcile only, against the address of an earlier media upload.
    pub async fn stage(&self, media_cid: &ContentAddress) -> Result<(Vec<Asset>, ReconcileReport)> {
        self.enter(PipelineState::Running(Phase::Reconciling));

        let result = async {
            let assets = list_assets(&self.layout.media_dir, self.filter.clone()).await?;
            let report = self.reconciler.reconcile(&assets, media_cid).await?;
            Ok::<_, Error>((assets, report))
        }
        .await;

        self.enter(match &result {
            Ok(_) => PipelineState::Done,
            Err(_) => PipelineState::Failed(Phase::Reconciling),
        });
        result
    }

    async fn upload(&self, upload: &DirectoryUpload, phase: Phase) -> Result<UploadReceipt> {
        let progress = self.progress.as_ref().map(|factory| factory(phase));
        let backend = self.backend.clone();

        call_with_policy(&self.policy, phase.as_str(), || {
            let backend = backend.clone();
            let progress = progress.clone();
            async move { backend.upload_directory(upload, progress).await }
        })
        .await
    }

    /// Log the backend's pin status. Failures here never fail the run.
    async fn report_status(&self, cid: &ContentAddress) {
        if !self.check_status {
            return;
        }

        let backend = self.backend.clone();
        let status = call_with_policy(&self.policy, "pin status", || {
            let backend = backend.clone();
            async move { backend.status(cid).await }
        })
        .await;

        match status {
            Ok(Some(status)) => info!(
                cid = %status.cid,
                state = %status.state,
                size = ?status.size,
                "Pin status"
            ),
            Ok(None) => {}
            Err(e) => warn!("Could not fetch pin status for {}: {}", cid, e),
        }
    }
}
