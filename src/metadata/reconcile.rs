//! Stub/asset reconciliation.
//!
//! Produces exactly one staged record per asset: the stub's fields with the
//! phase-one `image` URI merged over them, or the URI alone when the stub is
//! absent or unusable. Missing stubs are collected and summarized once.

use std::path::PathBuf;
use std::sync::Arc;

use futures::stream::{self, StreamExt, TryStreamExt};
use pinforge_common::{ContentAddress, Result};
use tracing::{debug, info, warn};

use crate::assets::Asset;

use super::store::{MetadataStore, StubError, UploadRecord};

/// Base names of assets staged without a stub, in asset order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MissingMetadata {
    names: Vec<String>,
}

impl MissingMetadata {
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    /// Operator-facing summary, or `None` when nothing is missing.
    ///
    /// Above `threshold` only the count is given; at or below it the names
    /// are listed.
    pub fn summary(&self, threshold: usize) -> Option<String> {
        if self.names.is_empty() {
            None
        } else if self.names.len() > threshold {
            Some(format!(
                "{} metadata not found, please check",
                self.names.len()
            ))
        } else {
            Some(format!(
                "Metadata not found, please check: {:?}",
                self.names
            ))
        }
    }
}

impl FromIterator<String> for MissingMetadata {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().collect(),
        }
    }
}

/// A record written to the staging directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedRecord {
    pub base_name: String,
    /// Name of the record inside the staging directory.
    pub file_name: String,
    pub path: PathBuf,
}

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Default)]
pub struct ReconcileReport {
    /// One entry per input asset, in asset order.
    pub staged: Vec<StagedRecord>,
    pub missing: MissingMetadata,
}

impl ReconcileReport {
    /// Record file names relative to the staging directory.
    pub fn staged_names(&self) -> Vec<PathBuf> {
        self.staged
            .iter()
            .map(|r| PathBuf::from(&r.file_name))
            .collect()
    }
}

struct AssetOutcome {
    staged: StagedRecord,
    stub_found: bool,
}

/// Merges stubs with the phase-one content address.
#[derive(Debug, Clone)]
pub struct Reconciler {
    store: Arc<MetadataStore>,
    missing_threshold: usize,
    concurrency: usize,
}

impl Reconciler {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self {
            store,
            missing_threshold: 5,
            concurrency: 1,
        }
    }

    pub fn with_missing_threshold(mut self, threshold: usize) -> Self {
        self.missing_threshold = threshold;
        self
    }

    /// Process up to `concurrency` assets at once. Values below 1 mean sequential.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn store(&self) -> &MetadataStore {
        &self.store
    }

    /// Stage one record per asset.
    ///
    /// A write failure aborts the pass; missing or malformed stubs never do.
    pub async fn reconcile(
        &self,
        assets: &[Asset],
        content_address: &ContentAddress,
    ) -> Result<ReconcileReport> {
        info!("Importing {} files...", assets.len());

        let outcomes = if self.concurrency <= 1 {
            let mut outcomes = Vec::with_capacity(assets.len());
            for asset in assets {
                outcomes.push(self.reconcile_one(asset, content_address).await?);
            }
            outcomes
        } else {
            let mut indexed: Vec<(usize, AssetOutcome)> = stream::iter(assets.iter().enumerate())
                .map(|(idx, asset)| async move {
                    self.reconcile_one(asset, content_address)
                        .await
                        .map(|outcome| (idx, outcome))
                })
                .buffer_unordered(self.concurrency)
                .try_collect()
                .await?;
            indexed.sort_by_key(|(idx, _)| *idx);
            indexed.into_iter().map(|(_, outcome)| outcome).collect()
        };

        let mut report = ReconcileReport::default();
        let mut missing = Vec::new();
        for outcome in outcomes {
            if !outcome.stub_found {
                missing.push(outcome.staged.base_name.clone());
            }
            report.staged.push(outcome.staged);
        }
        report.missing = missing.into_iter().collect();

        if let Some(summary) = report.missing.summary(self.missing_threshold) {
            warn!("{}", summary);
        }
        info!(
            "Metadata created: {} records in {:?}",
            report.staged.len(),
            self.store.staging_dir()
        );

        Ok(report)
    }

    async fn reconcile_one(
        &self,
        asset: &Asset,
        content_address: &ContentAddress,
    ) -> Result<AssetOutcome> {
        let image_uri = content_address.uri_for(&asset.file_name);

        let (record, stub_found) = match self.store.read_stub(&asset.base_name).await {
            Ok(stub) => (UploadRecord::from_stub(stub, image_uri), true),
            Err(StubError::Missing(path)) => {
                debug!("No metadata for {} (looked for {:?})", asset.base_name, path);
                (UploadRecord::image_only(image_uri), false)
            }
            Err(e) => {
                warn!("Treating {} as missing metadata: {}", asset.base_name, e);
                (UploadRecord::image_only(image_uri), false)
            }
        };

        let path = self.store.write_record(&asset.base_name, &record).await?;
        debug!("Staged {:?}", path);

        Ok(AssetOutcome {
            staged: StagedRecord {
                base_name: asset.base_name.clone(),
                file_name: asset.base_name.clone(),
                path,
            },
            stub_found,
        })
    }
}
