//! Pinning backends.
//!
//! This module defines the [`UploadBackend`] trait that every storage service
//! adapter implements, along with the request and response types shared by
//! the pipeline and the adapters.
//!
//! # Module layout
//!
//! - [`pinata`] -- Pinata pinning API.
//! - [`nft_storage`] -- NFT.Storage upload API.
//! - `multipart` -- Streaming multipart bodies with byte-level progress.

mod multipart;
pub mod nft_storage;
pub mod pinata;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pinforge_common::{ContentAddress, Error, Result, UploadOptions};
use reqwest::Client;
use serde::de::DeserializeOwned;

use crate::config::{BackendConfig, BackendKind};
use crate::progress::ProgressSink;

pub use nft_storage::NftStorageBackend;
pub use pinata::PinataBackend;

/// Connection timeout for backend API requests.
///
/// Whole-request deadlines are enforced by the pipeline per call.
const CONNECTION_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// A directory tree to upload as one content-addressed batch.
///
/// `entries` are paths relative to `root`; only they are sent, so the caller
/// controls exactly what the batch contains.
#[derive(Debug, Clone)]
pub struct DirectoryUpload {
    pub root: PathBuf,
    pub entries: Vec<PathBuf>,
    pub options: UploadOptions,
}

impl DirectoryUpload {
    pub fn new(root: impl Into<PathBuf>, entries: Vec<PathBuf>, options: UploadOptions) -> Self {
        Self {
            root: root.into(),
            entries,
            options,
        }
    }

    /// `(relative, absolute)` pairs for every entry.
    pub fn files(&self) -> impl Iterator<Item = (&Path, PathBuf)> + '_ {
        self.entries
            .iter()
            .map(move |rel| (rel.as_path(), self.root.join(rel)))
    }
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

/// Result of a successful upload.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadReceipt {
    pub cid: ContentAddress,
    /// Size reported by the backend, if any.
    pub pin_size: Option<u64>,
    pub pinned_at: Option<DateTime<Utc>>,
    /// The backend already held identical content.
    pub duplicate: bool,
}

impl UploadReceipt {
    pub fn new(cid: ContentAddress) -> Self {
        Self {
            cid,
            pin_size: None,
            pinned_at: None,
            duplicate: false,
        }
    }
}

/// Pinning state reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PinState {
    Queued,
    Pinning,
    Pinned,
    Unpinned,
    Failed,
    Other(String),
}

impl PinState {
    pub fn parse(value: &str) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "queued" => Self::Queued,
            "pinning" => Self::Pinning,
            "pinned" => Self::Pinned,
            "unpinned" => Self::Unpinned,
            "failed" => Self::Failed,
            _ => Self::Other(value.to_string()),
        }
    }
}

impl std::fmt::Display for PinState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Queued => write!(f, "queued"),
            Self::Pinning => write!(f, "pinning"),
            Self::Pinned => write!(f, "pinned"),
            Self::Unpinned => write!(f, "unpinned"),
            Self::Failed => write!(f, "failed"),
            Self::Other(s) => write!(f, "{s}"),
        }
    }
}

/// Backend view of an uploaded tree.
#[derive(Debug, Clone, PartialEq)]
pub struct PinStatus {
    pub cid: ContentAddress,
    pub state: PinState,
    pub size: Option<u64>,
    pub name: Option<String>,
    pub created: Option<DateTime<Utc>>,
}

// ---------------------------------------------------------------------------
// Backend trait
// ---------------------------------------------------------------------------

/// Async trait that all pinning backends must implement.
///
/// Backends are shared behind an `Arc` between the pipeline phases.
#[async_trait]
pub trait UploadBackend: Send + Sync {
    /// Short, lowercase identifier for this backend (e.g. `"pinata"`).
    fn name(&self) -> &'static str;

    /// Upload the entries of a directory as one batch and return its address.
    async fn upload_directory(
        &self,
        upload: &DirectoryUpload,
        progress: Option<ProgressSink>,
    ) -> Result<UploadReceipt>;

    /// Upload a single file.
    async fn upload_file(
        &self,
        path: &Path,
        options: &UploadOptions,
        progress: Option<ProgressSink>,
    ) -> Result<UploadReceipt>;

    /// Pin status of `cid`, or `None` when the backend cannot tell.
    async fn status(&self, _cid: &ContentAddress) -> Result<Option<PinStatus>> {
        Ok(None)
    }

    /// Stop pinning `cid`.
    async fn unpin(&self, cid: &ContentAddress) -> Result<()>;
}

/// Create the backend selected by `config`.
pub fn create_backend(config: &BackendConfig) -> Arc<dyn UploadBackend> {
    match config.kind {
        BackendKind::Pinata => Arc::new(PinataBackend::new(&config.pinata)),
        BackendKind::NftStorage => Arc::new(NftStorageBackend::new(&config.nft_storage)),
    }
}

// ---------------------------------------------------------------------------
// Shared HTTP helpers
// ---------------------------------------------------------------------------

fn http_client() -> Client {
    Client::builder()
        .connect_timeout(CONNECTION_TIMEOUT)
        .build()
        .unwrap_or_else(|e| {
            tracing::warn!("Failed to build HTTP client with timeout: {}", e);
            Client::new()
        })
}

/// Map a transport failure (no response or unreadable body).
fn transport_error(context: &str, err: reqwest::Error) -> Error {
    Error::backend(err.status().map(|s| s.as_u16()), format!("{context}: {err}"))
}

/// Turn a non-2xx response into a backend error carrying its body.
async fn check_status(context: &str, response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(Error::backend(
        Some(status.as_u16()),
        format!("{context}: {}", body.trim()),
    ))
}

/// Decode the JSON body of a response that was received.
///
/// A body that does not match is a permanent failure, so the error keeps the
/// response status.
async fn read_json<T: DeserializeOwned>(context: &str, response: reqwest::Response) -> Result<T> {
    let status = response.status().as_u16();
    let body = response
        .bytes()
        .await
        .map_err(|e| transport_error(context, e))?;
    serde_json::from_slice(&body).map_err(|e| {
        Error::backend(
            Some(status),
            format!("{context}: unexpected response body: {e}"),
        )
    })
}

fn parse_timestamp(value: Option<&str>) -> Option<DateTime<Utc>> {
    value
        .and_then(|v| DateTime::parse_from_rfc3339(v).ok())
        .map(|dt| dt.with_timezone(&Utc))
}
