use pinforge_common::CidVersion;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub layout: LayoutConfig,

    #[serde(default)]
    pub reconcile: ReconcileConfig,

    #[serde(default)]
    pub upload: UploadConfig,

    #[serde(default)]
    pub backend: BackendConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LayoutConfig {
    /// Directory the other three are resolved against (default: working directory)
    #[serde(default)]
    pub base_dir: Option<PathBuf>,

    #[serde(default = "default_media_dir")]
    pub media_dir: PathBuf,

    #[serde(default = "default_metadata_dir")]
    pub metadata_dir: PathBuf,

    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    /// Exact file names skipped when listing directories
    #[serde(default = "default_ignore")]
    pub ignore: Vec<String>,
}

fn default_media_dir() -> PathBuf {
    PathBuf::from("images")
}
fn default_metadata_dir() -> PathBuf {
    PathBuf::from("metadata")
}
fn default_staging_dir() -> PathBuf {
    PathBuf::from("upload")
}
fn default_ignore() -> Vec<String> {
    pinforge_common::paths::DEFAULT_IGNORED
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            base_dir: None,
            media_dir: default_media_dir(),
            metadata_dir: default_metadata_dir(),
            staging_dir: default_staging_dir(),
            ignore: default_ignore(),
        }
    }
}

impl LayoutConfig {
    /// Resolve the three directories against `base_dir` (or `fallback` when unset).
    pub fn resolve(&self, fallback: &Path) -> ResolvedLayout {
        let base = self.base_dir.as_deref().unwrap_or(fallback);
        ResolvedLayout {
            media_dir: base.join(&self.media_dir),
            metadata_dir: base.join(&self.metadata_dir),
            staging_dir: base.join(&self.staging_dir),
        }
    }
}

/// Absolute-or-relative directory triple used by a single run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLayout {
    pub media_dir: PathBuf,
    pub metadata_dir: PathBuf,
    pub staging_dir: PathBuf,
}

impl ResolvedLayout {
    /// All three directories as siblings of `base`.
    pub fn under(base: &Path) -> Self {
        LayoutConfig::default().resolve(base)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReconcileConfig {
    /// Above this many missing stubs only the count is reported
    #[serde(default = "default_missing_threshold")]
    pub missing_threshold: usize,

    /// Number of assets processed at once (1 = sequential)
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Write staged records with indentation
    #[serde(default)]
    pub pretty: bool,
}

fn default_missing_threshold() -> usize {
    5
}
fn default_concurrency() -> usize {
    1
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            missing_threshold: default_missing_threshold(),
            concurrency: default_concurrency(),
            pretty: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UploadConfig {
    #[serde(default)]
    pub cid_version: CidVersion,

    /// Deadline for a single backend call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Extra attempts for retryable backend failures
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial backoff, doubled after every failed attempt
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,

    /// Ask the backend for pin status after each upload
    #[serde(default = "default_check_status")]
    pub check_status: bool,
}

fn default_timeout_secs() -> u64 {
    300
}
fn default_max_retries() -> u32 {
    2
}
fn default_retry_backoff_ms() -> u64 {
    500
}
fn default_check_status() -> bool {
    true
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            cid_version: CidVersion::default(),
            timeout_secs: default_timeout_secs(),
            max_retries: default_max_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            check_status: default_check_status(),
        }
    }
}

impl UploadConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub kind: BackendKind,

    #[serde(default)]
    pub pinata: PinataConfig,

    #[serde(default)]
    pub nft_storage: NftStorageConfig,
}

#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Pinata,
    NftStorage,
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendKind::Pinata => write!(f, "pinata"),
            BackendKind::NftStorage => write!(f, "nft_storage"),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PinataConfig {
    #[serde(default = "default_pinata_url")]
    pub api_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default)]
    pub api_secret: String,

    /// Bearer token, used instead of the key/secret pair when set
    #[serde(default)]
    pub jwt: Option<String>,
}

fn default_pinata_url() -> String {
    "https://api.pinata.cloud".to_string()
}

impl Default for PinataConfig {
    fn default() -> Self {
        Self {
            api_url: default_pinata_url(),
            api_key: String::new(),
            api_secret: String::new(),
            jwt: None,
        }
    }
}

impl PinataConfig {
    pub fn has_credentials(&self) -> bool {
        self.jwt.as_deref().is_some_and(|t| !t.is_empty())
            || (!self.api_key.is_empty() && !self.api_secret.is_empty())
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NftStorageConfig {
    #[serde(default = "default_nft_storage_url")]
    pub api_url: String,

    #[serde(default)]
    pub token: String,
}

fn default_nft_storage_url() -> String {
    "https://api.nft.storage".to_string()
}

impl Default for NftStorageConfig {
    fn default() -> Self {
        Self {
            api_url: default_nft_storage_url(),
            token: String::new(),
        }
    }
}
