//! Local JSON storage for metadata stubs and staged upload records.
//!
//! Stubs are read from `{source_dir}/{base}.json`; records are written to
//! `{staging_dir}/{base}` (no extension), overwriting any previous run.

use std::path::{Path, PathBuf};

use pinforge_common::paths::stub_file_name;
use serde::Serialize;
use serde_json::{Map, Value};

/// Arbitrary key/value metadata loaded from a sidecar file.
pub type MetadataStub = Map<String, Value>;

/// Key that receives the media URI.
pub const IMAGE_KEY: &str = "image";

/// The phase-two document for a single asset.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct UploadRecord(Map<String, Value>);

impl UploadRecord {
    /// Merge `image_uri` over the stub. An existing `image` value is replaced
    /// in place; otherwise the key is appended after the stub's fields.
    pub fn from_stub(mut stub: MetadataStub, image_uri: String) -> Self {
        stub.insert(IMAGE_KEY.to_string(), Value::String(image_uri));
        Self(stub)
    }

    /// Record for an asset without a usable stub.
    pub fn image_only(image_uri: String) -> Self {
        Self::from_stub(Map::new(), image_uri)
    }

    pub fn image(&self) -> Option<&str> {
        self.0.get(IMAGE_KEY).and_then(Value::as_str)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Serialized file contents, newline terminated.
    pub fn to_bytes(&self, pretty: bool) -> serde_json::Result<Vec<u8>> {
        let mut bytes = if pretty {
            serde_json::to_vec_pretty(&self.0)?
        } else {
            serde_json::to_vec(&self.0)?
        };
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/// Why a stub could not be used.
#[derive(Debug, thiserror::Error)]
pub enum StubError {
    #[error("no metadata file at {}", .0.display())]
    Missing(PathBuf),

    #[error("cannot read {}: {source}", .path.display())]
    Unreadable {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("malformed metadata in {}: {reason}", .path.display())]
    Malformed { path: PathBuf, reason: String },
}

/// Reads stubs from one directory and writes records to another.
#[derive(Debug, Clone)]
pub struct MetadataStore {
    source_dir: PathBuf,
    staging_dir: PathBuf,
    pretty: bool,
}

impl MetadataStore {
    pub fn new(source_dir: impl Into<PathBuf>, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            staging_dir: staging_dir.into(),
            pretty: false,
        }
    }

    /// Write records with indentation.
    pub fn with_pretty(mut self, pretty: bool) -> Self {
        self.pretty = pretty;
        self
    }

    pub fn staging_dir(&self) -> &Path {
        &self.staging_dir
    }

    pub fn stub_path(&self, base_name: &str) -> PathBuf {
        self.source_dir.join(stub_file_name(base_name))
    }

    pub fn record_path(&self, base_name: &str) -> PathBuf {
        self.staging_dir.join(base_name)
    }

    /// Load the stub for `base_name`. Only JSON objects are accepted.
    pub async fn read_stub(&self, base_name: &str) -> Result<MetadataStub, StubError> {
        let path = self.stub_path(base_name);

        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StubError::Missing(path));
            }
            Err(source) => return Err(StubError::Unreadable { path, source }),
        };

        match serde_json::from_slice::<Value>(&bytes) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(StubError::Malformed {
                path,
                reason: format!("expected a JSON object, found {}", json_kind(&other)),
            }),
            Err(e) => Err(StubError::Malformed {
                path,
                reason: e.to_string(),
            }),
        }
    }

    /// Write `record` for `base_name`, creating the staging directory if needed.
    pub async fn write_record(
        &self,
        base_name: &str,
        record: &UploadRecord,
    ) -> pinforge_common::Result<PathBuf> {
        tokio::fs::create_dir_all(&self.staging_dir).await?;

        let path = self.record_path(base_name);
        let bytes = record.to_bytes(self.pretty).map_err(|e| {
            pinforge_common::Error::invalid_input(format!(
                "cannot serialize record {base_name}: {e}"
            ))
        })?;
        tokio::fs::write(&path, bytes).await?;

        Ok(path)
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
