//! Core types shared between the pipeline and the backends.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque identifier returned by a backend for an uploaded tree.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentAddress(String);

impl ContentAddress {
    pub fn new<S: Into<String>>(cid: S) -> Self {
        Self(cid.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Retrieval URI of a file inside the uploaded tree.
    ///
    /// # Examples
    ///
    /// ```
    /// use pinforge_common::ContentAddress;
    ///
    /// let cid = ContentAddress::new("CID1");
    /// assert_eq!(cid.uri_for("b.png"), "ipfs://CID1/b.png");
    /// ```
    pub fn uri_for(&self, file_name: &str) -> String {
        format!("ipfs://{}/{}", self.0, file_name)
    }
}

impl fmt::Display for ContentAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for ContentAddress {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ContentAddress {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Content-addressing version selector passed through to the backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum CidVersion {
    V0,
    #[default]
    V1,
}

impl TryFrom<u8> for CidVersion {
    type Error = String;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::V0),
            1 => Ok(Self::V1),
            other => Err(format!("unsupported CID version: {other}")),
        }
    }
}

impl From<CidVersion> for u8 {
    fn from(v: CidVersion) -> Self {
        match v {
            CidVersion::V0 => 0,
            CidVersion::V1 => 1,
        }
    }
}

/// Options attached to a single upload batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadOptions {
    /// Human-readable label shown by the backend for this batch.
    pub label: String,
    pub cid_version: CidVersion,
}

impl UploadOptions {
    pub fn new<S: Into<String>>(label: S, cid_version: CidVersion) -> Self {
        Self {
            label: label.into(),
            cid_version,
        }
    }
}
