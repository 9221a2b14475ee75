//! Pinata pinning backend.
//!
//! Implements [`UploadBackend`] against the Pinata REST API:
//!
//! - `POST /pinning/pinFileToIPFS` for directory and single-file uploads.
//! - `GET /data/pinList?hashContains=` for pin status.
//! - `DELETE /pinning/unpin/{cid}` for unpinning.
//!
//! Directory uploads send every file as a `file` part named
//! `<label>/<relative path>`; Pinata wraps the common folder into one CID.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pinforge_common::{ContentAddress, Error, Result, UploadOptions};
use reqwest::multipart::Form;
use reqwest::{Client, RequestBuilder};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};

use super::multipart::{attach_files, collect_files};
use super::{
    check_status, http_client, parse_timestamp, read_json, transport_error, DirectoryUpload,
    PinState, PinStatus, UploadBackend, UploadReceipt,
};
use crate::config::PinataConfig;
use crate::progress::ProgressSink;

// ---------------------------------------------------------------------------
// Pinata API response types (private)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct PinFileResponse {
    ipfs_hash: String,
    pin_size: Option<u64>,
    timestamp: Option<String>,
    #[serde(rename = "isDuplicate", default)]
    is_duplicate: bool,
}

#[derive(Debug, Deserialize)]
struct PinListResponse {
    #[serde(default)]
    rows: Vec<PinListRow>,
}

#[derive(Debug, Deserialize)]
struct PinListRow {
    ipfs_pin_hash: String,
    size: Option<u64>,
    date_pinned: Option<String>,
    date_unpinned: Option<String>,
    metadata: Option<PinListMetadata>,
}

#[derive(Debug, Deserialize)]
struct PinListMetadata {
    name: Option<String>,
}

// ---------------------------------------------------------------------------
// Backend implementation
// ---------------------------------------------------------------------------

enum Credentials {
    Keys { api_key: String, api_secret: String },
    Jwt(String),
}

/// Pinata pinning backend.
///
/// # Examples
///
/// ```no_run
/// use pinforge::backend::PinataBackend;
/// use pinforge::config::PinataConfig;
///
/// let backend = PinataBackend::new(&PinataConfig {
///     api_key: "key".into(),
///     api_secret: "secret".into(),
///     ..Default::default()
/// });
/// ```
pub struct PinataBackend {
    client: Client,
    base_url: String,
    credentials: Credentials,
}

impl PinataBackend {
    pub fn new(config: &PinataConfig) -> Self {
        let credentials = match config.jwt.as_deref() {
            Some(jwt) if !jwt.is_empty() => Credentials::Jwt(jwt.to_string()),
            _ => Credentials::Keys {
                api_key: config.api_key.clone(),
                api_secret: config.api_secret.clone(),
            },
        };

        Self {
            client: http_client(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            credentials,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.credentials {
            Credentials::Keys {
                api_key,
                api_secret,
            } => request
                .header("pinata_api_key", api_key)
                .header("pinata_secret_api_key", api_secret),
            Credentials::Jwt(token) => request.bearer_auth(token),
        }
    }

    fn base_form(options: &UploadOptions) -> Form {
        Form::new()
            .percent_encode_noop()
            .text(
                "pinataMetadata",
                json!({ "name": options.label }).to_string(),
            )
            .text(
                "pinataOptions",
                json!({ "cidVersion": u8::from(options.cid_version) }).to_string(),
            )
    }

    async fn pin_form(&self, form: Form, context: &str) -> Result<UploadReceipt> {
        let response = self
            .authorize(self.client.post(self.url("/pinning/pinFileToIPFS")))
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;

        let response = check_status(context, response).await?;
        let body: PinFileResponse = read_json(context, response).await?;

        Ok(UploadReceipt {
            cid: ContentAddress::new(body.ipfs_hash),
            pin_size: body.pin_size,
            pinned_at: parse_timestamp(body.timestamp.as_deref()),
            duplicate: body.is_duplicate,
        })
    }
}

#[async_trait]
impl UploadBackend for PinataBackend {
    fn name(&self) -> &'static str {
        "pinata"
    }

    async fn upload_directory(
        &self,
        upload: &DirectoryUpload,
        progress: Option<ProgressSink>,
    ) -> Result<UploadReceipt> {
        if upload.entries.is_empty() {
            return Err(Error::invalid_input(format!(
                "nothing to upload in {:?}",
                upload.root
            )));
        }

        let folder = upload.options.label.as_str();
        let entries: Vec<(String, PathBuf)> = upload
            .files()
            .map(|(rel, abs)| {
                (
                    format!("{}/{}", folder, rel.to_string_lossy().replace('\\', "/")),
                    abs,
                )
            })
            .collect();
        let files = collect_files(entries).await?;

        info!(
            "Uploading {} files to Pinata as '{}'",
            files.len(),
            upload.options.label
        );
        let (form, tracker) = attach_files(Self::base_form(&upload.options), "file", files, progress);

        let receipt = self.pin_form(form, "Pinata directory upload failed").await?;
        tracker.finish();

        debug!(cid = %receipt.cid, duplicate = receipt.duplicate, "Pinata upload complete");
        Ok(receipt)
    }

    async fn upload_file(
        &self,
        path: &Path,
        options: &UploadOptions,
        progress: Option<ProgressSink>,
    ) -> Result<UploadReceipt> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::invalid_input(format!("not a file path: {:?}", path)))?;

        let files = collect_files(vec![(name, path.to_path_buf())]).await?;
        let (form, tracker) = attach_files(Self::base_form(options), "file", files, progress);

        let receipt = self.pin_form(form, "Pinata file upload failed").await?;
        tracker.finish();
        Ok(receipt)
    }

    async fn status(&self, cid: &ContentAddress) -> Result<Option<PinStatus>> {
        let context = "Pinata pin list failed";
        let response = self
            .authorize(self.client.get(self.url("/data/pinList")))
            .query(&[("hashContains", cid.as_str()), ("status", "all")])
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;

        let response = check_status(context, response).await?;
        let list: PinListResponse = read_json(context, response).await?;

        let status = list
            .rows
            .into_iter()
            .find(|row| row.ipfs_pin_hash == cid.as_str())
            .map(|row| PinStatus {
                cid: cid.clone(),
                state: if row.date_unpinned.is_some() {
                    PinState::Unpinned
                } else {
                    PinState::Pinned
                },
                size: row.size,
                name: row.metadata.and_then(|m| m.name),
                created: parse_timestamp(row.date_pinned.as_deref()),
            });

        Ok(status)
    }

    async fn unpin(&self, cid: &ContentAddress) -> Result<()> {
        let context = "Pinata unpin failed";
        let response = self
            .authorize(
                self.client
                    .delete(self.url(&format!("/pinning/unpin/{}", cid))),
            )
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;

        check_status(context, response).await?;
        info!("Unpinned {} from Pinata", cid);
        Ok(())
    }
}
