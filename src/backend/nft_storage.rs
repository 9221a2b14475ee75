//! NFT.Storage backend.
//!
//! `POST /upload` takes a multipart body of `file` parts and returns the CID
//! of the wrapping directory. Status and deletion address the CID directly.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use pinforge_common::{ContentAddress, Error, Result, UploadOptions};
use reqwest::multipart::Form;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::{debug, info};

use super::multipart::{attach_files, collect_files};
use super::{
    check_status, http_client, parse_timestamp, read_json, transport_error, DirectoryUpload,
    PinState, PinStatus, UploadBackend, UploadReceipt,
};
use crate::config::NftStorageConfig;
use crate::progress::ProgressSink;

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    ok: bool,
    value: Option<T>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadValue {
    cid: String,
    size: Option<u64>,
    created: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatusValue {
    cid: String,
    size: Option<u64>,
    created: Option<String>,
    pin: Option<PinValue>,
}

#[derive(Debug, Deserialize)]
struct PinValue {
    status: String,
    name: Option<String>,
}

impl<T> Envelope<T> {
    /// The payload, or the API's own error message. `status` is the HTTP
    /// status the envelope arrived with.
    fn into_value(self, context: &str, status: u16) -> Result<T> {
        match (self.ok, self.value) {
            (true, Some(value)) => Ok(value),
            _ => Err(Error::backend(
                Some(status),
                format!(
                    "{context}: {}",
                    self.error
                        .and_then(|e| e.message)
                        .unwrap_or_else(|| "response without value".to_string())
                ),
            )),
        }
    }
}

/// NFT.Storage backend authenticated with an API token.
pub struct NftStorageBackend {
    client: Client,
    base_url: String,
    token: String,
}

impl NftStorageBackend {
    pub fn new(config: &NftStorageConfig) -> Self {
        Self {
            client: http_client(),
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.token.clone(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_upload(&self, form: Form, context: &str) -> Result<UploadReceipt> {
        let response = self
            .client
            .post(self.url("/upload"))
            .bearer_auth(&self.token)
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;

        let response = check_status(context, response).await?;
        let status = response.status().as_u16();
        let envelope: Envelope<UploadValue> = read_json(context, response).await?;
        let value = envelope.into_value(context, status)?;

        Ok(UploadReceipt {
            cid: ContentAddress::new(value.cid),
            pin_size: value.size,
            pinned_at: parse_timestamp(value.created.as_deref()),
            duplicate: false,
        })
    }
}

#[async_trait]
impl UploadBackend for NftStorageBackend {
    fn name(&self) -> &'static str {
        "nft_storage"
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

        // NFT.Storage always produces CIDv1 and has no batch label.
        debug!(
            label = %upload.options.label,
            cid_version = u8::from(upload.options.cid_version),
            "NFT.Storage ignores label and CID version"
        );

        let entries: Vec<(String, PathBuf)> = upload
            .files()
            .map(|(rel, abs)| (rel.to_string_lossy().replace('\\', "/"), abs))
            .collect();
        let files = collect_files(entries).await?;

        info!("Storing {} files on NFT.Storage", files.len());
        let form = Form::new().percent_encode_noop();
        let (form, tracker) = attach_files(form, "file", files, progress);

        let receipt = self
            .post_upload(form, "NFT.Storage directory upload failed")
            .await?;
        tracker.finish();
        Ok(receipt)
    }

    async fn upload_file(
        &self,
        path: &Path,
        _options: &UploadOptions,
        progress: Option<ProgressSink>,
    ) -> Result<UploadReceipt> {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .ok_or_else(|| Error::invalid_input(format!("not a file path: {:?}", path)))?;

        let files = collect_files(vec![(name, path.to_path_buf())]).await?;
        let (form, tracker) = attach_files(Form::new(), "file", files, progress);

        let receipt = self
            .post_upload(form, "NFT.Storage file upload failed")
            .await?;
        tracker.finish();
        Ok(receipt)
    }

    async fn status(&self, cid: &ContentAddress) -> Result<Option<PinStatus>> {
        let context = "NFT.Storage status failed";
        let response = self
            .client
            .get(self.url(&format!("/{}", cid)))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }

        let response = check_status(context, response).await?;
        let status = response.status().as_u16();
        let envelope: Envelope<StatusValue> = read_json(context, response).await?;
        let value = envelope.into_value(context, status)?;

        let (state, name) = match value.pin {
            Some(pin) => (PinState::parse(&pin.status), pin.name),
            None => (PinState::Other("unknown".to_string()), None),
        };

        Ok(Some(PinStatus {
            cid: ContentAddress::new(value.cid),
            state,
            size: value.size,
            name,
            created: parse_timestamp(value.created.as_deref()),
        }))
    }

    async fn unpin(&self, cid: &ContentAddress) -> Result<()> {
        let context = "NFT.Storage delete failed";
        let response = self
            .client
            .delete(self.url(&format!("/{}", cid)))
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| transport_error(context, e))?;

        check_status(context, response).await?;
        info!("Deleted {} from NFT.Storage", cid);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envelope_value() {
        let env: Envelope<UploadValue> =
            serde_json::from_str(r#"{"ok":true,"value":{"cid":"bafy","size":10}}"#).unwrap();
        let value = env.into_value("ctx", 200).unwrap();
        assert_eq!(value.cid, "bafy");
        assert_eq!(value.size, Some(10));
    }

    #[test]
    fn envelope_error() {
        let env: Envelope<UploadValue> =
            serde_json::from_str(r#"{"ok":false,"error":{"name":"HTTPError","message":"quota"}}"#)
                .unwrap();
        let err = env.into_value("upload failed", 200).unwrap_err();
        assert_eq!(err.to_string(), "Backend error (200): upload failed: quota");
        assert!(!err.is_retryable());
    }
}
