//! Media asset enumeration.
//!
//! Lists the files of a source directory (non-recursively), skipping entries
//! rejected by an [`EntryFilter`], and pairs each with its base name.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use pinforge_common::paths::{base_name, EntryFilter};
use pinforge_common::{Error, Result};
use tracing::{debug, info};
use walkdir::WalkDir;

/// A media file discovered in the source directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Asset {
    /// File name without anything from the first `.` on.
    pub base_name: String,
    /// File name as found on disk (used in the `image` URI).
    pub file_name: String,
    pub path: PathBuf,
    pub extension: Option<String>,
}

impl Asset {
    pub fn from_path(path: PathBuf) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_string());
        Some(Self {
            base_name: base_name(&file_name).to_string(),
            file_name,
            path,
            extension,
        })
    }
}

/// List the regular files directly inside `dir`, in filesystem order.
///
/// Returns the full paths of entries not rejected by `filter`.
pub async fn list_files(dir: &Path, filter: Arc<dyn EntryFilter>) -> Result<Vec<PathBuf>> {
    if !tokio::fs::try_exists(dir).await? {
        return Err(Error::DirectoryNotFound(dir.to_path_buf()));
    }

    let root = dir.to_path_buf();
    tokio::task::spawn_blocking(move || walk_files(&root, filter.as_ref()))
        .await
        .map_err(|e| Error::Io(std::io::Error::other(e)))?
}

fn walk_files(dir: &Path, filter: &dyn EntryFilter) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir)
        .follow_links(true)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
    {
        let entry = entry.map_err(std::io::Error::from)?;
        let name = entry.file_name().to_string_lossy();

        if filter.is_ignored(&name) {
            debug!("Skipping ignored entry: {}", name);
            continue;
        }

        if !entry.file_type().is_file() {
            debug!("Skipping non-file entry: {:?}", entry.path());
            continue;
        }

        files.push(entry.into_path());
    }

    Ok(files)
}

/// Enumerate the media assets of `source_dir`.
///
/// Fails with [`Error::DuplicateAsset`] when two files share a base name,
/// since both would stage the same record.
pub async fn list_assets(source_dir: &Path, filter: Arc<dyn EntryFilter>) -> Result<Vec<Asset>> {
    let files = list_files(source_dir, filter).await?;

    let mut seen: HashMap<String, String> = HashMap::with_capacity(files.len());
    let mut assets = Vec::with_capacity(files.len());

    for path in files {
        let Some(asset) = Asset::from_path(path.clone()) else {
            return Err(Error::invalid_input(format!(
                "media file name is not valid UTF-8: {:?}",
                path
            )));
        };

        if let Some(first) = seen.insert(asset.base_name.clone(), asset.file_name.clone()) {
            return Err(Error::DuplicateAsset {
                base_name: asset.base_name,
                first,
                second: asset.file_name,
            });
        }

        assets.push(asset);
    }

    info!("Found {} media files in {:?}", assets.len(), source_dir);
    Ok(assets)
}
