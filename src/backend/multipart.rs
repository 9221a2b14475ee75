//! Multipart bodies whose file parts are streamed from disk and report
//! progress as they are sent.
//!
//! Only file sizes are read up front. Each file is opened when the transport
//! reaches its part, so a batch never holds more than one descriptor or one
//! chunk in memory.

use std::path::PathBuf;
use std::sync::Arc;

use bytes::Bytes;
use futures::{stream, TryStreamExt};
use pinforge_common::{Error, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Body;
use tokio::fs::File;
use tokio_util::io::ReaderStream;

use crate::progress::{ProgressSink, ProgressTracker};

/// Size of the reads handed to the transport.
const CHUNK_SIZE: usize = 64 * 1024;

/// A file queued for upload, with the name it carries in the form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct FilePart {
    pub name: String,
    pub path: PathBuf,
    pub len: u64,
}

/// Stat every `(form name, path)` pair. Contents are not read here.
pub(super) async fn collect_files(files: Vec<(String, PathBuf)>) -> Result<Vec<FilePart>> {
    let mut parts = Vec::with_capacity(files.len());
    for (name, path) in files {
        let metadata = tokio::fs::metadata(&path).await?;
        if !metadata.is_file() {
            return Err(Error::invalid_input(format!("not a regular file: {:?}", path)));
        }
        parts.push(FilePart {
            name,
            path,
            len: metadata.len(),
        });
    }
    Ok(parts)
}

/// Attach `files` to `form` under `field`, returning the form and its tracker.
pub(super) fn attach_files(
    mut form: Form,
    field: &'static str,
    files: Vec<FilePart>,
    sink: Option<ProgressSink>,
) -> (Form, Arc<ProgressTracker>) {
    let total = files.iter().map(|f| f.len).sum();
    let tracker = Arc::new(ProgressTracker::new(total, sink));

    for file in files {
        let part = Part::stream_with_length(file_body(file.path, tracker.clone()), file.len)
            .file_name(file.name);
        form = form.part(field, part);
    }

    (form, tracker)
}

fn file_body(path: PathBuf, tracker: Arc<ProgressTracker>) -> Body {
    let chunks = stream::once(File::open(path))
        .map_ok(|file| ReaderStream::with_capacity(file, CHUNK_SIZE))
        .try_flatten()
        .inspect_ok(move |chunk: &Bytes| tracker.advance(chunk.len() as u64));

    Body::wrap_stream(chunks)
}
