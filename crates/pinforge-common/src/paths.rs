//! Path utilities for pairing media files with their metadata sidecars.
//!
//! Media, metadata stubs, and staged records share a base name:
//! `foo.png` pairs with `foo.json` and stages as `foo`.

use std::sync::Arc;

/// Housekeeping entries skipped by default.
pub const DEFAULT_IGNORED: &[&str] = &[".DS_Store"];

/// Extension used by metadata stubs.
pub const STUB_EXTENSION: &str = "json";

/// Derive the base name of a media file name.
///
/// The base name is everything before the first `.`. Names without a dot, or
/// whose first character is the dot, keep the whole file name so every file
/// still maps to a non-empty key.
///
/// # Examples
///
/// ```
/// use pinforge_common::paths::base_name;
///
/// assert_eq!(base_name("a.png"), "a");
/// assert_eq!(base_name("photo.final.jpg"), "photo");
/// assert_eq!(base_name("README"), "README");
/// assert_eq!(base_name(".hidden"), ".hidden");
/// ```
pub fn base_name(file_name: &str) -> &str {
    match file_name.find('.') {
        Some(0) | None => file_name,
        Some(idx) => &file_name[..idx],
    }
}

/// File name of the metadata stub for a base name.
///
/// # Examples
///
/// ```
/// use pinforge_common::paths::stub_file_name;
///
/// assert_eq!(stub_file_name("a"), "a.json");
/// ```
pub fn stub_file_name(base: &str) -> String {
    format!("{base}.{STUB_EXTENSION}")
}

/// Decides which directory entries are housekeeping noise.
///
/// Implemented by [`IgnoreList`] and by any `Fn(&str) -> bool` closure, so
/// callers can inject environment-specific rules.
pub trait EntryFilter: Send + Sync {
    /// Returns `true` when the entry with this file name must be skipped.
    fn is_ignored(&self, file_name: &str) -> bool;
}

impl<F> EntryFilter for F
where
    F: Fn(&str) -> bool + Send + Sync,
{
    fn is_ignored(&self, file_name: &str) -> bool {
        self(file_name)
    }
}

/// Exact file-name ignore list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IgnoreList {
    names: Vec<String>,
}

impl IgnoreList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    /// Wrap into a shareable filter handle.
    pub fn into_filter(self) -> Arc<dyn EntryFilter> {
        Arc::new(self)
    }
}

impl Default for IgnoreList {
    fn default() -> Self {
        Self::new(DEFAULT_IGNORED.iter().copied())
    }
}

impl EntryFilter for IgnoreList {
    fn is_ignored(&self, file_name: &str) -> bool {
        self.names.iter().any(|n| n == file_name)
    }
}
