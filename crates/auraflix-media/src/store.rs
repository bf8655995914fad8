//! On-disk media layout.
//!
//! [`MediaStore`] owns everything under the media root:
//!
//! ```text
//! {root}/
//!   videos/{token}.{ext}
//!   posters/{token}.{ext}
//! ```
//!
//! File names are a fresh UUIDv4 token plus the extension of the name the
//! client uploaded. Nothing else from the client name is kept, so generated
//! paths can neither collide nor point outside the root.

use std::io;
use std::path::{Path, PathBuf};

use uuid::Uuid;

use crate::error::{Error, Result};
use crate::types::{AssetCategory, AssetPath};

/// Longest extension carried over from a client file name.
const MAX_EXTENSION_LEN: usize = 16;

/// Outcome of a best-effort delete.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
    /// Nothing needed removing.
    NotNeeded,
    /// The file was removed.
    Removed,
    /// Removal failed; the message is for logs only.
    Failed(String),
}

impl Cleanup {
    /// Whether the target is known to be gone.
    pub fn is_clean(&self) -> bool {
        !matches!(self, Cleanup::Failed(_))
    }
}

/// Filesystem manager for the media root.
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Create a store rooted at `root`. Nothing is touched on disk.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The media root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the category directories under the root.
    pub async fn ensure_layout(&self) -> Result<()> {
        for category in AssetCategory::all() {
            let dir = self.root.join(category.dir_name());
            tokio::fs::create_dir_all(&dir)
                .await
                .map_err(|e| Error::storage(&dir, e))?;
        }
        Ok(())
    }

    /// Allocate a fresh relative path for an upload.
    ///
    /// The result is `{category}/{uuid}{.ext}` where `.ext` comes from
    /// `original_filename`. The extension is not checked against any list;
    /// content validation happens at ingestion.
    pub fn allocate(&self, category: AssetCategory, original_filename: &str) -> AssetPath {
        let token = Uuid::new_v4().simple().to_string();
        let file_name = match safe_extension(original_filename) {
            Some(ext) => format!("{token}.{ext}"),
            None => token,
        };
        AssetPath::from_parts(category, &file_name)
    }

    /// Absolute path of an asset.
    pub fn resolve(&self, path: &AssetPath) -> PathBuf {
        self.root.join(path.as_str())
    }

    /// Size of the file at `path` in bytes.
    pub async fn stat(&self, path: &Path) -> Result<u64> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_file() => Ok(meta.len()),
            Ok(_) => Err(Error::not_found("file", path.display())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(Error::not_found("file", path.display()))
            }
            Err(e) => Err(Error::storage(path, e)),
        }
    }

    /// Whether a regular file exists at `path`.
    pub async fn exists(&self, path: &Path) -> bool {
        self.stat(path).await.is_ok()
    }

    /// Remove the file at `path`.
    ///
    /// Never fails: a failure is logged and reported in the returned
    /// [`Cleanup`] so it cannot mask the error that triggered the cleanup.
    pub async fn delete(&self, path: &Path) -> Cleanup {
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                tracing::debug!(path = %path.display(), "Removed media file");
                Cleanup::Removed
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Cleanup::NotNeeded,
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove media file"
                );
                Cleanup::Failed(e.to_string())
            }
        }
    }
}

/// Extension of the last path component of a client file name.
///
/// Only short ASCII alphanumeric extensions survive; anything else is
/// dropped rather than sanitized, so the extension is not always verbatim
/// (see "Stored extensions" in DESIGN.md).
fn safe_extension(original_filename: &str) -> Option<&str> {
    let base = original_filename
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(original_filename);
    let (stem, ext) = base.rsplit_once('.')?;
    if stem.is_empty()
        || ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext)
}
