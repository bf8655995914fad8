//! Shared media types: asset categories, store-relative paths, MIME sets.

use std::fmt;
use std::path::{Component, Path};

/// Default chunk size for reads and writes (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

/// Default ceiling for a single video upload (1 GiB).
pub const DEFAULT_MAX_VIDEO_BYTES: u64 = 1024 * 1024 * 1024;

/// Fixed ceiling for a poster upload (5 MiB).
pub const POSTER_MAX_BYTES: u64 = 5 * 1024 * 1024;

/// Video container types accepted for upload.
pub const VIDEO_MIME_TYPES: MimeSet = MimeSet {
    label: "video",
    types: &["video/mp4", "video/webm", "video/ogg"],
};

/// Raster image types accepted for poster upload.
pub const IMAGE_MIME_TYPES: MimeSet = MimeSet {
    label: "poster",
    types: &["image/jpeg", "image/png", "image/webp"],
};

/// Top-level directory an asset lives in under the media root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AssetCategory {
    /// Primary video files.
    Videos,
    /// Poster images.
    Posters,
}

impl AssetCategory {
    /// Directory name under the media root.
    pub fn dir_name(&self) -> &'static str {
        match self {
            Self::Videos => "videos",
            Self::Posters => "posters",
        }
    }

    /// All categories, in layout order.
    pub fn all() -> &'static [AssetCategory] {
        &[AssetCategory::Videos, AssetCategory::Posters]
    }
}

impl fmt::Display for AssetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// A fixed set of allowed MIME types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MimeSet {
    /// What the set is for, used in error messages.
    pub label: &'static str,
    /// Lower-cased `type/subtype` values.
    pub types: &'static [&'static str],
}

impl MimeSet {
    /// Whether `declared` is in the set.
    ///
    /// Comparison ignores case, surrounding whitespace, and parameters
    /// (`video/mp4; codecs="avc1"` matches `video/mp4`).
    pub fn allows(&self, declared: &str) -> bool {
        let essence = mime_essence(declared);
        !essence.is_empty() && self.types.iter().any(|allowed| *allowed == essence)
    }
}

/// Lower-cased `type/subtype` part of a content type, parameters stripped.
pub fn mime_essence(content_type: &str) -> String {
    content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase()
}

/// A path relative to the media root, e.g. `videos/3f2a...c1.mp4`.
///
/// Values come either from [`crate::MediaStore::allocate`] or from
/// [`AssetPath::parse`], which rejects anything that could escape the
/// media root. Client-supplied names never become an `AssetPath` directly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssetPath(String);

impl AssetPath {
    pub(crate) fn from_parts(category: AssetCategory, file_name: &str) -> Self {
        Self(format!("{}/{}", category.dir_name(), file_name))
    }

    /// Parse a stored relative path.
    ///
    /// Returns `None` for empty paths, absolute paths, and any path containing
    /// `.`/`..` components.
    pub fn parse(value: &str) -> Option<Self> {
        if value.is_empty() || value.contains('\\') {
            return None;
        }
        let path = Path::new(value);
        let mut count = 0;
        for component in path.components() {
            match component {
                Component::Normal(_) => count += 1,
                _ => return None,
            }
        }
        (count >= 2).then(|| Self(value.trim_end_matches('/').to_string()))
    }

    /// The path as a `/`-separated string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The file extension, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.0).extension().and_then(|e| e.to_str())
    }
}

impl fmt::Display for AssetPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for AssetPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Guess a content type from a file extension.
///
/// Used when serving assets whose declared type was not recorded.
pub fn guess_content_type(extension: Option<&str>) -> &'static str {
    match extension.map(|e| e.to_ascii_lowercase()).as_deref() {
        Some("mp4") | Some("m4v") => "video/mp4",
        Some("webm") => "video/webm",
        Some("ogv") | Some("ogg") => "video/ogg",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}
