//! Error types for auraflix-media.
//!
//! Every failure of the ingestion and streaming core is one of the variants
//! of [`Error`]. Each variant maps to a stable HTTP status code through
//! [`Error::http_status`] so the server layer never has to inspect messages.

use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for auraflix-media operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for auraflix-media operations.
#[derive(Debug, Error)]
pub enum Error {
    /// The declared content type is not in the allowed set for the asset.
    #[error("Unsupported media type for {category}: {declared}")]
    UnsupportedMediaType {
        /// Content type declared by the client.
        declared: String,
        /// What the upload was for (`video` or `poster`).
        category: &'static str,
    },

    /// The upload exceeded its byte ceiling while streaming.
    #[error("Payload too large: exceeded limit of {limit} bytes")]
    PayloadTooLarge {
        /// The ceiling that was exceeded.
        limit: u64,
    },

    /// An I/O fault while reading the source or writing to storage.
    #[error("Storage error at {}: {source}", path.display())]
    Storage {
        /// File the operation was working on.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// The `Range` header could not be parsed.
    #[error("Malformed range header: {0}")]
    MalformedRange(String),

    /// The requested range starts beyond the end of the asset.
    #[error("Range not satisfiable for asset of {size} bytes")]
    RangeNotSatisfiable {
        /// Total size of the asset, echoed back in `Content-Range: bytes */size`.
        size: u64,
    },

    /// An asset or its backing file does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of thing that was looked up.
        entity: String,
        /// The identifier or path that was looked up.
        id: String,
    },
}

impl Error {
    /// Map this error to an HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::UnsupportedMediaType { .. } => 400,
            Error::PayloadTooLarge { .. } => 413,
            Error::Storage { .. } => 500,
            Error::MalformedRange(_) => 400,
            Error::RangeNotSatisfiable { .. } => 416,
            Error::NotFound { .. } => 404,
        }
    }

    /// Convenience constructor for [`Error::Storage`].
    pub fn storage(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Storage {
            path: path.into(),
            source,
        }
    }

    /// Convenience constructor for [`Error::MalformedRange`].
    pub fn malformed_range(msg: impl Into<String>) -> Self {
        Error::MalformedRange(msg.into())
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl std::fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }
}
