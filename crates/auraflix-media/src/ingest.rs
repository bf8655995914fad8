//! Size-capped upload ingestion.
//!
//! [`UploadIngestor::ingest`] copies a byte stream of unknown length to a
//! store-allocated path without buffering it, aborting the moment the running
//! total passes the ceiling. Every failure removes the partial file before it
//! is reported, so a destination holds exactly one complete file on success
//! and nothing otherwise.

use std::io;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::error::Error;
use crate::store::{Cleanup, MediaStore};
use crate::types::{mime_essence, AssetPath, MimeSet};

/// Streams uploads into a [`MediaStore`].
#[derive(Debug, Clone)]
pub struct UploadIngestor {
    store: MediaStore,
    chunk_size: usize,
}

/// A fully written upload that has not been committed yet.
///
/// Call [`IngestedAsset::commit`] once everything that depends on it has
/// succeeded, or [`IngestedAsset::rollback`] to remove the file.
#[must_use = "an ingested asset must be committed or rolled back"]
#[derive(Debug)]
pub struct IngestedAsset {
    store: MediaStore,
    path: AssetPath,
    absolute: PathBuf,
    size: u64,
    content_type: String,
}

impl IngestedAsset {
    /// Store-relative path of the written file.
    pub fn path(&self) -> &AssetPath {
        &self.path
    }

    /// Absolute path of the written file.
    pub fn absolute_path(&self) -> &Path {
        &self.absolute
    }

    /// Bytes written.
    pub fn size(&self) -> u64 {
        self.size
    }

    /// Normalized declared content type.
    pub fn content_type(&self) -> &str {
        &self.content_type
    }

    /// Keep the file.
    pub fn commit(self) -> CommittedAsset {
        CommittedAsset {
            path: self.path,
            size: self.size,
            content_type: self.content_type,
        }
    }

    /// Delete the file.
    pub async fn rollback(self) -> Cleanup {
        tracing::debug!(path = %self.path, "Rolling back ingested asset");
        self.store.delete(&self.absolute).await
    }
}

/// A file that has been kept.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommittedAsset {
    /// Store-relative path.
    pub path: AssetPath,
    /// Size in bytes.
    pub size: u64,
    /// Normalized declared content type.
    pub content_type: String,
}

/// A failed ingestion: the error plus what happened to the partial file.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct IngestFailure {
    /// Why ingestion failed.
    pub error: Error,
    /// Outcome of removing the partial file.
    pub cleanup: Cleanup,
}

impl IngestFailure {
    fn new(error: Error, cleanup: Cleanup) -> Self {
        Self { error, cleanup }
    }
}

impl From<IngestFailure> for Error {
    fn from(failure: IngestFailure) -> Self {
        failure.error
    }
}

impl UploadIngestor {
    /// Create an ingestor writing through `store` in chunks of at most
    /// `chunk_size` bytes.
    pub fn new(store: MediaStore, chunk_size: usize) -> Self {
        Self {
            store,
            chunk_size: chunk_size.max(1),
        }
    }

    /// The store this ingestor writes into.
    pub fn store(&self) -> &MediaStore {
        &self.store
    }

    /// Stream `source` to `dest`.
    ///
    /// The declared type is checked against `allowed` before anything is read
    /// or created. At most `max_bytes` bytes are accepted; one more fails the
    /// upload with [`Error::PayloadTooLarge`]. A source error is treated like
    /// any other I/O fault and reported as [`Error::Storage`].
    pub async fn ingest<S>(
        &self,
        source: S,
        declared_mime: &str,
        allowed: MimeSet,
        dest: &AssetPath,
        max_bytes: u64,
    ) -> Result<IngestedAsset, IngestFailure>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        if !allowed.allows(declared_mime) {
            tracing::warn!(
                declared = %declared_mime,
                kind = allowed.label,
                "Rejected upload with unsupported media type"
            );
            return Err(IngestFailure::new(
                Error::UnsupportedMediaType {
                    declared: declared_mime.to_string(),
                    category: allowed.label,
                },
                Cleanup::NotNeeded,
            ));
        }

        let absolute = self.store.resolve(dest);
        if let Some(parent) = absolute.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return Err(IngestFailure::new(
                    Error::storage(parent, e),
                    Cleanup::NotNeeded,
                ));
            }
        }

        // Removes the file if this future is dropped mid-copy.
        let guard = PartialFile::new(&absolute);
        let mut file = match File::create(&absolute).await {
            Ok(file) => file,
            Err(e) => {
                guard.disarm();
                return Err(IngestFailure::new(
                    Error::storage(&absolute, e),
                    Cleanup::NotNeeded,
                ));
            }
        };

        let outcome = self
            .copy_capped(source, &mut file, &absolute, max_bytes)
            .await;
        // Close before any delete.
        drop(file);
        guard.disarm();

        match outcome {
            Ok(size) => {
                tracing::info!(
                    path = %dest,
                    bytes = size,
                    kind = allowed.label,
                    "Upload ingested"
                );
                Ok(IngestedAsset {
                    store: self.store.clone(),
                    path: dest.clone(),
                    absolute,
                    size,
                    content_type: mime_essence(declared_mime),
                })
            }
            Err(error) => {
                let cleanup = self.store.delete(&absolute).await;
                tracing::warn!(
                    path = %dest,
                    error = %error,
                    cleanup = ?cleanup,
                    "Upload failed"
                );
                Err(IngestFailure::new(error, cleanup))
            }
        }
    }

    async fn copy_capped<S>(
        &self,
        source: S,
        file: &mut File,
        absolute: &Path,
        max_bytes: u64,
    ) -> Result<u64, Error>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let mut source = std::pin::pin!(source);
        let mut written: u64 = 0;

        while let Some(next) = source.next().await {
            let bytes = next.map_err(|e| Error::storage(absolute, e))?;
            for piece in bytes.chunks(self.chunk_size) {
                written += piece.len() as u64;
                if written > max_bytes {
                    return Err(Error::PayloadTooLarge { limit: max_bytes });
                }
                file.write_all(piece)
                    .await
                    .map_err(|e| Error::storage(absolute, e))?;
            }
        }

        file.flush()
            .await
            .map_err(|e| Error::storage(absolute, e))?;
        file.sync_all()
            .await
            .map_err(|e| Error::storage(absolute, e))?;
        Ok(written)
    }
}

/// Synchronous last-resort removal for an abandoned write.
struct PartialFile {
    path: Option<PathBuf>,
}

impl PartialFile {
    fn new(path: &Path) -> Self {
        Self {
            path: Some(path.to_path_buf()),
        }
    }

    fn disarm(mut self) {
        self.path = None;
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if let Some(path) = self.path.take() {
            match std::fs::remove_file(&path) {
                Ok(()) => tracing::debug!(path = %path.display(), "Removed abandoned upload"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to remove abandoned upload"
                ),
            }
        }
    }
}
