//! All-or-nothing creation of a video and its optional poster.
//!
//! Uploads are staged one at a time into an [`AssetTransaction`]. A failed
//! stage removes everything staged before it, so a request never leaves a
//! video behind without the record that owns it. [`AssetCreator::create`]
//! wraps the common video-then-poster sequence.

use std::io;

use bytes::Bytes;
use futures::Stream;

use crate::error::{Error, Result};
use crate::ingest::{CommittedAsset, IngestedAsset, UploadIngestor};
use crate::store::MediaStore;
use crate::types::{
    AssetCategory, MimeSet, DEFAULT_CHUNK_SIZE, DEFAULT_MAX_VIDEO_BYTES, IMAGE_MIME_TYPES,
    POSTER_MAX_BYTES, VIDEO_MIME_TYPES,
};

/// Byte ceilings and chunk size for ingestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IngestLimits {
    /// Ceiling for a video upload.
    pub video_max_bytes: u64,
    /// Ceiling for a poster upload.
    pub poster_max_bytes: u64,
    /// Largest single write.
    pub chunk_size: usize,
}

impl Default for IngestLimits {
    fn default() -> Self {
        Self {
            video_max_bytes: DEFAULT_MAX_VIDEO_BYTES,
            poster_max_bytes: POSTER_MAX_BYTES,
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// One uploaded file as received from a client.
pub struct AssetUpload<S> {
    /// Declared content type.
    pub content_type: String,
    /// Client file name; only its extension is used.
    pub filename: String,
    /// The file's bytes.
    pub source: S,
}

impl<S> AssetUpload<S> {
    /// Wrap a client file.
    pub fn new(content_type: impl Into<String>, filename: impl Into<String>, source: S) -> Self {
        Self {
            content_type: content_type.into(),
            filename: filename.into(),
            source,
        }
    }
}

/// The committed result of a create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedAssets {
    /// The stored video.
    pub video: CommittedAsset,
    /// The stored poster, if one was uploaded.
    pub poster: Option<CommittedAsset>,
}

/// Creates video and poster assets with rollback on failure.
#[derive(Debug, Clone)]
pub struct AssetCreator {
    ingestor: UploadIngestor,
    limits: IngestLimits,
}

impl AssetCreator {
    /// Create a creator writing into `store` under `limits`.
    pub fn new(store: MediaStore, limits: IngestLimits) -> Self {
        Self {
            ingestor: UploadIngestor::new(store, limits.chunk_size),
            limits,
        }
    }

    /// The store assets are written into.
    pub fn store(&self) -> &MediaStore {
        self.ingestor.store()
    }

    /// The configured ceilings.
    pub fn limits(&self) -> IngestLimits {
        self.limits
    }

    /// Start an empty transaction.
    ///
    /// Parts can then be staged in whatever order they arrive.
    pub fn begin(&self) -> AssetTransaction {
        AssetTransaction {
            creator: self.clone(),
            video: None,
            poster: None,
        }
    }

    /// Ingest a video and, if given, a poster.
    ///
    /// If the poster fails, the video is deleted before the poster's error
    /// is returned. Dropping the returned future part way through removes
    /// everything written so far.
    pub async fn create<V, P>(
        &self,
        video: AssetUpload<V>,
        poster: Option<AssetUpload<P>>,
    ) -> Result<CreatedAssets>
    where
        V: Stream<Item = io::Result<Bytes>>,
        P: Stream<Item = io::Result<Bytes>>,
    {
        let mut tx = self.begin();
        tx.stage_video(video).await?;
        if let Some(poster) = poster {
            tx.stage_poster(poster).await?;
        }
        tx.commit()
            .ok_or_else(|| Error::not_found("video", "staged upload"))
    }

    async fn ingest<S>(
        &self,
        upload: AssetUpload<S>,
        category: AssetCategory,
        allowed: MimeSet,
        max_bytes: u64,
    ) -> Result<IngestedAsset>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let dest = self.store().allocate(category, &upload.filename);
        let asset = self
            .ingestor
            .ingest(
                upload.source,
                &upload.content_type,
                allowed,
                &dest,
                max_bytes,
            )
            .await?;
        Ok(asset)
    }
}

/// Assets written for one request, not yet committed.
///
/// Dropping a transaction without calling [`commit`](Self::commit) or
/// [`rollback`](Self::rollback) removes the staged files synchronously.
#[must_use = "a transaction must be committed or rolled back"]
#[derive(Debug)]
pub struct AssetTransaction {
    creator: AssetCreator,
    video: Option<IngestedAsset>,
    poster: Option<IngestedAsset>,
}

impl AssetTransaction {
    /// Ingest the video.
    ///
    /// On failure every staged asset is removed and the transaction is
    /// left empty. Staging a second video replaces the first.
    pub async fn stage_video<S>(&mut self, upload: AssetUpload<S>) -> Result<&IngestedAsset>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let limits = self.creator.limits;
        let result = self
            .creator
            .ingest(
                upload,
                AssetCategory::Videos,
                VIDEO_MIME_TYPES,
                limits.video_max_bytes,
            )
            .await;
        let asset = self.settle(result).await?;
        if let Some(previous) = self.video.take() {
            let _ = previous.rollback().await;
        }
        Ok(&*self.video.insert(asset))
    }

    /// Ingest the poster.
    ///
    /// On failure the already staged video is removed first, then the
    /// poster's error is returned.
    pub async fn stage_poster<S>(&mut self, upload: AssetUpload<S>) -> Result<&IngestedAsset>
    where
        S: Stream<Item = io::Result<Bytes>>,
    {
        let limits = self.creator.limits;
        let result = self
            .creator
            .ingest(
                upload,
                AssetCategory::Posters,
                IMAGE_MIME_TYPES,
                limits.poster_max_bytes,
            )
            .await;
        let asset = self.settle(result).await?;
        if let Some(previous) = self.poster.take() {
            let _ = previous.rollback().await;
        }
        Ok(&*self.poster.insert(asset))
    }

    /// The staged video, if any.
    pub fn video(&self) -> Option<&IngestedAsset> {
        self.video.as_ref()
    }

    /// The staged poster, if any.
    pub fn poster(&self) -> Option<&IngestedAsset> {
        self.poster.as_ref()
    }

    /// Whether a video has been staged.
    pub fn has_video(&self) -> bool {
        self.video.is_some()
    }

    /// Whether a poster has been staged.
    pub fn has_poster(&self) -> bool {
        self.poster.is_some()
    }

    /// Keep every staged asset.
    ///
    /// Returns `None` if no video was staged; a staged poster is then
    /// removed like on drop.
    pub fn commit(mut self) -> Option<CreatedAssets> {
        let video = self.video.take()?;
        let poster = self.poster.take();
        Some(CreatedAssets {
            video: video.commit(),
            poster: poster.map(IngestedAsset::commit),
        })
    }

    /// Remove every staged asset, video first.
    pub async fn rollback(mut self) {
        self.rollback_staged().await;
    }

    async fn rollback_staged(&mut self) {
        if let Some(video) = self.video.take() {
            let _ = video.rollback().await;
        }
        if let Some(poster) = self.poster.take() {
            let _ = poster.rollback().await;
        }
    }

    async fn settle(&mut self, result: Result<IngestedAsset>) -> Result<IngestedAsset> {
        match result {
            Ok(asset) => Ok(asset),
            Err(error) => {
                self.rollback_staged().await;
                Err(error)
            }
        }
    }
}

impl Drop for AssetTransaction {
    fn drop(&mut self) {
        for asset in [self.video.take(), self.poster.take()]
            .into_iter()
            .flatten()
        {
            tracing::warn!(path = %asset.path(), "Discarding uncommitted asset");
            if let Err(e) = std::fs::remove_file(asset.absolute_path()) {
                if e.kind() != io::ErrorKind::NotFound {
                    tracing::warn!(
                        path = %asset.absolute_path().display(),
                        error = %e,
                        "Failed to remove uncommitted asset"
                    );
                }
            }
        }
    }
}
