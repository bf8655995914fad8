//! Auraflix-Media: media storage, size-capped ingestion, and range streaming
//!
//! This crate owns the media root on disk and everything that reads or writes
//! under it. It knows nothing about HTTP frameworks or movie metadata; the
//! server crate maps its results onto responses and catalog records.
//!
//! # Modules
//!
//! - `store` - On-disk layout, unique path allocation, best-effort deletes
//! - `ingest` - Streaming a byte source to disk under a byte ceiling
//! - `create` - Video plus optional poster with rollback on failure
//! - `range` - `Range` header parsing and window resolution
//! - `stream` - Lazy chunked reads of a window with a completion hook
//!
//! # Guarantees
//!
//! An ingestion leaves exactly one file on success and none on failure. A
//! create that fails on the poster removes the video before reporting. Memory
//! per request is bounded by the chunk size in both directions.

pub mod create;
pub mod error;
pub mod ingest;
pub mod range;
pub mod store;
pub mod stream;
pub mod types;

pub use create::{AssetCreator, AssetTransaction, AssetUpload, CreatedAssets, IngestLimits};
pub use error::{Error, Result};
pub use ingest::{CommittedAsset, IngestFailure, IngestedAsset, UploadIngestor};
pub use range::{parse_range_header, RangeSpec, RangeWindow};
pub use store::{Cleanup, MediaStore};
pub use stream::{ChunkStream, CompletionHook, RangeStreamer, StreamResult};
pub use types::{
    guess_content_type, AssetCategory, AssetPath, MimeSet, DEFAULT_CHUNK_SIZE,
    DEFAULT_MAX_VIDEO_BYTES, IMAGE_MIME_TYPES, POSTER_MAX_BYTES, VIDEO_MIME_TYPES,
};
