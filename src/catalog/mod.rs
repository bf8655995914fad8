//! Movie catalog.
//!
//! The catalog stores structured movie records; media bytes live in the
//! [`auraflix_media::MediaStore`]. Handlers only talk to the [`Catalog`]
//! trait so a durable backend can replace [`MemoryCatalog`] without touching
//! the HTTP layer.

mod memory;
mod types;

pub use memory::MemoryCatalog;
pub use types::*;

use async_trait::async_trait;

/// Result type for catalog operations.
pub type CatalogResult<T> = std::result::Result<T, CatalogError>;

/// Errors reported by a catalog backend.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("Movie not found: {0}")]
    NotFound(MovieId),

    #[error("Catalog unavailable: {0}")]
    Unavailable(String),
}

/// Storage for movie records.
#[async_trait]
pub trait Catalog: Send + Sync {
    /// Insert a new record with a fresh id and a view count of zero.
    async fn create_movie(&self, movie: NewMovie) -> CatalogResult<Movie>;

    /// Fetch one record.
    async fn get_movie(&self, id: MovieId) -> CatalogResult<Option<Movie>>;

    /// Records in insertion order, skipping `skip` and returning at most
    /// `limit`.
    async fn list_movies(&self, skip: usize, limit: usize) -> CatalogResult<Vec<Movie>>;

    /// Add one view and return the new count.
    async fn increment_view_count(&self, id: MovieId) -> CatalogResult<u64>;
}
