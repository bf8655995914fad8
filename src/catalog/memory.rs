use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::HashMap;

use super::{Catalog, CatalogError, CatalogResult, Movie, MovieId, NewMovie};

/// In-process catalog. Records are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCatalog {
    inner: RwLock<Inner>,
}

#[derive(Debug, Default)]
struct Inner {
    movies: Vec<Movie>,
    index: HashMap<MovieId, usize>,
}

impl MemoryCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records.
    pub fn len(&self) -> usize {
        self.inner.read().movies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Catalog for MemoryCatalog {
    async fn create_movie(&self, movie: NewMovie) -> CatalogResult<Movie> {
        let record = Movie {
            id: MovieId::new(),
            title: movie.title,
            description: movie.description,
            genre_id: movie.genre_id,
            language: movie.language,
            duration: movie.duration,
            release_date: movie.release_date,
            file_path: movie.file_path,
            poster_path: movie.poster_path,
            video_content_type: movie.video_content_type,
            poster_content_type: movie.poster_content_type,
            size_bytes: movie.size_bytes,
            view_count: 0,
            created_at: Utc::now(),
        };

        let mut inner = self.inner.write();
        let position = inner.movies.len();
        inner.index.insert(record.id, position);
        inner.movies.push(record.clone());
        Ok(record)
    }

    async fn get_movie(&self, id: MovieId) -> CatalogResult<Option<Movie>> {
        let inner = self.inner.read();
        Ok(inner.index.get(&id).map(|&i| inner.movies[i].clone()))
    }

    async fn list_movies(&self, skip: usize, limit: usize) -> CatalogResult<Vec<Movie>> {
        let inner = self.inner.read();
        let page = inner.movies.iter().skip(skip).take(limit);
        Ok(page.cloned().collect())
    }

    async fn increment_view_count(&self, id: MovieId) -> CatalogResult<u64> {
        let mut inner = self.inner.write();
        let position = *inner.index.get(&id).ok_or(CatalogError::NotFound(id))?;
        let movie = &mut inner.movies[position];
        movie.view_count += 1;
        Ok(movie.view_count)
    }
}
