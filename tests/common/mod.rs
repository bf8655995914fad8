//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`], which builds an [`AppContext`] over a temporary
//! media root and an in-memory catalog, plus helpers for multipart bodies and
//! reading responses.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use auraflix::catalog::{Catalog, MemoryCatalog, Movie, MovieId};
use auraflix::config::Config;
use auraflix::server::{create_router, AppContext};
use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

pub const BOUNDARY: &str = "auraflix-test-boundary";

/// Test harness wrapping an [`AppContext`] rooted in a temp directory.
pub struct TestHarness {
    pub ctx: AppContext,
    pub catalog: Arc<MemoryCatalog>,
    pub media_dir: TempDir,
}

impl TestHarness {
    /// Default configuration with a small chunk size.
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    /// Adjust the default configuration before building the context.
    pub fn with_config(adjust: impl FnOnce(&mut Config)) -> Self {
        let media_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.media.root = media_dir.path().to_path_buf();
        config.media.chunk_size_bytes = 4096;
        adjust(&mut config);

        let catalog = Arc::new(MemoryCatalog::new());
        let ctx = AppContext::new(config, catalog.clone());
        Self {
            ctx,
            catalog,
            media_dir,
        }
    }

    /// Same as [`TestHarness::new`] but over a caller-supplied catalog.
    pub fn with_catalog(catalog: Arc<dyn Catalog>) -> (AppContext, TempDir) {
        let media_dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.media.root = media_dir.path().to_path_buf();
        (AppContext::new(config, catalog), media_dir)
    }

    pub fn router(&self) -> Router {
        create_router(self.ctx.clone())
    }

    /// Send one request through a fresh router.
    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router().oneshot(request).await.unwrap()
    }

    /// Number of files in `videos/` or `posters/`.
    pub fn files_in(&self, category: &str) -> usize {
        count_files(self.media_dir.path().join(category))
    }

    /// Upload a video with a title and return the created record.
    pub async fn upload_video(&self, data: &[u8]) -> Movie {
        let body = MultipartBuilder::new()
            .text("title", "Test Movie")
            .file("file", "movie.mp4", "video/mp4", data)
            .build();
        let response = self.send(upload_request(body)).await;
        assert_eq!(response.status(), 201);
        let json = body_json(response).await;
        let id: MovieId = json["id"].as_str().unwrap().parse().unwrap();
        self.catalog.get_movie(id).await.unwrap().unwrap()
    }

    /// Current view count of a movie.
    pub async fn views(&self, id: MovieId) -> u64 {
        let movie = self.catalog.get_movie(id).await.unwrap().unwrap();
        movie.view_count
    }

    /// Wait until the view count reaches `expected`, or give up after ~1s.
    pub async fn wait_for_views(&self, id: MovieId, expected: u64) -> u64 {
        for _ in 0..100 {
            let views = self.views(id).await;
            if views >= expected {
                return views;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        self.views(id).await
    }
}

pub fn count_files(dir: PathBuf) -> usize {
    match std::fs::read_dir(dir) {
        Ok(entries) => entries.filter_map(Result::ok).count(),
        Err(_) => 0,
    }
}

/// Builds `multipart/form-data` bodies by hand.
#[derive(Default)]
pub struct MultipartBuilder {
    body: Vec<u8>,
}

impl MultipartBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"\r\n\r\n{value}\r\n"
            )
            .as_bytes(),
        );
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, data: &[u8]) -> Self {
        self.body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\nContent-Type: {content_type}\r\n\r\n"
            )
            .as_bytes(),
        );
        self.body.extend_from_slice(data);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn build(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        self.body
    }
}

pub fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::post("/api/v1/movies/upload")
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn get_request(uri: &str, range: Option<&str>) -> Request<Body> {
    let mut builder = Request::get(uri);
    if let Some(range) = range {
        builder = builder.header(header::RANGE, range);
    }
    builder.body(Body::empty()).unwrap()
}

/// Collect a response body.
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response
        .into_body()
        .collect()
        .await
        .unwrap()
        .to_bytes()
        .to_vec()
}

/// Collect a response body as JSON.
pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Deterministic test payload.
pub fn sample(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i % 251) as u8).collect()
}
