//! Movie API routes.
//!
//! Listing and lookup go straight to the catalog. Uploads stream each
//! multipart file part through an [`AssetTransaction`] as it arrives and
//! only commit the files once the catalog record exists. Playback serves the
//! stored video or poster with range support.

use std::io;

use auraflix_media::{guess_content_type, AssetTransaction, AssetUpload, StreamResult};
use axum::{
    body::Body,
    extract::{multipart::Field, DefaultBodyLimit, Multipart, Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, NaiveDate, Utc};
use futures::TryStreamExt;
use serde::Deserialize;

use super::error::AppError;
use super::AppContext;
use crate::catalog::{Movie, MovieId, NewMovie};

/// Default page size for the list endpoint.
pub const DEFAULT_LIST_LIMIT: usize = 50;

/// Largest page the list endpoint returns.
pub const MAX_LIST_LIMIT: usize = 200;

/// Largest accepted text form field.
const MAX_TEXT_FIELD_BYTES: usize = 64 * 1024;

/// Create movie routes, mounted under `/api/v1/movies`.
pub fn movie_routes() -> Router<AppContext> {
    Router::new()
        .route("/", get(list_movies))
        // Uploads are bounded per file by the ingestor, not by body size.
        .route(
            "/upload",
            post(upload_movie).layer(DefaultBodyLimit::disable()),
        )
        .route("/:id", get(get_movie))
        .route("/:id/stream", get(stream_movie))
        .route("/:id/poster", get(stream_poster))
}

// ============================================================================
// Request types
// ============================================================================

/// Pagination for the list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub skip: usize,
    #[serde(default = "default_limit")]
    pub limit: usize,
}

fn default_limit() -> usize {
    DEFAULT_LIST_LIMIT
}

/// Text fields of an upload form.
#[derive(Debug, Default)]
struct UploadForm {
    title: Option<String>,
    description: Option<String>,
    genre_id: Option<String>,
    language: Option<String>,
    duration: Option<String>,
    release_date: Option<String>,
}

// ============================================================================
// Handlers
// ============================================================================

async fn list_movies(
    State(ctx): State<AppContext>,
    Query(query): Query<ListQuery>,
) -> Result<Json<Vec<Movie>>, AppError> {
    let limit = query.limit.min(MAX_LIST_LIMIT);
    let movies = ctx.catalog.list_movies(query.skip, limit).await?;
    Ok(Json(movies))
}

async fn get_movie(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> Result<Json<Movie>, AppError> {
    let movie = find_movie(&ctx, &id).await?;
    Ok(Json(movie))
}

/// Accept a multipart upload: `title`, optional metadata, a `file` video
/// part and an optional `poster` part.
async fn upload_movie(
    State(ctx): State<AppContext>,
    mut multipart: Multipart,
) -> Result<impl IntoResponse, AppError> {
    let mut tx = ctx.creator.begin();

    let form = match receive_parts(&mut tx, &mut multipart).await {
        Ok(form) => form,
        Err(e) => {
            tx.rollback().await;
            return Err(e);
        }
    };

    let new_movie = match build_new_movie(&tx, form) {
        Ok(new_movie) => new_movie,
        Err(e) => {
            tx.rollback().await;
            return Err(e);
        }
    };

    let movie = match ctx.catalog.create_movie(new_movie).await {
        Ok(movie) => movie,
        Err(e) => {
            tracing::warn!(error = %e, "Catalog insert failed, rolling back upload");
            tx.rollback().await;
            return Err(e.into());
        }
    };

    let _ = tx.commit();
    tracing::info!(
        movie_id = %movie.id,
        title = %movie.title,
        bytes = movie.size_bytes,
        "Movie uploaded"
    );
    Ok((StatusCode::CREATED, Json(movie)))
}

/// Stream the movie's video. A fully delivered window counts as one view.
async fn stream_movie(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let movie = find_movie(&ctx, &id).await?;
    let asset = movie.video_asset().ok_or_else(|| {
        AppError::internal(format!("Invalid stored video path for {}", movie.id))
    })?;

    let path = ctx.store().resolve(&asset);
    let size = ctx.store().stat(&path).await?;
    let range = range_header(&headers)?;

    // Served with the MIME type declared at upload rather than a fixed
    // video/mp4 (see "Served content type" in DESIGN.md).
    let result = ctx
        .streamer
        .prepare(&path, size, range, &movie.video_content_type)
        .await?;

    let catalog = ctx.catalog.clone();
    let movie_id = movie.id;
    let result = result.on_complete(move || {
        tokio::spawn(async move {
            match catalog.increment_view_count(movie_id).await {
                Ok(views) => tracing::debug!(%movie_id, views, "View counted"),
                Err(e) => tracing::warn!(%movie_id, error = %e, "Failed to count view"),
            }
        });
    });

    into_response(result)
}

/// Stream the movie's poster image.
async fn stream_poster(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let movie = find_movie(&ctx, &id).await?;
    let asset = movie
        .poster_asset()
        .ok_or_else(|| auraflix_media::Error::not_found("poster", movie.id))?;

    let path = ctx.store().resolve(&asset);
    let size = ctx.store().stat(&path).await?;
    let range = range_header(&headers)?;

    let content_type = movie
        .poster_content_type
        .clone()
        .unwrap_or_else(|| guess_content_type(asset.extension()).to_string());

    let result = ctx
        .streamer
        .prepare(&path, size, range, &content_type)
        .await?;
    into_response(result)
}

// ============================================================================
// Helpers
// ============================================================================

async fn find_movie(ctx: &AppContext, id: &str) -> Result<Movie, AppError> {
    let movie_id: MovieId = id
        .parse()
        .map_err(|_| AppError::validation(format!("Invalid movie id: {id}")))?;
    ctx.catalog
        .get_movie(movie_id)
        .await?
        .ok_or_else(|| auraflix_media::Error::not_found("movie", movie_id).into())
}

fn range_header(headers: &HeaderMap) -> Result<Option<&str>, AppError> {
    match headers.get(header::RANGE) {
        None => Ok(None),
        Some(value) => value
            .to_str()
            .map(Some)
            .map_err(|_| auraflix_media::Error::malformed_range("non-ASCII header").into()),
    }
}

fn into_response(result: StreamResult) -> Result<Response, AppError> {
    let (status, headers, body) = result.into_parts();
    let status = StatusCode::from_u16(status).unwrap_or(StatusCode::OK);

    let mut builder = Response::builder().status(status);
    for (name, value) in headers {
        builder = builder.header(name, value);
    }
    builder
        .body(Body::from_stream(body))
        .map_err(|e| AppError::internal(format!("Failed to build response: {e}")))
}

/// Read every part, staging file parts as they arrive.
async fn receive_parts(
    tx: &mut AssetTransaction,
    multipart: &mut Multipart,
) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::validation(format!("Invalid multipart body: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                if tx.has_video() {
                    return Err(AppError::validation("More than one file part"));
                }
                tx.stage_video(file_upload(field)).await?;
            }
            "poster" => {
                // Browsers send an empty part when no poster was chosen.
                if field.file_name().map_or(true, str::is_empty) {
                    continue;
                }
                if tx.has_poster() {
                    return Err(AppError::validation("More than one poster part"));
                }
                tx.stage_poster(file_upload(field)).await?;
            }
            "title" => form.title = Some(read_text(field).await?),
            "description" => form.description = Some(read_text(field).await?),
            "genre_id" => form.genre_id = Some(read_text(field).await?),
            "language" => form.language = Some(read_text(field).await?),
            "duration" => form.duration = Some(read_text(field).await?),
            "release_date" => form.release_date = Some(read_text(field).await?),
            other => tracing::debug!(field = other, "Ignoring unknown form field"),
        }
    }

    Ok(form)
}

fn file_upload(
    field: Field<'_>,
) -> AssetUpload<impl futures::Stream<Item = io::Result<bytes::Bytes>> + '_> {
    let content_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    let filename = field.file_name().unwrap_or_default().to_string();
    let source = field.map_err(|e| io::Error::new(io::ErrorKind::Other, e));
    AssetUpload::new(content_type, filename, source)
}

async fn read_text(mut field: Field<'_>) -> Result<String, AppError> {
    let name = field.name().unwrap_or_default().to_string();
    let mut buf = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|e| AppError::validation(format!("Invalid field {name}: {e}")))?
    {
        if buf.len() + chunk.len() > MAX_TEXT_FIELD_BYTES {
            return Err(AppError::validation(format!("Field {name} is too long")));
        }
        buf.extend_from_slice(&chunk);
    }
    String::from_utf8(buf).map_err(|_| AppError::validation(format!("Field {name} is not UTF-8")))
}

fn build_new_movie(tx: &AssetTransaction, form: UploadForm) -> Result<NewMovie, AppError> {
    let title = form
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| AppError::validation("title is required"))?;

    let video = tx
        .video()
        .ok_or_else(|| AppError::validation("file is required"))?;

    let genre_id = parse_optional(form.genre_id, "genre_id", |v| v.parse::<i64>().ok())?;
    let duration = parse_optional(form.duration, "duration", |v| v.parse::<u32>().ok())?;
    let release_date = parse_optional(form.release_date, "release_date", parse_release_date)?;

    let mut movie = NewMovie::new(
        title,
        video.path().as_str(),
        video.content_type(),
        video.size(),
    );
    movie.description = non_empty(form.description);
    movie.language = non_empty(form.language);
    movie.genre_id = genre_id;
    movie.duration = duration;
    movie.release_date = release_date;
    if let Some(poster) = tx.poster() {
        movie.poster_path = Some(poster.path().to_string());
        movie.poster_content_type = Some(poster.content_type().to_string());
    }
    Ok(movie)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn parse_optional<T>(
    value: Option<String>,
    field: &str,
    parse: impl Fn(&str) -> Option<T>,
) -> Result<Option<T>, AppError> {
    match non_empty(value) {
        None => Ok(None),
        Some(v) => parse(&v)
            .map(Some)
            .ok_or_else(|| AppError::validation(format!("Invalid {field}: {v}"))),
    }
}

/// RFC 3339 timestamp, or a plain `YYYY-MM-DD` date at midnight UTC.
fn parse_release_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
