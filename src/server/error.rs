//! Error-to-HTTP response conversion.
//!
//! Handlers return `Result<T, AppError>`; every failure becomes a JSON body
//! of the form `{"error": "...", "code": "..."}` with a matching status.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;

use crate::catalog::CatalogError;

/// Any error a handler can return.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Media(#[from] auraflix_media::Error),

    #[error(transparent)]
    Catalog(#[from] CatalogError),

    /// Bad request input outside the media core (form fields, ids).
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Media(e) => StatusCode::from_u16(e.http_status())
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR),
            AppError::Catalog(CatalogError::NotFound(_)) => StatusCode::NOT_FOUND,
            AppError::Catalog(CatalogError::Unavailable(_)) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn code(&self) -> &'static str {
        use auraflix_media::Error as Media;
        match self {
            AppError::Media(Media::UnsupportedMediaType { .. }) => "unsupported_media_type",
            AppError::Media(Media::PayloadTooLarge { .. }) => "payload_too_large",
            AppError::Media(Media::Storage { .. }) => "storage_error",
            AppError::Media(Media::MalformedRange(_)) => "malformed_range",
            AppError::Media(Media::RangeNotSatisfiable { .. }) => "range_not_satisfiable",
            AppError::Media(Media::NotFound { .. }) => "not_found",
            AppError::Catalog(CatalogError::NotFound(_)) => "not_found",
            AppError::Catalog(CatalogError::Unavailable(_)) => "catalog_unavailable",
            AppError::Validation(_) => "validation_error",
            AppError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self,
                "Server error in API handler"
            );
        }

        let body = json!({
            "error": self.to_string(),
            "code": self.code(),
        });

        match self {
            AppError::Media(auraflix_media::Error::RangeNotSatisfiable { size }) => (
                status,
                [(header::CONTENT_RANGE, format!("bytes */{size}"))],
                axum::Json(body),
            )
                .into_response(),
            _ => (status, axum::Json(body)).into_response(),
        }
    }
}
