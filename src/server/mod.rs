use crate::catalog::{Catalog, MemoryCatalog};
use crate::config::Config;
use anyhow::{Context, Result};
use auraflix_media::{AssetCreator, IngestLimits, MediaStore, RangeStreamer, POSTER_MAX_BYTES};
use axum::{
    http::{header, Method, StatusCode},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

pub mod error;
pub mod routes_movies;

pub use error::AppError;

/// Shared application context
#[derive(Clone)]
pub struct AppContext {
    /// Effective configuration
    pub config: Arc<Config>,
    /// Movie records
    pub catalog: Arc<dyn Catalog>,
    /// Upload ingestion into the media store
    pub creator: AssetCreator,
    /// Range responses for stored assets
    pub streamer: RangeStreamer,
}

impl AppContext {
    /// Build a context over `catalog` with the media settings from `config`.
    pub fn new(config: Config, catalog: Arc<dyn Catalog>) -> Self {
        let store = MediaStore::new(&config.media.root);
        let limits = IngestLimits {
            video_max_bytes: config.media.max_video_upload_bytes,
            poster_max_bytes: POSTER_MAX_BYTES,
            chunk_size: config.media.chunk_size_bytes,
        };
        Self {
            creator: AssetCreator::new(store, limits),
            streamer: RangeStreamer::new(config.media.chunk_size_bytes),
            config: Arc::new(config),
            catalog,
        }
    }

    /// The media store.
    pub fn store(&self) -> &MediaStore {
        self.creator.store()
    }

    /// Socket address from the server section of the config.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let server = &self.config.server;
        format!("{}:{}", server.host, server.port)
            .parse()
            .with_context(|| format!("Invalid server address {}:{}", server.host, server.port))
    }
}

/// Create the Axum router with all routes
pub fn create_router(ctx: AppContext) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE, header::RANGE])
        .expose_headers([
            header::CONTENT_RANGE,
            header::ACCEPT_RANGES,
            header::CONTENT_LENGTH,
        ]);

    Router::new()
        // Health check
        .route("/health", get(health_check))
        .nest("/api/v1/movies", routes_movies::movie_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(ctx)
}

async fn health_check() -> impl IntoResponse {
    StatusCode::OK
}

/// Start the HTTP server with an in-memory catalog
pub async fn start_server(config: Config) -> Result<()> {
    start_server_with_catalog(config, Arc::new(MemoryCatalog::new())).await
}

/// Start the HTTP server over the given catalog
pub async fn start_server_with_catalog(config: Config, catalog: Arc<dyn Catalog>) -> Result<()> {
    let ctx = AppContext::new(config, catalog);
    let addr = ctx.bind_addr()?;
    ctx.store()
        .ensure_layout()
        .await
        .with_context(|| format!("Failed to prepare media root {:?}", ctx.store().root()))?;
    tracing::info!(
        root = %ctx.store().root().display(),
        max_video_bytes = ctx.creator.limits().video_max_bytes,
        "Media store ready"
    );

    let app = create_router(ctx);

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        match signal::ctrl_c().await {
            Ok(()) => {}
            Err(e) => {
                tracing::error!("Failed to install Ctrl+C handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bind_addr_comes_from_config() {
        let mut config = Config::default();
        config.server.host = "127.0.0.1".to_string();
        config.server.port = 9100;
        let ctx = AppContext::new(config, Arc::new(MemoryCatalog::new()));

        let expected: SocketAddr = "127.0.0.1:9100".parse().unwrap();
        assert_eq!(ctx.bind_addr().unwrap(), expected);
        assert_eq!(ctx.config.server.port, 9100);
    }

    #[test]
    fn bind_addr_rejects_bad_host() {
        let mut config = Config::default();
        config.server.host = "not a host".to_string();
        let ctx = AppContext::new(config, Arc::new(MemoryCatalog::new()));

        let err = ctx.bind_addr().unwrap_err();
        assert!(err.to_string().contains("Invalid server address"));
    }
}
