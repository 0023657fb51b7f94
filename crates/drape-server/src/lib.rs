//! drape-server: HTTP front end for the drape compositor.
//!
//! Owns all network I/O. Requests are parsed here, the pixel work is
//! handed to [`drape_pipeline`] on the blocking thread pool, and the
//! result or failure is translated back into HTTP.
//!
//! Routes:
//!
//! - `GET /` landing page
//! - `POST /generate` multipart `original`, `pattern`, `mask` -> PNG
//! - `GET /health` liveness probe

pub mod config;
pub mod error;
mod routes;

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::DefaultBodyLimit;
use axum::middleware;
use axum::routing::{get, post};
use tokio::sync::Semaphore;

pub use config::{Cli, ServerConfig};
pub use error::{ApiError, MISSING_INPUT_MESSAGE, ServerError};

/// Landing page compiled into the binary.
pub const BUILTIN_INDEX_HTML: &str = include_str!("../assets/index.html");

/// State shared by every request.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Immutable process configuration.
    pub config: Arc<ServerConfig>,
    index_html: Bytes,
    /// One permit per composite allowed to run at once.
    composite_permits: Arc<Semaphore>,
}

impl AppState {
    /// Build the state, loading the landing page from `config.index_path`
    /// when one is configured.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Index`] if the configured page cannot be read.
    pub fn new(config: ServerConfig) -> Result<Self, ServerError> {
        let index_html = match &config.index_path {
            Some(path) => std::fs::read(path)
                .map(Bytes::from)
                .map_err(|source| ServerError::Index {
                    path: path.clone(),
                    source,
                })?,
            None => Bytes::from_static(BUILTIN_INDEX_HTML.as_bytes()),
        };
        let composite_permits = Arc::new(Semaphore::new(config.max_concurrent.max(1)));
        Ok(Self {
            config: Arc::new(config),
            index_html,
            composite_permits,
        })
    }
}

/// Assemble the application router.
///
/// Oversized bodies are turned away twice: up front from the declared
/// `Content-Length`, and while streaming through [`DefaultBodyLimit`]
/// for requests that do not declare one.
pub fn build_router(state: AppState) -> Router {
    let limit = state.config.max_body_bytes;
    Router::new()
        .route("/", get(routes::index))
        .route("/generate", post(routes::generate))
        .route("/health", get(routes::health))
        .layer(DefaultBodyLimit::max(limit))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            routes::reject_oversized,
        ))
        .with_state(state)
}
