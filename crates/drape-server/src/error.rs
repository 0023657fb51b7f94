//! Error types for the HTTP boundary.
//!
//! [`ApiError`] is what handlers return; it renders as a JSON body
//! `{"error": "<message>"}` with a status picked by a fixed lookup on the
//! pipeline's [`ErrorKind`]. [`ServerError`] covers startup failures.

use std::path::PathBuf;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use drape_pipeline::{ErrorKind, PipelineError};
use serde::Serialize;

/// Message returned when any of the three inputs is absent.
pub const MISSING_INPUT_MESSAGE: &str = "Missing original image, pattern, or mask data";

/// Errors surfaced to HTTP clients.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// `original`, `pattern`, or `mask` was absent or empty.
    #[error("{MISSING_INPUT_MESSAGE}")]
    MissingInput,

    /// The request body exceeded the configured ceiling.
    #[error("File too large! Please upload an image smaller than {limit_mb} MB.")]
    PayloadTooLarge {
        /// Ceiling in mebibytes.
        limit_mb: usize,
    },

    /// The multipart body could not be read.
    #[error("invalid form data: {0}")]
    InvalidForm(String),

    /// The compositor rejected the inputs or failed.
    #[error(transparent)]
    Pipeline(PipelineError),

    /// The blocking compositing task did not complete.
    #[error("compositing task failed: {0}")]
    Task(String),
}

impl ApiError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::MissingInput | Self::InvalidForm(_) => StatusCode::BAD_REQUEST,
            Self::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            Self::Pipeline(e) => status_for_kind(e.kind()),
            Self::Task(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Status code for each pipeline failure kind.
///
/// A malformed mask is the client's fault, so it maps to 400 rather than
/// the generic 500.
#[must_use]
pub const fn status_for_kind(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::MissingInput | ErrorKind::MalformedMask => StatusCode::BAD_REQUEST,
        ErrorKind::TooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        ErrorKind::Decode | ErrorKind::InvalidConfig | ErrorKind::Encode => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::MissingInput(_) => Self::MissingInput,
            other => Self::Pipeline(other),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(%status, error = %self, "request failed");
        } else {
            tracing::warn!(%status, error = %self, "request rejected");
        }
        let body = ErrorBody {
            error: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Errors that stop the server from starting.
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    /// The compositor settings are unusable.
    #[error(transparent)]
    Config(#[from] PipelineError),

    /// The configured landing page could not be read.
    #[error("failed to read index page {}: {source}", path.display())]
    Index {
        /// Path that was configured.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Binding or serving failed.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
