//! Request handlers.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::multipart::{MultipartError, MultipartRejection};
use axum::extract::{Multipart, Request, State};
use axum::http::{StatusCode, header};
use axum::middleware::Next;
use axum::response::{Html, IntoResponse, Response};
use drape_pipeline::PNG_MIME;
use tracing::{debug, info};

use crate::AppState;
use crate::error::ApiError;

/// `GET /`
pub async fn index(State(state): State<AppState>) -> Html<Bytes> {
    Html(state.index_html)
}

/// `GET /health`
pub async fn health() -> &'static str {
    "ok"
}

/// Reject requests whose declared length exceeds the body ceiling before
/// any of the body is read.
pub async fn reject_oversized(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let declared = request
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > state.config.max_body_bytes) {
        return Err(ApiError::PayloadTooLarge {
            limit_mb: state.config.max_body_mb(),
        });
    }
    Ok(next.run(request).await)
}

/// Fields of a `/generate` form. Empty parts are left as `None`.
#[derive(Debug, Default)]
struct GenerateForm {
    original: Option<Bytes>,
    pattern: Option<Bytes>,
    mask: Option<String>,
}

impl GenerateForm {
    async fn read(mut multipart: Multipart, limit_mb: usize) -> Result<Self, ApiError> {
        let mut form = Self::default();
        let form_error = move |e: MultipartError| {
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::PayloadTooLarge { limit_mb }
            } else {
                ApiError::InvalidForm(e.body_text())
            }
        };

        while let Some(field) = multipart.next_field().await.map_err(form_error)? {
            let Some(name) = field.name().map(str::to_owned) else {
                continue;
            };
            match name.as_str() {
                "original" => {
                    form.original = Some(field.bytes().await.map_err(form_error)?);
                }
                "pattern" => {
                    form.pattern = Some(field.bytes().await.map_err(form_error)?);
                }
                "mask" => {
                    form.mask = Some(field.text().await.map_err(form_error)?);
                }
                other => debug!(field = other, "ignoring unknown form field"),
            }
        }

        form.original = form.original.filter(|b| !b.is_empty());
        form.pattern = form.pattern.filter(|b| !b.is_empty());
        form.mask = form.mask.filter(|m| !m.trim().is_empty());
        Ok(form)
    }
}

/// `POST /generate`
///
/// A body that is not multipart at all carries none of the inputs and is
/// answered like any other request with missing fields.
pub async fn generate(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Response, ApiError> {
    let multipart = multipart.map_err(|rejection| {
        debug!(%rejection, "request is not a multipart form");
        ApiError::MissingInput
    })?;
    let form = GenerateForm::read(multipart, state.config.max_body_mb()).await?;
    let (Some(original), Some(pattern), Some(mask)) = (form.original, form.pattern, form.mask)
    else {
        return Err(ApiError::MissingInput);
    };

    info!(
        original_bytes = original.len(),
        pattern_bytes = pattern.len(),
        mask_chars = mask.len(),
        "compositing request"
    );

    // Bounds peak pixel memory to `max_concurrent` composites.
    let permit = Arc::clone(&state.composite_permits)
        .acquire_owned()
        .await
        .map_err(|e| ApiError::Task(e.to_string()))?;
    let config = state.config.composite.clone();
    let composite = tokio::task::spawn_blocking(move || {
        let _permit = permit;
        drape_pipeline::compose_with_diagnostics(&original, &pattern, &mask, &config)
    })
    .await
    .map_err(|e| ApiError::Task(e.to_string()))??;

    info!(
        width = composite.dimensions.width,
        height = composite.dimensions.height,
        output_bytes = composite.png.len(),
        elapsed_ms = composite.diagnostics.total_duration.as_secs_f64() * 1000.0,
        "composite ready"
    );
    debug!("\n{}", composite.diagnostics.report());

    Ok(([(header::CONTENT_TYPE, PNG_MIME)], composite.png).into_response())
}
