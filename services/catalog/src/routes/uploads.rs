//! Stored image download

use anyhow::Context;
use axum::{
    body::Body,
    extract::{Path, State},
    http::{StatusCode, header},
    response::Response,
};

use crate::{
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Serve a stored product image
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(file_name): Path<String>,
) -> ApiResult<Response> {
    let image = state
        .images
        .read(&file_name)
        .await?
        .ok_or_else(|| ApiError::NotFound("Fichier non trouvé".to_string()))?;

    let response = Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, image.content_type)
        .header(header::CACHE_CONTROL, "public, max-age=86400")
        .body(Body::from(image.bytes))
        .context("Failed to build image response")?;

    Ok(response)
}
