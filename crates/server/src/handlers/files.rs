use axum::{
    extract::{Multipart, Path, State},
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use tracing::{error, info};

use super::AppState;
use crate::error::{Error, Result};
use crate::models::StoredBlob;

/// POST /upload
///
/// Multipart form with a single `file` field.
pub async fn upload_file(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<Json<StoredBlob>> {
    let mut upload = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        error!("Failed to read multipart field: {}", e);
        Error::BadRequest(format!("invalid multipart body: {}", e))
    })? {
        if field.name() != Some("file") {
            continue;
        }
        let filename = field.file_name().unwrap_or("unnamed").to_string();
        let content_type = field.content_type().map(str::to_string);
        let data = field.bytes().await.map_err(|e| {
            error!("Failed to read file data: {}", e);
            Error::BadRequest(format!("failed to read file: {}", e))
        })?;
        upload = Some((filename, content_type, data));
    }

    let (filename, content_type, data) =
        upload.ok_or_else(|| Error::BadRequest("missing multipart field `file`".into()))?;
    let blob = state
        .blobs
        .save(data, &filename, content_type.as_deref())
        .await?;

    info!("POST /upload - {} stored as {}", filename, blob.key);
    Ok(Json(blob))
}

/// GET /files/{key}
pub async fn download_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response> {
    let blob = state
        .blobs
        .load(&key)
        .await?
        .ok_or_else(|| Error::NotFound(format!("file {}", key)))?;

    Ok(([(header::CONTENT_TYPE, blob.content_type)], blob.bytes).into_response())
}
