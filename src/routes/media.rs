//! Media store endpoints: upload, listing, blob access, deletion

use axum::{
    Json, Router,
    extract::{Multipart, Path, Query, State},
    http::{StatusCode, header},
    response::IntoResponse,
    routing::{get, post},
};
use bytes::Bytes;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use uuid::Uuid;

use super::auth::{AuthSession, ControllerSession};
use crate::AppState;
use crate::constants::{MAX_MEDIA_UPLOAD_SIZE, SIGNED_URL_EXPIRY_SECS};
use crate::domain::media as media_domain;
use crate::models::{MediaItem, MediaKind};
use crate::services::error::LogErr;
use crate::services::notify;
use crate::storage;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/media", post(upload_media).get(list_media))
        .route("/media/{id}", get(get_media).delete(delete_media))
        .route("/media/{id}/url", get(get_media_url))
        .route("/files/{*path}", get(serve_file))
}

#[derive(Serialize)]
struct ErrorMessage {
    error: String,
}

type Rejection = (StatusCode, Json<ErrorMessage>);

fn reject(status: StatusCode, message: impl Into<String>) -> Rejection {
    (
        status,
        Json(ErrorMessage {
            error: message.into(),
        }),
    )
}

/// POST /media - Upload a media file (controller only)
///
/// Multipart fields: `file` (the blob, with its content type),
/// `slot_minutes` (required, >= 1), `name` (optional, defaults to the
/// uploaded filename). Validation rejects before anything is stored;
/// a rejected upload can simply be re-submitted.
async fn upload_media(
    State(state): State<Arc<AppState>>,
    ControllerSession(session): ControllerSession,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<MediaItem>), Rejection> {
    let mut file: Option<(Bytes, String, Option<String>)> = None;
    let mut name: Option<String> = None;
    let mut slot_minutes: Option<i64> = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| reject(StatusCode::BAD_REQUEST, format!("Multipart error: {}", e)))?
    {
        match field.name() {
            Some("file") => {
                let content_type = field
                    .content_type()
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| "application/octet-stream".to_string());
                let file_name = field.file_name().map(|s| s.to_string());
                let bytes = field.bytes().await.map_err(|e| {
                    reject(StatusCode::BAD_REQUEST, format!("Failed to read file: {}", e))
                })?;
                file = Some((bytes, content_type, file_name));
            }
            Some("name") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| reject(StatusCode::BAD_REQUEST, "Invalid name field"))?;
                if !text.is_empty() {
                    name = Some(text);
                }
            }
            Some("slot_minutes") => {
                let text = field
                    .text()
                    .await
                    .map_err(|_| reject(StatusCode::BAD_REQUEST, "Invalid slot_minutes field"))?;
                slot_minutes = Some(text.parse().map_err(|_| {
                    reject(StatusCode::BAD_REQUEST, "slot_minutes must be a number")
                })?);
            }
            _ => continue,
        }
    }

    let (bytes, content_type, file_name) =
        file.ok_or_else(|| reject(StatusCode::BAD_REQUEST, "Missing file"))?;
    let slot_minutes = slot_minutes
        .ok_or_else(|| reject(StatusCode::BAD_REQUEST, "Missing slot duration"))?;

    if slot_minutes < 1 {
        return Err(reject(
            StatusCode::BAD_REQUEST,
            "Slot duration must be at least 1 minute",
        ));
    }
    if bytes.len() > MAX_MEDIA_UPLOAD_SIZE {
        return Err(reject(StatusCode::PAYLOAD_TOO_LARGE, "File too large"));
    }
    let kind = MediaKind::from_content_type(&content_type).ok_or_else(|| {
        reject(
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            format!("Unsupported content type: {}", content_type),
        )
    })?;

    let name = name
        .or(file_name)
        .unwrap_or_else(|| "untitled".to_string());

    // Path: video/user_<uuid>/2026-08-06/1754500000000.mp4
    let now = Utc::now();
    let day_bucket = now.format("%Y-%m-%d").to_string();
    let blob_path = format!(
        "{}/user_{}/{}/{}.{}",
        kind.as_str(),
        session.user_id,
        day_bucket,
        now.timestamp_millis(),
        storage::get_extension(&content_type)
    );

    storage::upload_blob(
        state.gcs.as_ref(),
        state.local_storage_path.as_ref(),
        &state.bucket_name,
        &blob_path,
        &bytes,
    )
    .await
    .map_err(|e| {
        tracing::error!("Blob upload error: {}", e);
        reject(StatusCode::INTERNAL_SERVER_ERROR, "Storage error")
    })?;

    let slot_duration_ms = slot_minutes * crate::constants::SLOT_MINUTE_MS;
    let item = media_domain::insert_media(
        &state.db,
        session.user_id,
        &name,
        kind,
        &blob_path,
        slot_duration_ms,
    )
    .await
    .map_err(|e| {
        tracing::error!("Insert media error: {}", e);
        reject(StatusCode::INTERNAL_SERVER_ERROR, "Database error")
    })?;

    // Library subscribers pick the new item up; a failed notification
    // does not fail the upload
    if let Err(e) = notify::broadcast_library(&state.db, &state.hub).await {
        tracing::warn!("Library broadcast after upload failed: {}", e);
    }

    Ok((StatusCode::CREATED, Json(item)))
}

#[derive(Deserialize)]
struct ListParams {
    /// `owner=me` restricts the list to the caller's uploads
    owner: Option<String>,
}

/// GET /media - List media, newest first
async fn list_media(
    State(state): State<Arc<AppState>>,
    AuthSession(session): AuthSession,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<MediaItem>>, StatusCode> {
    let owner = match params.owner.as_deref() {
        Some("me") => Some(session.user_id),
        _ => None,
    };

    let items = media_domain::list_media(&state.db, owner)
        .await
        .log_500("List media error")?;

    Ok(Json(items))
}

/// GET /media/{id} - Get a single media record
async fn get_media(
    State(state): State<Arc<AppState>>,
    AuthSession(_session): AuthSession,
    Path(media_id): Path<Uuid>,
) -> Result<Json<MediaItem>, StatusCode> {
    let item = media_domain::get_media(&state.db, media_id)
        .await
        .log_500("Get media error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    Ok(Json(item))
}

/// DELETE /media/{id} - Remove an upload (owner only). An active pointer
/// at the deleted item resolves soft to null afterwards.
async fn delete_media(
    State(state): State<Arc<AppState>>,
    ControllerSession(session): ControllerSession,
    Path(media_id): Path<Uuid>,
) -> Result<StatusCode, StatusCode> {
    let deleted = media_domain::delete_media(&state.db, media_id, session.user_id)
        .await
        .log_500("Delete media error")?;

    if !deleted {
        return Err(StatusCode::NOT_FOUND);
    }

    if let Err(e) = notify::broadcast_library(&state.db, &state.hub).await {
        tracing::warn!("Library broadcast after delete failed: {}", e);
    }

    Ok(StatusCode::NO_CONTENT)
}

#[derive(Serialize)]
struct MediaUrlResponse {
    url: String,
}

/// GET /media/{id}/url - Resolve a media record to a fetchable URL:
/// a signed GCS URL when running against GCS, otherwise the local
/// file-serving path.
async fn get_media_url(
    State(state): State<Arc<AppState>>,
    AuthSession(_session): AuthSession,
    Path(media_id): Path<Uuid>,
) -> Result<Json<MediaUrlResponse>, StatusCode> {
    let item = media_domain::get_media(&state.db, media_id)
        .await
        .log_500("Get media error")?
        .ok_or(StatusCode::NOT_FOUND)?;

    if state.local_storage_path.is_some() {
        return Ok(Json(MediaUrlResponse {
            url: format!("/files/{}", item.url),
        }));
    }

    let client = cloud_storage::Client::default();
    let object = client
        .object()
        .read(&state.bucket_name, &item.url)
        .await
        .log_500("Object read error")?;

    let signed_url = object
        .download_url(SIGNED_URL_EXPIRY_SECS)
        .log_500("Signed URL error")?;

    Ok(Json(MediaUrlResponse { url: signed_url }))
}

/// GET /files/{*path} - Serve a stored blob directly (local deployments)
async fn serve_file(
    State(state): State<Arc<AppState>>,
    Path(path): Path<String>,
) -> Result<impl IntoResponse, StatusCode> {
    // Path traversal protection
    if path.contains("..") || path.contains('\0') || path.starts_with('/') {
        return Err(StatusCode::FORBIDDEN);
    }

    let bytes = storage::download_blob(
        state.gcs.as_ref(),
        state.local_storage_path.as_ref(),
        &state.bucket_name,
        &path,
    )
    .await
    .map_err(|_| StatusCode::NOT_FOUND)?;

    // Blob paths embed the upload timestamp, so the content never
    // changes under a given path: cache hard
    Ok((
        [
            (header::CONTENT_TYPE, storage::content_type_for(&path)),
            (
                header::CACHE_CONTROL,
                "public, max-age=31536000, immutable",
            ),
        ],
        bytes,
    ))
}
