//! Media domain - DB queries for the media store
//!
//! All functions use the generic Executor pattern, allowing them to work
//! with both `&PgPool` (for standalone queries) and `&mut PgConnection`
//! (for transactions).

use chrono::{DateTime, Duration, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::{MediaItem, MediaKind};

const MEDIA_COLUMNS: &str =
    "id, owner_id, name, kind, url, interaction_count, slot_duration_ms, slot_ends_at, created_at";

/// Error types for interaction tracking. Callers log these and move on -
/// a failed increment must never block playback.
#[derive(Debug)]
pub enum TrackingError {
    MediaNotFound,
    Database(sqlx::Error),
}

impl std::fmt::Display for TrackingError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TrackingError::MediaNotFound => write!(f, "Media not found"),
            TrackingError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for TrackingError {}

impl From<sqlx::Error> for TrackingError {
    fn from(e: sqlx::Error) -> Self {
        TrackingError::Database(e)
    }
}

/// Insert a new media record. `slot_ends_at` is computed here, exactly
/// once, as `created_at + slot_duration_ms`; activation never touches it.
pub async fn insert_media<'e, E>(
    executor: E,
    owner_id: Uuid,
    name: &str,
    kind: MediaKind,
    url: &str,
    slot_duration_ms: i64,
) -> Result<MediaItem, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let created_at = Utc::now();
    let slot_ends_at = slot_end(created_at, slot_duration_ms);

    sqlx::query_as(&format!(
        r#"
        INSERT INTO media (owner_id, name, kind, url, slot_duration_ms, slot_ends_at, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        RETURNING {}
        "#,
        MEDIA_COLUMNS
    ))
    .bind(owner_id)
    .bind(name)
    .bind(kind.as_str())
    .bind(url)
    .bind(slot_duration_ms)
    .bind(slot_ends_at)
    .bind(created_at)
    .fetch_one(executor)
    .await
}

/// Get a single media record by id
pub async fn get_media<'e, E>(
    executor: E,
    media_id: Uuid,
) -> Result<Option<MediaItem>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(&format!(
        "SELECT {} FROM media WHERE id = $1",
        MEDIA_COLUMNS
    ))
    .bind(media_id)
    .fetch_optional(executor)
    .await
}

/// List media, newest first, optionally restricted to one owner
pub async fn list_media<'e, E>(
    executor: E,
    owner_id: Option<Uuid>,
) -> Result<Vec<MediaItem>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    match owner_id {
        Some(owner) => {
            sqlx::query_as(&format!(
                "SELECT {} FROM media WHERE owner_id = $1 ORDER BY created_at DESC",
                MEDIA_COLUMNS
            ))
            .bind(owner)
            .fetch_all(executor)
            .await
        }
        None => {
            sqlx::query_as(&format!(
                "SELECT {} FROM media ORDER BY created_at DESC",
                MEDIA_COLUMNS
            ))
            .fetch_all(executor)
            .await
        }
    }
}

/// Delete a media record, scoped to its owner. Returns false when
/// nothing matched. An active pointer at the deleted media goes null via
/// the FK and resolves soft on the next read.
pub async fn delete_media<'e, E>(
    executor: E,
    media_id: Uuid,
    owner_id: Uuid,
) -> Result<bool, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let result = sqlx::query("DELETE FROM media WHERE id = $1 AND owner_id = $2")
        .bind(media_id)
        .bind(owner_id)
        .execute(executor)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Atomically increment a media record's interaction count and return
/// the new value. The increment happens in SQL, not read-modify-write at
/// the caller, so concurrent viewers never lose updates. At-least-once:
/// there is no idempotency key here: per-session dedup is the viewer's
/// policy (see `viewer::ViewerSession`).
pub async fn record_interaction<'e, E>(
    executor: E,
    media_id: Uuid,
) -> Result<i64, TrackingError>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: Option<(i64,)> = sqlx::query_as(
        r#"
        UPDATE media
        SET interaction_count = interaction_count + 1
        WHERE id = $1
        RETURNING interaction_count
        "#,
    )
    .bind(media_id)
    .fetch_optional(executor)
    .await?;

    match row {
        Some((count,)) => Ok(count),
        None => Err(TrackingError::MediaNotFound),
    }
}

/// Timestamp helper for the remaining-time derivation: the moment a slot
/// closes is fixed data, remaining time is always `slot_ends_at - now`
/// computed by whoever is asking.
pub fn slot_end(created_at: DateTime<Utc>, slot_duration_ms: i64) -> DateTime<Utc> {
    created_at + Duration::milliseconds(slot_duration_ms)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slot_end_exact() {
        let t0 = Utc::now();
        assert_eq!(slot_end(t0, 60_000), t0 + Duration::seconds(60));
        assert_eq!(slot_end(t0, 90_500), t0 + Duration::milliseconds(90_500));
    }
}
