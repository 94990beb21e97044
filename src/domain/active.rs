//! Active-media register - the per-controller "what is live" pointer
//!
//! Activation always goes through the same upsert path keyed on
//! `controller_id`, so there is never more than one pointer row per
//! controller: activating REPLACES the pointer, deactivating writes the
//! same row with a null media id. Reads resolve the pointer to its media
//! record and fail soft (None) on a null or dangling reference.

use chrono::Utc;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::models::{ActivePointer, MediaItem};

#[derive(Debug)]
pub enum RegisterError {
    MediaNotFound,
    Database(sqlx::Error),
}

impl std::fmt::Display for RegisterError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RegisterError::MediaNotFound => write!(f, "Media not found"),
            RegisterError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for RegisterError {}

impl From<sqlx::Error> for RegisterError {
    fn from(e: sqlx::Error) -> Self {
        RegisterError::Database(e)
    }
}

/// Result of an activate call. `changed` is false for an idempotent
/// re-activation of the already-active item: observers get no
/// notification for those, and `slot_ends_at` is untouched either way.
#[derive(Debug)]
pub struct ActivationOutcome {
    pub pointer: ActivePointer,
    pub media: MediaItem,
    pub changed: bool,
}

#[derive(Debug)]
pub struct DeactivationOutcome {
    pub pointer: ActivePointer,
    pub changed: bool,
}

/// Point the controller's register at `media_id`.
///
/// Fails with `MediaNotFound` before any pointer mutation when the media
/// row is absent. Runs in a transaction: the previous pointer is read
/// under lock so the `changed` flag can't race a concurrent activation
/// from another tab (last write wins on the row itself).
pub async fn activate(
    db: &PgPool,
    controller_id: Uuid,
    media_id: Uuid,
) -> Result<ActivationOutcome, RegisterError> {
    let mut tx = db.begin().await?;

    let media: Option<MediaItem> = sqlx::query_as(
        r#"
        SELECT id, owner_id, name, kind, url, interaction_count,
               slot_duration_ms, slot_ends_at, created_at
        FROM media WHERE id = $1
        "#,
    )
    .bind(media_id)
    .fetch_optional(&mut *tx)
    .await?;

    let media = media.ok_or(RegisterError::MediaNotFound)?;

    let previous: Option<(Option<Uuid>,)> = sqlx::query_as(
        "SELECT media_id FROM active_media WHERE controller_id = $1 FOR UPDATE",
    )
    .bind(controller_id)
    .fetch_optional(&mut *tx)
    .await?;

    let pointer = upsert_pointer(&mut tx, controller_id, Some(media_id)).await?;

    tx.commit().await?;

    let changed = previous.map(|(prev,)| prev) != Some(Some(media_id));
    Ok(ActivationOutcome {
        pointer,
        media,
        changed,
    })
}

/// Clear the controller's register. Always succeeds, always bumps
/// `activated_at`; deactivating while already inactive is a no-op for
/// observers (`changed == false`) but still touches the row.
pub async fn deactivate(
    db: &PgPool,
    controller_id: Uuid,
) -> Result<DeactivationOutcome, RegisterError> {
    let mut tx = db.begin().await?;

    let previous: Option<(Option<Uuid>,)> = sqlx::query_as(
        "SELECT media_id FROM active_media WHERE controller_id = $1 FOR UPDATE",
    )
    .bind(controller_id)
    .fetch_optional(&mut *tx)
    .await?;

    let pointer = upsert_pointer(&mut tx, controller_id, None).await?;

    tx.commit().await?;

    let changed = matches!(previous, Some((Some(_),)));
    Ok(DeactivationOutcome { pointer, changed })
}

/// The single replace-path shared by activate and deactivate. Upsert on
/// the primary key guarantees at most one row per controller.
async fn upsert_pointer(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    controller_id: Uuid,
    media_id: Option<Uuid>,
) -> Result<ActivePointer, sqlx::Error> {
    sqlx::query_as(
        r#"
        INSERT INTO active_media (controller_id, media_id, activated_at)
        VALUES ($1, $2, $3)
        ON CONFLICT (controller_id)
        DO UPDATE SET media_id = EXCLUDED.media_id, activated_at = EXCLUDED.activated_at
        RETURNING controller_id, media_id, activated_at
        "#,
    )
    .bind(controller_id)
    .bind(media_id)
    .bind(Utc::now())
    .fetch_one(&mut **tx)
    .await
}

/// Read the raw pointer row (None = never activated)
pub async fn get_pointer<'e, E>(
    executor: E,
    controller_id: Uuid,
) -> Result<Option<ActivePointer>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        "SELECT controller_id, media_id, activated_at FROM active_media WHERE controller_id = $1",
    )
    .bind(controller_id)
    .fetch_optional(executor)
    .await
}

/// Resolve the controller's pointer to its media record. A null pointer,
/// a missing row, and a pointer whose media was deleted all come back as
/// None rather than an error.
pub async fn get_active<'e, E>(
    executor: E,
    controller_id: Uuid,
) -> Result<Option<MediaItem>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT m.id, m.owner_id, m.name, m.kind, m.url, m.interaction_count,
               m.slot_duration_ms, m.slot_ends_at, m.created_at
        FROM active_media a
        JOIN media m ON m.id = a.media_id
        WHERE a.controller_id = $1
        "#,
    )
    .bind(controller_id)
    .fetch_optional(executor)
    .await
}
