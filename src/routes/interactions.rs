//! Interaction tracking endpoint
//!
//! The increment is atomic in SQL, so concurrent viewers can never lose
//! updates; there is deliberately no idempotency key (a viewer that
//! bypasses the client-side guard double-counts). Frontends fire this
//! and keep playing: a tracking failure is logged here and must never
//! gate playback.

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::auth::AuthSession;
use crate::AppState;
use crate::domain::media::{self, TrackingError};
use crate::services::notify;
use crate::services::rate_limit::INTERACTION_RATE_LIMITER;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/media/{id}/interactions", post(record_interaction))
}

#[derive(Serialize)]
struct InteractionResponse {
    interaction_count: i64,
}

/// POST /media/{id}/interactions - Record one viewer engagement
async fn record_interaction(
    State(state): State<Arc<AppState>>,
    AuthSession(session): AuthSession,
    Path(media_id): Path<Uuid>,
) -> Result<Json<InteractionResponse>, StatusCode> {
    if !INTERACTION_RATE_LIMITER.check(session.user_id) {
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    let count = media::record_interaction(&state.db, media_id)
        .await
        .map_err(|e| {
            tracing::warn!("Interaction tracking failed for {}: {}", media_id, e);
            match e {
                TrackingError::MediaNotFound => StatusCode::NOT_FOUND,
                TrackingError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            }
        })?;

    // The count change is store state, so the library channel carries it
    if let Err(e) = notify::broadcast_library(&state.db, &state.hub).await {
        tracing::warn!("Library broadcast after interaction failed: {}", e);
    }

    Ok(Json(InteractionResponse {
        interaction_count: count,
    }))
}
