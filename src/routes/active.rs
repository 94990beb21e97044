//! Active-media register endpoints
//!
//! Controllers mutate their own pointer; any authenticated role can read
//! any controller's pointer (that is how client viewers bootstrap before
//! their sync subscription takes over).

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::{delete, get, post},
};
use std::sync::Arc;
use uuid::Uuid;

use super::auth::{AuthSession, ControllerSession};
use crate::AppState;
use crate::domain::active as register;
use crate::services::error::LogErr;
use crate::services::notify::{self, ActiveMediaState};

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/active/{media_id}", post(activate))
        .route("/active", delete(deactivate))
        .route("/controllers/{controller_id}/active", get(get_active))
}

/// POST /active/{media_id} - Point the caller's register at a media item
///
/// 404 when the media does not exist; the previous pointer stays put in
/// that case. Re-activating the already-active item changes nothing for
/// subscribers and never restarts the countdown (`slot_ends_at` is fixed
/// at upload).
async fn activate(
    State(state): State<Arc<AppState>>,
    ControllerSession(session): ControllerSession,
    Path(media_id): Path<Uuid>,
) -> Result<Json<ActiveMediaState>, StatusCode> {
    let outcome = register::activate(&state.db, session.user_id, media_id)
        .await
        .map_err(|e| match e {
            register::RegisterError::MediaNotFound => StatusCode::NOT_FOUND,
            register::RegisterError::Database(e) => {
                tracing::error!("Activate error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    let event = ActiveMediaState {
        controller_id: session.user_id,
        media: Some(outcome.media),
        activated_at: Some(outcome.pointer.activated_at),
    };

    if outcome.changed {
        state.hub.publish_active(event.clone());
    }

    Ok(Json(event))
}

/// DELETE /active - Clear the caller's register
///
/// Always succeeds; deactivating while nothing is active still bumps
/// `activated_at` but notifies nobody.
async fn deactivate(
    State(state): State<Arc<AppState>>,
    ControllerSession(session): ControllerSession,
) -> Result<Json<ActiveMediaState>, StatusCode> {
    let outcome = register::deactivate(&state.db, session.user_id)
        .await
        .log_500("Deactivate error")?;

    let event = ActiveMediaState {
        controller_id: session.user_id,
        media: None,
        activated_at: Some(outcome.pointer.activated_at),
    };

    if outcome.changed {
        state.hub.publish_active(event.clone());
    }

    Ok(Json(event))
}

/// GET /controllers/{controller_id}/active - Resolve a controller's live media
///
/// A never-activated controller, a deactivated one, and one whose active
/// media has since been deleted all answer with `media: null`.
async fn get_active(
    State(state): State<Arc<AppState>>,
    AuthSession(_session): AuthSession,
    Path(controller_id): Path<Uuid>,
) -> Result<Json<ActiveMediaState>, StatusCode> {
    let state_snapshot = notify::resolve_active_state(&state.db, controller_id)
        .await
        .log_500("Get active error")?;

    Ok(Json(state_snapshot))
}
