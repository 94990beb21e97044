pub mod active;
pub mod auth;
pub mod interactions;
pub mod media;
pub mod sync;

use axum::Router;
use std::sync::Arc;

use crate::AppState;

/// Build all routes for the API
pub fn build_routes() -> Router<Arc<AppState>> {
    Router::new()
        .merge(active::routes())
        .merge(auth::routes())
        .merge(interactions::routes())
        .merge(media::routes())
        .merge(sync::routes())
}
