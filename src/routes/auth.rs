//! Authentication and session management endpoints

use axum::{
    Json, Router,
    extract::{FromRequestParts, State},
    http::{StatusCode, header::SET_COOKIE, request::Parts},
    response::{IntoResponse, Response},
    routing::{get, post},
};
use axum_extra::extract::CookieJar;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tower_governor::{
    GovernorLayer, governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor,
};
use uuid::Uuid;

use crate::AppState;
use crate::domain::users;
use crate::models::Role;
use crate::services::error::LogErr;
use crate::services::session::Session;
use crate::services::{cookies, password, session};

pub fn routes() -> Router<Arc<AppState>> {
    // Rate limit: allow a short burst, then throttle, to slow down
    // credential stuffing against login/register
    let rate_limit_config = GovernorConfigBuilder::default()
        .per_second(6)
        .burst_size(10)
        .key_extractor(SmartIpKeyExtractor)
        .finish()
        .expect("Failed to build rate limit config");

    let rate_limit_layer = GovernorLayer {
        config: rate_limit_config.into(),
    };

    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", post(refresh_session))
        .route("/auth/logout", post(logout))
        .route("/auth/me", get(get_me))
        .layer(rate_limit_layer)
}

// ============================================================================
// Auth Extractor - validates the JWT cookie and yields the Session
// ============================================================================

/// Extractor that validates the access_token cookie and returns the
/// explicit `Session` (user id + role) it encodes
pub struct AuthSession(pub Session);

impl FromRequestParts<Arc<AppState>> for AuthSession {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let jar = CookieJar::from_request_parts(parts, state)
            .await
            .log_500("Cookie extraction error")?;

        let access_token = jar
            .get(cookies::config::ACCESS_TOKEN_NAME)
            .map(|c| c.value())
            .ok_or(StatusCode::UNAUTHORIZED)?;

        let session = session::validate_access_token(access_token, &state.jwt_secret)
            .map_err(|e| {
                tracing::debug!("JWT validation failed: {}", e);
                StatusCode::UNAUTHORIZED
            })?;

        Ok(AuthSession(session))
    }
}

/// Extractor variant that additionally requires the controller role
pub struct ControllerSession(pub Session);

impl FromRequestParts<Arc<AppState>> for ControllerSession {
    type Rejection = StatusCode;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let AuthSession(session) = AuthSession::from_request_parts(parts, state).await?;
        if session.role != Role::Controller {
            return Err(StatusCode::FORBIDDEN);
        }
        Ok(ControllerSession(session))
    }
}

// ============================================================================
// Registration and login
// ============================================================================

#[derive(Deserialize)]
struct RegisterRequest {
    email: String,
    password: String,
    role: Role,
}

#[derive(Serialize)]
struct RegisterResponse {
    id: Uuid,
}

const MIN_PASSWORD_LEN: usize = 8;

/// POST /auth/register - Create a user with a role
async fn register(
    State(state): State<Arc<AppState>>,
    Json(req): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisterResponse>), StatusCode> {
    if !req.email.contains('@') || req.password.len() < MIN_PASSWORD_LEN {
        return Err(StatusCode::BAD_REQUEST);
    }

    let password_hash = password::hash_password(&req.password)
        .await
        .log_500("Password hash error")?;

    let id = users::create_user(&state.db, &req.email, &password_hash, req.role)
        .await
        .map_err(|e| match &e {
            // Unique violation on email
            sqlx::Error::Database(db) if db.is_unique_violation() => StatusCode::CONFLICT,
            _ => {
                tracing::error!("Create user error: {}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        })?;

    Ok((StatusCode::CREATED, Json(RegisterResponse { id })))
}

#[derive(Deserialize)]
struct LoginRequest {
    email: String,
    password: String,
}

#[derive(Serialize)]
struct LoginResponse {
    id: Uuid,
    email: String,
    role: Role,
}

/// POST /auth/login - Verify credentials and set session cookies
async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Response, StatusCode> {
    let user = users::get_user_by_email(&state.db, &req.email)
        .await
        .log_500("Get user by email error")?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let valid = password::verify_password(&req.password, &user.password_hash)
        .await
        .log_500("Password verify error")?;
    if !valid {
        return Err(StatusCode::UNAUTHORIZED);
    }

    let session = Session {
        user_id: user.id,
        role: user.role,
    };

    let access_token =
        session::create_access_token(session, &state.jwt_secret).log_500("Access token error")?;
    let refresh_token = session::create_refresh_token(user.id, &state.db)
        .await
        .log_500("Refresh token error")?;

    let mut response = Json(LoginResponse {
        id: user.id,
        email: user.email,
        role: user.role,
    })
    .into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, cookies::build_access_cookie(&access_token)?);
    response
        .headers_mut()
        .append(SET_COOKIE, cookies::build_refresh_cookie(&refresh_token)?);

    Ok(response)
}

// ============================================================================
// Session endpoints
// ============================================================================

/// POST /auth/refresh - Refresh the access token using the refresh token
/// cookie. Implements refresh token rotation: the old token is
/// invalidated, a new one is issued.
async fn refresh_session(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
) -> Result<Response, StatusCode> {
    let old_refresh_token = jar
        .get(cookies::config::REFRESH_TOKEN_NAME)
        .map(|c| c.value().to_string())
        .ok_or(StatusCode::UNAUTHORIZED)?;

    // Atomic rotation - two requests racing on the same token produce
    // one winner (silent - invalid tokens are expected for stale sessions)
    let (user_id, new_refresh_token) = session::rotate_refresh_token(&old_refresh_token, &state.db)
        .await
        .map_err(|_| StatusCode::UNAUTHORIZED)?;

    // The role rides in the JWT, so re-read it for the fresh token
    let user = users::get_user_by_id(&state.db, user_id)
        .await
        .log_500("Get user by ID error")?
        .ok_or(StatusCode::UNAUTHORIZED)?;

    let access_token = session::create_access_token(
        Session {
            user_id,
            role: user.role,
        },
        &state.jwt_secret,
    )
    .log_500("Access token error")?;

    let mut response = StatusCode::NO_CONTENT.into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, cookies::build_access_cookie(&access_token)?);
    response.headers_mut().append(
        SET_COOKIE,
        cookies::build_refresh_cookie(&new_refresh_token)?,
    );

    Ok(response)
}

/// POST /auth/logout - Clear session and revoke refresh token
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> Response {
    if let Some(refresh_token) = jar.get(cookies::config::REFRESH_TOKEN_NAME) {
        if let Err(e) = session::revoke_refresh_token(refresh_token.value(), &state.db).await {
            // Log but don't fail logout - the user is still logged out client-side
            tracing::warn!("Failed to revoke refresh token during logout: {}", e);
        }
    }

    let mut response = StatusCode::NO_CONTENT.into_response();
    response
        .headers_mut()
        .append(SET_COOKIE, cookies::build_clear_access_cookie());
    response
        .headers_mut()
        .append(SET_COOKIE, cookies::build_clear_refresh_cookie());

    response
}

#[derive(Serialize)]
struct MeResponse {
    id: Uuid,
    email: String,
    role: Role,
}

/// GET /auth/me - Get current user info (validates session)
async fn get_me(
    State(state): State<Arc<AppState>>,
    AuthSession(session): AuthSession,
) -> Result<Json<MeResponse>, StatusCode> {
    let user = users::get_user_by_id(&state.db, session.user_id)
        .await
        .log_500("Get user by ID error")?;

    // 401 if the user is gone - a valid JWT for a deleted user is still
    // unauthorized
    let user = user.ok_or(StatusCode::UNAUTHORIZED)?;

    Ok(Json(MeResponse {
        id: session.user_id,
        email: user.email,
        role: user.role,
    }))
}
