//! Session management: JWT access tokens and refresh tokens
//!
//! The access token carries the user id AND the role, so every handler
//! receives an explicit `Session` value rather than consulting ambient
//! auth state. Refresh tokens are opaque, stored server-side, and
//! rotated on every use.

use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::Role;

/// JWT claims for access tokens
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String,  // user_id as uuid string
    pub role: String, // "controller" | "client"
    pub exp: i64,     // expiry timestamp
    pub iat: i64,     // issued at
}

/// The authenticated caller, threaded explicitly through handlers.
/// Created on login, destroyed on logout; never global.
#[derive(Debug, Clone, Copy)]
pub struct Session {
    pub user_id: Uuid,
    pub role: Role,
}

#[derive(Debug)]
pub enum SessionError {
    InvalidToken,
    Expired,
    DatabaseError(String),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::InvalidToken => write!(f, "Invalid token"),
            SessionError::Expired => write!(f, "Token expired"),
            SessionError::DatabaseError(e) => write!(f, "Database error: {}", e),
        }
    }
}

const ACCESS_TOKEN_EXPIRY_MINUTES: i64 = 10;
const REFRESH_TOKEN_EXPIRY_DAYS: i64 = 30;

/// Create a JWT access token valid for 10 minutes
pub fn create_access_token(session: Session, secret: &[u8]) -> Result<String, SessionError> {
    let now = Utc::now();
    let exp = now + Duration::minutes(ACCESS_TOKEN_EXPIRY_MINUTES);

    let claims = Claims {
        sub: session.user_id.to_string(),
        role: session.role.as_str().to_string(),
        exp: exp.timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret),
    )
    .map_err(|_| SessionError::InvalidToken)
}

/// Validate a JWT access token and return the session it encodes
pub fn validate_access_token(token: &str, secret: &[u8]) -> Result<Session, SessionError> {
    // Explicitly validate with HS256 only to prevent algorithm confusion attacks
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_required_spec_claims(&["exp", "sub", "iat"]);

    let token_data = decode::<Claims>(token, &DecodingKey::from_secret(secret), &validation)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => SessionError::Expired,
            _ => SessionError::InvalidToken,
        })?;

    let user_id = token_data
        .claims
        .sub
        .parse::<Uuid>()
        .map_err(|_| SessionError::InvalidToken)?;
    let role =
        Role::try_from(token_data.claims.role).map_err(|_| SessionError::InvalidToken)?;

    Ok(Session { user_id, role })
}

/// Create a random refresh token and store it in the database
pub async fn create_refresh_token(user_id: Uuid, db: &PgPool) -> Result<String, SessionError> {
    let token = generate_token();
    let expires_at = Utc::now() + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(&token)
    .bind(user_id)
    .bind(expires_at)
    .execute(db)
    .await
    .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    Ok(token)
}

/// Rotate a refresh token: validate the old token, delete it, and create
/// a new one. Returns (user_id, new_refresh_token) on success. Each
/// refresh token can only be used once; the delete-and-check runs in one
/// statement so two racing requests can't both win. The transaction
/// keeps the user logged in if new-token creation fails.
pub async fn rotate_refresh_token(
    old_token: &str,
    db: &PgPool,
) -> Result<(Uuid, String), SessionError> {
    let now = Utc::now();

    let mut tx = db
        .begin()
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    let row: Option<(Uuid,)> = sqlx::query_as(
        r#"
        DELETE FROM refresh_tokens
        WHERE id = $1 AND expires_at > $2
        RETURNING user_id
        "#,
    )
    .bind(old_token)
    .bind(now)
    .fetch_optional(&mut *tx)
    .await
    .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    let user_id = row.ok_or(SessionError::InvalidToken)?.0;

    let new_token = generate_token();
    let expires_at = Utc::now() + Duration::days(REFRESH_TOKEN_EXPIRY_DAYS);

    sqlx::query(
        r#"
        INSERT INTO refresh_tokens (id, user_id, expires_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(&new_token)
    .bind(user_id)
    .bind(expires_at)
    .execute(&mut *tx)
    .await
    .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    tx.commit()
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    Ok((user_id, new_token))
}

/// Delete a specific refresh token (logout from one device)
pub async fn revoke_refresh_token(token: &str, db: &PgPool) -> Result<(), SessionError> {
    sqlx::query("DELETE FROM refresh_tokens WHERE id = $1")
        .bind(token)
        .execute(db)
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    Ok(())
}

/// Clean up expired refresh tokens (driven by the upkeep task)
pub async fn cleanup_expired_tokens(db: &PgPool) -> Result<u64, SessionError> {
    let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < NOW()")
        .execute(db)
        .await
        .map_err(|e| SessionError::DatabaseError(e.to_string()))?;

    Ok(result.rows_affected())
}

/// Random 32-byte token as hex
fn generate_token() -> String {
    use rand::Rng;
    let bytes: [u8; 32] = rand::rng().random();
    hex::encode(bytes.as_slice())
}

// Hex encoding helper since we don't want to add another dependency
mod hex {
    const HEX_CHARS: &[u8; 16] = b"0123456789abcdef";

    pub fn encode(bytes: &[u8]) -> String {
        let mut result = String::with_capacity(bytes.len() * 2);
        for byte in bytes {
            result.push(HEX_CHARS[(byte >> 4) as usize] as char);
            result.push(HEX_CHARS[(byte & 0x0f) as usize] as char);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn test_access_token_round_trip() {
        let session = Session {
            user_id: Uuid::new_v4(),
            role: Role::Controller,
        };
        let token = create_access_token(session, SECRET).unwrap();
        let decoded = validate_access_token(&token, SECRET).unwrap();
        assert_eq!(decoded.user_id, session.user_id);
        assert_eq!(decoded.role, Role::Controller);
    }

    #[test]
    fn test_access_token_wrong_secret() {
        let session = Session {
            user_id: Uuid::new_v4(),
            role: Role::Client,
        };
        let token = create_access_token(session, SECRET).unwrap();
        assert!(matches!(
            validate_access_token(&token, b"other-secret"),
            Err(SessionError::InvalidToken)
        ));
    }

    #[test]
    fn test_token_generation_is_hex() {
        let token = generate_token();
        assert_eq!(token.len(), 64);
        assert!(token.chars().all(|c| c.is_ascii_hexdigit()));
    }
}
