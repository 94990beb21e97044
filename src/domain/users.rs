//! User domain - DB queries for users
//!
//! All functions use the generic Executor pattern, allowing them to work
//! with both `&PgPool` (for standalone queries) and `&mut PgConnection`
//! (for transactions).

use chrono::{DateTime, Utc};
use sqlx::{Executor, Postgres};
use uuid::Uuid;

use crate::models::Role;

#[derive(Debug, sqlx::FromRow)]
pub struct UserRecord {
    pub id: Uuid,
    pub email: String,
    pub password_hash: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
pub struct UserBasicInfo {
    pub email: String,
    #[sqlx(try_from = "String")]
    pub role: Role,
}

/// Insert a new user; returns the generated id. The unique constraint on
/// email surfaces as `sqlx::Error::Database` for the caller to map.
pub async fn create_user<'e, E>(
    executor: E,
    email: &str,
    password_hash: &str,
    role: Role,
) -> Result<Uuid, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    let row: (Uuid,) = sqlx::query_as(
        r#"
        INSERT INTO users (email, password_hash, role)
        VALUES ($1, $2, $3)
        RETURNING id
        "#,
    )
    .bind(email)
    .bind(password_hash)
    .bind(role.as_str())
    .fetch_one(executor)
    .await?;

    Ok(row.0)
}

/// Look up a user by email (for login)
pub async fn get_user_by_email<'e, E>(
    executor: E,
    email: &str,
) -> Result<Option<UserRecord>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as(
        r#"
        SELECT id, email, password_hash, role, created_at
        FROM users WHERE email = $1
        "#,
    )
    .bind(email)
    .fetch_optional(executor)
    .await
}

/// Get basic user info by ID
pub async fn get_user_by_id<'e, E>(
    executor: E,
    user_id: Uuid,
) -> Result<Option<UserBasicInfo>, sqlx::Error>
where
    E: Executor<'e, Database = Postgres>,
{
    sqlx::query_as("SELECT email, role FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(executor)
        .await
}
