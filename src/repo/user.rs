// src/repo/user.rs

use sqlx::SqlitePool;

use crate::{error::AppError, models::user::User};

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, email, password, created_at FROM users WHERE id = ?",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, email, password, created_at FROM users WHERE email = ?",
    )
    .bind(email)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

pub async fn find_by_username(pool: &SqlitePool, username: &str) -> Result<Option<User>, AppError> {
    let user = sqlx::query_as::<_, User>(
        "SELECT id, username, email, password, created_at FROM users WHERE username = ?",
    )
    .bind(username)
    .fetch_optional(pool)
    .await?;

    Ok(user)
}

/// Inserts a new user and reads the stored row back.
pub async fn insert(
    pool: &SqlitePool,
    username: &str,
    email: &str,
    password_hash: &str,
) -> Result<User, AppError> {
    let result = sqlx::query(
        "INSERT INTO users (username, email, password, created_at) VALUES (?, ?, ?, ?)",
    )
    .bind(username)
    .bind(email)
    .bind(password_hash)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await
    .map_err(|e| {
        // SQLite reports duplicates as UNIQUE constraint failures; a
        // concurrent register can slip past the handler's pre-checks
        let msg = e.to_string();
        if msg.contains("UNIQUE constraint failed: users.email") {
            AppError::Conflict("Email already registered".to_string())
        } else if msg.contains("UNIQUE constraint failed: users.username") {
            AppError::Conflict("Username already taken".to_string())
        } else {
            AppError::from(e)
        }
    })?;

    let id = result.last_insert_rowid();

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::Internal("user row missing after insert".to_string()))
}
