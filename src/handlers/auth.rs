// src/handlers/auth.rs

use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use serde_json::json;
use sqlx::SqlitePool;
use validator::Validate;

use crate::{
    config::Config,
    error::AppError,
    models::user::{LoginRequest, RegisterRequest},
    repo,
    utils::{
        hash::{hash_password, verify_password},
        jwt::{AuthUser, sign_jwt},
    },
};

/// Registers a new user.
///
/// Hashes the password using Argon2 before storing it.
/// Returns 201 Created with a signed token and the user (excluding password).
pub async fn register(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<RegisterRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::Validation(validation_errors.to_string()));
    }

    // 1. Reject duplicate identities with a field-specific message
    if repo::user::find_by_email(&pool, &payload.email).await?.is_some() {
        return Err(AppError::Conflict("Email already registered".to_string()));
    }
    if repo::user::find_by_username(&pool, &payload.username)
        .await?
        .is_some()
    {
        return Err(AppError::Conflict("Username already taken".to_string()));
    }

    // 2. Hash and insert
    let hashed_password = hash_password(&payload.password)?;
    let user = repo::user::insert(&pool, &payload.username, &payload.email, &hashed_password).await?;

    // 3. Sign a token so the client is logged in right away
    let token = sign_jwt(user.id, &config.jwt_secret, config.jwt_expiration)?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "token": token,
            "data": { "user": user },
        })),
    ))
}

/// Authenticates a user and returns a JWT token.
pub async fn login(
    State(pool): State<SqlitePool>,
    State(config): State<Config>,
    Json(payload): Json<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    if payload.validate().is_err() {
        return Err(AppError::Validation(
            "Please provide email and password".to_string(),
        ));
    }

    // Unknown email and wrong password share one message
    let user = repo::user::find_by_email(&pool, &payload.email)
        .await?
        .ok_or_else(|| AppError::Unauthenticated("Invalid email or password".to_string()))?;

    let is_valid = verify_password(&payload.password, &user.password)?;
    if !is_valid {
        return Err(AppError::Unauthenticated(
            "Invalid email or password".to_string(),
        ));
    }

    let token = sign_jwt(user.id, &config.jwt_secret, config.jwt_expiration)?;

    Ok(Json(json!({
        "status": "success",
        "token": token,
        "data": { "user": user },
    })))
}

/// Returns the authenticated user's profile.
pub async fn me(
    State(pool): State<SqlitePool>,
    Extension(auth): Extension<AuthUser>,
) -> Result<impl IntoResponse, AppError> {
    let user = repo::user::find_by_id(&pool, auth.id)
        .await?
        .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

    Ok(Json(json!({
        "status": "success",
        "data": { "user": user },
    })))
}
