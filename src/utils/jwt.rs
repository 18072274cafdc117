// src/utils/jwt.rs

use std::time::{SystemTime, UNIX_EPOCH};

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request, header},
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use sqlx::SqlitePool;

use crate::{config::Config, error::AppError, repo, state::AppState};

/// JWT Claims structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Claims {
    /// Subject - Stores the User ID (as string).
    pub sub: String,
    /// Expiration time as Unix timestamp.
    pub exp: usize,
}

/// Authenticated identity, injected into request extensions by
/// `auth_middleware` and resolved for WebSocket handshakes.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub id: i64,
    pub username: String,
}

/// Outcome of resolving a bearer credential.
#[derive(Debug, Clone)]
pub enum Caller {
    /// Verified token for a user that still exists.
    User(AuthUser),
    /// No credential presented.
    Anonymous,
    /// Credential presented but rejected, with the reason.
    Invalid(String),
}

/// Signs a new JWT for the user.
pub fn sign_jwt(id: i64, secret: &str, expiration_seconds: u64) -> Result<String, AppError> {
    // Calculate expiration: current time + expiration_seconds
    let expiration = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_err(|e| AppError::Internal(e.to_string()))?
        .as_secs() as usize
        + expiration_seconds as usize;

    let claims = Claims {
        sub: id.to_string(), // Store User ID in 'sub' claim
        exp: expiration,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(e.to_string()))
}

/// Verifies and decodes a JWT string.
///
/// Returns the `Claims` if valid. Expiry gets its own message so clients
/// can tell a stale session from a forged token.
pub fn verify_jwt(token: &str, secret: &str) -> Result<Claims, AppError> {
    let token_data = decode(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => AppError::Unauthenticated(
            "Your token has expired. Please log in again.".to_string(),
        ),
        _ => AppError::Unauthenticated("Invalid token. Please log in again.".to_string()),
    })?;

    Ok(token_data.claims)
}

/// Pulls the token out of an 'Authorization: Bearer <token>' header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
}

/// Resolves an optional bearer token into a caller identity.
///
/// Verification covers the signature, the expiry, and the subject user
/// still existing. HTTP middleware rejects everything but `Caller::User`;
/// the WebSocket handshake downgrades the rest to a guest subscriber.
/// `Err` is reserved for infrastructure failures (database down).
pub async fn resolve_bearer(
    pool: &SqlitePool,
    config: &Config,
    token: Option<&str>,
) -> Result<Caller, AppError> {
    let Some(token) = token else {
        return Ok(Caller::Anonymous);
    };

    let claims = match verify_jwt(token, &config.jwt_secret) {
        Ok(claims) => claims,
        Err(AppError::Unauthenticated(msg)) => return Ok(Caller::Invalid(msg)),
        Err(e) => return Err(e),
    };

    let user_id: i64 = match claims.sub.parse() {
        Ok(id) => id,
        Err(_) => {
            return Ok(Caller::Invalid(
                "Invalid token. Please log in again.".to_string(),
            ));
        }
    };

    match repo::user::find_by_id(pool, user_id).await? {
        Some(user) => Ok(Caller::User(AuthUser {
            id: user.id,
            username: user.username,
        })),
        None => Ok(Caller::Invalid(
            "The user belonging to this token no longer exists.".to_string(),
        )),
    }
}

/// Axum Middleware: Authentication.
///
/// Validates the 'Authorization: Bearer <token>' header.
/// If valid, injects `AuthUser` into the request extensions for handlers
/// to use. If missing or invalid, returns 401 Unauthorized.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(req.headers());

    match resolve_bearer(&state.pool, &state.config, token).await? {
        Caller::User(user) => {
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        Caller::Anonymous => Err(AppError::Unauthenticated(
            "You are not logged in. Please log in to access this resource.".to_string(),
        )),
        Caller::Invalid(reason) => Err(AppError::Unauthenticated(reason)),
    }
}
