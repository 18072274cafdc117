// src/handlers/comment.rs

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde_json::json;
use sqlx::SqlitePool;

use crate::{
    error::AppError,
    fanout::{CommentEvent, CommentsHub},
    models::comment::{CreateCommentRequest, ListCommentsQuery, UpdateCommentRequest},
    services,
    utils::jwt::AuthUser,
};

/// Lists comments with pagination, sorting and parent filtering.
///
/// Without `parentComment` only top-level comments are returned; with it,
/// the replies of that id (even if the parent itself is gone).
pub async fn list_comments(
    State(pool): State<SqlitePool>,
    Query(query): Query<ListCommentsQuery>,
) -> Result<impl IntoResponse, AppError> {
    let page = services::comment::list_comments(&pool, &query).await?;

    Ok(Json(json!({
        "status": "success",
        "data": page,
    })))
}

pub async fn get_comment(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comment = services::comment::get_comment(&pool, id).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "comment": comment },
    })))
}

/// Creates a comment (or a reply, when `parentComment` is set).
/// Broadcasts `comment:new` to subscribers after the write succeeds.
pub async fn create_comment(
    State(pool): State<SqlitePool>,
    State(hub): State<CommentsHub>,
    Extension(auth): Extension<AuthUser>,
    Json(payload): Json<CreateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let comment = services::comment::create_comment(&pool, auth.id, payload).await?;

    // Best effort: the response does not wait on subscribers
    hub.broadcast(CommentEvent::New(comment.clone()));

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "status": "success",
            "data": { "comment": comment },
        })),
    ))
}

pub async fn update_comment(
    State(pool): State<SqlitePool>,
    State(hub): State<CommentsHub>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateCommentRequest>,
) -> Result<impl IntoResponse, AppError> {
    let comment = services::comment::update_comment(&pool, id, auth.id, payload).await?;

    hub.broadcast(CommentEvent::Update(comment.clone()));

    Ok(Json(json!({
        "status": "success",
        "data": { "comment": comment },
    })))
}

pub async fn delete_comment(
    State(pool): State<SqlitePool>,
    State(hub): State<CommentsHub>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    services::comment::delete_comment(&pool, id, auth.id).await?;

    hub.broadcast(CommentEvent::Delete(id));

    Ok(Json(json!({
        "status": "success",
        "data": { "message": "Comment deleted successfully" },
    })))
}

/// Toggles the caller's like and returns the updated comment.
/// Subscribers see the change as a `comment:update` event.
pub async fn toggle_like(
    State(pool): State<SqlitePool>,
    State(hub): State<CommentsHub>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comment = services::comment::toggle_like(&pool, id, auth.id).await?;

    hub.broadcast(CommentEvent::Update(comment.clone()));

    Ok(Json(json!({
        "status": "success",
        "data": { "comment": comment },
    })))
}

pub async fn toggle_dislike(
    State(pool): State<SqlitePool>,
    State(hub): State<CommentsHub>,
    Extension(auth): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let comment = services::comment::toggle_dislike(&pool, id, auth.id).await?;

    hub.broadcast(CommentEvent::Update(comment.clone()));

    Ok(Json(json!({
        "status": "success",
        "data": { "comment": comment },
    })))
}

pub async fn list_replies(
    State(pool): State<SqlitePool>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let replies = services::comment::list_replies(&pool, id).await?;

    Ok(Json(json!({
        "status": "success",
        "data": { "replies": replies },
    })))
}
