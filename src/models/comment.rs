// src/models/comment.rs

use serde::{Deserialize, Serialize};

/// Author info embedded in every comment payload.
/// Never carries the email or the password hash.
#[derive(Debug, Clone, Serialize)]
pub struct CommentAuthor {
    pub id: i64,
    pub username: String,
}

/// A comment as returned by the API: author joined in, reaction id sets
/// and their counts computed from the reaction tables at read time.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentResponse {
    pub id: i64,
    pub text: String,
    pub author: CommentAuthor,
    /// None for top-level comments.
    pub parent_comment: Option<i64>,
    pub likes: Vec<i64>,
    pub dislikes: Vec<i64>,
    pub like_count: i64,
    pub dislike_count: i64,
    pub created_at: chrono::DateTime<chrono::Utc>,
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

/// DTO for creating a new comment.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateCommentRequest {
    pub text: String,
    /// Optional: the ID of the comment being replied to.
    pub parent_comment: Option<i64>,
}

/// DTO for editing comment text.
#[derive(Debug, Deserialize)]
pub struct UpdateCommentRequest {
    pub text: String,
}

/// Sort keys accepted by the list endpoint.
#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SortBy {
    #[default]
    CreatedAt,
    Likes,
    Dislikes,
}

#[derive(Debug, Clone, Copy, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Query parameters for the list endpoint.
/// Without `parentComment` the listing covers top-level comments only.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListCommentsQuery {
    #[serde(default = "default_page")]
    pub page: i64,
    #[serde(default = "default_limit")]
    pub limit: i64,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub order: SortOrder,
    pub parent_comment: Option<i64>,
}

fn default_page() -> i64 {
    1
}

fn default_limit() -> i64 {
    10
}

/// Pagination metadata attached to every listing.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
}

/// One page of comments plus its pagination metadata.
#[derive(Debug, Serialize)]
pub struct CommentPage {
    pub comments: Vec<CommentResponse>,
    pub pagination: Pagination,
}
