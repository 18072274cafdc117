// src/services/comment.rs

use sqlx::SqlitePool;

use crate::{
    error::AppError,
    models::comment::{
        CommentPage, CommentResponse, CreateCommentRequest, ListCommentsQuery, Pagination,
        UpdateCommentRequest,
    },
    repo,
};

const DEFAULT_PAGE: i64 = 1;
const DEFAULT_LIMIT: i64 = 10;
const MAX_LIMIT: i64 = 100;
const MAX_TEXT_CHARS: usize = 1000;

/// Trims and checks comment text, returning the trimmed slice.
/// Length is counted in characters, not bytes.
fn validate_text(text: &str) -> Result<&str, AppError> {
    let text = text.trim();
    if text.is_empty() {
        return Err(AppError::Validation("Comment cannot be empty".to_string()));
    }
    if text.chars().count() > MAX_TEXT_CHARS {
        return Err(AppError::Validation(
            "Comment cannot exceed 1000 characters".to_string(),
        ));
    }
    Ok(text)
}

fn page_meta(total: i64, page: i64, limit: i64) -> Pagination {
    let total_pages = total.saturating_add(limit - 1) / limit;
    Pagination {
        total,
        page,
        limit,
        total_pages,
        has_next_page: page < total_pages,
        has_prev_page: page > 1,
    }
}

/// Paginated listing. Non-positive page/limit fall back to the defaults
/// and limit is capped at 100.
pub async fn list_comments(
    pool: &SqlitePool,
    query: &ListCommentsQuery,
) -> Result<CommentPage, AppError> {
    let page = if query.page < 1 { DEFAULT_PAGE } else { query.page };
    let limit = if query.limit < 1 {
        DEFAULT_LIMIT
    } else {
        query.limit.min(MAX_LIMIT)
    };

    let (comments, total) = repo::comment::list(
        pool,
        query.parent_comment,
        query.sort_by,
        query.order,
        page,
        limit,
    )
    .await?;

    Ok(CommentPage {
        comments,
        pagination: page_meta(total, page, limit),
    })
}

pub async fn get_comment(pool: &SqlitePool, id: i64) -> Result<CommentResponse, AppError> {
    repo::comment::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
}

/// Creates a comment for the authenticated author.
///
/// The parent is not checked for existence: replying to a comment deleted
/// moments ago produces an orphan, same as deleting a parent later would.
pub async fn create_comment(
    pool: &SqlitePool,
    author_id: i64,
    payload: CreateCommentRequest,
) -> Result<CommentResponse, AppError> {
    let text = validate_text(&payload.text)?;

    repo::comment::insert(pool, author_id, text, payload.parent_comment).await
}

/// Author-only text edit. A missing comment reports 404 before any
/// permission check.
pub async fn update_comment(
    pool: &SqlitePool,
    id: i64,
    user_id: i64,
    payload: UpdateCommentRequest,
) -> Result<CommentResponse, AppError> {
    let existing = repo::comment::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if existing.author.id != user_id {
        return Err(AppError::Forbidden(
            "You are not authorized to update this comment".to_string(),
        ));
    }

    let text = validate_text(&payload.text)?;

    repo::comment::update_text(pool, id, text).await
}

pub async fn delete_comment(pool: &SqlitePool, id: i64, user_id: i64) -> Result<(), AppError> {
    let existing = repo::comment::find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))?;

    if existing.author.id != user_id {
        return Err(AppError::Forbidden(
            "You are not authorized to delete this comment".to_string(),
        ));
    }

    // Replies survive as orphans; only the comment and its reactions go
    repo::comment::delete(pool, id).await
}

pub async fn toggle_like(
    pool: &SqlitePool,
    id: i64,
    user_id: i64,
) -> Result<CommentResponse, AppError> {
    repo::comment::toggle_like(pool, id, user_id).await
}

pub async fn toggle_dislike(
    pool: &SqlitePool,
    id: i64,
    user_id: i64,
) -> Result<CommentResponse, AppError> {
    repo::comment::toggle_dislike(pool, id, user_id).await
}

/// Replies of an existing parent, newest first.
pub async fn list_replies(
    pool: &SqlitePool,
    parent_id: i64,
) -> Result<Vec<CommentResponse>, AppError> {
    repo::comment::find_by_id(pool, parent_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Parent comment not found".to_string()))?;

    repo::comment::replies(pool, parent_id).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_meta_rounds_up() {
        let meta = page_meta(25, 1, 10);
        assert_eq!(meta.total_pages, 3);
        assert!(meta.has_next_page);
        assert!(!meta.has_prev_page);
    }

    #[test]
    fn page_meta_last_page() {
        let meta = page_meta(25, 3, 10);
        assert_eq!(meta.total_pages, 3);
        assert!(!meta.has_next_page);
        assert!(meta.has_prev_page);
    }

    #[test]
    fn page_meta_empty_listing() {
        let meta = page_meta(0, 1, 10);
        assert_eq!(meta.total_pages, 0);
        assert!(!meta.has_next_page);
        assert!(!meta.has_prev_page);
    }

    #[test]
    fn page_meta_exact_division() {
        let meta = page_meta(20, 2, 10);
        assert_eq!(meta.total_pages, 2);
        assert!(!meta.has_next_page);
        assert!(meta.has_prev_page);
    }

    #[test]
    fn page_meta_survives_extreme_values() {
        let meta = page_meta(25, 1, i64::MAX);
        assert_eq!(meta.total_pages, 1);
        assert!(!meta.has_next_page);

        let meta = page_meta(3, i64::MAX, 10);
        assert_eq!(meta.total_pages, 1);
        assert!(!meta.has_next_page);
        assert!(meta.has_prev_page);
    }

    #[test]
    fn text_is_trimmed() {
        assert_eq!(validate_text("  hello  ").unwrap(), "hello");
    }

    #[test]
    fn whitespace_only_text_rejected() {
        assert!(validate_text("   ").is_err());
        assert!(validate_text("").is_err());
    }

    #[test]
    fn text_length_counts_characters() {
        let at_limit = "é".repeat(1000);
        assert!(validate_text(&at_limit).is_ok());

        let over_limit = "é".repeat(1001);
        assert!(validate_text(&over_limit).is_err());
    }
}
