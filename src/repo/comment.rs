// src/repo/comment.rs

use chrono::Utc;
use sqlx::{Connection, SqlitePool};

use crate::{
    error::AppError,
    models::comment::{CommentAuthor, CommentResponse, SortBy, SortOrder},
};

/// Base SELECT shared by every read: comment columns, joined author, and
/// reaction counts plus id sets computed in the same statement, so sort
/// keys and returned fields come from one snapshot.
const SELECT_COMMENT: &str = "\
SELECT
    c.id,
    c.text,
    c.author_id,
    u.username AS author_username,
    c.parent_id,
    c.created_at,
    c.updated_at,
    (SELECT COUNT(*) FROM comment_likes l WHERE l.comment_id = c.id) AS like_count,
    (SELECT COUNT(*) FROM comment_dislikes d WHERE d.comment_id = c.id) AS dislike_count,
    (SELECT group_concat(l.user_id) FROM comment_likes l WHERE l.comment_id = c.id) AS like_ids,
    (SELECT group_concat(d.user_id) FROM comment_dislikes d WHERE d.comment_id = c.id) AS dislike_ids
FROM comments c
JOIN users u ON u.id = c.author_id";

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: i64,
    text: String,
    author_id: i64,
    author_username: String,
    parent_id: Option<i64>,
    created_at: chrono::DateTime<chrono::Utc>,
    updated_at: chrono::DateTime<chrono::Utc>,
    like_count: i64,
    dislike_count: i64,
    like_ids: Option<String>,
    dislike_ids: Option<String>,
}

impl CommentRow {
    fn into_response(self) -> CommentResponse {
        CommentResponse {
            id: self.id,
            text: self.text,
            author: CommentAuthor {
                id: self.author_id,
                username: self.author_username,
            },
            parent_comment: self.parent_id,
            likes: parse_id_list(self.like_ids.as_deref()),
            dislikes: parse_id_list(self.dislike_ids.as_deref()),
            like_count: self.like_count,
            dislike_count: self.dislike_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// group_concat output ("1,2,3") back into ids. NULL means the empty set.
fn parse_id_list(ids: Option<&str>) -> Vec<i64> {
    ids.map(|s| s.split(',').filter_map(|id| id.parse().ok()).collect())
        .unwrap_or_default()
}

/// Lists one page of comments plus the total count for the same filter.
///
/// `parent_id == None` selects top-level comments. Sorting by reaction
/// counts uses the computed columns; id breaks ties so page boundaries
/// stay deterministic.
pub async fn list(
    pool: &SqlitePool,
    parent_id: Option<i64>,
    sort_by: SortBy,
    order: SortOrder,
    page: i64,
    limit: i64,
) -> Result<(Vec<CommentResponse>, i64), AppError> {
    let filter = match parent_id {
        Some(_) => "WHERE c.parent_id = ?",
        None => "WHERE c.parent_id IS NULL",
    };

    let sort_col = match sort_by {
        SortBy::CreatedAt => "c.created_at",
        SortBy::Likes => "like_count",
        SortBy::Dislikes => "dislike_count",
    };
    let sort_dir = match order {
        SortOrder::Asc => "ASC",
        SortOrder::Desc => "DESC",
    };

    let sql = format!(
        "{SELECT_COMMENT}\n{filter}\nORDER BY {sort_col} {sort_dir}, c.id DESC\nLIMIT ? OFFSET ?"
    );

    let mut query = sqlx::query_as::<_, CommentRow>(&sql);
    if let Some(parent_id) = parent_id {
        query = query.bind(parent_id);
    }
    let rows = query
        .bind(limit)
        .bind(page.saturating_sub(1).saturating_mul(limit))
        .fetch_all(pool)
        .await?;

    let count_sql = match parent_id {
        Some(_) => "SELECT COUNT(*) FROM comments WHERE parent_id = ?",
        None => "SELECT COUNT(*) FROM comments WHERE parent_id IS NULL",
    };
    let mut count_query = sqlx::query_scalar::<_, i64>(count_sql);
    if let Some(parent_id) = parent_id {
        count_query = count_query.bind(parent_id);
    }
    let total = count_query.fetch_one(pool).await?;

    Ok((
        rows.into_iter().map(CommentRow::into_response).collect(),
        total,
    ))
}

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<CommentResponse>, AppError> {
    let sql = format!("{SELECT_COMMENT}\nWHERE c.id = ?");

    let row = sqlx::query_as::<_, CommentRow>(&sql)
        .bind(id)
        .fetch_optional(pool)
        .await?;

    Ok(row.map(CommentRow::into_response))
}

/// All replies of a parent, newest first.
pub async fn replies(pool: &SqlitePool, parent_id: i64) -> Result<Vec<CommentResponse>, AppError> {
    let sql = format!("{SELECT_COMMENT}\nWHERE c.parent_id = ?\nORDER BY c.created_at DESC, c.id DESC");

    let rows = sqlx::query_as::<_, CommentRow>(&sql)
        .bind(parent_id)
        .fetch_all(pool)
        .await?;

    Ok(rows.into_iter().map(CommentRow::into_response).collect())
}

/// Inserts a comment and reads it back with its author joined.
/// The parent id is stored as given; existence is not enforced.
pub async fn insert(
    pool: &SqlitePool,
    author_id: i64,
    text: &str,
    parent_id: Option<i64>,
) -> Result<CommentResponse, AppError> {
    let now = Utc::now();

    let result = sqlx::query(
        "INSERT INTO comments (text, author_id, parent_id, created_at, updated_at)
         VALUES (?, ?, ?, ?, ?)",
    )
    .bind(text)
    .bind(author_id)
    .bind(parent_id)
    .bind(now)
    .bind(now)
    .execute(pool)
    .await?;

    let id = result.last_insert_rowid();

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::Internal("comment row missing after insert".to_string()))
}

pub async fn update_text(
    pool: &SqlitePool,
    id: i64,
    text: &str,
) -> Result<CommentResponse, AppError> {
    sqlx::query("UPDATE comments SET text = ?, updated_at = ? WHERE id = ?")
        .bind(text)
        .bind(Utc::now())
        .bind(id)
        .execute(pool)
        .await?;

    find_by_id(pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
}

/// Deletes a comment and its reaction rows in one transaction.
/// Replies keep their parent_id and become orphans.
pub async fn delete(pool: &SqlitePool, id: i64) -> Result<(), AppError> {
    let mut tx = pool.begin().await?;

    sqlx::query("DELETE FROM comment_likes WHERE comment_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM comment_dislikes WHERE comment_id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    sqlx::query("DELETE FROM comments WHERE id = ?")
        .bind(id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;

    Ok(())
}

/// Toggles the caller's like in one transaction.
///
/// A standing like is removed. Otherwise the like is added and any
/// standing dislike is cleared, keeping the two sets mutually exclusive.
/// Returns the refreshed comment.
pub async fn toggle_like(
    pool: &SqlitePool,
    comment_id: i64,
    user_id: i64,
) -> Result<CommentResponse, AppError> {
    // Reads precede the writes here; BEGIN IMMEDIATE takes the write lock
    // up front so a concurrent toggle waits out the busy timeout instead
    // of failing on the deferred lock upgrade.
    let mut conn = pool.acquire().await?;
    let mut tx = conn.begin_with("BEGIN IMMEDIATE").await?;

    // 1. The comment must still exist at toggle time
    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM comments WHERE id = ?")
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }

    // 2. Check if already liked
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT 1 FROM comment_likes WHERE comment_id = ? AND user_id = ?",
    )
    .bind(comment_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    if existing.is_some() {
        // Unlike
        sqlx::query("DELETE FROM comment_likes WHERE comment_id = ? AND user_id = ?")
            .bind(comment_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    } else {
        // Like, and clear any standing dislike
        sqlx::query("INSERT OR IGNORE INTO comment_likes (comment_id, user_id) VALUES (?, ?)")
            .bind(comment_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM comment_dislikes WHERE comment_id = ? AND user_id = ?")
            .bind(comment_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    // 3. Bump updated_at so the change shows on the comment itself
    sqlx::query("UPDATE comments SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(comment_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    // Return the connection before the read-back acquires one of its own
    drop(conn);

    find_by_id(pool, comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
}

/// Mirror of `toggle_like` for the dislike set.
pub async fn toggle_dislike(
    pool: &SqlitePool,
    comment_id: i64,
    user_id: i64,
) -> Result<CommentResponse, AppError> {
    // Reads precede the writes here; BEGIN IMMEDIATE takes the write lock
    // up front so a concurrent toggle waits out the busy timeout instead
    // of failing on the deferred lock upgrade.
    let mut conn = pool.acquire().await?;
    let mut tx = conn.begin_with("BEGIN IMMEDIATE").await?;

    // 1. The comment must still exist at toggle time
    let exists = sqlx::query_scalar::<_, i64>("SELECT id FROM comments WHERE id = ?")
        .bind(comment_id)
        .fetch_optional(&mut *tx)
        .await?;
    if exists.is_none() {
        return Err(AppError::NotFound("Comment not found".to_string()));
    }

    // 2. Check if already disliked
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT 1 FROM comment_dislikes WHERE comment_id = ? AND user_id = ?",
    )
    .bind(comment_id)
    .bind(user_id)
    .fetch_optional(&mut *tx)
    .await?;

    if existing.is_some() {
        // Remove the dislike
        sqlx::query("DELETE FROM comment_dislikes WHERE comment_id = ? AND user_id = ?")
            .bind(comment_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    } else {
        // Dislike, and clear any standing like
        sqlx::query("INSERT OR IGNORE INTO comment_dislikes (comment_id, user_id) VALUES (?, ?)")
            .bind(comment_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        sqlx::query("DELETE FROM comment_likes WHERE comment_id = ? AND user_id = ?")
            .bind(comment_id)
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
    }

    // 3. Bump updated_at so the change shows on the comment itself
    sqlx::query("UPDATE comments SET updated_at = ? WHERE id = ?")
        .bind(Utc::now())
        .bind(comment_id)
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    // Return the connection before the read-back acquires one of its own
    drop(conn);

    find_by_id(pool, comment_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Comment not found".to_string()))
}
