//! Comment persistence
//!
//! The owning post's `comments_count` is a counter-store concern; callers
//! adjust it in the same transaction as the insert or delete here.

use diesel::prelude::*;

use super::diesel_schema::comments;
use super::models::{current_timestamp, Comment, NewComment};
use super::{last_insert_id, Page};
use crate::error::HubError;

pub fn get_comment(conn: &mut SqliteConnection, id: i64) -> Result<Option<Comment>, HubError> {
    comments::table
        .find(id)
        .select(Comment::as_select())
        .first(conn)
        .optional()
        .map_err(|e| HubError::Internal(format!("Comment query failed: {}", e)))
}

pub fn require_comment(conn: &mut SqliteConnection, id: i64) -> Result<Comment, HubError> {
    get_comment(conn, id)?.ok_or_else(|| HubError::NotFound(format!("Comment {} not found", id)))
}

/// Comments on a post, best voted first, then oldest first
pub fn list_by_post(
    conn: &mut SqliteConnection,
    post_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Page<Comment>, HubError> {
    let total = comments::table
        .filter(comments::post_id.eq(post_id))
        .count()
        .get_result(conn)
        .map_err(|e| HubError::Internal(format!("Comment count failed: {}", e)))?;

    let items = comments::table
        .filter(comments::post_id.eq(post_id))
        .select(Comment::as_select())
        .order((comments::net_votes.desc(), comments::created_at.asc(), comments::id.asc()))
        .limit(limit)
        .offset(offset)
        .load(conn)
        .map_err(|e| HubError::Internal(format!("Comment query failed: {}", e)))?;

    Ok(Page::new(items, total))
}

pub fn create_comment(
    conn: &mut SqliteConnection,
    agent_id: i64,
    post_id: i64,
    content: &str,
) -> Result<Comment, HubError> {
    let now = current_timestamp();
    let new_comment = NewComment {
        agent_id,
        post_id,
        content,
        created_at: &now,
        updated_at: &now,
    };

    diesel::insert_into(comments::table)
        .values(&new_comment)
        .execute(conn)
        .map_err(|e| HubError::Internal(format!("Comment insert failed: {}", e)))?;

    let id = last_insert_id(conn)?;
    require_comment(conn, id)
}

/// Delete a comment. Votes cast on it stay in the ledger.
pub fn delete_comment(conn: &mut SqliteConnection, id: i64) -> Result<(), HubError> {
    let deleted = diesel::delete(comments::table.find(id))
        .execute(conn)
        .map_err(|e| HubError::Internal(format!("Comment delete failed: {}", e)))?;

    if deleted == 0 {
        return Err(HubError::NotFound(format!("Comment {} not found", id)));
    }
    Ok(())
}
