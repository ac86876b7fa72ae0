//! Post persistence, feed queries and the delete cascade

use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use diesel::prelude::*;
use diesel::sql_types::BigInt;
use serde::{Deserialize, Serialize};

use super::diesel_schema::{comments, posts};
use super::models::{current_timestamp, format_timestamp, NewPost, Post, PostChanges};
use super::{contains_pattern, last_insert_id, Page, LIKE_ESCAPE};
use crate::error::HubError;

// ============================================================================
// Query Types
// ============================================================================

/// Feed ordering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PostSort {
    /// Newest first
    #[default]
    New,
    /// Highest net votes first, within a time range
    Top,
    /// Most comments first
    Discussed,
    Random,
}

impl FromStr for PostSort {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(PostSort::New),
            "top" => Ok(PostSort::Top),
            "discussed" => Ok(PostSort::Discussed),
            "random" => Ok(PostSort::Random),
            other => Err(HubError::InvalidInput(format!("Unknown sort: {}", other))),
        }
    }
}

/// Window for the `top` feed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeRange {
    Hour,
    Day,
    Week,
    Month,
    Year,
    #[default]
    All,
}

impl TimeRange {
    /// Earliest `created_at` inside the window ending at `now`
    pub fn since(&self, now: DateTime<Utc>) -> Option<String> {
        let span = match self {
            TimeRange::Hour => Duration::hours(1),
            TimeRange::Day => Duration::days(1),
            TimeRange::Week => Duration::weeks(1),
            TimeRange::Month => Duration::days(30),
            TimeRange::Year => Duration::days(365),
            TimeRange::All => return None,
        };
        Some(format_timestamp(now - span))
    }
}

impl FromStr for TimeRange {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hour" => Ok(TimeRange::Hour),
            "day" => Ok(TimeRange::Day),
            "week" => Ok(TimeRange::Week),
            "month" => Ok(TimeRange::Month),
            "year" => Ok(TimeRange::Year),
            "all" => Ok(TimeRange::All),
            other => Err(HubError::InvalidInput(format!("Unknown time range: {}", other))),
        }
    }
}

// ============================================================================
// Read Operations
// ============================================================================

pub fn get_post(conn: &mut SqliteConnection, id: i64) -> Result<Option<Post>, HubError> {
    posts::table
        .find(id)
        .select(Post::as_select())
        .first(conn)
        .optional()
        .map_err(|e| HubError::Internal(format!("Post query failed: {}", e)))
}

pub fn require_post(conn: &mut SqliteConnection, id: i64) -> Result<Post, HubError> {
    get_post(conn, id)?.ok_or_else(|| HubError::NotFound(format!("Post {} not found", id)))
}

/// One page of the feed. The time range only narrows the `top` sort.
pub fn list_posts(
    conn: &mut SqliteConnection,
    sort: PostSort,
    range: TimeRange,
    limit: i64,
    offset: i64,
) -> Result<Page<Post>, HubError> {
    let since = match sort {
        PostSort::Top => range.since(Utc::now()),
        _ => None,
    };

    let mut count_query = posts::table.select(diesel::dsl::count_star()).into_boxed();
    let mut query = posts::table.select(Post::as_select()).into_boxed();
    if let Some(ref since) = since {
        count_query = count_query.filter(posts::created_at.ge(since));
        query = query.filter(posts::created_at.ge(since));
    }

    let total: i64 = count_query
        .get_result(conn)
        .map_err(|e| HubError::Internal(format!("Post count failed: {}", e)))?;

    query = match sort {
        PostSort::New => query.order((posts::created_at.desc(), posts::id.desc())),
        PostSort::Top => query.order((posts::net_votes.desc(), posts::created_at.desc(), posts::id.desc())),
        PostSort::Discussed => query.order((posts::comments_count.desc(), posts::created_at.desc(), posts::id.desc())),
        PostSort::Random => query.order(diesel::dsl::sql::<BigInt>("RANDOM()")),
    };

    let items = query
        .limit(limit)
        .offset(offset)
        .load(conn)
        .map_err(|e| HubError::Internal(format!("Post query failed: {}", e)))?;

    Ok(Page::new(items, total))
}

pub fn top_by_net_votes(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<Post>, HubError> {
    posts::table
        .select(Post::as_select())
        .order((posts::net_votes.desc(), posts::id.asc()))
        .limit(limit)
        .load(conn)
        .map_err(|e| HubError::Internal(format!("Leaderboard query failed: {}", e)))
}

/// Posts whose title or content contains any of `tokens`, newest first
pub fn search(conn: &mut SqliteConnection, tokens: &[String], limit: i64) -> Result<Vec<Post>, HubError> {
    if tokens.is_empty() {
        return Ok(vec![]);
    }

    let patterns: Vec<String> = tokens.iter().map(|t| contains_pattern(t)).collect();
    let mut query = posts::table.select(Post::as_select()).into_boxed();
    for pattern in &patterns {
        query = query.or_filter(
            posts::title
                .like(pattern)
                .escape(LIKE_ESCAPE)
                .or(posts::content.like(pattern).escape(LIKE_ESCAPE)),
        );
    }

    query
        .order((posts::created_at.desc(), posts::id.desc()))
        .limit(limit)
        .load(conn)
        .map_err(|e| HubError::Internal(format!("Post search failed: {}", e)))
}

// ============================================================================
// Write Operations
// ============================================================================

pub fn create_post(
    conn: &mut SqliteConnection,
    agent_id: i64,
    community_id: i64,
    title: &str,
    content: Option<&str>,
) -> Result<Post, HubError> {
    let now = current_timestamp();
    let new_post = NewPost {
        agent_id,
        community_id,
        title,
        content,
        created_at: &now,
        updated_at: &now,
    };

    diesel::insert_into(posts::table)
        .values(&new_post)
        .execute(conn)
        .map_err(|e| HubError::Internal(format!("Post insert failed: {}", e)))?;

    let id = last_insert_id(conn)?;
    require_post(conn, id)
}

/// Replace the given fields; `None` keeps the stored value
pub fn update_post(
    conn: &mut SqliteConnection,
    id: i64,
    title: Option<&str>,
    content: Option<&str>,
) -> Result<Post, HubError> {
    let now = current_timestamp();
    let changes = PostChanges {
        title,
        content,
        updated_at: &now,
    };

    let updated = diesel::update(posts::table.find(id))
        .set(&changes)
        .execute(conn)
        .map_err(|e| HubError::Internal(format!("Post update failed: {}", e)))?;

    if updated == 0 {
        return Err(HubError::NotFound(format!("Post {} not found", id)));
    }
    require_post(conn, id)
}

/// Delete a post together with its comments.
///
/// Vote rows on the post or its comments are kept; ids are never reused, so
/// they cannot attach to later content. Returns the number of comments removed.
pub fn delete_post(conn: &mut SqliteConnection, id: i64) -> Result<usize, HubError> {
    conn.transaction(|conn| {
        let removed_comments = diesel::delete(comments::table.filter(comments::post_id.eq(id)))
            .execute(conn)
            .map_err(|e| HubError::Internal(format!("Comment delete failed: {}", e)))?;

        let deleted = diesel::delete(posts::table.find(id))
            .execute(conn)
            .map_err(|e| HubError::Internal(format!("Post delete failed: {}", e)))?;

        if deleted == 0 {
            return Err(HubError::NotFound(format!("Post {} not found", id)));
        }
        Ok(removed_comments)
    })
}
