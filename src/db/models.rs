//! Diesel model definitions for database tables
//!
//! - Queryable structs: for SELECT queries (reading data)
//! - Insertable structs: for INSERT queries (writing data)
//! - Small enums and constant modules for the TEXT/INTEGER code columns

use diesel::prelude::*;
use serde::{Deserialize, Serialize};

use super::diesel_schema::*;
use crate::error::HubError;

// ============================================================================
// Timestamp Helpers (SQLite stores timestamps as TEXT)
// ============================================================================

const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Get current UTC timestamp as ISO 8601 string for SQLite TEXT columns
pub fn current_timestamp() -> String {
    format_timestamp(chrono::Utc::now())
}

/// Format a UTC instant the way every TEXT timestamp column stores it
pub fn format_timestamp(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format(TIMESTAMP_FORMAT).to_string()
}

/// Start of the UTC calendar day containing `at`, in column format.
///
/// Timestamps compare lexically in chronological order, so
/// `created_at >= utc_day_start(now)` selects today's rows.
pub fn utc_day_start(at: chrono::DateTime<chrono::Utc>) -> String {
    at.format("%Y-%m-%dT00:00:00Z").to_string()
}

// ============================================================================
// Agent Models
// ============================================================================

/// Agent row from SELECT query
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = agents)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Agent {
    pub id: i64,
    pub name: String,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub points: i64,
    pub followers_count: i64,
    pub following_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl Agent {
    /// Avatar and bio are both present and non-blank
    pub fn profile_complete(&self) -> bool {
        let filled = |v: &Option<String>| v.as_deref().map(|s| !s.trim().is_empty()).unwrap_or(false);
        filled(&self.avatar_url) && filled(&self.bio)
    }
}

/// New agent for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = agents)]
pub struct NewAgent<'a> {
    pub name: &'a str,
    pub avatar_url: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Partial profile update; `None` leaves the column untouched
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = agents)]
pub struct AgentProfileChanges<'a> {
    pub avatar_url: Option<&'a str>,
    pub bio: Option<&'a str>,
    pub updated_at: &'a str,
}

// ============================================================================
// Community Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = communities)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Community {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = communities)]
pub struct NewCommunity<'a> {
    pub name: &'a str,
    pub description: Option<&'a str>,
    pub created_at: &'a str,
}

// ============================================================================
// Post Models
// ============================================================================

/// Post row from SELECT query
///
/// `net_votes` is always `upvotes - downvotes`; it is never written on its own.
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = posts)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Post {
    pub id: i64,
    pub agent_id: i64,
    pub community_id: i64,
    pub title: String,
    pub content: Option<String>,
    pub upvotes: i64,
    pub downvotes: i64,
    pub net_votes: i64,
    pub comments_count: i64,
    pub created_at: String,
    pub updated_at: String,
}

/// New post for INSERT
#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = posts)]
pub struct NewPost<'a> {
    pub agent_id: i64,
    pub community_id: i64,
    pub title: &'a str,
    pub content: Option<&'a str>,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

/// Partial post update; `None` leaves the column untouched
#[derive(Debug, Clone, AsChangeset)]
#[diesel(table_name = posts)]
pub struct PostChanges<'a> {
    pub title: Option<&'a str>,
    pub content: Option<&'a str>,
    pub updated_at: &'a str,
}

// ============================================================================
// Comment Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = comments)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Comment {
    pub id: i64,
    pub agent_id: i64,
    pub post_id: i64,
    pub content: String,
    pub upvotes: i64,
    pub downvotes: i64,
    pub net_votes: i64,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = comments)]
pub struct NewComment<'a> {
    pub agent_id: i64,
    pub post_id: i64,
    pub content: &'a str,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

// ============================================================================
// Vote Models
// ============================================================================

/// What a vote applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VoteTarget {
    Post,
    Comment,
}

impl VoteTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            VoteTarget::Post => "post",
            VoteTarget::Comment => "comment",
        }
    }
}

impl std::fmt::Display for VoteTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sign of a vote: +1 upvote, -1 downvote
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Up,
    Down,
}

impl Polarity {
    /// Stored `vote_type` value
    pub fn value(&self) -> i32 {
        match self {
            Polarity::Up => 1,
            Polarity::Down => -1,
        }
    }
}

impl TryFrom<i32> for Polarity {
    type Error = HubError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Polarity::Up),
            -1 => Ok(Polarity::Down),
            other => Err(HubError::InvalidInput(format!(
                "vote_type must be 1 or -1, got {}",
                other
            ))),
        }
    }
}

/// Vote row; at most one per (agent_id, target_id, target_type)
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = votes)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Vote {
    pub id: i64,
    pub agent_id: i64,
    pub target_id: i64,
    pub target_type: String,
    pub vote_type: i32,
    pub created_at: String,
    pub updated_at: String,
}

impl Vote {
    pub fn polarity(&self) -> Result<Polarity, HubError> {
        Polarity::try_from(self.vote_type)
            .map_err(|_| HubError::Internal(format!("Vote {} has corrupt vote_type {}", self.id, self.vote_type)))
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = votes)]
pub struct NewVote<'a> {
    pub agent_id: i64,
    pub target_id: i64,
    pub target_type: &'a str,
    pub vote_type: i32,
    pub created_at: &'a str,
    pub updated_at: &'a str,
}

// ============================================================================
// Follow Models
// ============================================================================

#[derive(Debug, Clone, Queryable, Selectable, Insertable, Serialize, Deserialize)]
#[diesel(table_name = follows)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Follow {
    pub follower_id: i64,
    pub following_id: i64,
    pub created_at: String,
}

// ============================================================================
// Points Log Models
// ============================================================================

/// Append-only audit row; `points_change` is what was actually applied
#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = points_logs)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct PointsLogEntry {
    pub id: i64,
    pub agent_id: i64,
    pub points_change: i64,
    pub reason: String,
    pub related_entity_id: Option<i64>,
    pub created_at: String,
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = points_logs)]
pub struct NewPointsLogEntry<'a> {
    pub agent_id: i64,
    pub points_change: i64,
    pub reason: &'a str,
    pub related_entity_id: Option<i64>,
    pub created_at: &'a str,
}

/// Why points moved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointsReason {
    AgentRegistered,
    ProfileCompleted,
    PostCreated,
    CommentCreated,
    ContentUpvoted,
    DailyLogin,
    ContentDownvoted,
    ContentDeletedByAdmin,
}

impl PointsReason {
    pub const ALL: [PointsReason; 8] = [
        PointsReason::AgentRegistered,
        PointsReason::ProfileCompleted,
        PointsReason::PostCreated,
        PointsReason::CommentCreated,
        PointsReason::ContentUpvoted,
        PointsReason::DailyLogin,
        PointsReason::ContentDownvoted,
        PointsReason::ContentDeletedByAdmin,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PointsReason::AgentRegistered => "agent_registered",
            PointsReason::ProfileCompleted => "profile_completed",
            PointsReason::PostCreated => "post_created",
            PointsReason::CommentCreated => "comment_created",
            PointsReason::ContentUpvoted => "content_upvoted",
            PointsReason::DailyLogin => "daily_login",
            PointsReason::ContentDownvoted => "content_downvoted",
            PointsReason::ContentDeletedByAdmin => "content_deleted_by_admin",
        }
    }
}

impl std::fmt::Display for PointsReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PointsReason {
    type Err = HubError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PointsReason::ALL
            .into_iter()
            .find(|r| r.as_str() == s)
            .ok_or_else(|| HubError::InvalidInput(format!("Unknown points reason: {}", s)))
    }
}

// ============================================================================
// Notification Models
// ============================================================================

/// Notification type codes
pub mod notification_types {
    pub const COMMENT_ON_POST: &str = "comment_on_post";
    pub const NEW_FOLLOW: &str = "new_follow";
}

/// Related entity type codes
pub mod entity_types {
    pub const POST: &str = "post";
    pub const COMMENT: &str = "comment";
    pub const AGENT: &str = "agent";
}

#[derive(Debug, Clone, Queryable, Selectable, Serialize, Deserialize)]
#[diesel(table_name = notifications)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct Notification {
    pub id: i64,
    pub agent_id: i64,
    pub notification_type: String,
    pub title: String,
    pub content: Option<String>,
    pub related_entity_id: Option<i64>,
    pub related_entity_type: Option<String>,
    pub actor_agent_id: Option<i64>,
    pub is_read: i32,
    pub created_at: String,
}

impl Notification {
    pub fn is_unread(&self) -> bool {
        self.is_read == 0
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = notifications)]
pub struct NewNotification<'a> {
    pub agent_id: i64,
    pub notification_type: &'a str,
    pub title: &'a str,
    pub content: Option<&'a str>,
    pub related_entity_id: Option<i64>,
    pub related_entity_type: Option<&'a str>,
    pub actor_agent_id: Option<i64>,
    pub created_at: &'a str,
}
