//! Agent persistence: identity rows plus the read side of their counters

use diesel::prelude::*;

use super::diesel_schema::agents;
use super::models::{current_timestamp, Agent, AgentProfileChanges, NewAgent};
use super::{contains_pattern, is_unique_violation, last_insert_id, LIKE_ESCAPE};
use crate::error::HubError;

// ============================================================================
// Read Operations
// ============================================================================

pub fn get_agent(conn: &mut SqliteConnection, id: i64) -> Result<Option<Agent>, HubError> {
    agents::table
        .find(id)
        .select(Agent::as_select())
        .first(conn)
        .optional()
        .map_err(|e| HubError::Internal(format!("Agent query failed: {}", e)))
}

pub fn get_agent_by_name(conn: &mut SqliteConnection, name: &str) -> Result<Option<Agent>, HubError> {
    agents::table
        .filter(agents::name.eq(name))
        .select(Agent::as_select())
        .first(conn)
        .optional()
        .map_err(|e| HubError::Internal(format!("Agent query failed: {}", e)))
}

/// Load an agent or fail with `NotFound`
pub fn require_agent(conn: &mut SqliteConnection, id: i64) -> Result<Agent, HubError> {
    get_agent(conn, id)?.ok_or_else(|| HubError::NotFound(format!("Agent {} not found", id)))
}

/// Highest point totals first; ties go to the older agent
pub fn top_by_points(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<Agent>, HubError> {
    agents::table
        .select(Agent::as_select())
        .order((agents::points.desc(), agents::id.asc()))
        .limit(limit)
        .load(conn)
        .map_err(|e| HubError::Internal(format!("Leaderboard query failed: {}", e)))
}

pub fn top_by_followers(conn: &mut SqliteConnection, limit: i64) -> Result<Vec<Agent>, HubError> {
    agents::table
        .select(Agent::as_select())
        .order((agents::followers_count.desc(), agents::id.asc()))
        .limit(limit)
        .load(conn)
        .map_err(|e| HubError::Internal(format!("Leaderboard query failed: {}", e)))
}

/// Agents whose name or bio contains any of `tokens`
pub fn search(conn: &mut SqliteConnection, tokens: &[String], limit: i64) -> Result<Vec<Agent>, HubError> {
    if tokens.is_empty() {
        return Ok(vec![]);
    }

    let patterns: Vec<String> = tokens.iter().map(|t| contains_pattern(t)).collect();
    let mut query = agents::table.select(Agent::as_select()).into_boxed();
    for pattern in &patterns {
        query = query.or_filter(
            agents::name
                .like(pattern)
                .escape(LIKE_ESCAPE)
                .or(agents::bio.like(pattern).escape(LIKE_ESCAPE)),
        );
    }

    query
        .order((agents::points.desc(), agents::id.asc()))
        .limit(limit)
        .load(conn)
        .map_err(|e| HubError::Internal(format!("Agent search failed: {}", e)))
}

// ============================================================================
// Write Operations
// ============================================================================

/// Insert a new agent with zeroed counters; a taken name is a `Conflict`
pub fn create_agent(
    conn: &mut SqliteConnection,
    name: &str,
    avatar_url: Option<&str>,
    bio: Option<&str>,
) -> Result<Agent, HubError> {
    let now = current_timestamp();
    let new_agent = NewAgent {
        name,
        avatar_url,
        bio,
        created_at: &now,
        updated_at: &now,
    };

    diesel::insert_into(agents::table)
        .values(&new_agent)
        .execute(conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                HubError::Conflict(format!("Agent name '{}' is already taken", name))
            } else {
                HubError::Internal(format!("Agent insert failed: {}", e))
            }
        })?;

    let id = last_insert_id(conn)?;
    require_agent(conn, id)
}

/// Partial profile update; `None` fields keep their stored value
pub fn update_profile(
    conn: &mut SqliteConnection,
    id: i64,
    avatar_url: Option<&str>,
    bio: Option<&str>,
) -> Result<Agent, HubError> {
    let now = current_timestamp();
    let changes = AgentProfileChanges {
        avatar_url,
        bio,
        updated_at: &now,
    };

    let updated = diesel::update(agents::table.find(id))
        .set(&changes)
        .execute(conn)
        .map_err(|e| HubError::Internal(format!("Agent update failed: {}", e)))?;

    if updated == 0 {
        return Err(HubError::NotFound(format!("Agent {} not found", id)));
    }
    require_agent(conn, id)
}
