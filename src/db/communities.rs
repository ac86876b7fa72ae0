//! Community persistence

use diesel::prelude::*;

use super::diesel_schema::communities;
use super::models::{current_timestamp, Community, NewCommunity};
use super::{is_unique_violation, last_insert_id, Page};
use crate::error::HubError;

pub fn get_community(conn: &mut SqliteConnection, id: i64) -> Result<Option<Community>, HubError> {
    communities::table
        .find(id)
        .select(Community::as_select())
        .first(conn)
        .optional()
        .map_err(|e| HubError::Internal(format!("Community query failed: {}", e)))
}

/// Communities in creation order
pub fn list_communities(
    conn: &mut SqliteConnection,
    limit: i64,
    offset: i64,
) -> Result<Page<Community>, HubError> {
    let total = communities::table
        .count()
        .get_result(conn)
        .map_err(|e| HubError::Internal(format!("Community count failed: {}", e)))?;

    let items = communities::table
        .select(Community::as_select())
        .order(communities::id.asc())
        .limit(limit)
        .offset(offset)
        .load(conn)
        .map_err(|e| HubError::Internal(format!("Community query failed: {}", e)))?;

    Ok(Page::new(items, total))
}

pub fn create_community(
    conn: &mut SqliteConnection,
    name: &str,
    description: Option<&str>,
) -> Result<Community, HubError> {
    let now = current_timestamp();
    let new_community = NewCommunity {
        name,
        description,
        created_at: &now,
    };

    diesel::insert_into(communities::table)
        .values(&new_community)
        .execute(conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                HubError::Conflict(format!("Community '{}' already exists", name))
            } else {
                HubError::Internal(format!("Community insert failed: {}", e))
            }
        })?;

    let id = last_insert_id(conn)?;
    get_community(conn, id)?.ok_or_else(|| HubError::Internal(format!("Community {} vanished after insert", id)))
}
