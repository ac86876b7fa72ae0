//! Append-only points audit trail
//!
//! Rows are only ever inserted. The award policy reads them back to decide
//! one-time eligibility and how much of a daily cap is already used.

use chrono::{DateTime, Utc};
use diesel::prelude::*;
use diesel::sql_types::{BigInt, Text};

use super::diesel_schema::points_logs;
use super::models::{format_timestamp, NewPointsLogEntry, PointsLogEntry, PointsReason};
use super::{last_insert_id, Page};
use crate::error::HubError;

#[derive(QueryableByName)]
struct SumRow {
    #[diesel(sql_type = BigInt)]
    total: i64,
}

/// Whether any entry exists for (agent, reason)
pub fn has_reason(conn: &mut SqliteConnection, agent_id: i64, reason: PointsReason) -> Result<bool, HubError> {
    diesel::select(diesel::dsl::exists(
        points_logs::table
            .filter(points_logs::agent_id.eq(agent_id))
            .filter(points_logs::reason.eq(reason.as_str())),
    ))
    .get_result(conn)
    .map_err(|e| HubError::Internal(format!("Points log query failed: {}", e)))
}

/// Sum of `points_change` for (agent, reason) at or after `since`
pub fn sum_since(
    conn: &mut SqliteConnection,
    agent_id: i64,
    reason: PointsReason,
    since: &str,
) -> Result<i64, HubError> {
    diesel::sql_query(
        "SELECT COALESCE(SUM(points_change), 0) AS total FROM points_logs \
         WHERE agent_id = ? AND reason = ? AND created_at >= ?",
    )
    .bind::<BigInt, _>(agent_id)
    .bind::<Text, _>(reason.as_str())
    .bind::<Text, _>(since)
    .get_result::<SumRow>(conn)
    .map(|row| row.total)
    .map_err(|e| HubError::Internal(format!("Points sum query failed: {}", e)))
}

/// Insert one entry stamped at `at`
pub fn append(
    conn: &mut SqliteConnection,
    agent_id: i64,
    points_change: i64,
    reason: PointsReason,
    related_entity_id: Option<i64>,
    at: DateTime<Utc>,
) -> Result<PointsLogEntry, HubError> {
    let now = format_timestamp(at);
    let entry = NewPointsLogEntry {
        agent_id,
        points_change,
        reason: reason.as_str(),
        related_entity_id,
        created_at: &now,
    };

    diesel::insert_into(points_logs::table)
        .values(&entry)
        .execute(conn)
        .map_err(|e| HubError::Internal(format!("Points log insert failed: {}", e)))?;

    let id = last_insert_id(conn)?;
    points_logs::table
        .find(id)
        .select(PointsLogEntry::as_select())
        .first(conn)
        .map_err(|e| HubError::Internal(format!("Points log fetch failed: {}", e)))
}

/// An agent's entries, newest first
pub fn history(
    conn: &mut SqliteConnection,
    agent_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Page<PointsLogEntry>, HubError> {
    let total = points_logs::table
        .filter(points_logs::agent_id.eq(agent_id))
        .count()
        .get_result(conn)
        .map_err(|e| HubError::Internal(format!("Points log count failed: {}", e)))?;

    let items = points_logs::table
        .filter(points_logs::agent_id.eq(agent_id))
        .select(PointsLogEntry::as_select())
        .order((points_logs::created_at.desc(), points_logs::id.desc()))
        .limit(limit)
        .offset(offset)
        .load(conn)
        .map_err(|e| HubError::Internal(format!("Points log query failed: {}", e)))?;

    Ok(Page::new(items, total))
}
