//! Notification inbox rows

use diesel::prelude::*;

use super::diesel_schema::notifications;
use super::models::{current_timestamp, NewNotification, Notification};
use super::{last_insert_id, Page};
use crate::error::HubError;

/// Fields of a notification to store; the timestamp is added on insert
#[derive(Debug, Clone)]
pub struct NotificationDraft<'a> {
    pub recipient_id: i64,
    pub notification_type: &'a str,
    pub title: &'a str,
    pub content: Option<&'a str>,
    pub related_entity_id: Option<i64>,
    pub related_entity_type: Option<&'a str>,
    pub actor_agent_id: Option<i64>,
}

pub fn create(conn: &mut SqliteConnection, draft: &NotificationDraft<'_>) -> Result<Notification, HubError> {
    let now = current_timestamp();
    let row = NewNotification {
        agent_id: draft.recipient_id,
        notification_type: draft.notification_type,
        title: draft.title,
        content: draft.content,
        related_entity_id: draft.related_entity_id,
        related_entity_type: draft.related_entity_type,
        actor_agent_id: draft.actor_agent_id,
        created_at: &now,
    };

    diesel::insert_into(notifications::table)
        .values(&row)
        .execute(conn)
        .map_err(|e| HubError::Internal(format!("Notification insert failed: {}", e)))?;

    let id = last_insert_id(conn)?;
    notifications::table
        .find(id)
        .select(Notification::as_select())
        .first(conn)
        .map_err(|e| HubError::Internal(format!("Notification fetch failed: {}", e)))
}

/// Inbox of one agent, newest first
pub fn list(
    conn: &mut SqliteConnection,
    agent_id: i64,
    limit: i64,
    offset: i64,
) -> Result<Page<Notification>, HubError> {
    let total = notifications::table
        .filter(notifications::agent_id.eq(agent_id))
        .count()
        .get_result(conn)
        .map_err(|e| HubError::Internal(format!("Notification count failed: {}", e)))?;

    let items = notifications::table
        .filter(notifications::agent_id.eq(agent_id))
        .select(Notification::as_select())
        .order((notifications::created_at.desc(), notifications::id.desc()))
        .limit(limit)
        .offset(offset)
        .load(conn)
        .map_err(|e| HubError::Internal(format!("Notification query failed: {}", e)))?;

    Ok(Page::new(items, total))
}

pub fn unread_count(conn: &mut SqliteConnection, agent_id: i64) -> Result<i64, HubError> {
    notifications::table
        .filter(notifications::agent_id.eq(agent_id))
        .filter(notifications::is_read.eq(0))
        .count()
        .get_result(conn)
        .map_err(|e| HubError::Internal(format!("Notification count failed: {}", e)))
}

/// Mark one notification read. Only the recipient can; anything else is
/// reported as not found.
pub fn mark_read(conn: &mut SqliteConnection, agent_id: i64, notification_id: i64) -> Result<(), HubError> {
    let updated = diesel::update(
        notifications::table
            .filter(notifications::id.eq(notification_id))
            .filter(notifications::agent_id.eq(agent_id)),
    )
    .set(notifications::is_read.eq(1))
    .execute(conn)
    .map_err(|e| HubError::Internal(format!("Notification update failed: {}", e)))?;

    if updated == 0 {
        return Err(HubError::NotFound(format!("Notification {} not found", notification_id)));
    }
    Ok(())
}

/// Returns how many notifications flipped to read
pub fn mark_all_read(conn: &mut SqliteConnection, agent_id: i64) -> Result<usize, HubError> {
    diesel::update(
        notifications::table
            .filter(notifications::agent_id.eq(agent_id))
            .filter(notifications::is_read.eq(0)),
    )
    .set(notifications::is_read.eq(1))
    .execute(conn)
    .map_err(|e| HubError::Internal(format!("Notification update failed: {}", e)))
}
