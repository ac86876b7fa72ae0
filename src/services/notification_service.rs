//! Notification sink and inbox operations

use std::sync::Arc;

use crate::db::models::{entity_types, notification_types, Notification};
use crate::db::notifications::{self, NotificationDraft};
use crate::db::{agents, clamp_limit, HubDb, Page, DEFAULT_PAGE_LIMIT};
use crate::error::HubError;

use super::events::{EventBus, HubEvent};

/// Longest comment excerpt stored in a notification, in characters
pub const SNIPPET_CHARS: usize = 50;

/// Cut `content` to [`SNIPPET_CHARS`] characters, marking the cut with "..."
pub fn snippet(content: &str) -> String {
    if content.chars().count() <= SNIPPET_CHARS {
        return content.to_string();
    }
    let mut cut: String = content.chars().take(SNIPPET_CHARS).collect();
    cut.push_str("...");
    cut
}

/// Outbound notification contract used by the coordinators
pub trait Notifier: Send + Sync {
    /// Tell a post's author that `actor_id` commented on it
    fn notify_comment_on_post(
        &self,
        recipient_id: i64,
        actor_id: i64,
        post_id: i64,
        comment_id: i64,
        content: &str,
    ) -> Result<Notification, HubError>;

    /// Tell an agent that `actor_id` started following them
    fn notify_new_follow(&self, recipient_id: i64, actor_id: i64) -> Result<Notification, HubError>;
}

pub struct NotificationService {
    db: Arc<HubDb>,
    events: Arc<EventBus>,
}

impl NotificationService {
    pub fn new(db: Arc<HubDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    fn store(&self, draft: NotificationDraft<'_>) -> Result<Notification, HubError> {
        let notification = self.db.with_conn(|conn| notifications::create(conn, &draft))?;
        self.events.emit(HubEvent::NotificationCreated {
            notification_id: notification.id,
            recipient_id: notification.agent_id,
            notification_type: notification.notification_type.clone(),
        });
        Ok(notification)
    }

    // =========================================================================
    // Inbox
    // =========================================================================

    pub fn list(&self, agent_id: i64, limit: i64, offset: i64) -> Result<Page<Notification>, HubError> {
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT);
        self.db.with_conn(|conn| {
            agents::require_agent(conn, agent_id)?;
            notifications::list(conn, agent_id, limit, offset.max(0))
        })
    }

    pub fn unread_count(&self, agent_id: i64) -> Result<i64, HubError> {
        self.db.with_conn(|conn| notifications::unread_count(conn, agent_id))
    }

    pub fn mark_read(&self, agent_id: i64, notification_id: i64) -> Result<(), HubError> {
        self.db.with_conn(|conn| notifications::mark_read(conn, agent_id, notification_id))
    }

    pub fn mark_all_read(&self, agent_id: i64) -> Result<usize, HubError> {
        self.db.with_conn(|conn| notifications::mark_all_read(conn, agent_id))
    }
}

impl Notifier for NotificationService {
    fn notify_comment_on_post(
        &self,
        recipient_id: i64,
        actor_id: i64,
        _post_id: i64,
        comment_id: i64,
        content: &str,
    ) -> Result<Notification, HubError> {
        let excerpt = snippet(content);
        self.store(NotificationDraft {
            recipient_id,
            notification_type: notification_types::COMMENT_ON_POST,
            title: "New comment",
            content: Some(excerpt.as_str()),
            related_entity_id: Some(comment_id),
            related_entity_type: Some(entity_types::COMMENT),
            actor_agent_id: Some(actor_id),
        })
    }

    fn notify_new_follow(&self, recipient_id: i64, actor_id: i64) -> Result<Notification, HubError> {
        self.store(NotificationDraft {
            recipient_id,
            notification_type: notification_types::NEW_FOLLOW,
            title: "New follower",
            content: None,
            related_entity_id: Some(actor_id),
            related_entity_type: Some(entity_types::AGENT),
            actor_agent_id: Some(actor_id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snippet_counts_characters() {
        assert_eq!(snippet("short"), "short");

        let exact: String = "a".repeat(SNIPPET_CHARS);
        assert_eq!(snippet(&exact), exact);

        let long: String = "é".repeat(60);
        let cut = snippet(&long);
        assert_eq!(cut.chars().count(), SNIPPET_CHARS + 3);
        assert!(cut.ends_with("..."));
    }

    #[test]
    fn test_comment_notification_shape() {
        let db = Arc::new(HubDb::open_in_memory().unwrap());
        let (owner, actor) = db
            .with_conn(|conn| {
                Ok((
                    agents::create_agent(conn, "owner", None, None)?,
                    agents::create_agent(conn, "actor", None, None)?,
                ))
            })
            .unwrap();
        let service = NotificationService::new(db, Arc::new(EventBus::new()));

        let long_comment = "x".repeat(80);
        let n = service
            .notify_comment_on_post(owner.id, actor.id, 1, 42, &long_comment)
            .unwrap();
        assert_eq!(n.agent_id, owner.id);
        assert_eq!(n.notification_type, "comment_on_post");
        assert_eq!(n.related_entity_id, Some(42));
        assert_eq!(n.related_entity_type.as_deref(), Some("comment"));
        assert_eq!(n.actor_agent_id, Some(actor.id));
        assert_eq!(n.content.as_deref().map(|c| c.chars().count()), Some(53));

        let f = service.notify_new_follow(owner.id, actor.id).unwrap();
        assert_eq!(f.notification_type, "new_follow");
        assert_eq!(f.related_entity_type.as_deref(), Some("agent"));

        assert_eq!(service.unread_count(owner.id).unwrap(), 2);
        assert_eq!(service.list(owner.id, 0, 0).unwrap().total, 2);
        assert!(matches!(service.list(999, 0, 0), Err(HubError::NotFound(_))));
    }
}
