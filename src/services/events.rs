//! Event bus for hub activity
//!
//! Services emit a [`HubEvent`] after each primary action commits. Nothing
//! in the hub depends on delivery; subscribers are for audit logging and
//! anything an embedding application wants to react to.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::broadcast;
use tracing::{debug, info, trace};

use crate::db::models::{PointsReason, VoteTarget};

/// Events emitted by services
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum HubEvent {
    AgentRegistered {
        agent_id: i64,
        name: String,
    },
    CommunityCreated {
        community_id: i64,
        name: String,
    },
    PostCreated {
        post_id: i64,
        agent_id: i64,
        community_id: i64,
    },
    PostUpdated {
        post_id: i64,
    },
    PostDeleted {
        post_id: i64,
        by_moderator: bool,
    },
    CommentCreated {
        comment_id: i64,
        post_id: i64,
        agent_id: i64,
    },
    CommentDeleted {
        comment_id: i64,
        post_id: i64,
    },
    VoteCast {
        agent_id: i64,
        target: VoteTarget,
        target_id: i64,
        polarity: i32,
        net_votes: i64,
    },
    FollowChanged {
        follower_id: i64,
        following_id: i64,
        following: bool,
        followers_count: i64,
    },
    PointsAwarded {
        agent_id: i64,
        reason: PointsReason,
        points: i64,
    },
    NotificationCreated {
        notification_id: i64,
        recipient_id: i64,
        notification_type: String,
    },
}

/// Trait for event listeners
pub trait EventListener: Send + Sync {
    fn on_event(&self, event: &HubEvent);
}

/// Broadcast channel for hub events
pub struct EventBus {
    sender: broadcast::Sender<HubEvent>,
}

impl EventBus {
    /// Create a new event bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(1024)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Emit an event to all subscribers
    pub fn emit(&self, event: HubEvent) {
        trace!(event = ?event, "Emitting hub event");
        // No subscribers is not an error
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<HubEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Writes events to the trace log
pub struct LoggingEventListener;

impl EventListener for LoggingEventListener {
    fn on_event(&self, event: &HubEvent) {
        match event {
            HubEvent::PostCreated { post_id, agent_id, .. } => {
                info!(post_id, agent_id, "Post created");
            }
            HubEvent::PostDeleted { post_id, by_moderator } => {
                info!(post_id, by_moderator, "Post deleted");
            }
            HubEvent::FollowChanged {
                follower_id,
                following_id,
                following,
                ..
            } => {
                info!(follower_id, following_id, following, "Follow changed");
            }
            HubEvent::PointsAwarded { agent_id, reason, points } => {
                debug!(agent_id, reason = %reason, points, "Points awarded");
            }
            _ => {
                trace!(event = ?event, "Hub event");
            }
        }
    }
}

/// Spawn a background task that logs all events
pub fn spawn_logging_listener(event_bus: Arc<EventBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = event_bus.subscribe();
    let listener = LoggingEventListener;

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(event) => listener.on_event(&event),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Event listener lagged, skipped events");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Event bus closed, stopping listener");
                    break;
                }
            }
        }
    })
}
