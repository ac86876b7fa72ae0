//! Service layer for agent-hub
//!
//! Services hold the business rules between callers and repositories:
//! - Input validation and ownership checks
//! - Transaction boundaries around each primary write
//! - Best-effort points and notification side effects
//! - Event emission after each committed action
//!
//! ## Architecture
//!
//! ```text
//! Caller (already authenticated)
//!     ↓
//! InteractionService / ContentService / AgentService
//!     ↓                       ↘
//! Repository Layer (db/*.rs)   PointsAwarder / Notifier (best effort)
//!     ↓
//! SQLite Database
//! ```

pub mod agent_service;
pub mod content_service;
pub mod discovery_service;
pub mod events;
pub mod interaction_service;
pub mod notification_service;
pub mod points_service;
pub mod side_effects;

pub use agent_service::AgentService;
pub use content_service::ContentService;
pub use discovery_service::{DiscoveryService, SearchResults};
pub use events::{spawn_logging_listener, EventBus, EventListener, HubEvent};
pub use interaction_service::InteractionService;
pub use notification_service::{NotificationService, Notifier};
pub use points_service::{PointsAwarder, PointsService};
pub use side_effects::best_effort;

use std::sync::Arc;

use crate::db::HubDb;

/// Service container sharing one database and one event bus
pub struct Services {
    pub agents: Arc<AgentService>,
    pub content: Arc<ContentService>,
    pub interactions: Arc<InteractionService>,
    pub notifications: Arc<NotificationService>,
    pub points: Arc<PointsService>,
    pub discovery: Arc<DiscoveryService>,
    pub events: Arc<EventBus>,
}

impl Services {
    /// Wire every service against the database's own points ledger and inbox
    pub fn new(db: Arc<HubDb>) -> Self {
        let events = Arc::new(EventBus::new());
        let points = Arc::new(PointsService::new(db.clone(), events.clone()));
        let notifications = Arc::new(NotificationService::new(db.clone(), events.clone()));
        Self::assemble(db, events, points.clone(), notifications.clone(), points, notifications)
    }

    /// Wire the coordinators against substitute side-effect sinks (for testing)
    pub fn with_side_effects(
        db: Arc<HubDb>,
        awarder: Arc<dyn PointsAwarder>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let events = Arc::new(EventBus::new());
        let points = Arc::new(PointsService::new(db.clone(), events.clone()));
        let notifications = Arc::new(NotificationService::new(db.clone(), events.clone()));
        Self::assemble(db, events, points, notifications, awarder, notifier)
    }

    fn assemble(
        db: Arc<HubDb>,
        events: Arc<EventBus>,
        points: Arc<PointsService>,
        notifications: Arc<NotificationService>,
        awarder: Arc<dyn PointsAwarder>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            agents: Arc::new(AgentService::new(db.clone(), awarder.clone(), events.clone())),
            content: Arc::new(ContentService::new(
                db.clone(),
                awarder.clone(),
                notifier.clone(),
                events.clone(),
            )),
            interactions: Arc::new(InteractionService::new(db.clone(), awarder, notifier, events.clone())),
            discovery: Arc::new(DiscoveryService::new(db)),
            notifications,
            points,
            events,
        }
    }
}
