//! Agent lifecycle: registration, profile and daily login

use std::sync::Arc;

use tracing::info;

use crate::db::models::{Agent, PointsReason};
use crate::db::{agents, HubDb};
use crate::error::HubError;

use super::events::{EventBus, HubEvent};
use super::points_service::PointsAwarder;
use super::side_effects::best_effort;

/// Longest accepted agent name, in characters
pub const MAX_AGENT_NAME_CHARS: usize = 50;

pub struct AgentService {
    db: Arc<HubDb>,
    points: Arc<dyn PointsAwarder>,
    events: Arc<EventBus>,
}

impl AgentService {
    pub fn new(db: Arc<HubDb>, points: Arc<dyn PointsAwarder>, events: Arc<EventBus>) -> Self {
        Self { db, points, events }
    }

    /// Create an agent and grant the registration bonus. A profile that is
    /// already complete earns its bonus straight away.
    pub fn register(&self, name: &str, avatar_url: Option<&str>, bio: Option<&str>) -> Result<Agent, HubError> {
        let name = name.trim();
        let len = name.chars().count();
        if len == 0 || len > MAX_AGENT_NAME_CHARS {
            return Err(HubError::InvalidInput(format!(
                "agent name must be 1-{} characters",
                MAX_AGENT_NAME_CHARS
            )));
        }

        let agent = self
            .db
            .with_conn(|conn| agents::create_agent(conn, name, avatar_url, bio))?;
        info!(agent_id = agent.id, name = %agent.name, "Agent registered");

        best_effort(
            "agent_registered points",
            self.points.award(agent.id, PointsReason::AgentRegistered, None),
        );
        if agent.profile_complete() {
            best_effort(
                "profile_completed points",
                self.points.award(agent.id, PointsReason::ProfileCompleted, None),
            );
        }

        self.events.emit(HubEvent::AgentRegistered {
            agent_id: agent.id,
            name: agent.name.clone(),
        });
        self.get(agent.id)
    }

    /// Partial profile update; completing the profile earns a one-time bonus
    pub fn update_profile(&self, agent_id: i64, avatar_url: Option<&str>, bio: Option<&str>) -> Result<Agent, HubError> {
        let agent = self
            .db
            .with_conn(|conn| agents::update_profile(conn, agent_id, avatar_url, bio))?;

        if agent.profile_complete() {
            best_effort(
                "profile_completed points",
                self.points.award(agent_id, PointsReason::ProfileCompleted, None),
            );
        }
        self.get(agent_id)
    }

    /// Award the daily login bonus; returns the points applied (0 once
    /// today's bonus has been collected)
    pub fn record_daily_login(&self, agent_id: i64) -> Result<i64, HubError> {
        self.get(agent_id)?;
        self.points.award(agent_id, PointsReason::DailyLogin, None)
    }

    pub fn get(&self, agent_id: i64) -> Result<Agent, HubError> {
        self.db.with_conn(|conn| agents::require_agent(conn, agent_id))
    }

    pub fn get_by_name(&self, name: &str) -> Result<Agent, HubError> {
        self.db
            .with_conn(|conn| agents::get_agent_by_name(conn, name))?
            .ok_or_else(|| HubError::NotFound(format!("Agent '{}' not found", name)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::points_service::PointsService;

    fn service() -> AgentService {
        let db = Arc::new(HubDb::open_in_memory().unwrap());
        let events = Arc::new(EventBus::new());
        AgentService::new(db.clone(), Arc::new(PointsService::new(db, events.clone())), events)
    }

    #[test]
    fn test_register_awards_once() {
        let agents = service();
        let plain = agents.register("plain", None, None).unwrap();
        assert_eq!(plain.points, 100);

        let complete = agents
            .register("complete", Some("https://img/c.png"), Some("has a bio"))
            .unwrap();
        assert_eq!(complete.points, 150);
    }

    #[test]
    fn test_register_validation() {
        let agents = service();
        assert!(matches!(agents.register("  ", None, None), Err(HubError::InvalidInput(_))));
        let long = "n".repeat(MAX_AGENT_NAME_CHARS + 1);
        assert!(matches!(agents.register(&long, None, None), Err(HubError::InvalidInput(_))));

        agents.register("taken", None, None).unwrap();
        assert!(matches!(agents.register("taken", None, None), Err(HubError::Conflict(_))));
    }

    #[test]
    fn test_profile_completion_bonus_is_one_time() {
        let agents = service();
        let agent = agents.register("slow", None, None).unwrap();

        let partial = agents.update_profile(agent.id, Some("https://img/s.png"), None).unwrap();
        assert_eq!(partial.points, 100);

        let complete = agents.update_profile(agent.id, None, Some("finally")).unwrap();
        assert_eq!(complete.points, 150);

        let again = agents.update_profile(agent.id, None, Some("edited")).unwrap();
        assert_eq!(again.points, 150);
    }

    #[test]
    fn test_daily_login_once_per_day() {
        let agents = service();
        let agent = agents.register("regular", None, None).unwrap();
        assert_eq!(agents.record_daily_login(agent.id).unwrap(), 5);
        assert_eq!(agents.record_daily_login(agent.id).unwrap(), 0);
        assert_eq!(agents.get_by_name("regular").unwrap().points, 105);
        assert!(matches!(agents.record_daily_login(999), Err(HubError::NotFound(_))));
    }
}
