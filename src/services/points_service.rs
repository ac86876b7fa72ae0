//! Points ledger policy
//!
//! Each [`PointsReason`] has one rule: a nominal delta and at most one of
//! a one-time limit or a per-UTC-day cap. Awards are decided and applied
//! in one immediate transaction, so two concurrent awards cannot both see
//! room under the same cap.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use diesel::SqliteConnection;
use tracing::debug;

use crate::db::counters::{self, Counter};
use crate::db::models::{utc_day_start, PointsLogEntry, PointsReason};
use crate::db::{agents, clamp_limit, points_log, HubDb, Page, DEFAULT_PAGE_LIMIT};
use crate::error::HubError;

use super::events::{EventBus, HubEvent};

/// Award policy for one reason
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointsRule {
    pub reason: PointsReason,
    pub delta: i64,
    pub one_time: bool,
    /// Maximum positive total per UTC day; 0 means uncapped
    pub daily_cap: i64,
}

pub const POINTS_RULES: [PointsRule; 8] = [
    PointsRule { reason: PointsReason::AgentRegistered, delta: 100, one_time: true, daily_cap: 0 },
    PointsRule { reason: PointsReason::ProfileCompleted, delta: 50, one_time: true, daily_cap: 0 },
    PointsRule { reason: PointsReason::PostCreated, delta: 10, one_time: false, daily_cap: 50 },
    PointsRule { reason: PointsReason::CommentCreated, delta: 5, one_time: false, daily_cap: 50 },
    PointsRule { reason: PointsReason::ContentUpvoted, delta: 1, one_time: false, daily_cap: 100 },
    PointsRule { reason: PointsReason::DailyLogin, delta: 5, one_time: false, daily_cap: 5 },
    PointsRule { reason: PointsReason::ContentDownvoted, delta: -1, one_time: false, daily_cap: 0 },
    PointsRule { reason: PointsReason::ContentDeletedByAdmin, delta: -20, one_time: false, daily_cap: 0 },
];

pub fn rule_for(reason: PointsReason) -> PointsRule {
    POINTS_RULES
        .into_iter()
        .find(|rule| rule.reason == reason)
        .unwrap_or(PointsRule { reason, delta: 0, one_time: false, daily_cap: 0 })
}

/// Amount the rule allows right now, before the counter floor applies
pub fn allowed_amount(
    conn: &mut SqliteConnection,
    agent_id: i64,
    rule: &PointsRule,
    now: DateTime<Utc>,
) -> Result<i64, HubError> {
    if rule.one_time {
        if points_log::has_reason(conn, agent_id, rule.reason)? {
            return Ok(0);
        }
        return Ok(rule.delta);
    }

    if rule.daily_cap > 0 && rule.delta > 0 {
        let used = points_log::sum_since(conn, agent_id, rule.reason, &utc_day_start(now))?;
        if used >= rule.daily_cap {
            return Ok(0);
        }
        return Ok(rule.delta.min(rule.daily_cap - used));
    }

    Ok(rule.delta)
}

/// Decide, apply and log one award as of `now`.
///
/// `now` picks the daily-cap window and stamps the log row, so an award
/// straddling UTC midnight is counted against the day it was checked in.
/// Must run inside the caller's transaction.
pub fn apply_award(
    conn: &mut SqliteConnection,
    agent_id: i64,
    rule: &PointsRule,
    related_entity_id: Option<i64>,
    now: DateTime<Utc>,
) -> Result<i64, HubError> {
    let allowed = allowed_amount(conn, agent_id, rule, now)?;
    if allowed == 0 {
        return Ok(0);
    }

    let before = agents::require_agent(conn, agent_id)?.points;
    let after = counters::adjust(conn, Counter::AgentPoints(agent_id), allowed)?;
    // The zero floor counts: a deduction that found nothing to take leaves no row
    let applied = after - before;
    if applied != 0 {
        points_log::append(conn, agent_id, applied, rule.reason, related_entity_id, now)?;
    }
    Ok(applied)
}

/// Awards or deducts points for a reason under its rule.
///
/// Returns the change actually applied to the agent's points, which may be
/// less than the rule's delta (cap reached, one-time already used, or the
/// zero floor on deductions).
pub trait PointsAwarder: Send + Sync {
    fn award(&self, agent_id: i64, reason: PointsReason, related_entity_id: Option<i64>) -> Result<i64, HubError>;
}

/// Points service backed by the hub database
pub struct PointsService {
    db: Arc<HubDb>,
    events: Arc<EventBus>,
}

impl PointsService {
    pub fn new(db: Arc<HubDb>, events: Arc<EventBus>) -> Self {
        Self { db, events }
    }

    /// An agent's audit trail, newest first
    pub fn history(&self, agent_id: i64, limit: i64, offset: i64) -> Result<Page<PointsLogEntry>, HubError> {
        let limit = clamp_limit(limit, DEFAULT_PAGE_LIMIT);
        self.db.with_conn(|conn| {
            agents::require_agent(conn, agent_id)?;
            points_log::history(conn, agent_id, limit, offset.max(0))
        })
    }
}

impl PointsAwarder for PointsService {
    fn award(&self, agent_id: i64, reason: PointsReason, related_entity_id: Option<i64>) -> Result<i64, HubError> {
        let rule = rule_for(reason);

        let applied = self
            .db
            .with_transaction(|conn| apply_award(conn, agent_id, &rule, related_entity_id, Utc::now()))?;

        if applied == 0 {
            debug!(agent_id, reason = %reason, "No points applied");
        } else {
            self.events.emit(HubEvent::PointsAwarded {
                agent_id,
                reason,
                points: applied,
            });
        }
        Ok(applied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn setup() -> (Arc<HubDb>, PointsService, i64) {
        let db = Arc::new(HubDb::open_in_memory().unwrap());
        let agent = db.with_conn(|conn| agents::create_agent(conn, "earner", None, None)).unwrap();
        let service = PointsService::new(db.clone(), Arc::new(EventBus::new()));
        (db, service, agent.id)
    }

    fn points_of(db: &HubDb, agent_id: i64) -> i64 {
        db.with_conn(|conn| agents::require_agent(conn, agent_id)).unwrap().points
    }

    #[test]
    fn test_every_reason_has_a_rule() {
        for reason in PointsReason::ALL {
            assert_ne!(rule_for(reason).delta, 0, "{} has no rule", reason);
        }
        assert_eq!(rule_for(PointsReason::DailyLogin).daily_cap, 5);
        assert!(rule_for(PointsReason::AgentRegistered).one_time);
    }

    #[test]
    fn test_one_time_award_applies_once() {
        let (db, service, agent_id) = setup();

        assert_eq!(service.award(agent_id, PointsReason::AgentRegistered, None).unwrap(), 100);
        assert_eq!(service.award(agent_id, PointsReason::AgentRegistered, None).unwrap(), 0);
        assert_eq!(points_of(&db, agent_id), 100);
        assert_eq!(service.history(agent_id, 0, 0).unwrap().total, 1);
    }

    #[test]
    fn test_daily_cap_clamps_partial_award() {
        let (db, service, agent_id) = setup();
        db.with_conn(|conn| points_log::append(conn, agent_id, 45, PointsReason::PostCreated, None, Utc::now()))
            .unwrap();

        // 5 of room left under the 50 cap
        assert_eq!(service.award(agent_id, PointsReason::PostCreated, Some(1)).unwrap(), 5);
        assert_eq!(service.award(agent_id, PointsReason::PostCreated, Some(2)).unwrap(), 0);

        let history = service.history(agent_id, 10, 0).unwrap();
        assert_eq!(history.total, 2);
        assert_eq!(history.items[0].points_change, 5);
    }

    #[test]
    fn test_deduction_floors_at_zero_and_logs_actual_change() {
        let (db, service, agent_id) = setup();
        service.award(agent_id, PointsReason::DailyLogin, None).unwrap();

        let applied = service
            .award(agent_id, PointsReason::ContentDeletedByAdmin, Some(3))
            .unwrap();
        assert_eq!(applied, -5);
        assert_eq!(points_of(&db, agent_id), 0);

        // Nothing left to take
        assert_eq!(service.award(agent_id, PointsReason::ContentDownvoted, None).unwrap(), 0);
        assert_eq!(service.history(agent_id, 10, 0).unwrap().total, 2);
    }

    #[test]
    fn test_award_near_midnight_logs_under_checked_day() {
        let (db, _service, agent_id) = setup();
        let rule = rule_for(PointsReason::PostCreated);
        let before_midnight = Utc.with_ymd_and_hms(2024, 3, 9, 23, 59, 59).unwrap();
        let after_midnight = Utc.with_ymd_and_hms(2024, 3, 10, 0, 0, 0).unwrap();

        db.with_transaction(|conn| {
            points_log::append(conn, agent_id, 45, PointsReason::PostCreated, None, before_midnight)?;

            assert_eq!(apply_award(conn, agent_id, &rule, Some(1), before_midnight)?, 5);
            assert_eq!(apply_award(conn, agent_id, &rule, Some(2), before_midnight)?, 0);

            // New UTC day, new cap
            assert_eq!(apply_award(conn, agent_id, &rule, Some(3), after_midnight)?, 10);

            let stamps: Vec<String> = points_log::history(conn, agent_id, 10, 0)?
                .items
                .into_iter()
                .map(|e| e.created_at)
                .collect();
            assert_eq!(
                stamps,
                vec!["2024-03-10T00:00:00Z", "2024-03-09T23:59:59Z", "2024-03-09T23:59:59Z"]
            );
            Ok(())
        })
        .unwrap();
        assert_eq!(points_of(&db, agent_id), 15);
    }

    #[test]
    fn test_award_to_missing_agent_fails() {
        let (_db, service, _) = setup();
        assert!(matches!(
            service.award(404, PointsReason::DailyLogin, None),
            Err(HubError::NotFound(_))
        ));
    }
}
