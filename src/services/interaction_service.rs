//! Interaction coordinator: votes and follows
//!
//! The ledger change and its counter deltas commit together in one
//! immediate transaction. Points and notifications run afterwards, outside
//! any connection, and only through [`best_effort`].

use std::sync::Arc;

use tracing::{debug, info};

use crate::db::counters::{self, Counter};
use crate::db::models::{PointsReason, Polarity, VoteTarget};
use crate::db::votes::{self, VoteOutcome};
use crate::db::{agents, comments, follows, posts, HubDb};
use crate::error::HubError;

use super::events::{EventBus, HubEvent};
use super::notification_service::Notifier;
use super::points_service::PointsAwarder;
use super::side_effects::best_effort;

pub struct InteractionService {
    db: Arc<HubDb>,
    points: Arc<dyn PointsAwarder>,
    notifier: Arc<dyn Notifier>,
    events: Arc<EventBus>,
}

impl InteractionService {
    pub fn new(
        db: Arc<HubDb>,
        points: Arc<dyn PointsAwarder>,
        notifier: Arc<dyn Notifier>,
        events: Arc<EventBus>,
    ) -> Self {
        Self {
            db,
            points,
            notifier,
            events,
        }
    }

    // =========================================================================
    // Votes
    // =========================================================================

    /// Vote on a post; returns the post's net votes afterwards
    pub fn vote_post(&self, agent_id: i64, post_id: i64, vote_type: i32) -> Result<i64, HubError> {
        self.vote(agent_id, VoteTarget::Post, post_id, vote_type)
    }

    /// Vote on a comment; returns the comment's net votes afterwards
    pub fn vote_comment(&self, agent_id: i64, comment_id: i64, vote_type: i32) -> Result<i64, HubError> {
        self.vote(agent_id, VoteTarget::Comment, comment_id, vote_type)
    }

    fn vote(&self, agent_id: i64, target: VoteTarget, target_id: i64, vote_type: i32) -> Result<i64, HubError> {
        let polarity = Polarity::try_from(vote_type)?;

        let (owner_id, outcome, tally) = self.db.with_transaction(|conn| {
            agents::require_agent(conn, agent_id)?;
            let owner_id = match target {
                VoteTarget::Post => posts::require_post(conn, target_id)?.agent_id,
                VoteTarget::Comment => comments::require_comment(conn, target_id)?.agent_id,
            };

            let outcome = votes::record_vote(conn, agent_id, target_id, target, polarity)?;
            let tally = counters::apply_vote_delta(conn, target, target_id, outcome.delta())?;
            Ok((owner_id, outcome, tally))
        })?;

        match outcome {
            VoteOutcome::Unchanged(_) => {
                debug!(agent_id, target = %target, target_id, "Repeated vote ignored");
                return Ok(tally.net_votes);
            }
            VoteOutcome::Created(Polarity::Up) => {
                best_effort(
                    "content_upvoted points",
                    self.points.award(owner_id, PointsReason::ContentUpvoted, Some(target_id)),
                );
            }
            VoteOutcome::Created(Polarity::Down) => {
                best_effort(
                    "content_downvoted points",
                    self.points.award(owner_id, PointsReason::ContentDownvoted, Some(target_id)),
                );
            }
            // Flips leave previously awarded points alone
            VoteOutcome::Flipped { from, to } => {
                debug!(agent_id, target = %target, target_id, ?from, ?to, "Vote flipped");
            }
        }

        self.events.emit(HubEvent::VoteCast {
            agent_id,
            target,
            target_id,
            polarity: polarity.value(),
            net_votes: tally.net_votes,
        });
        Ok(tally.net_votes)
    }

    // =========================================================================
    // Follows
    // =========================================================================

    /// Drive the follow relation to `want_follow`; returns the target's
    /// follower count. Already being in the requested state is a no-op.
    pub fn follow(&self, follower_id: i64, target_name: &str, want_follow: bool) -> Result<i64, HubError> {
        let (target_id, changed, followers_count) = self.db.with_transaction(|conn| {
            agents::require_agent(conn, follower_id)?;
            let target = agents::get_agent_by_name(conn, target_name)?
                .ok_or_else(|| HubError::NotFound(format!("Agent '{}' not found", target_name)))?;
            if target.id == follower_id {
                return Err(HubError::InvalidInput("cannot follow self".into()));
            }

            let changed = if want_follow {
                follows::create(conn, follower_id, target.id)?
            } else {
                follows::delete(conn, follower_id, target.id)?
            };
            if !changed {
                return Ok((target.id, false, target.followers_count));
            }

            let delta = if want_follow { 1 } else { -1 };
            counters::adjust(conn, Counter::AgentFollowing(follower_id), delta)?;
            let followers_count = counters::adjust(conn, Counter::AgentFollowers(target.id), delta)?;
            Ok((target.id, true, followers_count))
        })?;

        if !changed {
            debug!(follower_id, target_id, want_follow, "Follow state already holds");
            return Ok(followers_count);
        }

        info!(follower_id, target_id, following = want_follow, "Follow changed");
        if want_follow {
            best_effort("new_follow notification", self.notifier.notify_new_follow(target_id, follower_id));
        }
        self.events.emit(HubEvent::FollowChanged {
            follower_id,
            following_id: target_id,
            following: want_follow,
            followers_count,
        });
        Ok(followers_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{communities, notifications};
    use crate::services::notification_service::NotificationService;
    use crate::services::points_service::PointsService;

    struct Fixture {
        db: Arc<HubDb>,
        service: InteractionService,
        author: i64,
        voter: i64,
        post: i64,
    }

    fn fixture() -> Fixture {
        let db = Arc::new(HubDb::open_in_memory().unwrap());
        let events = Arc::new(EventBus::new());
        let (author, voter, post) = db
            .with_conn(|conn| {
                let author = agents::create_agent(conn, "author", None, None)?;
                let voter = agents::create_agent(conn, "voter", None, None)?;
                let community = communities::create_community(conn, "votes", None)?;
                let post = posts::create_post(conn, author.id, community.id, "vote on me", None)?;
                Ok((author.id, voter.id, post.id))
            })
            .unwrap();

        let service = InteractionService::new(
            db.clone(),
            Arc::new(PointsService::new(db.clone(), events.clone())),
            Arc::new(NotificationService::new(db.clone(), events.clone())),
            events,
        );
        Fixture { db, service, author, voter, post }
    }

    fn agent(db: &HubDb, id: i64) -> crate::db::models::Agent {
        db.with_conn(|conn| agents::require_agent(conn, id)).unwrap()
    }

    #[test]
    fn test_repeated_vote_is_idempotent() {
        let f = fixture();
        assert_eq!(f.service.vote_post(f.voter, f.post, 1).unwrap(), 1);
        assert_eq!(f.service.vote_post(f.voter, f.post, 1).unwrap(), 1);
        assert_eq!(agent(&f.db, f.author).points, 1);
    }

    #[test]
    fn test_flip_moves_net_by_two_without_touching_points() {
        let f = fixture();
        assert_eq!(f.service.vote_post(f.voter, f.post, 1).unwrap(), 1);
        assert_eq!(f.service.vote_post(f.voter, f.post, -1).unwrap(), -1);

        let post = f.db.with_conn(|conn| posts::require_post(conn, f.post)).unwrap();
        assert_eq!((post.upvotes, post.downvotes, post.net_votes), (0, 1, -1));
        // The +1 from the original upvote stays
        assert_eq!(agent(&f.db, f.author).points, 1);
    }

    #[test]
    fn test_first_downvote_deducts_from_owner() {
        let f = fixture();
        f.db.with_conn(|conn| counters::adjust(conn, Counter::AgentPoints(f.author), 10))
            .unwrap();
        assert_eq!(f.service.vote_post(f.voter, f.post, -1).unwrap(), -1);
        assert_eq!(agent(&f.db, f.author).points, 9);
    }

    #[test]
    fn test_vote_validation() {
        let f = fixture();
        assert!(matches!(f.service.vote_post(f.voter, f.post, 0), Err(HubError::InvalidInput(_))));
        assert!(matches!(f.service.vote_post(f.voter, 999, 1), Err(HubError::NotFound(_))));
        assert!(matches!(f.service.vote_comment(f.voter, 999, -1), Err(HubError::NotFound(_))));
    }

    #[test]
    fn test_self_vote_counts() {
        let f = fixture();
        assert_eq!(f.service.vote_post(f.author, f.post, 1).unwrap(), 1);
        assert_eq!(agent(&f.db, f.author).points, 1);
    }

    #[test]
    fn test_comment_vote_awards_comment_owner() {
        let f = fixture();
        let comment = f
            .db
            .with_conn(|conn| comments::create_comment(conn, f.voter, f.post, "a comment worth upvoting"))
            .unwrap();
        assert_eq!(f.service.vote_comment(f.author, comment.id, 1).unwrap(), 1);
        assert_eq!(agent(&f.db, f.voter).points, 1);
        assert_eq!(agent(&f.db, f.author).points, 0);
    }

    #[test]
    fn test_follow_round_trip_is_idempotent_per_state() {
        let f = fixture();
        assert_eq!(f.service.follow(f.voter, "author", true).unwrap(), 1);
        assert_eq!(f.service.follow(f.voter, "author", true).unwrap(), 1);
        assert_eq!(agent(&f.db, f.voter).following_count, 1);

        assert_eq!(f.service.follow(f.voter, "author", false).unwrap(), 0);
        assert_eq!(f.service.follow(f.voter, "author", false).unwrap(), 0);
        assert_eq!(agent(&f.db, f.voter).following_count, 0);

        // One notification for the one real follow
        let inbox = f.db.with_conn(|conn| notifications::list(conn, f.author, 20, 0)).unwrap();
        assert_eq!(inbox.total, 1);
    }

    #[test]
    fn test_follow_errors() {
        let f = fixture();
        assert!(matches!(f.service.follow(f.voter, "voter", true), Err(HubError::InvalidInput(_))));
        assert!(matches!(f.service.follow(f.voter, "nobody", true), Err(HubError::NotFound(_))));
    }
}
