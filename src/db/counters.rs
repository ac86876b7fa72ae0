//! Counter store: atomic adjustments of the denormalized counters
//!
//! Every adjustment is a single `UPDATE ... SET col = <expr>` so concurrent
//! writers never lose increments. Floored counters clamp at zero in SQL.
//! Vote counters move as one statement that also recomputes `net_votes`
//! from the new up/down values.

use diesel::prelude::*;
use diesel::sql_types::BigInt;
use serde::Serialize;

use super::models::{Polarity, VoteTarget};
use crate::error::HubError;

/// A floored counter on one row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Counter {
    AgentPoints(i64),
    AgentFollowers(i64),
    AgentFollowing(i64),
    PostComments(i64),
}

impl Counter {
    /// (table, column, row id); names are fixed strings, never user input
    fn location(&self) -> (&'static str, &'static str, i64) {
        match *self {
            Counter::AgentPoints(id) => ("agents", "points", id),
            Counter::AgentFollowers(id) => ("agents", "followers_count", id),
            Counter::AgentFollowing(id) => ("agents", "following_count", id),
            Counter::PostComments(id) => ("posts", "comments_count", id),
        }
    }
}

#[derive(QueryableByName)]
struct CounterValue {
    #[diesel(sql_type = BigInt)]
    value: i64,
}

/// Add `delta` to a floored counter and return the stored value.
///
/// The result is `max(0, current + delta)`. A missing row is `NotFound`;
/// callers load the entity first, so hitting it means a logic error.
pub fn adjust(conn: &mut SqliteConnection, counter: Counter, delta: i64) -> Result<i64, HubError> {
    let (table, column, id) = counter.location();

    conn.transaction(|conn| {
        let updated = diesel::sql_query(format!(
            "UPDATE {table} SET {column} = MAX(0, {column} + ?) WHERE id = ?"
        ))
        .bind::<BigInt, _>(delta)
        .bind::<BigInt, _>(id)
        .execute(conn)
        .map_err(|e| HubError::Internal(format!("Counter update failed: {}", e)))?;

        if updated == 0 {
            return Err(HubError::NotFound(format!("{} row {} not found", table, id)));
        }

        diesel::sql_query(format!("SELECT {column} AS value FROM {table} WHERE id = ?"))
            .bind::<BigInt, _>(id)
            .get_result::<CounterValue>(conn)
            .map(|row| row.value)
            .map_err(|e| HubError::Internal(format!("Counter read failed: {}", e)))
    })
}

/// Change to a target's up/down counts caused by one vote operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct VoteDelta {
    pub up: i64,
    pub down: i64,
}

impl VoteDelta {
    /// A first vote of the given polarity
    pub fn cast(polarity: Polarity) -> Self {
        match polarity {
            Polarity::Up => Self { up: 1, down: 0 },
            Polarity::Down => Self { up: 0, down: 1 },
        }
    }

    /// Moving an existing vote away from `previous`
    pub fn flip_from(previous: Polarity) -> Self {
        match previous {
            Polarity::Up => Self { up: -1, down: 1 },
            Polarity::Down => Self { up: 1, down: -1 },
        }
    }

    pub fn is_zero(&self) -> bool {
        self.up == 0 && self.down == 0
    }
}

/// Vote counters of a post or comment
#[derive(Debug, Clone, Copy, PartialEq, Eq, QueryableByName, Serialize)]
pub struct VoteTally {
    #[diesel(sql_type = BigInt)]
    pub upvotes: i64,
    #[diesel(sql_type = BigInt)]
    pub downvotes: i64,
    #[diesel(sql_type = BigInt)]
    pub net_votes: i64,
}

fn vote_table(target: VoteTarget) -> &'static str {
    match target {
        VoteTarget::Post => "posts",
        VoteTarget::Comment => "comments",
    }
}

/// Apply a vote delta as one statement and return the re-read tally.
///
/// `net_votes` is rewritten from the new up/down values in the same
/// UPDATE, so no reader ever sees the pair half-applied.
pub fn apply_vote_delta(
    conn: &mut SqliteConnection,
    target: VoteTarget,
    target_id: i64,
    delta: VoteDelta,
) -> Result<VoteTally, HubError> {
    let table = vote_table(target);

    conn.transaction(|conn| {
        if !delta.is_zero() {
            let updated = diesel::sql_query(format!(
                "UPDATE {table} SET \
                    upvotes = upvotes + ?1, \
                    downvotes = downvotes + ?2, \
                    net_votes = (upvotes + ?1) - (downvotes + ?2) \
                 WHERE id = ?3"
            ))
            .bind::<BigInt, _>(delta.up)
            .bind::<BigInt, _>(delta.down)
            .bind::<BigInt, _>(target_id)
            .execute(conn)
            .map_err(|e| HubError::Internal(format!("Vote counter update failed: {}", e)))?;

            if updated == 0 {
                return Err(HubError::NotFound(format!("{} {} not found", target, target_id)));
            }
        }

        read_vote_tally(conn, target, target_id)
    })
}

/// Current vote counters of a target
pub fn read_vote_tally(
    conn: &mut SqliteConnection,
    target: VoteTarget,
    target_id: i64,
) -> Result<VoteTally, HubError> {
    let table = vote_table(target);
    diesel::sql_query(format!(
        "SELECT upvotes, downvotes, net_votes FROM {table} WHERE id = ?"
    ))
    .bind::<BigInt, _>(target_id)
    .get_result::<VoteTally>(conn)
    .optional()
    .map_err(|e| HubError::Internal(format!("Vote tally read failed: {}", e)))?
    .ok_or_else(|| HubError::NotFound(format!("{} {} not found", target, target_id)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{agents, communities, posts, HubDb};

    fn seed_post(db: &HubDb) -> (i64, i64) {
        db.with_conn(|conn| {
            let agent = agents::create_agent(conn, "counter-owner", None, None)?;
            let community = communities::create_community(conn, "counters", None)?;
            let post = posts::create_post(conn, agent.id, community.id, "tally", None)?;
            Ok((agent.id, post.id))
        })
        .unwrap()
    }

    #[test]
    fn test_floored_counter_never_negative() {
        let db = HubDb::open_in_memory().unwrap();
        let (agent_id, _) = seed_post(&db);

        db.with_conn(|conn| {
            assert_eq!(adjust(conn, Counter::AgentFollowers(agent_id), 1)?, 1);
            assert_eq!(adjust(conn, Counter::AgentFollowers(agent_id), -1)?, 0);
            assert_eq!(adjust(conn, Counter::AgentFollowers(agent_id), -1)?, 0);
            assert_eq!(adjust(conn, Counter::AgentPoints(agent_id), 10)?, 10);
            assert_eq!(adjust(conn, Counter::AgentPoints(agent_id), -25)?, 0);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_adjust_missing_row_is_not_found() {
        let db = HubDb::open_in_memory().unwrap();
        let result = db.with_conn(|conn| adjust(conn, Counter::AgentFollowing(999), 1));
        assert!(matches!(result, Err(HubError::NotFound(_))));
    }

    #[test]
    fn test_vote_delta_keeps_net_consistent() {
        let db = HubDb::open_in_memory().unwrap();
        let (_, post_id) = seed_post(&db);

        db.with_conn(|conn| {
            let tally = apply_vote_delta(conn, VoteTarget::Post, post_id, VoteDelta::cast(Polarity::Up))?;
            assert_eq!(tally, VoteTally { upvotes: 1, downvotes: 0, net_votes: 1 });

            let tally = apply_vote_delta(conn, VoteTarget::Post, post_id, VoteDelta::flip_from(Polarity::Up))?;
            assert_eq!(tally, VoteTally { upvotes: 0, downvotes: 1, net_votes: -1 });

            let tally = apply_vote_delta(conn, VoteTarget::Post, post_id, VoteDelta::default())?;
            assert_eq!(tally.net_votes, -1);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_vote_delta_constructors() {
        assert_eq!(VoteDelta::cast(Polarity::Down), VoteDelta { up: 0, down: 1 });
        assert_eq!(VoteDelta::flip_from(Polarity::Down), VoteDelta { up: 1, down: -1 });
        assert!(VoteDelta::default().is_zero());
    }
}
