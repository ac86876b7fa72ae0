//! Vote ledger: at most one vote per (agent, target)
//!
//! The ledger is the source of truth for who voted how. Target counters
//! are a cache derived from it through [`VoteOutcome::delta`].

use diesel::prelude::*;

use super::counters::VoteDelta;
use super::diesel_schema::votes;
use super::models::{current_timestamp, NewVote, Polarity, Vote, VoteTarget};
use super::{is_unique_violation, last_insert_id};
use crate::error::HubError;

/// What recording a vote did to the ledger
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VoteOutcome {
    /// First vote by this agent on the target
    Created(Polarity),
    /// Same polarity as the stored vote; nothing changed
    Unchanged(Polarity),
    /// Stored vote moved from `from` to the opposite polarity
    Flipped { from: Polarity, to: Polarity },
}

impl VoteOutcome {
    /// Counter change this outcome implies for the target
    pub fn delta(&self) -> VoteDelta {
        match *self {
            VoteOutcome::Created(polarity) => VoteDelta::cast(polarity),
            VoteOutcome::Unchanged(_) => VoteDelta::default(),
            VoteOutcome::Flipped { from, .. } => VoteDelta::flip_from(from),
        }
    }
}

pub fn get_vote(
    conn: &mut SqliteConnection,
    agent_id: i64,
    target_id: i64,
    target: VoteTarget,
) -> Result<Option<Vote>, HubError> {
    votes::table
        .filter(votes::agent_id.eq(agent_id))
        .filter(votes::target_id.eq(target_id))
        .filter(votes::target_type.eq(target.as_str()))
        .select(Vote::as_select())
        .first(conn)
        .optional()
        .map_err(|e| HubError::Internal(format!("Vote query failed: {}", e)))
}

/// Insert a first vote. A concurrent duplicate trips the unique index
/// and surfaces as `Conflict`.
pub fn cast_vote(
    conn: &mut SqliteConnection,
    agent_id: i64,
    target_id: i64,
    target: VoteTarget,
    polarity: Polarity,
) -> Result<Vote, HubError> {
    let now = current_timestamp();
    let new_vote = NewVote {
        agent_id,
        target_id,
        target_type: target.as_str(),
        vote_type: polarity.value(),
        created_at: &now,
        updated_at: &now,
    };

    diesel::insert_into(votes::table)
        .values(&new_vote)
        .execute(conn)
        .map_err(|e| {
            if is_unique_violation(&e) {
                HubError::Conflict(format!(
                    "Agent {} already voted on {} {}",
                    agent_id, target, target_id
                ))
            } else {
                HubError::Internal(format!("Vote insert failed: {}", e))
            }
        })?;

    let id = last_insert_id(conn)?;
    votes::table
        .find(id)
        .select(Vote::as_select())
        .first(conn)
        .map_err(|e| HubError::Internal(format!("Vote fetch failed: {}", e)))
}

pub fn change_polarity(conn: &mut SqliteConnection, vote: &Vote, polarity: Polarity) -> Result<Vote, HubError> {
    let now = current_timestamp();
    diesel::update(votes::table.find(vote.id))
        .set((votes::vote_type.eq(polarity.value()), votes::updated_at.eq(&now)))
        .execute(conn)
        .map_err(|e| HubError::Internal(format!("Vote update failed: {}", e)))?;

    votes::table
        .find(vote.id)
        .select(Vote::as_select())
        .first(conn)
        .map_err(|e| HubError::Internal(format!("Vote fetch failed: {}", e)))
}

/// Look up the agent's vote and create, keep or flip it.
///
/// Run inside the same transaction as the counter update that applies
/// [`VoteOutcome::delta`].
pub fn record_vote(
    conn: &mut SqliteConnection,
    agent_id: i64,
    target_id: i64,
    target: VoteTarget,
    polarity: Polarity,
) -> Result<VoteOutcome, HubError> {
    match get_vote(conn, agent_id, target_id, target)? {
        None => {
            cast_vote(conn, agent_id, target_id, target, polarity)?;
            Ok(VoteOutcome::Created(polarity))
        }
        Some(existing) => {
            let previous = existing.polarity()?;
            if previous == polarity {
                Ok(VoteOutcome::Unchanged(polarity))
            } else {
                change_polarity(conn, &existing, polarity)?;
                Ok(VoteOutcome::Flipped {
                    from: previous,
                    to: polarity,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{agents, HubDb};

    #[test]
    fn test_record_vote_transitions() {
        let db = HubDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let voter = agents::create_agent(conn, "voter", None, None)?;

            let outcome = record_vote(conn, voter.id, 7, VoteTarget::Post, Polarity::Up)?;
            assert_eq!(outcome, VoteOutcome::Created(Polarity::Up));
            assert_eq!(outcome.delta(), VoteDelta { up: 1, down: 0 });

            let outcome = record_vote(conn, voter.id, 7, VoteTarget::Post, Polarity::Up)?;
            assert_eq!(outcome, VoteOutcome::Unchanged(Polarity::Up));
            assert!(outcome.delta().is_zero());

            let outcome = record_vote(conn, voter.id, 7, VoteTarget::Post, Polarity::Down)?;
            assert_eq!(outcome, VoteOutcome::Flipped { from: Polarity::Up, to: Polarity::Down });
            assert_eq!(outcome.delta(), VoteDelta { up: -1, down: 1 });

            let stored = get_vote(conn, voter.id, 7, VoteTarget::Post)?.unwrap();
            assert_eq!(stored.polarity()?, Polarity::Down);

            // Same id on the other target type is a separate ledger entry
            assert!(get_vote(conn, voter.id, 7, VoteTarget::Comment)?.is_none());
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_duplicate_cast_hits_unique_index() {
        let db = HubDb::open_in_memory().unwrap();
        let result = db.with_conn(|conn| {
            let voter = agents::create_agent(conn, "racer", None, None)?;
            cast_vote(conn, voter.id, 1, VoteTarget::Comment, Polarity::Up)?;
            cast_vote(conn, voter.id, 1, VoteTarget::Comment, Polarity::Down)
        });
        assert!(matches!(result, Err(HubError::Conflict(_))));
    }
}
