//! Follow relation rows

use diesel::prelude::*;

use super::diesel_schema::follows;
use super::models::{current_timestamp, Follow};
use crate::error::HubError;

pub fn exists(conn: &mut SqliteConnection, follower_id: i64, following_id: i64) -> Result<bool, HubError> {
    diesel::select(diesel::dsl::exists(
        follows::table
            .filter(follows::follower_id.eq(follower_id))
            .filter(follows::following_id.eq(following_id)),
    ))
    .get_result(conn)
    .map_err(|e| HubError::Internal(format!("Follow query failed: {}", e)))
}

/// Insert the pair; returns false if it was already present
pub fn create(conn: &mut SqliteConnection, follower_id: i64, following_id: i64) -> Result<bool, HubError> {
    let row = Follow {
        follower_id,
        following_id,
        created_at: current_timestamp(),
    };

    let inserted = diesel::insert_or_ignore_into(follows::table)
        .values(&row)
        .execute(conn)
        .map_err(|e| HubError::Internal(format!("Follow insert failed: {}", e)))?;
    Ok(inserted > 0)
}

/// Remove the pair; returns false if it was not present
pub fn delete(conn: &mut SqliteConnection, follower_id: i64, following_id: i64) -> Result<bool, HubError> {
    let deleted = diesel::delete(follows::table.find((follower_id, following_id)))
        .execute(conn)
        .map_err(|e| HubError::Internal(format!("Follow delete failed: {}", e)))?;
    Ok(deleted > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{agents, HubDb};

    #[test]
    fn test_create_and_delete_report_changes() {
        let db = HubDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let a = agents::create_agent(conn, "a", None, None)?;
            let b = agents::create_agent(conn, "b", None, None)?;

            assert!(!exists(conn, a.id, b.id)?);
            assert!(create(conn, a.id, b.id)?);
            assert!(!create(conn, a.id, b.id)?);
            assert!(exists(conn, a.id, b.id)?);
            assert!(!exists(conn, b.id, a.id)?);

            assert!(delete(conn, a.id, b.id)?);
            assert!(!delete(conn, a.id, b.id)?);
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_self_follow_never_lands() {
        let db = HubDb::open_in_memory().unwrap();
        db.with_conn(|conn| {
            let a = agents::create_agent(conn, "narcissus", None, None)?;
            // OR IGNORE also skips the CHECK constraint
            assert!(!create(conn, a.id, a.id)?);
            assert!(!exists(conn, a.id, a.id)?);
            Ok(())
        })
        .unwrap();
    }
}
