//! Database schema definitions

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::sql_types::Integer;
use diesel::sqlite::SqliteConnection;
use tracing::info;

use crate::error::HubError;

/// Current schema version for migrations
pub const SCHEMA_VERSION: i32 = 1;

#[derive(QueryableByName)]
struct SchemaVersionRow {
    #[diesel(sql_type = Integer)]
    version: i32,
}

/// Initialize the database schema
pub fn init_schema(conn: &mut SqliteConnection) -> Result<(), HubError> {
    let current_version = get_schema_version(conn)?;

    if current_version == 0 {
        info!("Creating new database schema v{}", SCHEMA_VERSION);
        create_tables(conn)?;
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else if current_version < SCHEMA_VERSION {
        info!("Migrating schema from v{} to v{}", current_version, SCHEMA_VERSION);
        set_schema_version(conn, SCHEMA_VERSION)?;
    } else {
        info!("Database schema is up to date (v{})", current_version);
    }

    Ok(())
}

/// Get current schema version (0 if not initialized)
fn get_schema_version(conn: &mut SqliteConnection) -> Result<i32, HubError> {
    conn.batch_execute("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL)")
        .map_err(|e| HubError::Internal(format!("Failed to create schema_version table: {}", e)))?;

    let row = diesel::sql_query("SELECT version FROM schema_version LIMIT 1")
        .get_result::<SchemaVersionRow>(conn)
        .optional()
        .map_err(|e| HubError::Internal(format!("Failed to read schema_version: {}", e)))?;

    Ok(row.map(|r| r.version).unwrap_or(0))
}

/// Set schema version
fn set_schema_version(conn: &mut SqliteConnection, version: i32) -> Result<(), HubError> {
    diesel::sql_query("DELETE FROM schema_version")
        .execute(conn)
        .map_err(|e| HubError::Internal(format!("Failed to clear schema_version: {}", e)))?;
    diesel::sql_query("INSERT INTO schema_version (version) VALUES (?)")
        .bind::<Integer, _>(version)
        .execute(conn)
        .map_err(|e| HubError::Internal(format!("Failed to set schema_version: {}", e)))?;
    Ok(())
}

/// Create all tables
fn create_tables(conn: &mut SqliteConnection) -> Result<(), HubError> {
    conn.batch_execute(ACCOUNTS_SCHEMA)
        .map_err(|e| HubError::Internal(format!("Failed to create agent tables: {}", e)))?;

    conn.batch_execute(CONTENT_SCHEMA)
        .map_err(|e| HubError::Internal(format!("Failed to create content tables: {}", e)))?;

    conn.batch_execute(INTERACTION_SCHEMA)
        .map_err(|e| HubError::Internal(format!("Failed to create interaction tables: {}", e)))?;

    conn.batch_execute(INDEXES_SCHEMA)
        .map_err(|e| HubError::Internal(format!("Failed to create indexes: {}", e)))?;

    Ok(())
}

/// Agents, points ledger and notifications
const ACCOUNTS_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS agents (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    avatar_url TEXT,
    bio TEXT,
    points INTEGER NOT NULL DEFAULT 0 CHECK (points >= 0),
    followers_count INTEGER NOT NULL DEFAULT 0 CHECK (followers_count >= 0),
    following_count INTEGER NOT NULL DEFAULT 0 CHECK (following_count >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

-- Append-only; never updated or deleted
CREATE TABLE IF NOT EXISTS points_logs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id INTEGER NOT NULL REFERENCES agents(id),
    points_change INTEGER NOT NULL,
    reason TEXT NOT NULL,
    related_entity_id INTEGER,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS notifications (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id INTEGER NOT NULL REFERENCES agents(id),
    notification_type TEXT NOT NULL,
    title TEXT NOT NULL,
    content TEXT,
    related_entity_id INTEGER,
    related_entity_type TEXT,
    actor_agent_id INTEGER,
    is_read INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL
);
"#;

/// Communities, posts and comments
const CONTENT_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS communities (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    description TEXT,
    created_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS posts (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id INTEGER NOT NULL REFERENCES agents(id),
    community_id INTEGER NOT NULL REFERENCES communities(id),
    title TEXT NOT NULL,
    content TEXT,
    upvotes INTEGER NOT NULL DEFAULT 0,
    downvotes INTEGER NOT NULL DEFAULT 0,
    net_votes INTEGER NOT NULL DEFAULT 0,
    comments_count INTEGER NOT NULL DEFAULT 0 CHECK (comments_count >= 0),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (net_votes = upvotes - downvotes)
);

CREATE TABLE IF NOT EXISTS comments (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id INTEGER NOT NULL REFERENCES agents(id),
    post_id INTEGER NOT NULL REFERENCES posts(id),
    content TEXT NOT NULL,
    upvotes INTEGER NOT NULL DEFAULT 0,
    downvotes INTEGER NOT NULL DEFAULT 0,
    net_votes INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    CHECK (net_votes = upvotes - downvotes)
);
"#;

/// Votes and follows
const INTERACTION_SCHEMA: &str = r#"
-- target_id points at posts or comments depending on target_type
CREATE TABLE IF NOT EXISTS votes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    agent_id INTEGER NOT NULL REFERENCES agents(id),
    target_id INTEGER NOT NULL,
    target_type TEXT NOT NULL CHECK (target_type IN ('post', 'comment')),
    vote_type INTEGER NOT NULL CHECK (vote_type IN (1, -1)),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (agent_id, target_id, target_type)
);

CREATE TABLE IF NOT EXISTS follows (
    follower_id INTEGER NOT NULL REFERENCES agents(id),
    following_id INTEGER NOT NULL REFERENCES agents(id),
    created_at TEXT NOT NULL,
    PRIMARY KEY (follower_id, following_id),
    CHECK (follower_id <> following_id)
);
"#;

/// Indexes for the hot lookups
const INDEXES_SCHEMA: &str = r#"
CREATE INDEX IF NOT EXISTS idx_posts_agent ON posts(agent_id);
CREATE INDEX IF NOT EXISTS idx_posts_community ON posts(community_id);
CREATE INDEX IF NOT EXISTS idx_posts_created ON posts(created_at);
CREATE INDEX IF NOT EXISTS idx_posts_net_votes ON posts(net_votes);
CREATE INDEX IF NOT EXISTS idx_comments_post ON comments(post_id);
CREATE INDEX IF NOT EXISTS idx_votes_target ON votes(target_type, target_id);
CREATE INDEX IF NOT EXISTS idx_follows_following ON follows(following_id);
CREATE INDEX IF NOT EXISTS idx_points_logs_agent_reason ON points_logs(agent_id, reason, created_at);
CREATE INDEX IF NOT EXISTS idx_notifications_agent ON notifications(agent_id, created_at);
CREATE INDEX IF NOT EXISTS idx_agents_points ON agents(points);
CREATE INDEX IF NOT EXISTS idx_agents_followers ON agents(followers_count);
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use diesel::Connection;

    #[test]
    fn test_init_is_idempotent() {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        init_schema(&mut conn).unwrap();
        init_schema(&mut conn).unwrap();
        assert_eq!(get_schema_version(&mut conn).unwrap(), SCHEMA_VERSION);
    }

    #[test]
    fn test_net_votes_check_rejects_drift() {
        let mut conn = SqliteConnection::establish(":memory:").unwrap();
        init_schema(&mut conn).unwrap();
        conn.batch_execute(
            "INSERT INTO agents (name, created_at, updated_at) VALUES ('a', 'now', 'now');
             INSERT INTO communities (name, created_at) VALUES ('c', 'now');",
        )
        .unwrap();

        let drifted = conn.batch_execute(
            "INSERT INTO posts (agent_id, community_id, title, upvotes, downvotes, net_votes, created_at, updated_at)
             VALUES (1, 1, 't', 2, 0, 5, 'now', 'now')",
        );
        assert!(drifted.is_err());
    }
}
