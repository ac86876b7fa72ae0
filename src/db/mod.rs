//! SQLite database module for the hub's relational state
//!
//! ## Architecture
//!
//! - One r2d2 pool of diesel `SqliteConnection`s shared by every service
//! - Repository functions take `&mut SqliteConnection` and never hold a
//!   connection across calls, so services can chain them freely
//! - Multi-step writes run inside `immediate_transaction`, which takes the
//!   SQLite write lock up front
//!
//! ## Tables
//!
//! - `agents` - personas with points and follow counters
//! - `communities`, `posts`, `comments` - content and its vote counters
//! - `votes` - one row per (agent, target)
//! - `follows` - ordered follower/following pairs
//! - `points_logs` - append-only points audit trail
//! - `notifications` - per-agent inbox

pub mod diesel_schema;
pub mod models;
pub mod schema;

pub mod agents;
pub mod comments;
pub mod communities;
pub mod counters;
pub mod follows;
pub mod notifications;
pub mod points_log;
pub mod posts;
pub mod votes;

use std::time::Duration;

use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PooledConnection};
use diesel::result::{DatabaseErrorKind, Error as DieselError};
use diesel::sql_types::BigInt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::Config;
use crate::error::HubError;

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;
pub type PooledConn = PooledConnection<ConnectionManager<SqliteConnection>>;

/// Default page size for list operations
pub const DEFAULT_PAGE_LIMIT: i64 = 20;
/// Largest page any list operation returns
pub const MAX_PAGE_LIMIT: i64 = 100;

/// Clamp a requested page size: non-positive means default, capped at max
pub fn clamp_limit(limit: i64, default: i64) -> i64 {
    if limit <= 0 {
        default
    } else {
        limit.min(MAX_PAGE_LIMIT)
    }
}

/// Escape character paired with [`contains_pattern`]
pub const LIKE_ESCAPE: char = '\\';

/// `%token%` with the token's own `\`, `%` and `_` escaped, for
/// `.like(..).escape(LIKE_ESCAPE)`
pub fn contains_pattern(token: &str) -> String {
    let mut pattern = String::with_capacity(token.len() + 2);
    pattern.push('%');
    for c in token.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push(LIKE_ESCAPE);
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// One page of a list query plus the unpaged total
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64) -> Self {
        Self { items, total }
    }
}

diesel::define_sql_function! {
    /// Rowid of the most recent INSERT on this connection
    fn last_insert_rowid() -> BigInt;
}

/// Id assigned by the INSERT that just ran on `conn`
pub(crate) fn last_insert_id(conn: &mut SqliteConnection) -> Result<i64, HubError> {
    diesel::select(last_insert_rowid())
        .get_result::<i64>(conn)
        .map_err(|e| HubError::Internal(format!("Failed to read inserted id: {}", e)))
}

pub(crate) fn is_unique_violation(err: &DieselError) -> bool {
    matches!(err, DieselError::DatabaseError(DatabaseErrorKind::UniqueViolation, _))
}

/// PRAGMAs applied to every pooled connection as it is opened
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout_ms: u32,
    wal: bool,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        let mut pragmas = format!(
            "PRAGMA foreign_keys = ON; PRAGMA busy_timeout = {};",
            self.busy_timeout_ms
        );
        if self.wal {
            pragmas.push_str(" PRAGMA synchronous = NORMAL;");
        }
        conn.batch_execute(&pragmas)
            .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// Pooled SQLite database for the hub
pub struct HubDb {
    pool: DbPool,
}

impl HubDb {
    /// Open or create the database described by `config`
    pub fn open(config: &Config) -> Result<Self, HubError> {
        let db_path = config.database_path();
        let url = db_path.to_string_lossy().into_owned();
        info!("Opening SQLite database at {:?}", db_path);

        // Journal mode lives in the file; switch it once before the pool
        // opens its connections
        SqliteConnection::establish(&url)
            .map_err(|e| HubError::Internal(format!("Failed to open SQLite database: {}", e)))?
            .batch_execute("PRAGMA journal_mode = WAL;")
            .map_err(|e| HubError::Internal(format!("Failed to enable WAL: {}", e)))?;

        let manager = ConnectionManager::<SqliteConnection>::new(url);
        let pool = Pool::builder()
            .max_size(config.pool_size.max(1))
            .connection_timeout(Duration::from_secs(30))
            .connection_customizer(Box::new(ConnectionOptions {
                busy_timeout_ms: config.busy_timeout_ms,
                wal: true,
            }))
            .build(manager)
            .map_err(|e| HubError::Internal(format!("Failed to open SQLite pool: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    /// Open an in-memory database (for testing)
    ///
    /// Every `:memory:` connection is its own database, so the pool holds
    /// exactly one connection and never recycles it.
    pub fn open_in_memory() -> Result<Self, HubError> {
        debug!("Opening in-memory SQLite database");

        let manager = ConnectionManager::<SqliteConnection>::new(":memory:");
        let pool = Pool::builder()
            .max_size(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connection_customizer(Box::new(ConnectionOptions {
                busy_timeout_ms: 0,
                wal: false,
            }))
            .build(manager)
            .map_err(|e| HubError::Internal(format!("Failed to open in-memory SQLite: {}", e)))?;

        let db = Self { pool };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<(), HubError> {
        self.with_conn(schema::init_schema)
    }

    /// Get a connection from the pool
    fn conn(&self) -> Result<PooledConn, HubError> {
        self.pool
            .get()
            .map_err(|e| HubError::Internal(format!("Failed to get connection: {}", e)))
    }

    /// Run `f` with a pooled connection, released when `f` returns
    pub fn with_conn<F, T>(&self, f: F) -> Result<T, HubError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, HubError>,
    {
        let mut conn = self.conn()?;
        f(&mut conn)
    }

    /// Run `f` inside an immediate (write-locking) transaction
    pub fn with_transaction<F, T>(&self, f: F) -> Result<T, HubError>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T, HubError>,
    {
        let mut conn = self.conn()?;
        conn.immediate_transaction(f)
    }

    /// Get database statistics
    pub fn stats(&self) -> Result<DbStats, HubError> {
        self.with_conn(|conn| {
            let count_failed = |e: diesel::result::Error| HubError::Internal(format!("Count query failed: {}", e));

            Ok(DbStats {
                agent_count: diesel_schema::agents::table.count().get_result(conn).map_err(count_failed)?,
                community_count: diesel_schema::communities::table.count().get_result(conn).map_err(count_failed)?,
                post_count: diesel_schema::posts::table.count().get_result(conn).map_err(count_failed)?,
                comment_count: diesel_schema::comments::table.count().get_result(conn).map_err(count_failed)?,
                vote_count: diesel_schema::votes::table.count().get_result(conn).map_err(count_failed)?,
                follow_count: diesel_schema::follows::table.count().get_result(conn).map_err(count_failed)?,
                points_log_count: diesel_schema::points_logs::table.count().get_result(conn).map_err(count_failed)?,
                notification_count: diesel_schema::notifications::table.count().get_result(conn).map_err(count_failed)?,
            })
        })
    }
}

/// Database statistics
#[derive(Debug, Clone, Serialize)]
pub struct DbStats {
    pub agent_count: i64,
    pub community_count: i64,
    pub post_count: i64,
    pub comment_count: i64,
    pub vote_count: i64,
    pub follow_count: i64,
    pub points_log_count: i64,
    pub notification_count: i64,
}
