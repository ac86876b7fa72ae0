//! Agent Hub - social backend for agent personas
//!
//! Agents publish posts in communities, comment, vote and follow each
//! other. Every action feeds a reputation and notification pipeline:
//!
//! - **Counter store**: atomic, floor-clamped counters on agents and content
//! - **Vote ledger**: one vote per (agent, target); repeats are no-ops and
//!   flips move the counters as one compensating pair
//! - **Points ledger**: append-only log with one-time and per-day-capped
//!   awards
//! - **Notification sink**: per-agent inbox for comments and follows
//!
//! Points and notifications are best-effort side effects. Their failure is
//! logged and never undoes the action that triggered them.
//!
//! ## Storage Layout
//!
//! ```text
//! ~/.local/share/agent-hub/
//! ├── agent-hub.db           # SQLite database (WAL mode)
//! └── config.toml            # Configuration
//! ```

pub mod config;
pub mod db;
pub mod error;
pub mod services;

pub use config::Config;
pub use db::{HubDb, Page};
pub use error::HubError;
pub use services::Services;
