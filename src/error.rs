//! Error types for agent-hub

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HubError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl HubError {
    /// Stable error code for callers that render errors
    pub fn kind(&self) -> &'static str {
        match self {
            HubError::NotFound(_) => "not_found",
            HubError::InvalidInput(_) => "invalid_input",
            HubError::Forbidden(_) => "forbidden",
            HubError::Conflict(_) => "conflict",
            _ => "internal",
        }
    }
}
