// errors.rs
use crate::gateway::GatewayError;
use thiserror::Error;

/// Errors surfaced by the comparables core.
///
/// `SourceUnavailable` is the only recoverable kind: the stored snapshot is left untouched
/// and callers may retry later.
#[derive(Error, Debug)]
pub enum CompsError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Comparable source unavailable: {0}")]
    SourceUnavailable(#[from] GatewayError),

    #[error("Lead {0} not found")]
    NotFound(i64),

    #[error("Database error: {0}")]
    DbError(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl From<rusqlite::Error> for CompsError {
    fn from(e: rusqlite::Error) -> Self {
        CompsError::DbError(e.to_string())
    }
}
