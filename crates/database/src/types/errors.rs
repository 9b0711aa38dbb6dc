//! Error types shared by the database layer.

use thiserror::Error;

/// Errors raised while preparing or migrating the database itself.
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Database connection error: {0}")]
    ConnectionError(String),

    #[error("Database migration error: {0}")]
    MigrationError(String),
}

/// Errors raised by conversation store operations.
#[derive(Debug, Error)]
pub enum ConversationError {
    #[error("conversation not found")]
    NotFound,

    #[error("invalid message kind: {0}")]
    InvalidMessageKind(String),

    #[error("Database error: {0}")]
    DatabaseError(String),
}

/// Errors raised by notification store operations.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification not found")]
    NotFound,

    #[error("Database error: {0}")]
    DatabaseError(String),
}
