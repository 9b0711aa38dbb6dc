//! Shared result aliases and error types for the database crate.

pub mod errors;

pub use errors::{ConversationError, DatabaseError, NotificationError};

pub type DatabaseResult<T> = Result<T, DatabaseError>;
pub type ConversationResult<T> = Result<T, ConversationError>;
pub type NotificationResult<T> = Result<T, NotificationError>;
