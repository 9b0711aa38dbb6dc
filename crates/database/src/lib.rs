//! Matchday Database Crate
//!
//! This crate provides database functionality for the Matchday backend,
//! including connection management, migrations, and the repository
//! implementations behind the conversation and notification stores.

use matchday_config::DatabaseConfig;
use sqlx::SqlitePool;

pub mod connection;
pub mod entities;
pub mod migrations;
pub mod repos;
pub mod types;

pub use connection::prepare_database;
pub use migrations::run_migrations;

// Re-export repositories
pub use repos::{ConversationRepository, NotificationRepository};

// Re-export entities
pub use entities::{
    conversation::{Conversation, CreateConversationRequest},
    message::{ChatMessage, MessageKind, NewMessage},
    notification::{CreateNotificationRequest, Notification},
};

// Re-export types
pub use types::{
    errors::{ConversationError, DatabaseError, NotificationError},
    ConversationResult, DatabaseResult, NotificationResult,
};

/// Initialize the database with migrations
pub async fn initialize_database(config: &DatabaseConfig) -> DatabaseResult<SqlitePool> {
    let pool = prepare_database(config)
        .await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    run_migrations(&pool)
        .await
        .map_err(|e| DatabaseError::MigrationError(e.to_string()))?;

    Ok(pool)
}
