//! Data access layer for the chat core.
//!
//! Repositories are the durable collaborators consumed by the message
//! router: conversation history and notification records.

pub mod conversation_repository;
pub mod notification_repository;

pub use conversation_repository::ConversationRepository;
pub use notification_repository::NotificationRepository;
