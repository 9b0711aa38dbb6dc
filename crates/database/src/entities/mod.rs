//! Entity definitions for the Matchday chat store.

pub mod conversation;
pub mod message;
pub mod notification;

pub use conversation::{Conversation, CreateConversationRequest};
pub use message::{ChatMessage, MessageKind, NewMessage};
pub use notification::{CreateNotificationRequest, Notification};
