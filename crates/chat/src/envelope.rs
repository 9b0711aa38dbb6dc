//! Inbound and outbound envelope types.
//!
//! The wire format is one JSON object per frame with a `type`
//! discriminator and camelCase field names, decoded once at the socket
//! boundary into these closed enums.

use matchday_database::{ChatMessage, MessageKind, Notification};
use serde::{Deserialize, Serialize};

/// Envelopes a client may send.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ClientEnvelope {
    /// Start receiving a conversation's traffic (required before sending).
    Subscribe { chat_id: String },
    /// Start receiving the caller's own notification stream.
    SubscribeNotif,
    /// A text message to a subscribed conversation.
    Chat { chat_id: String, content: String },
    /// A file reference to a subscribed conversation. The upload itself is
    /// handled elsewhere; filename and size arrive as the client reported
    /// them.
    File {
        chat_id: String,
        content: String,
        filename: String,
        filesize: i64,
    },
}

/// Envelopes the server pushes to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ServerEvent {
    /// Caller-only error reply (e.g. access denied on subscribe).
    Error { error: String },
    /// A chat message broadcast to a conversation room.
    Chat {
        chat_id: String,
        from: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<i64>,
        content: String,
        timestamp: String,
    },
    /// A file message broadcast to a conversation room.
    File {
        chat_id: String,
        from: i64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        to: Option<i64>,
        content: String,
        filename: String,
        filesize: i64,
        timestamp: String,
    },
    /// Full notification history, sent once per `subscribeNotif`.
    InitNotifs { notifications: Vec<Notification> },
    /// A single freshly created notification.
    Notification { notification: Notification },
}

impl ServerEvent {
    pub fn error(message: impl Into<String>) -> Self {
        ServerEvent::Error {
            error: message.into(),
        }
    }

    /// The broadcast form of a stored message.
    pub fn from_message(chat_id: &str, message: &ChatMessage) -> Self {
        match message.kind {
            MessageKind::Chat => ServerEvent::Chat {
                chat_id: chat_id.to_string(),
                from: message.from,
                to: message.to,
                content: message.content.clone(),
                timestamp: message.timestamp.clone(),
            },
            MessageKind::File => ServerEvent::File {
                chat_id: chat_id.to_string(),
                from: message.from,
                to: message.to,
                content: message.content.clone(),
                filename: message.filename.clone().unwrap_or_default(),
                filesize: message.filesize.unwrap_or_default(),
                timestamp: message.timestamp.clone(),
            },
        }
    }
}
