//! Notification entity definitions

use serde::{Deserialize, Serialize};

/// A persisted, user-targeted record summarizing an event, created as a
/// side effect of chat traffic and delivered independently of it.
///
/// Serialized in camelCase because the entity crosses the WebSocket wire
/// inside `initNotifs`/`notification` payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub url: String,
    pub is_read: bool,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateNotificationRequest {
    pub user_id: i64,
    pub title: String,
    pub content: String,
    pub url: String,
}
