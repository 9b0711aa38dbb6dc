//! The message router: validates, persists, and fans out inbound envelopes.

use std::sync::Arc;

use chrono::Utc;
use matchday_database::{
    Conversation, ConversationRepository, CreateNotificationRequest, MessageKind, NewMessage,
    NotificationRepository,
};
use tracing::{error, info, warn};

use crate::connection::Connection;
use crate::envelope::{ClientEnvelope, ServerEvent};
use crate::registry::ChatRegistry;

/// Routes each inbound envelope through validation, persistence and
/// fan-out. Holds no per-envelope state of its own; authentication
/// happened at admission and everything else is re-checked per envelope.
pub struct MessageRouter {
    registry: Arc<ChatRegistry>,
    conversations: ConversationRepository,
    notifications: NotificationRepository,
}

impl MessageRouter {
    pub fn new(
        registry: Arc<ChatRegistry>,
        conversations: ConversationRepository,
        notifications: NotificationRepository,
    ) -> Self {
        Self {
            registry,
            conversations,
            notifications,
        }
    }

    pub fn registry(&self) -> &Arc<ChatRegistry> {
        &self.registry
    }

    /// Decode one raw frame and dispatch it.
    ///
    /// Malformed or unrecognized frames are logged and dropped; they never
    /// close the connection and nothing is reported to the client.
    pub async fn handle_text(&self, connection: &Arc<Connection>, raw: &str) {
        match serde_json::from_str::<ClientEnvelope>(raw) {
            Ok(envelope) => self.handle_envelope(connection, envelope).await,
            Err(error) => {
                if serde_json::from_str::<serde_json::Value>(raw).is_ok() {
                    warn!(%error, "dropping envelope of unrecognized shape");
                } else {
                    warn!(%error, "dropping non-JSON frame");
                }
            }
        }
    }

    pub async fn handle_envelope(&self, connection: &Arc<Connection>, envelope: ClientEnvelope) {
        match envelope {
            ClientEnvelope::Subscribe { chat_id } => self.subscribe(connection, &chat_id).await,
            ClientEnvelope::SubscribeNotif => self.subscribe_notifications(connection).await,
            ClientEnvelope::Chat { chat_id, content } => {
                self.route_message(connection, &chat_id, MessageKind::Chat, content, None)
                    .await
            }
            ClientEnvelope::File {
                chat_id,
                content,
                filename,
                filesize,
            } => {
                self.route_message(
                    connection,
                    &chat_id,
                    MessageKind::File,
                    content,
                    Some((filename, filesize)),
                )
                .await
            }
        }
    }

    /// Join a conversation room after verifying participation.
    ///
    /// The check runs on every subscribe; nothing is cached. A miss is
    /// answered to the caller alone.
    async fn subscribe(&self, connection: &Arc<Connection>, chat_id: &str) {
        let Some(user_id) = connection.identity() else {
            return;
        };

        match self.conversations.find_for_participant(chat_id, user_id).await {
            Ok(Some(_)) => {
                self.registry.join_conversation(chat_id, connection).await;
                info!(user_id, chat_id, "subscribed to conversation");
            }
            Ok(None) => {
                connection.try_send(&ServerEvent::error("Access denied to chat"));
            }
            Err(err) => {
                error!(error = %err, chat_id, "conversation lookup failed during subscribe");
                connection.try_send(&ServerEvent::error("Access denied to chat"));
            }
        }
    }

    /// Join the caller's own notification room and replay history.
    ///
    /// Always permitted; the room key is the authenticated identity, never
    /// caller-supplied. Each call sends the full history, newest first.
    async fn subscribe_notifications(&self, connection: &Arc<Connection>) {
        let Some(user_id) = connection.identity() else {
            return;
        };

        self.registry.join_notifications(user_id, connection).await;
        info!(user_id, "subscribed to notifications");

        match self.notifications.list_for_user(user_id).await {
            Ok(notifications) => {
                connection.try_send(&ServerEvent::InitNotifs { notifications });
            }
            Err(err) => {
                error!(error = %err, user_id, "failed to load notification history");
            }
        }
    }

    /// Persist and fan out one chat/file message.
    async fn route_message(
        &self,
        connection: &Arc<Connection>,
        chat_id: &str,
        kind: MessageKind,
        content: String,
        file: Option<(String, i64)>,
    ) {
        let Some(user_id) = connection.identity() else {
            return;
        };

        // Sending requires an explicit subscribe first; anything else is
        // dropped without telling the client.
        if !self.registry.is_subscribed(chat_id, connection).await {
            warn!(user_id, chat_id, "dropping message from unsubscribed connection");
            return;
        }

        // Room membership can be stale; re-check against the store.
        let conversation = match self.conversations.find_for_participant(chat_id, user_id).await {
            Ok(Some(conversation)) => conversation,
            Ok(None) => {
                warn!(user_id, chat_id, "conversation missing or sender not a participant");
                return;
            }
            Err(err) => {
                error!(error = %err, chat_id, "conversation lookup failed");
                return;
            }
        };

        let to = if conversation.is_group {
            None
        } else {
            conversation.other_participant(user_id)
        };
        let (filename, filesize) = match file {
            Some((name, size)) => (Some(name), Some(size)),
            None => (None, None),
        };

        let message = NewMessage {
            kind,
            from: user_id,
            to,
            content,
            filename,
            filesize,
            timestamp: Utc::now().to_rfc3339(),
        };

        let stored = match self.conversations.append_message(conversation.id, &message).await {
            Ok(stored) => stored,
            Err(err) => {
                error!(error = %err, chat_id, "failed to append message, dropping envelope");
                return;
            }
        };

        let delivered = self
            .registry
            .broadcast_to_conversation(chat_id, &ServerEvent::from_message(chat_id, &stored))
            .await;
        info!(user_id, chat_id, delivered, kind = %kind, "message broadcast");

        let recipients: Vec<i64> = if conversation.is_group {
            conversation
                .participants
                .iter()
                .copied()
                .filter(|id| *id != user_id)
                .collect()
        } else {
            stored.to.into_iter().collect()
        };

        for recipient in recipients {
            let request = CreateNotificationRequest {
                user_id: recipient,
                title: notification_title(kind, &conversation),
                content: stored.content.clone(),
                url: format!("/chats/{chat_id}"),
            };

            let notification = match self.notifications.create(&request).await {
                Ok(notification) => notification,
                Err(err) => {
                    error!(error = %err, recipient, "failed to create notification, aborting fan-out");
                    return;
                }
            };

            self.registry
                .broadcast_notification(recipient, &ServerEvent::Notification { notification })
                .await;
        }
    }
}

/// Human-readable notification title, varying by message kind, direct vs
/// group, and whether the group carries a display name.
fn notification_title(kind: MessageKind, conversation: &Conversation) -> String {
    if conversation.is_group {
        let name = conversation.name.as_deref().unwrap_or("group");
        match kind {
            MessageKind::Chat => format!("New message in \"{name}\""),
            MessageKind::File => format!("New file in \"{name}\""),
        }
    } else {
        match kind {
            MessageKind::Chat => "Message received".to_string(),
            MessageKind::File => "File received".to_string(),
        }
    }
}
