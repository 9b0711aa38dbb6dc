//! Connection and room-subscription registry.
//!
//! All live-connection state lives here: the identity map plus the two
//! independent room spaces (conversation rooms keyed by conversation id,
//! notification rooms keyed by user id). Everything sits behind one
//! coarse lock; room and connection counts are small, and atomic
//! join/evict matters more than lock granularity.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, RwLock};
use tracing::info;

use crate::connection::Connection;
use crate::envelope::ServerEvent;

type Room = HashMap<u64, Arc<Connection>>;

#[derive(Default)]
struct RegistryInner {
    /// Connection per authenticated identity, last writer wins.
    clients: HashMap<i64, Arc<Connection>>,
    /// Conversation id -> connections currently viewing it.
    conversation_rooms: HashMap<String, Room>,
    /// User id -> connections wanting notification delivery.
    notification_rooms: HashMap<i64, Room>,
}

/// Registry of live connections and their room subscriptions.
///
/// Performs no authorization; the router authorizes before joining. Rooms
/// are ephemeral and rebuilt by clients re-subscribing after reconnect.
#[derive(Default)]
pub struct ChatRegistry {
    inner: RwLock<RegistryInner>,
}

impl ChatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Admit an authenticated connection.
    ///
    /// If the identity already has a connection the new one replaces it in
    /// the identity map; the prior connection is not closed and keeps any
    /// room subscriptions it holds.
    pub async fn admit(&self, user_id: i64, outbound: mpsc::UnboundedSender<String>) -> Arc<Connection> {
        let connection = Arc::new(Connection::new(outbound));
        connection.set_identity(user_id);

        let mut inner = self.inner.write().await;
        inner.clients.insert(user_id, connection.clone());
        info!(user_id, connection = connection.id(), "connection admitted");

        connection
    }

    /// Whether an identity currently has a registered connection.
    pub async fn is_connected(&self, user_id: i64) -> bool {
        self.inner.read().await.clients.contains_key(&user_id)
    }

    /// Remove a connection and evict it from every room it joined.
    ///
    /// Idempotent; the identity-map slot is only cleared while this
    /// connection still owns it, so a stale disconnect cannot evict a
    /// newer connection for the same identity.
    pub async fn remove(&self, connection: &Arc<Connection>) {
        connection.close();

        let mut inner = self.inner.write().await;

        if let Some(user_id) = connection.identity() {
            if inner
                .clients
                .get(&user_id)
                .is_some_and(|current| current.id() == connection.id())
            {
                inner.clients.remove(&user_id);
            }
        }

        for room in inner.conversation_rooms.values_mut() {
            room.remove(&connection.id());
        }
        inner.conversation_rooms.retain(|_, room| !room.is_empty());

        for room in inner.notification_rooms.values_mut() {
            room.remove(&connection.id());
        }
        inner.notification_rooms.retain(|_, room| !room.is_empty());
    }

    /// Insert a connection into a conversation room. Idempotent.
    pub async fn join_conversation(&self, chat_id: &str, connection: &Arc<Connection>) {
        let mut inner = self.inner.write().await;
        inner
            .conversation_rooms
            .entry(chat_id.to_string())
            .or_default()
            .insert(connection.id(), connection.clone());
    }

    /// Insert a connection into a user's notification room. Idempotent.
    pub async fn join_notifications(&self, user_id: i64, connection: &Arc<Connection>) {
        let mut inner = self.inner.write().await;
        inner
            .notification_rooms
            .entry(user_id)
            .or_default()
            .insert(connection.id(), connection.clone());
    }

    /// Whether a connection has joined a conversation room.
    pub async fn is_subscribed(&self, chat_id: &str, connection: &Arc<Connection>) -> bool {
        self.inner
            .read()
            .await
            .conversation_rooms
            .get(chat_id)
            .is_some_and(|room| room.contains_key(&connection.id()))
    }

    /// Send an event to every live member of a conversation room.
    ///
    /// Unreachable connections are skipped, not removed; eviction happens
    /// only through `remove`. Returns the number of deliveries.
    pub async fn broadcast_to_conversation(&self, chat_id: &str, event: &ServerEvent) -> usize {
        let inner = self.inner.read().await;
        let Some(room) = inner.conversation_rooms.get(chat_id) else {
            return 0;
        };
        room.values().filter(|conn| conn.try_send(event)).count()
    }

    /// Send an event to every live member of a user's notification room.
    pub async fn broadcast_notification(&self, user_id: i64, event: &ServerEvent) -> usize {
        let inner = self.inner.read().await;
        let Some(room) = inner.notification_rooms.get(&user_id) else {
            return 0;
        };
        room.values().filter(|conn| conn.try_send(event)).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fanout_event() -> ServerEvent {
        ServerEvent::error("test")
    }

    async fn admitted(
        registry: &ChatRegistry,
        user_id: i64,
    ) -> (Arc<Connection>, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (registry.admit(user_id, tx).await, rx)
    }

    #[tokio::test]
    async fn admit_and_remove_track_identity() {
        let registry = ChatRegistry::new();
        let (conn, _rx) = admitted(&registry, 1).await;

        assert!(registry.is_connected(1).await);

        registry.remove(&conn).await;
        assert!(!registry.is_connected(1).await);

        // Removing again is a no-op.
        registry.remove(&conn).await;
    }

    #[tokio::test]
    async fn duplicate_identity_is_last_writer_wins() {
        let registry = ChatRegistry::new();
        let (first, _rx1) = admitted(&registry, 1).await;
        let (_second, _rx2) = admitted(&registry, 1).await;

        // A stale disconnect of the replaced connection must not evict the
        // newer one from the identity map.
        registry.remove(&first).await;
        assert!(registry.is_connected(1).await);
    }

    #[tokio::test]
    async fn join_is_idempotent() {
        let registry = ChatRegistry::new();
        let (conn, mut rx) = admitted(&registry, 1).await;

        registry.join_conversation("room", &conn).await;
        registry.join_conversation("room", &conn).await;

        assert_eq!(registry.broadcast_to_conversation("room", &fanout_event()).await, 1);
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn broadcast_skips_closed_connections_without_removing_them() {
        let registry = ChatRegistry::new();
        let (alive, mut alive_rx) = admitted(&registry, 1).await;
        let (closed, _closed_rx) = admitted(&registry, 2).await;

        registry.join_conversation("room", &alive).await;
        registry.join_conversation("room", &closed).await;
        closed.close();

        assert_eq!(registry.broadcast_to_conversation("room", &fanout_event()).await, 1);
        assert!(alive_rx.try_recv().is_ok());

        // Still a member; only eviction removes.
        assert!(registry.is_subscribed("room", &closed).await);
    }

    #[tokio::test]
    async fn remove_evicts_from_every_room() {
        let registry = ChatRegistry::new();
        let (conn, _rx) = admitted(&registry, 1).await;

        registry.join_conversation("r1", &conn).await;
        registry.join_conversation("r2", &conn).await;
        registry.join_notifications(1, &conn).await;

        registry.remove(&conn).await;

        assert!(!registry.is_subscribed("r1", &conn).await);
        assert!(!registry.is_subscribed("r2", &conn).await);
        assert_eq!(registry.broadcast_to_conversation("r1", &fanout_event()).await, 0);
        assert_eq!(registry.broadcast_to_conversation("r2", &fanout_event()).await, 0);
        assert_eq!(registry.broadcast_notification(1, &fanout_event()).await, 0);
    }

    #[tokio::test]
    async fn broadcast_to_unknown_room_reaches_nobody() {
        let registry = ChatRegistry::new();
        assert_eq!(registry.broadcast_to_conversation("ghost", &fanout_event()).await, 0);
        assert_eq!(registry.broadcast_notification(9, &fanout_event()).await, 0);
    }
}
