//! Per-socket connection handles.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use once_cell::sync::OnceCell;
use tokio::sync::mpsc;
use tracing::debug;

use crate::envelope::ServerEvent;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// One logical connection, owned by the registry for its lifetime.
///
/// The identity is settable at most once, before any message is accepted;
/// the open flag tracks the transport state so sends after close degrade
/// to a no-op instead of an error.
pub struct Connection {
    id: u64,
    identity: OnceCell<i64>,
    open: AtomicBool,
    outbound: mpsc::UnboundedSender<String>,
}

impl Connection {
    pub fn new(outbound: mpsc::UnboundedSender<String>) -> Self {
        Self {
            id: NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed),
            identity: OnceCell::new(),
            open: AtomicBool::new(true),
            outbound,
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Assign the authenticated identity. Returns `false` if one was
    /// already set; the first assignment always wins.
    pub fn set_identity(&self, user_id: i64) -> bool {
        self.identity.set(user_id).is_ok()
    }

    pub fn identity(&self) -> Option<i64> {
        self.identity.get().copied()
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// Mark the transport closed. Returns `true` on the first call only,
    /// so teardown can run exactly once.
    pub fn close(&self) -> bool {
        self.open.swap(false, Ordering::AcqRel)
    }

    /// Serialize and enqueue an event for the socket writer.
    ///
    /// Returns `false` without side effects when the connection is not
    /// open or not authenticated; never panics or surfaces an error. A
    /// send failure means the writer task is gone, so the connection is
    /// marked closed.
    pub fn try_send(&self, event: &ServerEvent) -> bool {
        if !self.is_open() || self.identity().is_none() {
            debug!(connection = self.id, "skipping send on unavailable connection");
            return false;
        }

        let text = match serde_json::to_string(event) {
            Ok(text) => text,
            Err(error) => {
                debug!(connection = self.id, %error, "failed to serialize outbound event");
                return false;
            }
        };

        if self.outbound.send(text).is_err() {
            self.open.store(false, Ordering::Release);
            return false;
        }

        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (Connection, mpsc::UnboundedReceiver<String>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Connection::new(tx), rx)
    }

    #[test]
    fn identity_is_set_at_most_once() {
        let (conn, _rx) = connection();

        assert_eq!(conn.identity(), None);
        assert!(conn.set_identity(1));
        assert!(!conn.set_identity(2));
        assert_eq!(conn.identity(), Some(1));
    }

    #[test]
    fn try_send_requires_identity() {
        let (conn, mut rx) = connection();

        assert!(!conn.try_send(&ServerEvent::error("nope")));
        assert!(rx.try_recv().is_err());

        conn.set_identity(1);
        assert!(conn.try_send(&ServerEvent::error("yes")));
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn try_send_after_close_is_a_silent_no_op() {
        let (conn, mut rx) = connection();
        conn.set_identity(1);

        assert!(conn.close());
        assert!(!conn.close());

        assert!(!conn.try_send(&ServerEvent::error("late")));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_writer_marks_connection_closed() {
        let (conn, rx) = connection();
        conn.set_identity(1);
        drop(rx);

        assert!(!conn.try_send(&ServerEvent::error("gone")));
        assert!(!conn.is_open());
    }
}
