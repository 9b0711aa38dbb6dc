//! # Matchday Chat Crate
//!
//! The real-time core of the Matchday backend: a persistent-connection
//! server that authenticates clients, tracks room subscriptions, routes
//! chat and file messages to live peers, and fans out derived
//! notifications to a separate subscription space.
//!
//! ## Architecture
//!
//! - **connection/registry**: live-connection state behind one coarse lock
//! - **envelope**: closed tagged inbound/outbound wire types
//! - **router**: per-envelope validation, persistence, fan-out
//! - **socket**: the axum WebSocket route and per-connection pump

pub mod connection;
pub mod envelope;
pub mod registry;
pub mod router;
pub mod socket;

pub use connection::Connection;
pub use envelope::{ClientEnvelope, ServerEvent};
pub use registry::ChatRegistry;
pub use router::MessageRouter;
pub use socket::{create_chat_routes, ChatSocketState};
