//! Chat WebSocket route and per-connection pump.

use std::sync::Arc;

use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
    routing::get,
    Router,
};
use futures_util::{SinkExt, StreamExt};
use matchday_auth::{AuthError, TokenVerifier};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::router::MessageRouter;

/// Shared state for the chat socket route.
#[derive(Clone)]
pub struct ChatSocketState {
    pub verifier: Arc<TokenVerifier>,
    pub router: Arc<MessageRouter>,
}

impl ChatSocketState {
    pub fn new(verifier: Arc<TokenVerifier>, router: Arc<MessageRouter>) -> Self {
        Self { verifier, router }
    }
}

/// WebSocket routes for the chat core.
pub fn create_chat_routes() -> Router<ChatSocketState> {
    Router::new().route("/ws/chat", get(chat_socket_handler))
}

#[derive(Debug, Deserialize)]
struct SocketQuery {
    token: Option<String>,
}

async fn chat_socket_handler(
    ws: WebSocketUpgrade,
    State(state): State<ChatSocketState>,
    Query(query): Query<SocketQuery>,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, query.token))
}

/// Drive one connection: authenticate, admit, pump frames, tear down.
async fn handle_socket(socket: WebSocket, state: ChatSocketState, token: Option<String>) {
    let user_id = match state.verifier.verify(token.as_deref()) {
        Ok(user_id) => user_id,
        Err(error) => {
            reject(socket, &error).await;
            return;
        }
    };

    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    let connection = state.router.registry().admit(user_id, tx).await;

    // Writer task: drains the connection's outbound queue into the socket.
    let writer = tokio::spawn(async move {
        while let Some(text) = rx.recv().await {
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    // Inbound frames are handled sequentially; the next frame is not read
    // until the previous envelope has been fully dispatched.
    while let Some(frame) = stream.next().await {
        match frame {
            Ok(Message::Text(text)) => state.router.handle_text(&connection, &text).await,
            Ok(Message::Close(_)) | Err(_) => break,
            Ok(_) => {}
        }
    }

    // Teardown runs once, whichever side closed the transport.
    state.router.registry().remove(&connection).await;
    writer.abort();
    info!(user_id, connection = connection.id(), "connection closed");
}

/// Close an unauthenticated socket with the admission failure's code.
async fn reject(mut socket: WebSocket, error: &AuthError) {
    warn!(code = error.close_code(), "rejecting connection: {error}");

    let frame = CloseFrame {
        code: error.close_code(),
        reason: error.close_reason().into(),
    };
    if socket.send(Message::Close(Some(frame))).await.is_err() {
        debug!("client went away before the close frame was sent");
    }
}
