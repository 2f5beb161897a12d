use axum::{
    extract::{
        ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade},
        Query, State,
    },
    response::Response,
};
use serde::Deserialize;

use crate::state::AppState;
use crate::ws::lifecycle::Connection;
use crate::ws::{actor, connection_channel, ConnectionReceiver};

/// Query parameters for WebSocket connection.
/// The client asserts its identity with `?userId=...`; the relay trusts it.
#[derive(Debug, Deserialize)]
pub struct WsHandshakeQuery {
    #[serde(rename = "userId")]
    pub user_id: Option<String>,
}

/// Close code sent when the handshake carries no user identity.
pub const CLOSE_MISSING_IDENTITY: u16 = 4001;

/// GET /ws?userId=ID
/// WebSocket upgrade endpoint. The identity check runs after the upgrade so a
/// rejected client gets a close frame with a reason instead of an HTTP error.
pub async fn ws_upgrade(
    State(state): State<AppState>,
    Query(params): Query<WsHandshakeQuery>,
    ws: WebSocketUpgrade,
) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state, params.user_id))
}

async fn handle_socket(socket: WebSocket, state: AppState, claimed_user_id: Option<String>) {
    let (tx, rx) = connection_channel();
    let mut conn = Connection::new(tx);

    match state
        .lifecycle
        .on_handshake(&mut conn, claimed_user_id.as_deref())
    {
        Ok(_) => actor::run_connection(socket, state, conn, rx).await,
        Err(rejected) => reject(socket, rx, &rejected.to_string()).await,
    }
}

/// Close a socket that failed the handshake.
async fn reject(mut socket: WebSocket, rx: ConnectionReceiver, reason: &str) {
    drop(rx);
    let close_frame = CloseFrame {
        code: CLOSE_MISSING_IDENTITY,
        reason: reason.to_string().into(),
    };
    let _ = socket.send(Message::Close(Some(close_frame))).await;
}
