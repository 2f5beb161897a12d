use axum::extract::ws::{CloseFrame, Message, WebSocket};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, timeout};

use crate::state::{AppState, Heartbeat};
use crate::ws::lifecycle::Connection;
use crate::ws::protocol::ClientEvent;
use crate::ws::{ConnectionId, ConnectionReceiver, ConnectionSender};

/// Close code sent when a client stops answering pings.
const CLOSE_GOING_AWAY: u16 = 1001;

/// How long the writer may keep flushing queued frames after the reader stops.
const WRITER_DRAIN: Duration = Duration::from_secs(5);

/// Run the actor-per-connection pattern for a registered WebSocket.
///
/// Splits the WebSocket into reader and writer halves:
/// - Writer task: owns the sink, forwards messages from the connection's queue
/// - Ping task: sends periodic pings and closes the socket on a missed pong
/// - Reader loop: the single dispatch point for every inbound event
///
/// On exit the lifecycle teardown runs exactly once.
pub async fn run_connection(
    socket: WebSocket,
    state: AppState,
    mut conn: Connection,
    rx: ConnectionReceiver,
) {
    let (ws_sender, mut ws_receiver) = socket.split();
    let user_id = conn.user_id().unwrap_or_default().to_string();
    let connection_id = conn.id();

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        "WebSocket actor started"
    );

    let mut writer_handle = tokio::spawn(writer_task(ws_sender, rx));

    // Track pong reception
    let (pong_tx, pong_rx) = mpsc::unbounded_channel::<()>();
    let ping_handle = tokio::spawn(heartbeat_task(
        conn.sender().clone(),
        pong_rx,
        state.heartbeat,
        connection_id,
    ));

    // Reader loop: process incoming WebSocket messages
    loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(Message::Text(text))) => {
                    dispatch_text(&state, &conn, text.as_str()).await;
                }
                Some(Ok(Message::Binary(data))) => {
                    tracing::debug!(
                        user_id = %user_id,
                        bytes = data.len(),
                        "Received binary frame (expected JSON text), ignoring"
                    );
                }
                Some(Ok(Message::Pong(_))) => {
                    let _ = pong_tx.send(());
                }
                Some(Ok(Message::Ping(data))) => {
                    let _ = conn.sender().send(Message::Pong(data));
                }
                Some(Ok(Message::Close(frame))) => {
                    tracing::info!(
                        user_id = %user_id,
                        reason = ?frame,
                        "Client initiated close"
                    );
                    break;
                }
                Some(Err(e)) => {
                    tracing::warn!(
                        user_id = %user_id,
                        error = %e,
                        "WebSocket receive error"
                    );
                    break;
                }
                None => {
                    tracing::info!(user_id = %user_id, "WebSocket stream ended");
                    break;
                }
            },
            // The writer stops once it has sent a close frame or the sink broke
            _ = conn.sender().closed() => {
                tracing::info!(user_id = %user_id, "Outbound queue closed");
                break;
            }
        }
    }

    ping_handle.abort();

    state.lifecycle.on_close(&mut conn);

    // Let queued frames (including a close frame) flush before the socket drops
    drop(conn);
    if timeout(WRITER_DRAIN, &mut writer_handle).await.is_err() {
        writer_handle.abort();
    }

    tracing::info!(
        user_id = %user_id,
        connection_id = %connection_id,
        "WebSocket actor stopped"
    );
}

/// Ping task: sends a ping every interval and queues a close frame if no pong
/// arrives within the timeout. Only pongs received after the current ping count.
async fn heartbeat_task(
    ping_tx: ConnectionSender,
    mut pong_rx: mpsc::UnboundedReceiver<()>,
    heartbeat: Heartbeat,
    connection_id: ConnectionId,
) {
    let mut ping_timer = interval(heartbeat.ping_interval);
    // Skip the first immediate tick
    ping_timer.tick().await;

    loop {
        ping_timer.tick().await;

        // Discard unsolicited pongs from before this ping
        while pong_rx.try_recv().is_ok() {}

        if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
            // Writer task has died, connection is gone
            break;
        }

        match timeout(heartbeat.pong_timeout, pong_rx.recv()).await {
            Ok(Some(())) => {}
            _ => {
                tracing::warn!(connection_id = %connection_id, "Pong timeout, closing connection");
                let _ = ping_tx.send(Message::Close(Some(CloseFrame {
                    code: CLOSE_GOING_AWAY,
                    reason: "Pong timeout".into(),
                })));
                break;
            }
        }
    }
}

/// Decode one text frame and hand it to the relay. Undecodable frames are dropped.
async fn dispatch_text(state: &AppState, conn: &Connection, text: &str) {
    match ClientEvent::decode(text) {
        Ok(event) => {
            state.relay.handle(conn, event).await;
        }
        Err(e) => {
            tracing::debug!(
                user_id = conn.user_id().unwrap_or_default(),
                error = %e,
                "Dropping undecodable frame: {}",
                text.chars().take(100).collect::<String>()
            );
        }
    }
}

/// Writer task: receives messages from the queue and forwards them to the WebSocket sink.
/// Stops after forwarding a close frame.
async fn writer_task(
    mut ws_sender: futures_util::stream::SplitSink<WebSocket, Message>,
    mut rx: ConnectionReceiver,
) {
    while let Some(msg) = rx.recv().await {
        let is_close = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || is_close {
            break;
        }
    }
}
