/**
 * Connection Actor
 *
 * One actor per WebSocket connection:
 *
 * - **writer task** - owns the socket sink; forwards hub events (as JSON
 *   text frames) and control frames (ping, close)
 * - **heartbeat task** - pings every `heartbeat_interval` and ends the
 *   connection when no pong arrives within `heartbeat_timeout`
 * - **command task** - decodes client frames and runs them one at a time in
 *   arrival order
 * - **reader loop** - drains the socket, handing frames to the command task
 *   while pongs and liveness are recorded as soon as they arrive
 *
 * Whatever ends the reader loop (client close, socket error, heartbeat
 * failure, or the hub reaping the connection), `Hub::disconnect` runs
 * afterwards. Frames still queued at that point are dropped; a command
 * already running completes against the disconnected state.
 */

use axum::extract::ws::{CloseFrame, Message, Utf8Bytes, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::{SinkExt, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{interval, timeout};

use super::protocol::{dispatch, error_reply, parse_frame};
use crate::backend::error::HubError;
use crate::backend::hub::{ConnectionHandle, Hub};
use crate::shared::event::HubEvent;

/// Ping cadence for one connection
#[derive(Debug, Clone, Copy)]
pub struct Heartbeat {
    pub interval: Duration,
    pub timeout: Duration,
}

/// Close code sent when the heartbeat fails or the hub drops the connection
const CLOSE_GOING_AWAY: u16 = 1001;

/// Client frame waiting for the command task
enum Inbound {
    Text(Utf8Bytes),
    Binary,
}

/// Authenticate and run a connection until it closes
pub async fn run_connection(mut socket: WebSocket, hub: Arc<Hub>, token: String, heartbeat: Heartbeat) {
    let (event_tx, event_rx) = mpsc::unbounded_channel::<HubEvent>();

    let connection = match hub.connect(&token, event_tx.clone()).await {
        Ok(connection) => connection,
        Err(err) => {
            tracing::warn!(close_code = err.close_code(), "WebSocket auth failed: {}", err);
            let close_frame = CloseFrame {
                code: err.close_code(),
                reason: err.to_string().into(),
            };
            let _ = socket.send(Message::Close(Some(close_frame))).await;
            return;
        }
    };

    let (ws_sender, mut ws_receiver) = socket.split();
    let (control_tx, control_rx) = mpsc::unbounded_channel::<Message>();

    let writer_handle = tokio::spawn(writer_task(ws_sender, event_rx, control_rx));

    let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Inbound>();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    tokio::spawn(command_task(
        hub.clone(),
        connection.clone(),
        event_tx.clone(),
        inbound_rx,
        stop_rx,
    ));

    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();
    let (dead_tx, mut dead_rx) = oneshot::channel::<()>();
    let ping_tx = control_tx.clone();
    let ping_handle = tokio::spawn(async move {
        let mut ping_timer = interval(heartbeat.interval);
        // Skip the first immediate tick
        ping_timer.tick().await;

        loop {
            ping_timer.tick().await;

            if ping_tx.send(Message::Ping(vec![1, 2, 3, 4].into())).is_err() {
                break;
            }

            match timeout(heartbeat.timeout, pong_rx.recv()).await {
                Ok(Some(())) => {}
                _ => {
                    let _ = dead_tx.send(());
                    break;
                }
            }
        }
    });

    loop {
        tokio::select! {
            incoming = ws_receiver.next() => match incoming {
                Some(Ok(msg)) => {
                    hub.touch(connection.id);
                    let queued = match msg {
                        Message::Text(text) => inbound_tx.send(Inbound::Text(text)).is_ok(),
                        Message::Binary(_) => inbound_tx.send(Inbound::Binary).is_ok(),
                        Message::Pong(_) => {
                            let _ = pong_tx.send(());
                            true
                        }
                        // Pings are answered by the WebSocket layer
                        Message::Ping(_) => true,
                        Message::Close(frame) => {
                            tracing::info!(connection_id = %connection.id, reason = ?frame, "Client initiated close");
                            false
                        }
                    };
                    if !queued {
                        break;
                    }
                }
                Some(Err(e)) => {
                    tracing::warn!(connection_id = %connection.id, error = %e, "WebSocket receive error");
                    break;
                }
                None => {
                    tracing::debug!(connection_id = %connection.id, "WebSocket stream ended");
                    break;
                }
            },
            // `Err` means the heartbeat task stopped because the writer is gone
            missed = &mut dead_rx => {
                if missed.is_ok() {
                    tracing::warn!(connection_id = %connection.id, "Pong timeout, closing connection");
                    let _ = control_tx.send(Message::Close(Some(CloseFrame {
                        code: CLOSE_GOING_AWAY,
                        reason: "Pong timeout".into(),
                    })));
                }
                break;
            }
            _ = connection.shutdown.notified() => {
                let _ = control_tx.send(Message::Close(Some(CloseFrame {
                    code: CLOSE_GOING_AWAY,
                    reason: "Connection expired".into(),
                })));
                break;
            }
        }
    }

    ping_handle.abort();
    let _ = stop_tx.send(());
    hub.disconnect(connection.id).await;
    // Let the writer flush a pending close frame, then stop it
    drop(control_tx);
    drop(event_tx);
    if timeout(Duration::from_secs(1), writer_handle).await.is_err() {
        tracing::debug!(connection_id = %connection.id, "Writer did not finish in time");
    }
}

/// Run queued frames in arrival order until stopped or the queue closes
async fn command_task(
    hub: Arc<Hub>,
    connection: ConnectionHandle,
    replies: mpsc::UnboundedSender<HubEvent>,
    mut inbound: mpsc::UnboundedReceiver<Inbound>,
    mut stop: oneshot::Receiver<()>,
) {
    loop {
        let frame = tokio::select! {
            biased;
            _ = &mut stop => break,
            frame = inbound.recv() => match frame {
                Some(frame) => frame,
                None => break,
            },
        };

        let reply = match frame {
            Inbound::Text(text) => match parse_frame(text.as_str()) {
                Ok(frame) => dispatch(&hub, &connection, frame).await,
                Err(rejected) => {
                    tracing::debug!(connection_id = %connection.id, "Malformed frame: {}", rejected.error);
                    error_reply(rejected.request_id, &rejected.error)
                }
            },
            Inbound::Binary => error_reply(
                None,
                &HubError::MalformedFrame("binary frames are not supported".to_string()),
            ),
        };

        if replies.send(reply).is_err() {
            break;
        }
    }
}

/// Writer task: serializes events and forwards control frames to the sink
async fn writer_task(
    mut ws_sender: SplitSink<WebSocket, Message>,
    mut events: mpsc::UnboundedReceiver<HubEvent>,
    mut control: mpsc::UnboundedReceiver<Message>,
) {
    loop {
        let msg = tokio::select! {
            biased;
            control_msg = control.recv() => match control_msg {
                Some(msg) => msg,
                None => break,
            },
            event = events.recv() => match event {
                Some(event) => match serde_json::to_string(&event) {
                    Ok(json) => Message::Text(json.into()),
                    Err(e) => {
                        tracing::error!("Failed to serialize hub event: {}", e);
                        continue;
                    }
                },
                None => break,
            },
        };

        let closing = matches!(msg, Message::Close(_));
        if ws_sender.send(msg).await.is_err() || closing {
            break;
        }
    }
}
