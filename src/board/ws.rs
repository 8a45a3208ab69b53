use std::collections::HashSet;
use std::time::Duration;

use anyhow::{Context, Result};
use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
};
use futures_util::{SinkExt, StreamExt, stream::SplitSink, stream::SplitStream};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::time::Instant;
use uuid::Uuid;

use super::api::SharedState;
use super::models::*;

/// How often to send WebSocket Ping frames.
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// How long to wait for a Pong response before considering the connection dead.
const PONG_TIMEOUT: Duration = Duration::from_secs(60);

// ── Event types ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum WsMessage {
    CardCreated {
        card: Card,
        actor_id: Uuid,
    },
    CardUpdated {
        card: Card,
        actor_id: Uuid,
    },
    CardMoved {
        card_id: Uuid,
        from_board_id: Uuid,
        to_board_id: Uuid,
        position: i32,
        actor_id: Uuid,
    },
    CardDeleted {
        card_id: Uuid,
        board_id: Uuid,
        actor_id: Uuid,
    },
    BoardCreated {
        board: Board,
    },
}

impl From<CardMoved> for WsMessage {
    fn from(moved: CardMoved) -> Self {
        Self::CardMoved {
            card_id: moved.card_id,
            from_board_id: moved.from_board_id,
            to_board_id: moved.to_board_id,
            position: moved.position,
            actor_id: moved.actor_id,
        }
    }
}

/// A serialized event addressed to one environment's room.
#[derive(Debug, Clone)]
pub struct Envelope {
    pub environment_id: Uuid,
    pub payload: String,
}

pub type EventSender = broadcast::Sender<Envelope>;

/// Room membership changes sent by clients.
#[derive(Debug, Deserialize, PartialEq)]
#[serde(tag = "action", rename_all = "snake_case")]
enum ClientCommand {
    Join { environment_id: Uuid },
    Leave { environment_id: Uuid },
}

// ── WebSocket handler ────────────────────────────────────────────────

pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<SharedState>,
) -> impl IntoResponse {
    let rx = state.events.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, rx))
}

async fn handle_socket(socket: WebSocket, rx: broadcast::Receiver<Envelope>) {
    let (sender, receiver) = socket.split();
    run_socket_loop(sender, receiver, rx).await;
}

/// Core WebSocket loop with ping/pong keepalive.
///
/// Forwards broadcast events for the environments this client has joined,
/// handles join/leave commands, and exits if no Pong arrives within
/// [`PONG_TIMEOUT`] after a Ping.
async fn run_socket_loop(
    mut sender: SplitSink<WebSocket, Message>,
    mut receiver: SplitStream<WebSocket>,
    mut rx: broadcast::Receiver<Envelope>,
) {
    let mut ping_interval = tokio::time::interval(PING_INTERVAL);
    // The first tick completes immediately; consume it so the first real
    // ping fires after PING_INTERVAL has elapsed.
    ping_interval.tick().await;

    let mut last_pong = Instant::now();
    let mut awaiting_pong = false;
    let mut rooms: HashSet<Uuid> = HashSet::new();

    loop {
        tokio::select! {
            _ = ping_interval.tick() => {
                if awaiting_pong && last_pong.elapsed() > PONG_TIMEOUT {
                    tracing::debug!("websocket pong timeout, closing");
                    break;
                }
                if sender.send(Message::Ping(Vec::new().into())).await.is_err() {
                    break;
                }
                awaiting_pong = true;
            }

            result = rx.recv() => {
                match result {
                    Ok(envelope) => {
                        if !rooms.contains(&envelope.environment_id) {
                            continue;
                        }
                        if sender.send(Message::Text(envelope.payload.into())).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        tracing::warn!(missed, "websocket subscriber lagged");
                        continue;
                    }
                }
            }

            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Pong(_))) => {
                        last_pong = Instant::now();
                        awaiting_pong = false;
                    }
                    Some(Ok(Message::Text(text))) => {
                        if let Some(ack) = apply_client_command(&mut rooms, text.as_str()) {
                            if sender.send(Message::Text(ack.into())).await.is_err() {
                                break;
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {}
                    Some(Err(_)) => break,
                }
            }
        }
    }

    // Best-effort close frame
    let _ = sender.send(Message::Close(None)).await;
}

/// Apply a join/leave command and return the acknowledgement to send back.
/// Unparseable text is ignored.
fn apply_client_command(rooms: &mut HashSet<Uuid>, text: &str) -> Option<String> {
    let command: ClientCommand = match serde_json::from_str(text) {
        Ok(command) => command,
        Err(e) => {
            tracing::debug!(error = %e, "ignoring unrecognised websocket message");
            return None;
        }
    };
    let (event, environment_id) = match command {
        ClientCommand::Join { environment_id } => {
            rooms.insert(environment_id);
            ("joined", environment_id)
        }
        ClientCommand::Leave { environment_id } => {
            rooms.remove(&environment_id);
            ("left", environment_id)
        }
    };
    Some(serde_json::json!({"event": event, "data": environment_id}).to_string())
}

// ── Broadcast helpers ────────────────────────────────────────────────

/// Serialize and broadcast a WsMessage to one environment's room.
/// Returns the number of live subscribers; zero subscribers is not an error.
pub fn publish(tx: &EventSender, environment_id: Uuid, msg: &WsMessage) -> Result<usize> {
    let payload = serde_json::to_string(msg).context("Failed to serialize WsMessage")?;
    Ok(tx
        .send(Envelope {
            environment_id,
            payload,
        })
        .unwrap_or(0))
}

/// Like [`publish`], logging instead of returning failures.
pub fn broadcast_message(tx: &EventSender, environment_id: Uuid, msg: &WsMessage) {
    if let Err(e) = publish(tx, environment_id, msg) {
        tracing::error!(error = %e, %environment_id, "failed to broadcast event");
    }
}

// ── Tests ────────────────────────────────────────────────────────────
