// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent link WebSocket (`/ws/agent`).
//!
//! Agent-initiated. The first message must be `agent_hello` within the
//! handshake window or the connection is closed. Unknown message types are
//! logged and ignored; link loss marks the agent offline and fails its
//! in-flight commands.

use super::AppState;
use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use drover_core::{AgentHello, AgentMessage, ControllerMessage};
use futures_util::stream::SplitStream;
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::sync::mpsc;

/// An agent that has not said hello within this window is cut loose.
const HELLO_TIMEOUT: Duration = Duration::from_secs(5);

/// How often the controller pings a connected agent.
const PING_INTERVAL: Duration = Duration::from_secs(20);

/// Outbound channel depth per agent link.
const OUTBOUND_DEPTH: usize = 64;

pub(super) async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle(socket, state))
}

async fn handle(socket: WebSocket, state: AppState) {
    let (mut sink, mut read) = socket.split();

    let hello = match tokio::time::timeout(HELLO_TIMEOUT, read_hello(&mut read)).await {
        Ok(Some(hello)) => hello,
        _ => {
            tracing::warn!("agent connection closed: no hello within {HELLO_TIMEOUT:?}");
            return;
        }
    };

    let (tx, mut out_rx) = mpsc::channel::<ControllerMessage>(OUTBOUND_DEPTH);
    let (agent, conn) = state.registry.register(hello, tx.clone());
    let agent_id = agent.id.clone();
    tracing::info!(%agent_id, hostname = %agent.hostname, "agent connected");

    // Writer: serialize outbound messages onto the socket. Exits on socket
    // error or when the read side tears the connection down.
    let writer = tokio::spawn(async move {
        while let Some(message) = out_rx.recv().await {
            let text = match serde_json::to_string(&message) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(error = %e, "unserializable controller message");
                    continue;
                }
            };
            if sink.send(Message::Text(text)).await.is_err() {
                break;
            }
        }
    });

    let mut ping_timer = tokio::time::interval(PING_INTERVAL);
    loop {
        let text = tokio::select! {
            frame = read.next() => match frame {
                Some(Ok(Message::Text(text))) => text,
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break,
                _ => continue,
            },
            _ = ping_timer.tick() => {
                // Liveness ping. A send failure means a newer connection
                // replaced this one; stop reading on its behalf.
                if tx.send(ControllerMessage::Ping).await.is_err() {
                    break;
                }
                continue;
            }
        };
        match serde_json::from_str::<AgentMessage>(&text) {
            Ok(AgentMessage::Hello(hello)) => {
                // Re-hello on the same link refreshes identity fields.
                state.registry.register(hello, tx.clone());
            }
            Ok(AgentMessage::Heartbeat { telemetry }) => {
                state.registry.heartbeat(&agent_id, telemetry);
            }
            Ok(AgentMessage::TaskOutput { task_id, command_index, stream, content }) => {
                state
                    .dispatcher
                    .deliver_output(&task_id, command_index, stream, content)
                    .await;
            }
            Ok(AgentMessage::CommandResult {
                task_id,
                command_index,
                exit_code,
                stderr,
                duration_ms,
            }) => {
                state
                    .dispatcher
                    .deliver_result(&task_id, command_index, exit_code, stderr, duration_ms)
                    .await;
            }
            Ok(AgentMessage::Ack { .. }) => {}
            Ok(AgentMessage::Unknown) => {
                tracing::warn!(%agent_id, "ignoring unknown agent message type");
            }
            Err(e) => {
                tracing::warn!(%agent_id, error = %e, "unparsable agent frame");
            }
        }
    }

    // Only tear down if this is still the live connection; a reconnect that
    // raced ahead keeps its channel.
    if state.registry.disconnect_conn(&agent_id, conn) {
        tracing::info!(%agent_id, "agent disconnected");
        state.dispatcher.fail_agent_routes(&agent_id).await;
    }
    writer.abort();
}

async fn read_hello(read: &mut SplitStream<WebSocket>) -> Option<AgentHello> {
    while let Some(frame) = read.next().await {
        let text = match frame {
            Ok(Message::Text(text)) => text,
            Ok(Message::Close(_)) | Err(_) => return None,
            _ => continue,
        };
        match serde_json::from_str::<AgentMessage>(&text) {
            Ok(AgentMessage::Hello(hello)) => return Some(hello),
            Ok(_) | Err(_) => {
                tracing::warn!("expected agent_hello as first frame");
            }
        }
    }
    None
}
