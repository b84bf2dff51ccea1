//! `GET /api/terminal/ws` — the WebSocket terminal.
//!
//! Each connection registers a response route with [`WsChannel`] before
//! handing the built `Message` to its inbox, mirroring the same
//! register-before-submit race-safety pattern used for the HTTP channel.
//! The default per-request timeout is 30s.

use std::time::Duration;

use axum::extract::ws::{Message as WsMessage, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use evoclaw_channel::{InFrame, OutFrame};
use evoclaw_core::AgentId;
use evoclaw_security::validate_token;
use futures_util::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::warn;

use crate::state::AppState;

const TERMINAL_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct TerminalQuery {
    #[serde(default)]
    token: Option<String>,
}

pub async fn terminal_ws(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<TerminalQuery>,
) -> impl IntoResponse {
    let authorized = match &state.config.jwt_secret {
        None => true,
        Some(secret) => query.token.as_deref().is_some_and(|t| validate_token(t, secret).is_ok()),
    };
    if !authorized {
        return (axum::http::StatusCode::UNAUTHORIZED, "invalid or missing token").into_response();
    }

    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sink, mut stream) = socket.split();
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<OutFrame>();

    let forwarder = tokio::spawn(async move {
        while let Some(frame) = out_rx.recv().await {
            let Ok(text) = serde_json::to_string(&frame) else { continue };
            if sink.send(WsMessage::Text(text.into())).await.is_err() {
                break;
            }
        }
    });

    while let Some(Ok(msg)) = stream.next().await {
        let WsMessage::Text(text) = msg else { continue };
        let frame: InFrame = match serde_json::from_str(&text) {
            Ok(f) => f,
            Err(e) => {
                warn!(error = %e, "malformed terminal frame, dropping");
                continue;
            }
        };

        match frame {
            InFrame::Ping { request_id } => {
                let _ = out_tx.send(OutFrame::Pong { request_id });
            }
            InFrame::Chat { agent_id, message, request_id } => {
                spawn_chat(&state, out_tx.clone(), agent_id, message, request_id);
            }
        }
    }

    drop(out_tx);
    let _ = forwarder.await;
}

fn spawn_chat(state: &AppState, out_tx: mpsc::UnboundedSender<OutFrame>, agent_id: AgentId, message: String, request_id: String) {
    let ws_channel = state.ws_channel.clone();
    let msg = evoclaw_channel::Message::new("ws", "terminal", agent_id, message);
    let message_id = msg.id.clone();
    let mut rx = ws_channel.register(message_id.clone(), &request_id);
    let inbox = ws_channel.inbox_sender();

    tokio::spawn(async move {
        if inbox.send(msg).await.is_err() {
            let _ = out_tx.send(OutFrame::Error { request_id, error: "ws channel closed".into() });
            ws_channel.unregister(&message_id);
            return;
        }

        let outcome = tokio::time::timeout(TERMINAL_RESPONSE_TIMEOUT, rx.recv()).await;
        ws_channel.unregister(&message_id);

        let frame = match outcome {
            Ok(Some(resp)) => OutFrame::Done {
                request_id,
                agent_id: resp.agent_id,
                content: resp.content,
                done: true,
                model: resp.model,
            },
            Ok(None) => OutFrame::Error { request_id, error: "response channel closed".into() },
            Err(_) => OutFrame::Error { request_id, error: "timed out waiting for response".into() },
        };
        let _ = out_tx.send(frame);
    });
}
