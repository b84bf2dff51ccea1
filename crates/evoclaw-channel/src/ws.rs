//! WebSocket terminal channel.
//!
//! Each browser connection registers a per-`message_id` response route
//! before the message is handed to the orchestrator, then bridges frames
//! to/from the socket. `unregister` always runs on completion so a dropped
//! connection never leaks a route. The terminal's wire frames
//! (`chat`/`ping`/`done`/`error`) are this module's concern, not the
//! orchestrator's.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use evoclaw_core::{AgentId, MessageId};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::channel::{Channel, MessageStream};
use crate::context::Context;
use crate::message::{Message, Response};
use crate::stream::InboxStream;
use evoclaw_core::Result;

/// Inbound terminal frame, `{type: "chat"|"ping", agent_id, message, request_id}`.
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InFrame {
    Chat { agent_id: AgentId, message: String, request_id: String },
    Ping { request_id: String },
}

/// Outbound terminal frame, `{type: "pong"|"done"|"error", request_id, agent_id, content, done, model, error}`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutFrame {
    Pong { request_id: String },
    Done {
        request_id: String,
        agent_id: AgentId,
        content: String,
        done: bool,
        model: String,
    },
    Error { request_id: String, error: String },
}

pub struct WsChannel {
    name: String,
    inbox_tx: mpsc::Sender<Message>,
    inbox_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    routes: Mutex<HashMap<MessageId, mpsc::UnboundedSender<Response>>>,
}

impl WsChannel {
    pub fn new(name: impl Into<String>, buffer: usize) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(buffer);
        Self {
            name: name.into(),
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
            routes: Mutex::new(HashMap::new()),
        }
    }

    /// Handle used by the HTTP layer to push a freshly-built `Message` onto
    /// this channel's fan-in queue.
    pub fn inbox_sender(&self) -> mpsc::Sender<Message> {
        self.inbox_tx.clone()
    }

    /// Register a response route for `message_id` before the message is
    /// dispatched. `request_id` correlates the route back to the terminal
    /// frame that originated it; routing itself keys on `message_id`.
    pub fn register(&self, message_id: MessageId, _request_id: &str) -> mpsc::UnboundedReceiver<Response> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.routes.lock().expect("ws routes poisoned").insert(message_id, tx);
        rx
    }

    pub fn unregister(&self, message_id: &MessageId) {
        self.routes.lock().expect("ws routes poisoned").remove(message_id);
    }
}

#[async_trait]
impl Channel for WsChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, _ctx: Context) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) {}

    async fn send(&self, _ctx: Context, response: Response) -> Result<()> {
        let route = self.routes.lock().expect("ws routes poisoned").get(&response.message_id).cloned();
        match route {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => warn!(message_id = %response.message_id, "no ws route registered, dropping response"),
        }
        Ok(())
    }

    fn receive(&self) -> MessageStream {
        let rx = self
            .inbox_rx
            .lock()
            .expect("ws inbox poisoned")
            .take()
            .expect("WsChannel::receive called more than once");
        Box::pin(InboxStream(rx))
    }
}

impl Drop for WsChannel {
    fn drop(&mut self) {
        debug!(channel = %self.name, "ws channel dropped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn register_then_send_delivers_and_unregister_stops_delivery() {
        let channel = WsChannel::new("ws", 8);
        let msg = Message::new("ws", "alice", AgentId::from("a1"), "hi");
        let mut rx = channel.register(msg.id.clone(), "req-1");

        let resp = Response::for_message(&msg, AgentId::from("a1"), "hello", "P/m");
        channel.send(Context::background(), resp.clone()).await.unwrap();
        let got = rx.recv().await.unwrap();
        assert_eq!(got.content, "hello");

        channel.unregister(&msg.id);
        channel.send(Context::background(), resp).await.unwrap();
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn in_frame_parses_chat_and_ping() {
        let chat: InFrame = serde_json::from_str(
            r#"{"type":"chat","agent_id":"a1","message":"hi","request_id":"r1"}"#,
        )
        .unwrap();
        matches!(chat, InFrame::Chat { .. });

        let ping: InFrame = serde_json::from_str(r#"{"type":"ping","request_id":"r1"}"#).unwrap();
        matches!(ping, InFrame::Ping { .. });
    }
}
