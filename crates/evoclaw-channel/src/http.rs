//! HTTP channel: request/response correlation via a single-slot rendezvous.
//!
//! A handler enqueues the inbound `Message` with [`HttpChannel::submit`],
//! registers a waiter with [`HttpChannel::wait_for_response`] *before* the
//! message can possibly be answered, then blocks until the orchestrator
//! calls [`Channel::send`] with a matching `message_id` or the context
//! expires.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use evoclaw_core::{Error, MessageId, Result};
use tokio::sync::{mpsc, oneshot};
use tracing::warn;

use crate::channel::{Channel, MessageStream};
use crate::context::{self, Context};
use crate::message::{Message, Response};
use crate::stream::InboxStream;

pub struct HttpChannel {
    name: String,
    inbox_tx: mpsc::Sender<Message>,
    inbox_rx: Mutex<Option<mpsc::Receiver<Message>>>,
    waiters: Mutex<HashMap<MessageId, oneshot::Sender<Response>>>,
}

impl HttpChannel {
    pub fn new(name: impl Into<String>, buffer: usize) -> Self {
        let (inbox_tx, inbox_rx) = mpsc::channel(buffer);
        Self {
            name: name.into(),
            inbox_tx,
            inbox_rx: Mutex::new(Some(inbox_rx)),
            waiters: Mutex::new(HashMap::new()),
        }
    }

    /// Push an inbound request onto the orchestrator's fan-in queue. Backs
    /// off (blocks the caller) when the queue is saturated, per the
    /// "block the sender" back-pressure policy.
    pub async fn submit(&self, mut ctx: Context, message: Message) -> Result<()> {
        context::race(&mut ctx, async { self.inbox_tx.send(message).await.map_err(|_| Error::unavailable("http channel closed")) }).await
    }

    /// Register a single-slot waiter for `message_id`, then block for the
    /// matching `Response`. Must be called *before* the message that will
    /// produce that response could plausibly be dispatched.
    pub async fn wait_for_response(&self, mut ctx: Context, message_id: MessageId) -> Result<Response> {
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().expect("http waiters poisoned").insert(message_id, tx);
        context::race(&mut ctx, async { rx.await.map_err(|_| Error::cancelled("response waiter dropped")) }).await
    }
}

#[async_trait]
impl Channel for HttpChannel {
    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self, _ctx: Context) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) {}

    async fn send(&self, _ctx: Context, response: Response) -> Result<()> {
        let waiter = self.waiters.lock().expect("http waiters poisoned").remove(&response.message_id);
        match waiter {
            Some(tx) => {
                let _ = tx.send(response);
            }
            None => warn!(message_id = %response.message_id, "no waiter registered for http response, dropping"),
        }
        Ok(())
    }

    fn receive(&self) -> MessageStream {
        let rx = self
            .inbox_rx
            .lock()
            .expect("http inbox poisoned")
            .take()
            .expect("HttpChannel::receive called more than once");
        Box::pin(InboxStream(rx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use evoclaw_core::AgentId;
    use std::time::Duration;

    #[tokio::test]
    async fn wait_for_response_resolves_once_send_arrives() {
        let channel = std::sync::Arc::new(HttpChannel::new("http", 8));
        let msg = Message::new("http", "alice", AgentId::from("a1"), "hi");
        let message_id = msg.id.clone();

        let waiter = {
            let channel = channel.clone();
            let message_id = message_id.clone();
            tokio::spawn(async move { channel.wait_for_response(Context::background(), message_id).await })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        let resp = Response::for_message(&msg, AgentId::from("a1"), "hello", "P/m");
        channel.send(Context::background(), resp.clone()).await.unwrap();

        let got = waiter.await.unwrap().unwrap();
        assert_eq!(got.content, "hello");
    }

    #[tokio::test]
    async fn wait_for_response_times_out_without_a_send() {
        let channel = HttpChannel::new("http", 8);
        let ctx = Context::background().with_timeout(Duration::from_millis(10));
        let err = channel.wait_for_response(ctx, MessageId::from("msg_x")).await.unwrap_err();
        assert_eq!(err.kind, evoclaw_core::ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn send_without_waiter_is_dropped_not_errored() {
        let channel = HttpChannel::new("http", 8);
        let msg = Message::new("http", "alice", AgentId::from("a1"), "hi");
        let resp = Response::for_message(&msg, AgentId::from("a1"), "hello", "P/m");
        assert!(channel.send(Context::background(), resp).await.is_ok());
    }

    #[tokio::test]
    #[should_panic(expected = "called more than once")]
    async fn receive_called_twice_panics() {
        let channel = HttpChannel::new("http", 8);
        let _first = channel.receive();
        let _second = channel.receive();
    }
}
