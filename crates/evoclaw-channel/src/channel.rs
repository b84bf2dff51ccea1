//! The `Channel` transport contract.

use std::pin::Pin;

use async_trait::async_trait;
use evoclaw_core::Result;
use futures_util::Stream;

use crate::context::Context;
use crate::message::{Message, Response};

pub type MessageStream = Pin<Box<dyn Stream<Item = Message> + Send>>;

/// A transport adapter (HTTP, SSE, WebSocket) that produces `Message`s into
/// the orchestrator and consumes `Response`s.
///
/// `receive` is consumed exactly once by the orchestrator's fan-in task at
/// startup; implementations that can only hand out their receiver a single
/// time should document that and panic on a second call rather than return
/// an empty stream silently.
#[async_trait]
pub trait Channel: Send + Sync {
    fn name(&self) -> &str;

    async fn start(&self, ctx: Context) -> Result<()>;

    async fn stop(&self);

    async fn send(&self, ctx: Context, response: Response) -> Result<()>;

    fn receive(&self) -> MessageStream;
}
