//! Bridges scheduler `agent` actions back into the orchestrator through a
//! dedicated [`HttpChannel`] registered under the `"scheduler"` channel name.
//!
//! The waiter is registered *before* `submit`, mirroring the race-safety
//! pattern `HttpChannel`'s own doc comment calls out and the orchestrator's
//! tests already exercise: a fast dispatch must never resolve before the
//! waiter exists to catch it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use evoclaw_channel::{Context, HttpChannel, Message};
use evoclaw_core::{AgentId, Error, Result};
use evoclaw_scheduler::ActionExecutor;

const SCHEDULER_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

pub struct OrchestratorExecutor {
    channel: Arc<HttpChannel>,
}

impl OrchestratorExecutor {
    pub fn new(channel: Arc<HttpChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl ActionExecutor for OrchestratorExecutor {
    async fn execute_agent(&self, agent_id: &str, message: &str) -> Result<String> {
        let msg = Message::new("scheduler", "scheduler", AgentId::from(agent_id), message);
        let message_id = msg.id.clone();

        let channel = self.channel.clone();
        let waiter = tokio::spawn(async move {
            let ctx = Context::background().with_timeout(SCHEDULER_RESPONSE_TIMEOUT);
            channel.wait_for_response(ctx, message_id).await
        });

        self.channel.submit(Context::background().with_timeout(SCHEDULER_RESPONSE_TIMEOUT), msg).await?;

        waiter.await.map_err(|e| Error::internal(format!("response waiter panicked: {e}")))?.map(|r| r.content)
    }

    async fn publish_mqtt(&self, _topic: &str, _payload: &str) -> Result<()> {
        Err(Error::unavailable("mqtt publishing not configured in this deployment"))
    }
}
