//! Pluggable sinks for the two action kinds the scheduler cannot satisfy on
//! its own: `agent` (re-enters the orchestrator) and `mqtt` (needs a broker
//! connection). `shell` and `http` are self-contained (see `action.rs`).

use async_trait::async_trait;
use evoclaw_core::Result;

#[async_trait]
pub trait ActionExecutor: Send + Sync {
    async fn execute_agent(&self, agent_id: &str, message: &str) -> Result<String>;
    async fn publish_mqtt(&self, topic: &str, payload: &str) -> Result<()>;
}

/// Executor used when no real agent/mqtt sink is wired up; both calls fail
/// with `unavailable` rather than silently succeeding.
pub struct UnconfiguredExecutor;

#[async_trait]
impl ActionExecutor for UnconfiguredExecutor {
    async fn execute_agent(&self, _agent_id: &str, _message: &str) -> Result<String> {
        Err(evoclaw_core::Error::unavailable("no agent executor configured"))
    }

    async fn publish_mqtt(&self, _topic: &str, _payload: &str) -> Result<()> {
        Err(evoclaw_core::Error::unavailable("no mqtt executor configured"))
    }
}
