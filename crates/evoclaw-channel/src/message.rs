//! Inbound `Message` / outbound `Response` — the orchestrator's wire types.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use evoclaw_core::{new_message_id, AgentId, MessageId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: MessageId,
    pub channel: String,
    pub from: String,
    pub to: AgentId,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
    #[serde(default)]
    pub reply_to: Option<MessageId>,
}

impl Message {
    pub fn new(channel: impl Into<String>, from: impl Into<String>, to: AgentId, content: impl Into<String>) -> Self {
        Self {
            id: new_message_id(),
            channel: channel.into(),
            from: from.into(),
            to,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: HashMap::new(),
            reply_to: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Response {
    pub message_id: MessageId,
    pub agent_id: AgentId,
    pub channel: String,
    pub content: String,
    pub model: String,
    #[serde(default)]
    pub metadata: HashMap<String, Value>,
}

impl Response {
    /// `response.message_id` always equals the source `message.id`.
    pub fn for_message(message: &Message, agent_id: AgentId, content: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            message_id: message.id.clone(),
            agent_id,
            channel: message.channel.clone(),
            content: content.into(),
            model: model.into(),
            metadata: HashMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_message_id_matches_source() {
        let msg = Message::new("http", "alice", AgentId::from("a1"), "hi");
        let resp = Response::for_message(&msg, AgentId::from("a1"), "hello", "P/m");
        assert_eq!(resp.message_id, msg.id);
    }
}
