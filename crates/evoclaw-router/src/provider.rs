//! `Provider` contract: the only interface the router depends on. Wire
//! formats for concrete providers are out of scope.

use async_trait::async_trait;
use evoclaw_core::Result;
use evoclaw_memory::ChatMessage;

use crate::ModelInfo;

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
}

impl ChatRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            model: String::new(),
            messages,
            temperature: None,
            max_tokens: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: String,
    pub tokens_in: u64,
    pub tokens_out: u64,
}

/// Providers handle their own HTTP timeouts and native error mapping; the
/// router owns retries only through the fallback chain.
#[async_trait]
pub trait Provider: Send + Sync {
    fn name(&self) -> &str;
    fn models(&self) -> Vec<ModelInfo>;
    async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse>;
}
