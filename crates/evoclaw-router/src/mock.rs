//! Deterministic in-memory providers for router tests and downstream crates
//! that need a `Provider` without a network dependency.

use async_trait::async_trait;
use evoclaw_core::{Error, Result};

use crate::{ChatRequest, ChatResponse, ModelInfo, Provider};

pub struct MockProvider {
    name: String,
    model_id: String,
    outcome: Outcome,
}

enum Outcome {
    Fail,
    Succeed { content: String, tokens_in: u64, tokens_out: u64 },
}

impl MockProvider {
    pub fn failing(provider: &str, model: &str) -> Self {
        Self {
            name: provider.to_string(),
            model_id: model.to_string(),
            outcome: Outcome::Fail,
        }
    }

    pub fn succeeding(provider: &str, model: &str, content: &str, tokens_in: u64, tokens_out: u64) -> Self {
        Self {
            name: provider.to_string(),
            model_id: model.to_string(),
            outcome: Outcome::Succeed {
                content: content.to_string(),
                tokens_in,
                tokens_out,
            },
        }
    }
}

#[async_trait]
impl Provider for MockProvider {
    fn name(&self) -> &str {
        &self.name
    }

    fn models(&self) -> Vec<ModelInfo> {
        vec![ModelInfo {
            provider: self.name.clone(),
            id: self.model_id.clone(),
            cost_input_per_1m: 1.0,
            cost_output_per_1m: 2.0,
            context_window: 8192,
        }]
    }

    async fn chat(&self, _req: &ChatRequest) -> Result<ChatResponse> {
        match &self.outcome {
            Outcome::Fail => Err(Error::internal(format!("mock provider {} always fails", self.name))),
            Outcome::Succeed { content, tokens_in, tokens_out } => Ok(ChatResponse {
                content: content.clone(),
                tokens_in: *tokens_in,
                tokens_out: *tokens_out,
            }),
        }
    }
}
