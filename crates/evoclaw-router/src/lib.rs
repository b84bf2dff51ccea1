//! Provider/model index, dispatch with fallback chain, and cost tracking.

mod cost;
mod provider;

#[cfg(any(test, feature = "mock-provider"))]
pub mod mock;

pub use cost::{CostRecord, CostTracker};
pub use provider::{ChatRequest, ChatResponse, Provider};

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use evoclaw_core::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Complex,
    Critical,
}

impl Default for Complexity {
    fn default() -> Self {
        Self::Complex
    }
}

/// Declared facts about one `"provider/model"` entry. `context_window` lets
/// the orchestrator size its history window per model.
#[derive(Debug, Clone)]
pub struct ModelInfo {
    pub provider: String,
    pub id: String,
    pub cost_input_per_1m: f64,
    pub cost_output_per_1m: f64,
    pub context_window: u32,
}

impl ModelInfo {
    pub fn key(&self) -> String {
        format!("{}/{}", self.provider, self.id)
    }
}

/// Per-complexity model overrides consulted by `select_model`.
#[derive(Debug, Clone, Default)]
pub struct RoutingConfig {
    pub simple: Option<String>,
    pub complex: Option<String>,
    pub critical: Option<String>,
}

pub struct Router {
    providers: RwLock<HashMap<String, Arc<dyn Provider>>>,
    models: RwLock<HashMap<String, ModelInfo>>,
    costs: CostTracker,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self {
            providers: RwLock::new(HashMap::new()),
            models: RwLock::new(HashMap::new()),
            costs: CostTracker::default(),
        }
    }

    /// Register a provider and index its declared models under
    /// `"<provider_name>/<model_id>"`.
    pub fn register_provider(&self, provider: Arc<dyn Provider>) {
        let name = provider.name().to_string();
        let declared = provider.models();
        {
            let mut models = self.models.write().expect("router models poisoned");
            for m in declared {
                models.insert(m.key(), m);
            }
        }
        self.providers.write().expect("router providers poisoned").insert(name, provider);
    }

    fn parse_model_id(model_id: &str) -> Result<(String, String)> {
        let mut parts = model_id.splitn(2, '/');
        let provider = parts.next().filter(|s| !s.is_empty());
        let model = parts.next().filter(|s| !s.is_empty());
        match (provider, model) {
            (Some(p), Some(m)) if !m.contains('/') => Ok((p.to_string(), m.to_string())),
            _ => Err(Error::invalid_argument(format!(
                "malformed model id (expected exactly one '/'): {model_id}"
            ))),
        }
    }

    fn provider_for(&self, provider_name: &str) -> Result<Arc<dyn Provider>> {
        self.providers
            .read()
            .expect("router providers poisoned")
            .get(provider_name)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("unknown provider: {provider_name}")))
    }

    /// Attempt `model_id`; on error, walk `fallback` in order. Returns the
    /// first success. If all fail, returns the last error with the primary
    /// error attached as context.
    pub async fn chat(&self, model_id: &str, req: ChatRequest, fallback: &[String]) -> Result<ChatResponse> {
        let (primary_err, primary_name) = match self.try_chat(model_id, &req).await {
            Ok(resp) => return Ok(resp),
            Err(e) => (e, model_id.to_string()),
        };

        let mut last_err = primary_err;
        for candidate in fallback {
            tracing::warn!(primary = %primary_name, fallback = %candidate, error = %last_err, "router falling back");
            match self.try_chat(candidate, &req).await {
                Ok(resp) => return Ok(resp),
                Err(e) => last_err = e,
            }
        }

        Err(Error::internal(format!(
            "all providers failed; primary model {primary_name} error: {last_err}"
        )))
    }

    async fn try_chat(&self, model_id: &str, req: &ChatRequest) -> Result<ChatResponse> {
        let (provider_name, model) = Self::parse_model_id(model_id)?;
        let provider = self.provider_for(&provider_name)?;
        let info = self
            .models
            .read()
            .expect("router models poisoned")
            .get(model_id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("unknown model: {model_id}")))?;

        let mut scoped = req.clone();
        scoped.model = model;
        let resp = provider.chat(&scoped).await?;
        self.costs.record(&info, resp.tokens_in, resp.tokens_out);
        Ok(resp)
    }

    pub fn get_cost(&self, model_id: &str) -> Option<CostRecord> {
        self.costs.get(model_id)
    }

    pub fn get_all_costs(&self) -> HashMap<String, CostRecord> {
        self.costs.all()
    }

    pub fn list_models(&self) -> Vec<ModelInfo> {
        self.models.read().expect("router models poisoned").values().cloned().collect()
    }

    pub fn get_model_info(&self, model_id: &str) -> Option<ModelInfo> {
        self.models.read().expect("router models poisoned").get(model_id).cloned()
    }

    /// Pick the configured model for `complexity`, defaulting to whatever
    /// `complex` maps to when the specific tier has no override.
    pub fn select_model(&self, complexity: Complexity, routing: &RoutingConfig) -> Option<String> {
        match complexity {
            Complexity::Simple => routing.simple.clone().or_else(|| routing.complex.clone()),
            Complexity::Complex => routing.complex.clone(),
            Complexity::Critical => routing.critical.clone().or_else(|| routing.complex.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockProvider;

    /// S2: P1/m1 always errors, P2/m2 succeeds; fallback recovers
    /// and exactly one request lands on the cost record for P2/m2.
    #[tokio::test]
    async fn s2_router_fallback() {
        let router = Router::new();
        router.register_provider(Arc::new(MockProvider::failing("P1", "m1")));
        router.register_provider(Arc::new(MockProvider::succeeding("P2", "m2", "ok", 10, 5)));

        let req = ChatRequest::new(vec![]);
        let resp = router.chat("P1/m1", req, &["P2/m2".to_string()]).await.unwrap();
        assert_eq!(resp.content, "ok");

        let costs = router.get_all_costs();
        assert!(!costs.contains_key("P1/m1"));
        let c = costs.get("P2/m2").unwrap();
        assert_eq!(c.total_requests, 1);
        assert_eq!(c.total_tokens_in, 10);
        assert_eq!(c.total_tokens_out, 5);
    }

    #[tokio::test]
    async fn malformed_model_id_never_touches_a_provider() {
        let router = Router::new();
        router.register_provider(Arc::new(MockProvider::succeeding("P1", "m1", "ok", 1, 1)));
        let err = router.chat("not-a-valid-id", ChatRequest::new(vec![]), &[]).await.unwrap_err();
        assert_eq!(err.kind, evoclaw_core::ErrorKind::InvalidArgument);
        assert!(router.get_all_costs().is_empty());
    }

    #[tokio::test]
    async fn all_providers_failing_reports_primary_context() {
        let router = Router::new();
        router.register_provider(Arc::new(MockProvider::failing("P1", "m1")));
        router.register_provider(Arc::new(MockProvider::failing("P2", "m2")));
        let err = router
            .chat("P1/m1", ChatRequest::new(vec![]), &["P2/m2".to_string()])
            .await
            .unwrap_err();
        assert!(err.message.contains("P1/m1"));
    }

    #[test]
    fn select_model_defaults_to_complex() {
        let routing = RoutingConfig {
            simple: None,
            complex: Some("P/complex".to_string()),
            critical: None,
        };
        let router = Router::new();
        assert_eq!(router.select_model(Complexity::Simple, &routing), Some("P/complex".to_string()));
        assert_eq!(router.select_model(Complexity::Critical, &routing), Some("P/complex".to_string()));
    }
}
