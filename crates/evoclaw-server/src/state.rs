//! Shared axum state, grounded on `skilllite-swarm::handler`'s `AppState`
//! pattern: one `Clone` struct of `Arc`s threaded through every handler via
//! `State<AppState>`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use evoclaw_channel::{HttpChannel, WsChannel};
use evoclaw_core::config::EvoClawConfig;
use evoclaw_evolution::EvolutionEngine;
use evoclaw_memory::MemoryStore;
use evoclaw_orchestrator::Orchestrator;
use evoclaw_registry::AgentRegistry;
use evoclaw_router::Router;
use evoclaw_scheduler::Scheduler;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<EvoClawConfig>,
    pub registry: Arc<AgentRegistry>,
    pub memory: Arc<MemoryStore>,
    pub router: Arc<Router>,
    pub orchestrator: Arc<Orchestrator>,
    pub http_channel: Arc<HttpChannel>,
    pub ws_channel: Arc<WsChannel>,
    pub evolution: Option<Arc<EvolutionEngine>>,
    pub scheduler: Option<Arc<Scheduler>>,
    pub started_at: DateTime<Utc>,
}

/// Insecure fixed signing key used only when `EVOCLAW_JWT_SECRET` is unset.
/// Tokens issued with it are meaningless for authorization since the auth
/// middleware skips validation entirely in that mode.
pub const DEV_JWT_SECRET: &str = "evoclaw-dev-mode-insecure-secret";
