//! Process entrypoint: wire every subsystem into one [`AppState`], register
//! channels with the orchestrator, serve the HTTP/WS/SSE surface, and drain
//! everything cleanly on Ctrl+C.

mod auth;
mod error;
mod executor;
mod request_id;
mod routes;
mod state;

use std::sync::Arc;

use chrono::Utc;
use evoclaw_channel::{HttpChannel, WsChannel};
use evoclaw_core::config::EvoClawConfig;
use evoclaw_evolution::EvolutionEngine;
use evoclaw_memory::MemoryStore;
use evoclaw_orchestrator::Orchestrator;
use evoclaw_registry::AgentRegistry;
use evoclaw_router::{mock::MockProvider, Router};
use evoclaw_scheduler::Scheduler;
use evoclaw_security::SandboxPolicy;
use tracing::info;

use crate::executor::OrchestratorExecutor;
use crate::state::AppState;

const CHANNEL_BUFFER: usize = 256;
/// Default provider/model registered so a fresh deployment has something to
/// route to before an operator wires in a real one.
const DEFAULT_MODEL_ID: &str = "mock/default";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    evoclaw_core::observability::init_tracing();
    let config = Arc::new(EvoClawConfig::from_env());

    if config.jwt_secret.is_none() {
        tracing::warn!("EVOCLAW_JWT_SECRET not set, running in dev mode (auth is bypassed)");
    }

    let registry = Arc::new(AgentRegistry::new(config.agents_dir()));
    let loaded = registry.load();
    info!(agents_loaded = loaded, "agent registry warm-started");

    let memory = Arc::new(MemoryStore::new(config.memory_dir(), config.memory_max_messages, config.memory_token_limit));

    let router = Arc::new(Router::new());
    router.register_provider(Arc::new(MockProvider::succeeding("mock", "default", "this deployment has no provider configured yet", 0, 0)));

    let orchestrator = Arc::new(Orchestrator::new(registry.clone(), memory.clone(), router.clone(), config.memory_max_messages));

    let http_channel = Arc::new(HttpChannel::new("http", CHANNEL_BUFFER));
    let ws_channel = Arc::new(WsChannel::new("ws", CHANNEL_BUFFER));
    orchestrator.register_channel(http_channel.clone());
    orchestrator.register_channel(ws_channel.clone());

    let evolution = if config.evolution_enabled {
        Some(Arc::new(EvolutionEngine::with_snapshots_dir(config.evolution_dir(), config.snapshots_dir(), registry.clone())))
    } else {
        info!("evolution engine disabled via EVOCLAW_EVOLUTION_ENABLED");
        None
    };

    let sandbox_autonomy = match config.sandbox_autonomy.to_lowercase().as_str() {
        "readonly" => evoclaw_security::AutonomyLevel::Readonly,
        "full" => evoclaw_security::AutonomyLevel::Full,
        _ => evoclaw_security::AutonomyLevel::Supervised,
    };
    let sandbox = Arc::new(SandboxPolicy::new(sandbox_autonomy, config.sandbox_allowed_binaries.clone(), config.sandbox_workspace()));

    let scheduler = if config.scheduler_enabled {
        let scheduler_channel = Arc::new(HttpChannel::new("scheduler", CHANNEL_BUFFER));
        orchestrator.register_channel(scheduler_channel.clone());
        let executor = Arc::new(OrchestratorExecutor::new(scheduler_channel));
        Some(Arc::new(Scheduler::new(executor, sandbox.clone())))
    } else {
        info!("scheduler disabled via EVOCLAW_SCHEDULER_ENABLED");
        None
    };

    orchestrator.start().await?;
    if let Some(scheduler) = &scheduler {
        scheduler.start();
    }

    let state = AppState {
        config: config.clone(),
        registry: registry.clone(),
        memory: memory.clone(),
        router,
        orchestrator: orchestrator.clone(),
        http_channel,
        ws_channel,
        evolution,
        scheduler: scheduler.clone(),
        started_at: Utc::now(),
    };

    let app = routes::build_router(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    info!(addr = %config.bind_addr, default_model = DEFAULT_MODEL_ID, "evoclaw-server listening");

    axum::serve(listener, app).with_graceful_shutdown(shutdown_signal()).await?;

    info!("shutting down: draining orchestrator and scheduler tasks");
    orchestrator.shutdown().await;
    if let Some(scheduler) = &scheduler {
        scheduler.stop().await;
    }
    registry.save_all();
    memory.save_all();
    info!("shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
