//! `GET /api/status`.

use axum::extract::State;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn get_status(State(state): State<AppState>) -> Json<serde_json::Value> {
    let agents = state.registry.list();
    let models = state.router.list_models();
    let total_cost: f64 = state.router.get_all_costs().values().map(|c| c.total_cost_usd).sum();

    Json(json!({
        "version": env!("CARGO_PKG_VERSION"),
        "agents": agents.len(),
        "models": models.len(),
        "total_cost": total_cost,
        "memory": {
            "max_messages": state.config.memory_max_messages,
            "token_limit": state.config.memory_token_limit,
        },
        "uptime_seconds": (chrono::Utc::now() - state.started_at).num_seconds(),
    }))
}
