//! `/api/agents/*` — catalog, memory, metrics.

use axum::extract::{Path, State};
use axum::Json;
use evoclaw_core::{AgentId, Error};
use evoclaw_memory::ChatMessage;
use evoclaw_registry::{Agent, AgentDefinition};
use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::error::ApiResult;
use crate::state::AppState;

pub async fn list_agents(State(state): State<AppState>) -> Json<Vec<Agent>> {
    Json(state.registry.list())
}

pub async fn get_agent(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Agent>> {
    Ok(Json(state.registry.get_snapshot(&AgentId::from(id))?))
}

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    id: String,
    #[serde(flatten)]
    definition: AgentDefinition,
}

pub async fn register_agent(State(state): State<AppState>, Json(req): Json<RegisterRequest>) -> ApiResult<Json<Agent>> {
    if state.router.get_model_info(&req.definition.model).is_none() {
        return Err(Error::invalid_argument(format!("unknown model: {}", req.definition.model)).into());
    }
    let id = AgentId::from(req.id);
    state.registry.create(id.clone(), req.definition)?;
    info!(agent_id = %id, "agent registered");
    Ok(Json(state.registry.get_snapshot(&id)?))
}

pub async fn update_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(definition): Json<AgentDefinition>,
) -> ApiResult<Json<Agent>> {
    if state.router.get_model_info(&definition.model).is_none() {
        return Err(Error::invalid_argument(format!("unknown model: {}", definition.model)).into());
    }
    let id = AgentId::from(id);
    state.registry.update(&id, definition)?;
    Ok(Json(state.registry.get_snapshot(&id)?))
}

pub async fn get_memory(State(state): State<AppState>, Path(id): Path<String>) -> Json<Vec<ChatMessage>> {
    Json(state.memory.get_messages(&id))
}

pub async fn clear_memory(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    state.memory.clear(&id);
    state.memory.save(&id);
    Ok(Json(serde_json::json!({ "cleared": true })))
}

pub async fn get_metrics(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let snapshot = state.registry.get_snapshot(&AgentId::from(id))?;
    Ok(Json(serde_json::json!({
        "message_count": snapshot.message_count,
        "error_count": snapshot.error_count,
        "metrics": snapshot.metrics,
    })))
}

#[derive(Debug, Deserialize)]
pub struct EvolveRequest {
    #[serde(default)]
    metrics: Option<evoclaw_evolution::FitnessMetrics>,
    #[serde(default = "default_min_fitness")]
    min_fitness: f64,
    #[serde(default = "default_mutation_rate")]
    mutation_rate: f64,
}

fn default_min_fitness() -> f64 {
    0.5
}

fn default_mutation_rate() -> f64 {
    0.1
}

/// `POST /api/agents/{id}/evolve` — evaluate (when metrics are supplied),
/// then mutate the strategy if it is due for evolution.
pub async fn evolve_agent(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<EvolveRequest>,
) -> ApiResult<Json<Value>> {
    let evolution = state
        .evolution
        .as_ref()
        .ok_or_else(|| Error::unavailable("evolution engine not configured"))?;

    let fitness = match &req.metrics {
        Some(metrics) => Some(evolution.evaluate(&id, metrics)?),
        None => None,
    };

    let due = evolution.should_evolve(&id, req.min_fitness)?;
    let mutated = if due { Some(evolution.mutate(&id, req.mutation_rate)?) } else { None };

    Ok(Json(serde_json::json!({
        "evaluated_fitness": fitness,
        "due_for_evolution": due,
        "mutated_strategy": mutated,
    })))
}

