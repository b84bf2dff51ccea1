//! `/api/agents/{id}/genome*`, `/feedback`, `/behavior*`, `/firewall*`
//! . Every route 503s when no evolution engine is configured.

use std::collections::HashMap;

use axum::extract::{Path, State};
use axum::Json;
use evoclaw_core::Error;
use evoclaw_evolution::{FeedbackRecord, FeedbackType, FirewallStatus, Genome, SkillGenome};
use serde::Deserialize;
use serde_json::Value;

use crate::error::ApiResult;
use crate::state::AppState;

fn engine(state: &AppState) -> ApiResult<&evoclaw_evolution::EvolutionEngine> {
    state.evolution.as_deref().ok_or_else(|| Error::unavailable("evolution engine not configured").into())
}

pub async fn get_genome(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Genome>> {
    Ok(Json(engine(&state)?.get_genome(&id)?))
}

pub async fn put_genome(State(state): State<AppState>, Path(id): Path<String>, Json(genome): Json<Genome>) -> ApiResult<Json<Genome>> {
    let engine = engine(&state)?;
    engine.update_genome(&id, genome)?;
    Ok(Json(engine.get_genome(&id)?))
}

pub async fn get_skill(
    State(state): State<AppState>,
    Path((id, skill)): Path<(String, String)>,
) -> ApiResult<Json<SkillGenome>> {
    let genome = engine(&state)?.get_genome(&id)?;
    genome
        .skills
        .get(&skill)
        .cloned()
        .map(Json)
        .ok_or_else(|| Error::not_found(format!("skill {skill} not found for agent {id}")).into())
}

pub async fn put_skill_params(
    State(state): State<AppState>,
    Path((id, skill)): Path<(String, String)>,
    Json(params): Json<HashMap<String, Value>>,
) -> ApiResult<Json<Genome>> {
    let engine = engine(&state)?;
    let mut genome = engine.get_genome(&id)?;
    let sk = genome
        .skills
        .get_mut(&skill)
        .ok_or_else(|| Error::not_found(format!("skill {skill} not found for agent {id}")))?;
    sk.set_params(params);
    engine.update_genome(&id, genome)?;
    Ok(Json(engine.get_genome(&id)?))
}

pub async fn put_constraints(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<ConstraintsUpdate>,
) -> ApiResult<Json<Genome>> {
    let engine = engine(&state)?;
    let mut genome = engine.get_genome(&id)?;
    genome.constraints = body.constraints;
    genome.constraint_signature = body.constraint_signature;
    if body.owner_public_key.is_some() {
        genome.owner_public_key = body.owner_public_key;
    }
    // `update_genome` verifies the signature against `owner_public_key`
    // before it is written, returning `forbidden` (403) on mismatch.
    engine.update_genome(&id, genome)?;
    Ok(Json(engine.get_genome(&id)?))
}

#[derive(Debug, Deserialize)]
pub struct ConstraintsUpdate {
    constraints: evoclaw_security::GenomeConstraints,
    #[serde(default)]
    constraint_signature: Option<String>,
    #[serde(default)]
    owner_public_key: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct FeedbackRequest {
    #[serde(rename = "type")]
    feedback_type: FeedbackType,
    score: f64,
    #[serde(default)]
    context: String,
}

pub async fn post_feedback(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(req): Json<FeedbackRequest>,
) -> ApiResult<Json<Value>> {
    engine(&state)?.submit_feedback(&id, req.feedback_type, req.score, &req.context)?;
    Ok(Json(serde_json::json!({ "accepted": true })))
}

pub async fn get_behavior(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<evoclaw_evolution::Behavior>> {
    Ok(Json(engine(&state)?.get_genome(&id)?.behavior))
}

pub async fn get_behavior_history(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Vec<FeedbackRecord>>> {
    Ok(Json(engine(&state)?.feedback_history(&id)))
}

pub async fn get_firewall(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<FirewallStatus>> {
    Ok(Json(engine(&state)?.get_firewall_status(&id)))
}

pub async fn rollback_firewall(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Genome>> {
    Ok(Json(engine(&state)?.rollback(&id)?))
}

pub async fn reset_firewall(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    engine(&state)?.reset_firewall(&id);
    Ok(Json(serde_json::json!({ "reset": true })))
}
