//! `/api/scheduler*`. 503s when the scheduler is disabled.

use axum::extract::{Path, State};
use axum::Json;
use evoclaw_core::Error;
use evoclaw_scheduler::Job;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

fn scheduler(state: &AppState) -> ApiResult<&evoclaw_scheduler::Scheduler> {
    state.scheduler.as_deref().ok_or_else(|| Error::unavailable("scheduler not enabled").into())
}

pub async fn get_scheduler(State(state): State<AppState>) -> ApiResult<Json<Value>> {
    let jobs = scheduler(&state)?.list();
    Ok(Json(json!({
        "enabled": true,
        "job_count": jobs.len(),
    })))
}

pub async fn list_jobs(State(state): State<AppState>) -> ApiResult<Json<Vec<Job>>> {
    Ok(Json(scheduler(&state)?.list()))
}

pub async fn create_job(State(state): State<AppState>, Json(job): Json<Job>) -> ApiResult<Json<Job>> {
    let scheduler = scheduler(&state)?;
    scheduler.add(job.clone()).await?;
    Ok(Json(scheduler.get(&job.id)?))
}

pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Job>> {
    Ok(Json(scheduler(&state)?.get(&id)?))
}

pub async fn update_job(State(state): State<AppState>, Path(id): Path<String>, Json(mut job): Json<Job>) -> ApiResult<Json<Job>> {
    job.id = id;
    let scheduler = scheduler(&state)?;
    scheduler.update(job.clone()).await?;
    Ok(Json(scheduler.get(&job.id)?))
}

pub async fn delete_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Job>> {
    Ok(Json(scheduler(&state)?.remove(&id).await?))
}

pub async fn run_job(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult<Json<Value>> {
    let output = scheduler(&state)?.run_now(&id).await?;
    Ok(Json(json!({ "output": output })))
}
