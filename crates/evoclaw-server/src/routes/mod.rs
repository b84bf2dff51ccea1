//! Route tables, grounded on `skilllite-swarm::handler`'s `Router`/`State`
//! wiring.

mod agents;
mod auth;
mod chat;
mod genome;
mod scheduler;
mod status;
mod terminal;

use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{get, post, put};
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::request_id::{PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use crate::request_id::MakeUuidRequestId;
use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";

// `/api/terminal/ws` authenticates its own connection via a `?token=` query
// parameter (a bearer header can't be set on a browser WebSocket handshake),
// and `/api/auth/token` issues the very bearer tokens this stack checks (see
// its handler doc comment for how it guards itself), so both are kept out of
// the `auth_mw`/`rbac_mw` stack and merged back in below.
fn authenticated_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/api/status", get(status::get_status))
        .route("/api/agents", get(agents::list_agents))
        .route("/api/agents/register", post(agents::register_agent))
        .route("/api/agents/:id", get(agents::get_agent).patch(agents::update_agent))
        .route("/api/agents/:id/memory", get(agents::get_memory).delete(agents::clear_memory))
        .route("/api/agents/:id/metrics", get(agents::get_metrics))
        .route("/api/agents/:id/evolve", post(agents::evolve_agent))
        .route("/api/agents/:id/genome", get(genome::get_genome).put(genome::put_genome))
        .route("/api/agents/:id/genome/skills/:skill", get(genome::get_skill))
        .route("/api/agents/:id/genome/skills/:skill/params", put(genome::put_skill_params))
        .route("/api/agents/:id/genome/constraints", put(genome::put_constraints))
        .route("/api/agents/:id/feedback", post(genome::post_feedback))
        .route("/api/agents/:id/genome/behavior", get(genome::get_behavior))
        .route("/api/agents/:id/behavior/history", get(genome::get_behavior_history))
        .route("/api/agents/:id/firewall", get(genome::get_firewall))
        .route("/api/agents/:id/firewall/rollback", post(genome::rollback_firewall))
        .route("/api/agents/:id/firewall/reset", post(genome::reset_firewall))
        .route("/api/chat", post(chat::post_chat))
        .route("/api/chat/stream", get(chat::get_chat_stream))
        .route("/api/chat/history", get(chat::get_chat_history))
        .route("/api/scheduler", get(scheduler::get_scheduler))
        .route("/api/scheduler/jobs", get(scheduler::list_jobs).post(scheduler::create_job))
        .route(
            "/api/scheduler/jobs/:id",
            get(scheduler::get_job).patch(scheduler::update_job).delete(scheduler::delete_job),
        )
        .route("/api/scheduler/jobs/:id/run", post(scheduler::run_job))
        .layer(from_fn(crate::auth::rbac_mw))
        .layer(from_fn_with_state(state, crate::auth::auth_mw))
}

pub fn build_router(state: AppState) -> Router {
    let request_id_header = axum::http::HeaderName::from_static(REQUEST_ID_HEADER);

    Router::new()
        .merge(authenticated_routes(state.clone()))
        .route("/api/auth/token", post(auth::issue_token))
        .route("/api/terminal/ws", get(terminal::terminal_ws))
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeUuidRequestId))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
