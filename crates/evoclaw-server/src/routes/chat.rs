//! `/api/chat`, `/api/chat/stream`, `/api/chat/history`.
//!
//! Chat dispatch reuses the same `HttpChannel` rendezvous the orchestrator's
//! own tests exercise: register the waiter before `submit`, so a fast
//! dispatch can never resolve before something is listening for it.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::{Query, State};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::Json;
use evoclaw_channel::{json_event, Context, Message};
use evoclaw_core::{AgentId, Error};
use evoclaw_memory::ChatMessage;
use futures_util::stream::{self, Stream};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

const CHAT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Deserialize)]
pub struct ChatRequestBody {
    agent_id: String,
    message: String,
}

async fn dispatch(state: &AppState, agent_id: &str, message: &str) -> ApiResult<evoclaw_channel::Response> {
    let msg = Message::new("http", "api", AgentId::from(agent_id), message);
    let message_id = msg.id.clone();

    let channel = state.http_channel.clone();
    let waiter = tokio::spawn(async move {
        let ctx = Context::background().with_timeout(CHAT_RESPONSE_TIMEOUT);
        channel.wait_for_response(ctx, message_id).await
    });

    state
        .http_channel
        .submit(Context::background().with_timeout(CHAT_RESPONSE_TIMEOUT), msg)
        .await?;

    Ok(waiter.await.map_err(|e| Error::internal(format!("response waiter panicked: {e}")))??)
}

pub async fn post_chat(State(state): State<AppState>, Json(req): Json<ChatRequestBody>) -> ApiResult<Json<Value>> {
    let resp = dispatch(&state, &req.agent_id, &req.message).await?;
    Ok(Json(json!({
        "agent_id": resp.agent_id,
        "content": resp.content,
        "model": resp.model,
    })))
}

#[derive(Debug, Deserialize)]
pub struct StreamQuery {
    agent_id: String,
    message: String,
}

/// One `start` event followed by one `done` event carrying the full
/// response; the router's `Provider` contract has no incremental token
/// interface, so framing is
/// event-granular rather than token-granular.
pub async fn get_chat_stream(
    State(state): State<AppState>,
    Query(q): Query<StreamQuery>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let result = dispatch(&state, &q.agent_id, &q.message).await;
    let event = match result {
        Ok(resp) => json_event(&json!({
            "agent_id": resp.agent_id,
            "content": resp.content,
            "model": resp.model,
            "done": true,
        })),
        Err(e) => json_event(&json!({ "error": e.0.message, "done": true })),
    }
    .unwrap_or_else(|_| Event::default().data("{\"error\":\"failed to encode event\"}"));

    Sse::new(stream::once(async move { Ok(event) })).keep_alive(KeepAlive::default())
}

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    agent_id: String,
}

pub async fn get_chat_history(State(state): State<AppState>, Query(q): Query<HistoryQuery>) -> Json<Vec<ChatMessage>> {
    Json(state.memory.get_messages(&q.agent_id))
}
