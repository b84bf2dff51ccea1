//! `POST /api/auth/token`.

use axum::extract::State;
use axum::Json;
use chrono::Duration;
use evoclaw_core::Error;
use evoclaw_security::{generate_token, Role};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::{AppState, DEV_JWT_SECRET};

const TOKEN_TTL: Duration = Duration::hours(12);

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    agent_id: String,
    role: String,
    #[serde(default)]
    api_key: Option<String>,
}

fn parse_role(raw: &str) -> ApiResult<Role> {
    match raw {
        "owner" => Ok(Role::Owner),
        "agent" => Ok(Role::Agent),
        "readonly" => Ok(Role::Readonly),
        other => Err(Error::invalid_argument(format!("unknown role: {other}")).into()),
    }
}

/// Unauthenticated by design (see `routes::authenticated_routes`'s doc
/// comment) so the first token can ever be minted. In dev mode (no
/// `EVOCLAW_JWT_SECRET`) any request is honored, matching `auth_mw`'s
/// passthrough. Once a JWT secret is configured, minting also requires
/// `api_key` to match `EVOCLAW_BOOTSTRAP_TOKEN_SECRET`; an unconfigured
/// bootstrap secret refuses every request rather than silently allowing one.
pub async fn issue_token(State(state): State<AppState>, Json(req): Json<TokenRequest>) -> ApiResult<Json<Value>> {
    let role = parse_role(&req.role)?;

    let secret = match state.config.jwt_secret.as_deref() {
        None => DEV_JWT_SECRET,
        Some(secret) => {
            let expected = state.config.bootstrap_token_secret.as_deref();
            let provided = req.api_key.as_deref();
            match (expected, provided) {
                (Some(expected), Some(provided)) if expected == provided => secret,
                _ => return Err(Error::unauthorized("invalid or missing bootstrap api_key").into()),
            }
        }
    };
    let token = generate_token(&req.agent_id, role, secret, TOKEN_TTL)?;

    Ok(Json(json!({
        "token": token,
        "expires_in": TOKEN_TTL.num_seconds(),
        "token_type": "Bearer",
    })))
}
