//! Bearer-token auth and RBAC middleware, grounded on
//! `sven-gateway::http::auth`'s `bearer_auth_mw` shape (its opaque shared
//! token is replaced with `evoclaw_security`'s signed per-agent JWT claims).

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use evoclaw_security::{dev_mode_claims, is_authorized, validate_token, Claims};
use tracing::warn;

use crate::error::ApiError;
use crate::state::AppState;

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?.strip_prefix("Bearer ")
}

/// Validates the bearer token (or issues dev-mode passthrough claims when no
/// secret is configured) and inserts [`Claims`] into request extensions for
/// downstream handlers and [`rbac_mw`].
pub async fn auth_mw(State(state): State<AppState>, mut req: Request, next: Next) -> Response {
    let claims = match &state.config.jwt_secret {
        None => dev_mode_claims("dev"),
        Some(secret) => {
            let token = match extract_bearer(req.headers()) {
                Some(t) => t,
                None => return ApiError(evoclaw_core::Error::unauthorized("missing bearer token")).into_response(),
            };
            match validate_token(token, secret) {
                Ok(c) => c,
                Err(e) => return ApiError(e).into_response(),
            }
        }
    };
    req.extensions_mut().insert(claims);
    next.run(req).await
}

/// Enforces the per-role route table against the [`Claims`] `auth_mw`
/// inserted. Must run after `auth_mw` in the request path (added earlier via
/// `.layer()`, since layers added later wrap outer and run first).
pub async fn rbac_mw(req: Request, next: Next) -> Response {
    let method = req.method().as_str().to_string();
    let path = req.uri().path().to_string();
    let claims = match req.extensions().get::<Claims>() {
        Some(c) => c.clone(),
        None => {
            warn!("rbac_mw ran without claims in request extensions; auth_mw must run first");
            return ApiError(evoclaw_core::Error::internal("auth not evaluated")).into_response();
        }
    };
    if !is_authorized(claims.role, &method, &path, &claims.agent_id) {
        return ApiError(evoclaw_core::Error::forbidden(format!(
            "role {:?} may not {method} {path}",
            claims.role
        )))
        .into_response();
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::{HeaderMap, HeaderValue};

    #[test]
    fn extract_bearer_strips_prefix() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Bearer abc.def.ghi"));
        assert_eq!(extract_bearer(&headers), Some("abc.def.ghi"));
    }

    #[test]
    fn extract_bearer_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(axum::http::header::AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert_eq!(extract_bearer(&headers), None);
    }

    #[test]
    fn extract_bearer_none_when_absent() {
        let headers = HeaderMap::new();
        assert_eq!(extract_bearer(&headers), None);
    }
}
