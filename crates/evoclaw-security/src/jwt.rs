//! HS256 bearer tokens carrying `{agent_id, role, iat, exp}`.
//!
//! Grounded on `swedishembedded-sven::sven-gateway::http::auth`'s bearer
//! middleware shape, adapted from an opaque shared-secret token to a signed
//! JWT claim set carrying per-agent role claims rather than a single shared
//! token.

use chrono::{Duration, Utc};
use evoclaw_core::{Error, Result};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::rbac::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub agent_id: String,
    pub role: Role,
    pub iat: i64,
    pub exp: i64,
}

/// Issue a signed token valid for `ttl` from now.
pub fn generate_token(agent_id: &str, role: Role, secret: &str, ttl: Duration) -> Result<String> {
    let now = Utc::now();
    let claims = Claims {
        agent_id: agent_id.to_string(),
        role,
        iat: now.timestamp(),
        exp: (now + ttl).timestamp(),
    };
    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| Error::internal(format!("failed to sign token: {e}")))
}

/// Validate a token against `secret`, returning distinguishable errors for a
/// missing/malformed token vs. an expired one.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims> {
    let mut validation = Validation::default();
    validation.validate_exp = true;
    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Error::unauthorized("token expired"),
            _ => Error::unauthorized(format!("invalid token: {e}")),
        })
}

/// Dev-mode passthrough claims used when no `EVOCLAW_JWT_SECRET` is
/// configured.
pub fn dev_mode_claims(agent_id: &str) -> Claims {
    let now = Utc::now();
    Claims {
        agent_id: agent_id.to_string(),
        role: Role::Owner,
        iat: now.timestamp(),
        exp: (now + Duration::days(365)).timestamp(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_generate_and_validate() {
        let token = generate_token("agent-1", Role::Agent, "s3cr3t", Duration::minutes(5)).unwrap();
        let claims = validate_token(&token, "s3cr3t").unwrap();
        assert_eq!(claims.agent_id, "agent-1");
        assert_eq!(claims.role, Role::Agent);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = generate_token("agent-1", Role::Agent, "s3cr3t", Duration::minutes(5)).unwrap();
        let err = validate_token(&token, "wrong").unwrap_err();
        assert_eq!(err.kind, evoclaw_core::ErrorKind::Unauthorized);
    }

    #[test]
    fn expired_token_is_distinguishable() {
        let token = generate_token("agent-1", Role::Agent, "s3cr3t", Duration::seconds(-5)).unwrap();
        let err = validate_token(&token, "s3cr3t").unwrap_err();
        assert!(err.message.contains("expired"));
    }
}
