//! Role table and permission check.
//!
//! Grounded on the general shape of `swedishembedded-sven::sven-gateway`'s
//! middleware-driven request gating, generalized from "valid token or not"
//! to a per-role, per-route permission table covering three distinct roles
//! rather than one shared secret.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Agent,
    Readonly,
}

/// Routes an `agent`-role caller may touch on its own resource, matched by
/// method + a pattern with a single `{id}` wildcard standing for the agent
/// id segment.
const AGENT_OWN_ROUTES: &[(&str, &str)] = &[
    ("GET", "/api/agents/{id}/genome"),
    ("GET", "/api/agents/{id}/genome/behavior"),
    ("GET", "/api/agents/{id}/behavior/history"),
    ("POST", "/api/agents/{id}/feedback"),
];

/// `true` if `role` may perform `method` on `path`, given the caller's own
/// `claim_agent_id` (from its JWT claims). Owner bypasses all checks;
/// readonly may `GET` anywhere under `/api`; agent is limited to
/// [`AGENT_OWN_ROUTES`] on its own id.
pub fn is_authorized(role: Role, method: &str, path: &str, claim_agent_id: &str) -> bool {
    match role {
        Role::Owner => true,
        Role::Readonly => method.eq_ignore_ascii_case("GET") && path.starts_with("/api"),
        Role::Agent => AGENT_OWN_ROUTES.iter().any(|(m, pattern)| {
            m.eq_ignore_ascii_case(method) && matches_own(pattern, path, claim_agent_id)
        }),
    }
}

/// Longest-prefix-style segment match: `pattern` and `path` must have the
/// same segment count, literal segments must match exactly, and `{id}` must
/// equal `claim_agent_id`.
fn matches_own(pattern: &str, path: &str, claim_agent_id: &str) -> bool {
    let pat_segs: Vec<&str> = pattern.split('/').filter(|s| !s.is_empty()).collect();
    let path_segs: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    if pat_segs.len() != path_segs.len() {
        return false;
    }
    pat_segs.iter().zip(path_segs.iter()).all(|(p, s)| {
        if *p == "{id}" {
            *s == claim_agent_id
        } else {
            p == s
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_bypasses_everything() {
        assert!(is_authorized(Role::Owner, "DELETE", "/api/scheduler/jobs/x", "anyone"));
    }

    #[test]
    fn readonly_allows_any_get_under_api() {
        assert!(is_authorized(Role::Readonly, "GET", "/api/agents/a1", "a1"));
        assert!(!is_authorized(Role::Readonly, "POST", "/api/agents/register", "a1"));
        assert!(!is_authorized(Role::Readonly, "GET", "/healthz", "a1"));
    }

    #[test]
    fn agent_may_read_its_own_genome_but_not_others() {
        assert!(is_authorized(Role::Agent, "GET", "/api/agents/a1/genome", "a1"));
        assert!(!is_authorized(Role::Agent, "GET", "/api/agents/a2/genome", "a1"));
    }

    #[test]
    fn agent_may_post_its_own_feedback_only() {
        assert!(is_authorized(Role::Agent, "POST", "/api/agents/a1/feedback", "a1"));
        assert!(!is_authorized(Role::Agent, "POST", "/api/agents/a2/feedback", "a1"));
    }

    #[test]
    fn agent_cannot_write_its_own_genome() {
        assert!(!is_authorized(Role::Agent, "PUT", "/api/agents/a1/genome", "a1"));
    }
}
