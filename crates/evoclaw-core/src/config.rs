//! Centralized environment-variable loading.
//!
//! Business code reads through [`EvoClawConfig`] rather than calling
//! `std::env::var` directly, following the `config::loader` /
//! `config::schema` split.

use std::env;
use std::path::PathBuf;

/// Load `.env` from the current directory into the process environment
/// (does not override variables already set). Idempotent.
pub fn load_dotenv() {
    use std::sync::Once;
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = dotenvy::dotenv();
    });
}

fn env_or(key: &str, default: impl FnOnce() -> String) -> String {
    env::var(key).ok().filter(|s| !s.is_empty()).unwrap_or_else(default)
}

fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

fn env_bool(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(s) => !matches!(s.trim().to_lowercase().as_str(), "0" | "false" | "no" | "off"),
        Err(_) => default,
    }
}

fn env_usize(key: &str, default: usize) -> usize {
    env::var(key).ok().and_then(|s| s.parse().ok()).unwrap_or(default)
}

/// Process-wide configuration, built explicitly and threaded through
/// constructors.
#[derive(Debug, Clone)]
pub struct EvoClawConfig {
    /// HMAC secret for JWT signing. `None` means dev-mode passthrough
    /// (logged loudly at boot).
    pub jwt_secret: Option<String>,
    /// Shared secret required in `POST /api/auth/token`'s `api_key` field
    /// before a token is minted over HTTP in production. `None` means no
    /// bootstrap secret is configured, so token minting is refused whenever
    /// `jwt_secret` is set (dev mode, where `jwt_secret` is `None`, never
    /// checks this).
    pub bootstrap_token_secret: Option<String>,
    pub data_dir: PathBuf,
    pub bind_addr: String,
    pub scheduler_enabled: bool,
    pub evolution_enabled: bool,
    pub memory_max_messages: usize,
    pub memory_token_limit: usize,
    /// One of `readonly`, `supervised`, `full`. Parsed by the caller, since
    /// `evoclaw-core` can't depend on `evoclaw-security`'s `AutonomyLevel`
    /// without creating a dependency cycle.
    pub sandbox_autonomy: String,
    /// Binaries the scheduler's `shell` action is allowed to invoke.
    pub sandbox_allowed_binaries: Vec<String>,
}

impl EvoClawConfig {
    pub fn from_env() -> Self {
        load_dotenv();
        let data_dir = env_optional("EVOCLAW_DATA_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(default_data_dir);
        Self {
            jwt_secret: env_optional("EVOCLAW_JWT_SECRET"),
            bootstrap_token_secret: env_optional("EVOCLAW_BOOTSTRAP_TOKEN_SECRET"),
            data_dir,
            bind_addr: env_or("EVOCLAW_BIND_ADDR", || "0.0.0.0:8080".to_string()),
            scheduler_enabled: env_bool("EVOCLAW_SCHEDULER_ENABLED", true),
            evolution_enabled: env_bool("EVOCLAW_EVOLUTION_ENABLED", true),
            memory_max_messages: env_usize("EVOCLAW_MEMORY_MAX_MESSAGES", 100),
            memory_token_limit: env_usize("EVOCLAW_MEMORY_TOKEN_LIMIT", 32_000),
            sandbox_autonomy: env_or("EVOCLAW_SANDBOX_AUTONOMY", || "supervised".to_string()),
            sandbox_allowed_binaries: env_optional("EVOCLAW_SANDBOX_ALLOWED_BINARIES")
                .map(|s| s.split(',').map(|b| b.trim().to_string()).filter(|b| !b.is_empty()).collect())
                .unwrap_or_default(),
        }
    }

    pub fn agents_dir(&self) -> PathBuf {
        self.data_dir.join("agents")
    }

    pub fn memory_dir(&self) -> PathBuf {
        self.data_dir.join("memory")
    }

    pub fn evolution_dir(&self) -> PathBuf {
        self.data_dir.join("evolution")
    }

    pub fn snapshots_dir(&self) -> PathBuf {
        self.evolution_dir().join("snapshots")
    }

    pub fn sandbox_workspace(&self) -> PathBuf {
        self.data_dir.join("workspace")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".evoclaw")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        // SAFETY: test-only, single-threaded env mutation scoped to this test.
        unsafe {
            env::remove_var("EVOCLAW_DATA_DIR");
            env::remove_var("EVOCLAW_MEMORY_MAX_MESSAGES");
        }
        let cfg = EvoClawConfig::from_env();
        assert_eq!(cfg.memory_max_messages, 100);
        assert!(cfg.scheduler_enabled);
    }
}
