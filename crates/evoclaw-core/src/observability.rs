//! Tracing init, grounded on `observability::init_tracing`.

use std::env;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Initialize tracing. Call once at process startup.
///
/// `EVOCLAW_QUIET=1` restricts output to WARN and above. `EVOCLAW_LOG_JSON=1`
/// switches to newline-delimited JSON records. `EVOCLAW_LOG_LEVEL` (or
/// `RUST_LOG`) sets the filter directive when not quiet.
pub fn init_tracing() {
    let level = if is_quiet() {
        "evoclaw=warn".to_string()
    } else {
        env::var("EVOCLAW_LOG_LEVEL").unwrap_or_else(|_| "evoclaw=info".to_string())
    };

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let json = env_bool("EVOCLAW_LOG_JSON");

    let _ = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .try_init()
    };
}

fn is_quiet() -> bool {
    env_bool("EVOCLAW_QUIET")
}

fn env_bool(key: &str) -> bool {
    env::var(key)
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
}
