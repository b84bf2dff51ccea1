//! Per-job runner loop.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use evoclaw_security::SandboxPolicy;
use tokio::sync::watch;
use tracing::warn;

use crate::action;
use crate::executor::ActionExecutor;
use crate::job::Schedule;
use crate::store::JobStore;

/// Runs until the job is disabled/removed or `stop_rx` signals true. A
/// disabled job returns immediately without ticking.
pub async fn run(
    job_id: String,
    store: Arc<JobStore>,
    executor: Arc<dyn ActionExecutor>,
    http_client: reqwest::Client,
    sandbox: Arc<SandboxPolicy>,
    mut stop_rx: watch::Receiver<bool>,
) {
    let Ok(job) = store.get(&job_id) else { return };
    if !job.enabled {
        return;
    }

    let mut next_run_at = match job.schedule.next_run(Utc::now()) {
        Ok(t) => t,
        Err(e) => {
            warn!(job_id = %job_id, error = %e, "failed to compute initial next_run_at, runner exiting");
            return;
        }
    };
    store.with_state_mut(&job_id, |j| j.state.next_run_at = Some(next_run_at));

    let tick = match &job.schedule {
        Schedule::Interval { interval_ms } => Duration::from_millis(*interval_ms),
        Schedule::Cron { .. } | Schedule::At { .. } => Duration::from_secs(60),
    };

    loop {
        tokio::select! {
            _ = tokio::time::sleep(tick) => {}
            changed = stop_rx.changed() => {
                if changed.is_err() || *stop_rx.borrow() {
                    return;
                }
            }
        }

        let Ok(current) = store.get(&job_id) else { return };
        if !current.enabled {
            return;
        }

        let now = Utc::now();
        if now < next_run_at {
            continue;
        }

        let started = Instant::now();
        let result = action::fire(&current.action, executor.as_ref(), &http_client, &sandbox).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        store.with_state_mut(&job_id, |j| {
            j.state.last_run_at = Some(now);
            j.state.run_count += 1;
            j.state.last_duration_ms = Some(duration_ms);
            match &result {
                Ok(_) => j.state.last_error = None,
                Err(e) => {
                    j.state.error_count += 1;
                    j.state.last_error = Some(e.to_string());
                }
            }
        });

        if let Err(e) = &result {
            warn!(job_id = %job_id, error = %e, "scheduled job fire failed");
        }

        next_run_at = match current.schedule.next_run(now) {
            Ok(t) => t,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "failed to compute next_run_at, runner exiting");
                return;
            }
        };
        store.with_state_mut(&job_id, |j| j.state.next_run_at = Some(next_run_at));
    }
}
