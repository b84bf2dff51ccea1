//! The `Scheduler`: owns the `JobStore` and starts/stops one runner task
//! per enabled job.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Instant;

use chrono::Utc;
use evoclaw_core::Result;
use evoclaw_security::SandboxPolicy;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::action;
use crate::executor::ActionExecutor;
use crate::job::Job;
use crate::runner;
use crate::store::JobStore;

struct RunnerHandle {
    stop_tx: watch::Sender<bool>,
    join: JoinHandle<()>,
}

pub struct Scheduler {
    store: Arc<JobStore>,
    executor: Arc<dyn ActionExecutor>,
    http_client: reqwest::Client,
    sandbox: Arc<SandboxPolicy>,
    runners: Mutex<HashMap<String, RunnerHandle>>,
}

impl Scheduler {
    pub fn new(executor: Arc<dyn ActionExecutor>, sandbox: Arc<SandboxPolicy>) -> Self {
        Self {
            store: Arc::new(JobStore::new()),
            executor,
            http_client: reqwest::Client::new(),
            sandbox,
            runners: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<JobStore> {
        &self.store
    }

    /// Launch a runner for every currently-enabled job.
    pub fn start(&self) {
        for job in self.store.list() {
            if job.enabled {
                self.spawn_runner(&job.id);
            }
        }
    }

    fn spawn_runner(&self, id: &str) {
        let (stop_tx, stop_rx) = watch::channel(false);
        let join = tokio::spawn(runner::run(
            id.to_string(),
            self.store.clone(),
            self.executor.clone(),
            self.http_client.clone(),
            self.sandbox.clone(),
            stop_rx,
        ));
        self.runners.lock().expect("scheduler runners poisoned").insert(id.to_string(), RunnerHandle { stop_tx, join });
    }

    /// Stop the runner for `id`, waiting for its in-flight fire to complete.
    async fn stop_runner(&self, id: &str) {
        let handle = self.runners.lock().expect("scheduler runners poisoned").remove(id);
        if let Some(handle) = handle {
            let _ = handle.stop_tx.send(true);
            let _ = handle.join.await;
        }
    }

    pub async fn add(&self, job: Job) -> Result<()> {
        let enabled = job.enabled;
        let id = job.id.clone();
        self.store.add(job)?;
        if enabled {
            self.spawn_runner(&id);
        }
        Ok(())
    }

    pub async fn update(&self, job: Job) -> Result<()> {
        let enabled = job.enabled;
        let id = job.id.clone();
        self.store.update(job)?;
        self.stop_runner(&id).await;
        if enabled {
            self.spawn_runner(&id);
        }
        Ok(())
    }

    pub async fn remove(&self, id: &str) -> Result<Job> {
        self.stop_runner(id).await;
        self.store.remove(id)
    }

    pub fn get(&self, id: &str) -> Result<Job> {
        self.store.get(id)
    }

    pub fn list(&self) -> Vec<Job> {
        self.store.list()
    }

    /// Execute a job's action once, bypassing the schedule, without
    /// mutating `next_run_at`.
    pub async fn run_now(&self, id: &str) -> Result<String> {
        let job = self.store.get(id)?;
        let started = Instant::now();
        let result = action::fire(&job.action, self.executor.as_ref(), &self.http_client, &self.sandbox).await;
        let duration_ms = started.elapsed().as_millis() as u64;
        let now = Utc::now();

        self.store.with_state_mut(id, |j| {
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

        result
    }

    /// Cancel every runner and join them.
    pub async fn stop(&self) {
        let ids: Vec<String> = self.runners.lock().expect("scheduler runners poisoned").keys().cloned().collect();
        for id in ids {
            self.stop_runner(&id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::executor::UnconfiguredExecutor;
    use crate::job::{Action, Schedule};
    use evoclaw_security::AutonomyLevel;
    use std::time::Duration;

    fn sandbox() -> Arc<SandboxPolicy> {
        Arc::new(SandboxPolicy::new(AutonomyLevel::Full, vec!["echo".into()], std::env::temp_dir()))
    }

    #[tokio::test]
    async fn run_now_fires_without_touching_next_run_at() {
        let scheduler = Scheduler::new(Arc::new(UnconfiguredExecutor), sandbox());
        let job = Job::new("j1", "n", Schedule::Interval { interval_ms: 60_000 }, Action::Shell { command: "echo hi".into() });
        scheduler.add(job).await.unwrap();

        let before = scheduler.get("j1").unwrap().state.next_run_at;
        let out = scheduler.run_now("j1").await.unwrap();
        assert!(out.contains("hi"));
        let after = scheduler.get("j1").unwrap();
        assert_eq!(after.state.run_count, 1);
        assert_eq!(after.state.next_run_at, before);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn interval_runner_fires_after_one_period() {
        let scheduler = Scheduler::new(Arc::new(UnconfiguredExecutor), sandbox());
        let job = Job::new("j1", "n", Schedule::Interval { interval_ms: 10 }, Action::Shell { command: "echo hi".into() });
        scheduler.add(job).await.unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;
        let state = scheduler.get("j1").unwrap().state;
        assert!(state.run_count >= 1);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn disabled_job_runner_never_fires() {
        let scheduler = Scheduler::new(Arc::new(UnconfiguredExecutor), sandbox());
        let mut job = Job::new("j1", "n", Schedule::Interval { interval_ms: 10 }, Action::Shell { command: "echo hi".into() });
        job.enabled = false;
        scheduler.add(job).await.unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        let state = scheduler.get("j1").unwrap().state;
        assert_eq!(state.run_count, 0);

        scheduler.stop().await;
    }

    #[tokio::test]
    async fn update_to_disabled_stops_the_runner() {
        let scheduler = Scheduler::new(Arc::new(UnconfiguredExecutor), sandbox());
        let job = Job::new("j1", "n", Schedule::Interval { interval_ms: 10 }, Action::Shell { command: "echo hi".into() });
        scheduler.add(job.clone()).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        let mut disabled = job;
        disabled.enabled = false;
        scheduler.update(disabled).await.unwrap();
        let count_at_disable = scheduler.get("j1").unwrap().state.run_count;

        tokio::time::sleep(Duration::from_millis(50)).await;
        let count_after = scheduler.get("j1").unwrap().state.run_count;
        assert_eq!(count_at_disable, count_after);

        scheduler.stop().await;
    }
}
