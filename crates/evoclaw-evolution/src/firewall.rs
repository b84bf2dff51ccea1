//! Snapshot-and-rollback safety net plus the circuit breaker and signed
//! constraint gate that guard every genome/strategy mutation.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use evoclaw_core::{fsutil, Error, Result};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::genome::Genome;

/// How many consecutive failed evaluations open the breaker for an agent.
const BREAKER_FAILURE_THRESHOLD: u32 = 3;

/// How long an open breaker stays closed to writes before a single probe is
/// let through as half-open.
const BREAKER_COOLDOWN_SECS: i64 = 30;

/// Snapshots retained per agent before the oldest is dropped.
const MAX_SNAPSHOTS_PER_AGENT: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Snapshot {
    pub genome: Genome,
    pub taken_at: DateTime<Utc>,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FirewallStatus {
    pub breaker_state: BreakerState,
    pub snapshot_count: usize,
    pub last_event: Option<String>,
}

#[derive(Debug, Default)]
struct AgentFirewallState {
    snapshots: Vec<Snapshot>,
    breaker: BreakerState,
    consecutive_failures: u32,
    opened_at: Option<DateTime<Utc>>,
    last_event: Option<String>,
}

impl Default for BreakerState {
    fn default() -> Self {
        BreakerState::Closed
    }
}

/// Tracks per-agent snapshot stacks and circuit breaker state. Not
/// thread-safe on its own; callers hold it behind the same per-agent lock
/// the engine uses for genome/strategy access.
///
/// The snapshot stack is persisted to `<snapshots_dir>/<agent_id>.json` when
/// constructed with [`Firewall::with_dir`], mirroring how `EvolutionStore`
/// persists strategies and genomes; breaker state stays process-local, since
/// losing it on restart just means one fewer rollback generation and a
/// freshly-closed breaker rather than a safety regression.
#[derive(Debug)]
pub struct Firewall {
    agents: HashMap<String, AgentFirewallState>,
    cooldown_secs: i64,
    snapshots_dir: Option<PathBuf>,
}

impl Default for Firewall {
    fn default() -> Self {
        Self::new()
    }
}

impl Firewall {
    pub fn new() -> Self {
        Self { agents: HashMap::new(), cooldown_secs: BREAKER_COOLDOWN_SECS, snapshots_dir: None }
    }

    /// Same as [`Firewall::new`] but with an explicit cooldown, so tests
    /// don't have to wait out [`BREAKER_COOLDOWN_SECS`] in real time.
    pub fn with_cooldown(cooldown_secs: i64) -> Self {
        Self { agents: HashMap::new(), cooldown_secs, snapshots_dir: None }
    }

    /// Persist each agent's snapshot stack under `dir` as `<agent_id>.json`.
    pub fn with_dir(dir: impl Into<PathBuf>) -> Self {
        Self { agents: HashMap::new(), cooldown_secs: BREAKER_COOLDOWN_SECS, snapshots_dir: Some(dir.into()) }
    }

    fn snapshot_path(&self, agent_id: &str) -> Option<PathBuf> {
        self.snapshots_dir.as_ref().map(|dir| dir.join(format!("{agent_id}.json")))
    }

    fn load_snapshots(&self, agent_id: &str) -> Vec<Snapshot> {
        let Some(path) = self.snapshot_path(agent_id) else { return Vec::new() };
        match fs::read_to_string(&path) {
            Ok(data) => serde_json::from_str(&data).unwrap_or_default(),
            Err(_) => Vec::new(),
        }
    }

    fn persist_snapshots(&self, agent_id: &str) {
        let Some(path) = self.snapshot_path(agent_id) else { return };
        let Some(state) = self.agents.get(agent_id) else { return };
        if let Err(e) = fsutil::atomic_write_json(&path, &state.snapshots) {
            warn!(agent_id, error = %e, "failed to persist firewall snapshots");
        }
    }

    /// Get-or-create an agent's state, seeding its snapshot stack from disk
    /// on first access within this process.
    fn state_mut(&mut self, agent_id: &str) -> &mut AgentFirewallState {
        if !self.agents.contains_key(agent_id) {
            let snapshots = self.load_snapshots(agent_id);
            self.agents.insert(agent_id.to_string(), AgentFirewallState { snapshots, ..Default::default() });
        }
        self.agents.get_mut(agent_id).expect("just inserted")
    }

    /// Push a pre-mutation snapshot, evicting the oldest once the cap is hit.
    pub fn snapshot(&mut self, agent_id: &str, genome: &Genome, reason: impl Into<String>) {
        let state = self.state_mut(agent_id);
        if state.snapshots.len() >= MAX_SNAPSHOTS_PER_AGENT {
            state.snapshots.remove(0);
        }
        state.snapshots.push(Snapshot { genome: genome.clone(), taken_at: Utc::now(), reason: reason.into() });
        self.persist_snapshots(agent_id);
    }

    /// Pop the most recent snapshot and return its genome. Errors when the
    /// stack is empty rather than silently no-op'ing, per the rollback
    /// contract.
    pub fn rollback(&mut self, agent_id: &str) -> Result<Genome> {
        let genome = {
            let state = self.state_mut(agent_id);
            let snapshot = state
                .snapshots
                .pop()
                .ok_or_else(|| Error::not_found(format!("no snapshot to roll back to for agent {agent_id}")))?;
            state.last_event = Some(format!("rolled back to snapshot from {}", snapshot.taken_at));
            snapshot.genome
        };
        self.persist_snapshots(agent_id);
        Ok(genome)
    }

    /// Record an evaluation outcome; opens the breaker once the consecutive
    /// failure count reaches the threshold.
    pub fn record_outcome(&mut self, agent_id: &str, success: bool) {
        let state = self.state_mut(agent_id);
        if success {
            state.consecutive_failures = 0;
            if state.breaker == BreakerState::HalfOpen {
                state.breaker = BreakerState::Closed;
                state.last_event = Some("breaker closed after successful probe".into());
            }
        } else {
            state.consecutive_failures += 1;
            if state.consecutive_failures >= BREAKER_FAILURE_THRESHOLD && state.breaker == BreakerState::Closed {
                state.breaker = BreakerState::Open;
                state.opened_at = Some(Utc::now());
                state.last_event = Some(format!("breaker opened after {} consecutive failures", state.consecutive_failures));
            }
        }
    }

    /// Whether mutation is currently allowed for this agent. `Open` rejects
    /// every write until [`BREAKER_COOLDOWN_SECS`] has elapsed since it
    /// opened, at which point a single probe is let through as half-open.
    pub fn allow_mutation(&mut self, agent_id: &str) -> bool {
        let cooldown_secs = self.cooldown_secs;
        let state = self.state_mut(agent_id);
        match state.breaker {
            BreakerState::Closed => true,
            BreakerState::HalfOpen => true,
            BreakerState::Open => {
                let cooled_down = state
                    .opened_at
                    .is_some_and(|opened_at| Utc::now().signed_duration_since(opened_at).num_seconds() >= cooldown_secs);
                if cooled_down {
                    state.breaker = BreakerState::HalfOpen;
                    state.last_event = Some("breaker half-open, allowing probe after cooldown".into());
                    true
                } else {
                    false
                }
            }
        }
    }

    pub fn reset(&mut self, agent_id: &str) {
        let state = self.state_mut(agent_id);
        state.breaker = BreakerState::Closed;
        state.consecutive_failures = 0;
        state.opened_at = None;
        state.last_event = Some("breaker reset".into());
    }

    pub fn status(&mut self, agent_id: &str) -> FirewallStatus {
        let state = self.state_mut(agent_id);
        FirewallStatus {
            breaker_state: state.breaker,
            snapshot_count: state.snapshots.len(),
            last_event: state.last_event.clone(),
        }
    }
}

/// Verify a genome's constraint signature before it is written. Genomes
/// without an `owner_public_key` pass through unsigned (logged, not
/// rejected) for backward compatibility with pre-signing deployments.
pub fn verify_genome_constraints(genome: &Genome) -> Result<()> {
    let (Some(public_key), Some(signature)) = (&genome.owner_public_key, &genome.constraint_signature) else {
        warn!(agent = %genome.identity, "genome has unsigned constraints; allowing (unsigned-compat path)");
        return Ok(());
    };

    let verified = evoclaw_security::verify_constraints(public_key, &genome.constraints, signature)?;
    if !verified {
        return Err(Error::forbidden(format!("constraint signature verification failed for agent {}", genome.identity)));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollback_without_snapshot_errors() {
        let mut fw = Firewall::new();
        assert!(fw.rollback("a1").is_err());
    }

    #[test]
    fn snapshot_then_rollback_restores_genome() {
        let mut fw = Firewall::new();
        let g = Genome::new("a1");
        fw.snapshot("a1", &g, "pre-mutate");
        let restored = fw.rollback("a1").unwrap();
        assert_eq!(restored.identity, "a1");
        assert!(fw.rollback("a1").is_err());
    }

    #[test]
    fn snapshot_stack_evicts_oldest_past_cap() {
        let mut fw = Firewall::new();
        let g = Genome::new("a1");
        for i in 0..(MAX_SNAPSHOTS_PER_AGENT + 5) {
            fw.snapshot("a1", &g, format!("mutation-{i}"));
        }
        assert_eq!(fw.status("a1").snapshot_count, MAX_SNAPSHOTS_PER_AGENT);
    }

    #[test]
    fn breaker_opens_after_threshold_failures() {
        let mut fw = Firewall::new();
        for _ in 0..BREAKER_FAILURE_THRESHOLD {
            fw.record_outcome("a1", false);
        }
        assert_eq!(fw.status("a1").breaker_state, BreakerState::Open);
    }

    #[test]
    fn open_breaker_denies_mutation_before_cooldown() {
        let mut fw = Firewall::new();
        for _ in 0..BREAKER_FAILURE_THRESHOLD {
            fw.record_outcome("a1", false);
        }
        assert!(!fw.allow_mutation("a1"));
        assert_eq!(fw.status("a1").breaker_state, BreakerState::Open);
    }

    #[test]
    fn breaker_half_opens_then_closes_on_success() {
        let mut fw = Firewall::with_cooldown(0);
        for _ in 0..BREAKER_FAILURE_THRESHOLD {
            fw.record_outcome("a1", false);
        }
        assert!(fw.allow_mutation("a1"));
        assert_eq!(fw.status("a1").breaker_state, BreakerState::HalfOpen);
        fw.record_outcome("a1", true);
        assert_eq!(fw.status("a1").breaker_state, BreakerState::Closed);
    }

    #[test]
    fn reset_clears_breaker_state() {
        let mut fw = Firewall::new();
        for _ in 0..BREAKER_FAILURE_THRESHOLD {
            fw.record_outcome("a1", false);
        }
        fw.reset("a1");
        assert_eq!(fw.status("a1").breaker_state, BreakerState::Closed);
    }

    #[test]
    fn unsigned_genome_passes_with_warning() {
        let g = Genome::new("a1");
        assert!(verify_genome_constraints(&g).is_ok());
    }

    #[test]
    fn snapshots_persist_across_instances() {
        let dir = tempfile::tempdir().unwrap();
        let g = Genome::new("a1");
        {
            let mut fw = Firewall::with_dir(dir.path());
            fw.snapshot("a1", &g, "pre-mutate");
        }
        let mut fw2 = Firewall::with_dir(dir.path());
        assert_eq!(fw2.status("a1").snapshot_count, 1);
        let restored = fw2.rollback("a1").unwrap();
        assert_eq!(restored.identity, "a1");

        let mut fw3 = Firewall::with_dir(dir.path());
        assert_eq!(fw3.status("a1").snapshot_count, 0);
    }
}
