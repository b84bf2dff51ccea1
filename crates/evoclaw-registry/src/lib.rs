//! Agent catalog: status, metrics, skill reports, disk persistence.

mod metrics;

pub use metrics::Metrics;

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use evoclaw_core::{fsutil, AgentId, Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Running,
    Error,
    Evolving,
}

/// Configuration record for an agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentDefinition {
    pub name: String,
    #[serde(rename = "type")]
    pub agent_type: String,
    pub model: String,
    pub system_prompt: String,
    #[serde(default)]
    pub skills: Vec<String>,
    #[serde(default)]
    pub config_map: HashMap<String, Value>,
    /// Opaque genome payload. `evoclaw-evolution` owns the typed `Genome`
    /// and writes its serialized form back here on update.
    #[serde(default)]
    pub genome: Option<Value>,
}

/// Catalog entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Agent {
    pub id: AgentId,
    pub definition: AgentDefinition,
    pub status: AgentStatus,
    pub started_at: DateTime<Utc>,
    pub last_active: DateTime<Utc>,
    pub last_heartbeat: Option<DateTime<Utc>>,
    pub message_count: u64,
    pub error_count: u64,
    pub metrics: Metrics,
    #[serde(default)]
    pub skill_data: Vec<Value>,
}

const SKILL_DATA_WINDOW: usize = 50;

impl Agent {
    fn new(id: AgentId, definition: AgentDefinition) -> Self {
        let now = Utc::now();
        Self {
            id,
            definition,
            status: AgentStatus::Idle,
            started_at: now,
            last_active: now,
            last_heartbeat: None,
            message_count: 0,
            error_count: 0,
            metrics: Metrics::default(),
            skill_data: Vec::new(),
        }
    }
}

type Handle = Arc<Mutex<Agent>>;

/// Single-writer/many-readers registry keyed by `agent_id`. Each `Agent` has
/// its own lock protecting its mutable fields.
pub struct AgentRegistry {
    dir: PathBuf,
    agents: RwLock<HashMap<AgentId, Handle>>,
}

impl AgentRegistry {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            agents: RwLock::new(HashMap::new()),
        }
    }

    fn path_for(&self, id: &AgentId) -> PathBuf {
        self.dir.join(format!("{}.json", id.as_str()))
    }

    pub fn create(&self, id: AgentId, definition: AgentDefinition) -> Result<()> {
        let mut agents = self.agents.write().expect("registry poisoned");
        if agents.contains_key(&id) {
            return Err(Error::invalid_argument(format!("agent already exists: {id}")));
        }
        let agent = Agent::new(id.clone(), definition);
        self.persist(&agent);
        agents.insert(id, Arc::new(Mutex::new(agent)));
        Ok(())
    }

    pub fn update(&self, id: &AgentId, definition: AgentDefinition) -> Result<()> {
        let handle = self.require(id)?;
        let mut agent = handle.lock().expect("agent poisoned");
        agent.definition = definition;
        agent.last_active = Utc::now();
        let snapshot = agent.clone();
        drop(agent);
        self.persist(&snapshot);
        Ok(())
    }

    pub fn delete(&self, id: &AgentId) -> Result<()> {
        let mut agents = self.agents.write().expect("registry poisoned");
        if agents.remove(id).is_none() {
            return Err(Error::not_found(format!("agent not found: {id}")));
        }
        let _ = fs::remove_file(self.path_for(id));
        Ok(())
    }

    fn require(&self, id: &AgentId) -> Result<Handle> {
        self.agents
            .read()
            .expect("registry poisoned")
            .get(id)
            .cloned()
            .ok_or_else(|| Error::not_found(format!("agent not found: {id}")))
    }

    /// Returns an `Agent` value copy (no lock held), suitable for API
    /// responses.
    pub fn get_snapshot(&self, id: &AgentId) -> Result<Agent> {
        let handle = self.require(id)?;
        Ok(handle.lock().expect("agent poisoned").clone())
    }

    pub fn list(&self) -> Vec<Agent> {
        self.agents
            .read()
            .expect("registry poisoned")
            .values()
            .map(|h| h.lock().expect("agent poisoned").clone())
            .collect()
    }

    pub fn record_message(&self, id: &AgentId) -> Result<()> {
        let handle = self.require(id)?;
        let mut agent = handle.lock().expect("agent poisoned");
        agent.message_count += 1;
        agent.last_active = Utc::now();
        Ok(())
    }

    pub fn record_error(&self, id: &AgentId) -> Result<()> {
        let handle = self.require(id)?;
        let mut agent = handle.lock().expect("agent poisoned");
        agent.error_count += 1;
        Ok(())
    }

    pub fn record_heartbeat(&self, id: &AgentId) -> Result<()> {
        let handle = self.require(id)?;
        let mut agent = handle.lock().expect("agent poisoned");
        agent.last_heartbeat = Some(Utc::now());
        Ok(())
    }

    /// Increment totals and update the running-mean response time.
    pub fn update_metrics(&self, id: &AgentId, tokens: u64, cost_usd: f64, response_ms: f64, success: bool) -> Result<()> {
        let handle = self.require(id)?;
        let mut agent = handle.lock().expect("agent poisoned");
        agent.metrics.record_action(tokens, cost_usd, response_ms, success);
        Ok(())
    }

    /// Returns ids whose `last_heartbeat` is set and older than `timeout_sec`.
    pub fn check_health(&self, timeout_sec: i64) -> Vec<AgentId> {
        let now = Utc::now();
        self.agents
            .read()
            .expect("registry poisoned")
            .values()
            .filter_map(|h| {
                let agent = h.lock().expect("agent poisoned");
                let hb = agent.last_heartbeat?;
                let stale = now.signed_duration_since(hb).num_seconds() > timeout_sec;
                stale.then(|| agent.id.clone())
            })
            .collect()
    }

    fn persist(&self, agent: &Agent) {
        if let Err(e) = fsutil::atomic_write_json(&self.path_for(&agent.id), agent) {
            tracing::warn!(agent_id = %agent.id, error = %e, "failed to persist agent record");
        }
    }

    pub fn save_all(&self) {
        let snapshots: Vec<Agent> = self.list();
        for agent in &snapshots {
            self.persist(agent);
        }
    }

    /// Bulk-load agent records from disk. Tolerates per-file parse failures
    /// by logging and skipping; returns the count successfully loaded.
    pub fn load(&self) -> usize {
        let entries = match fs::read_dir(&self.dir) {
            Ok(e) => e,
            Err(_) => return 0,
        };
        let mut loaded = 0;
        let mut agents = self.agents.write().expect("registry poisoned");
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let data = match fs::read_to_string(&path) {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to read agent file");
                    continue;
                }
            };
            match serde_json::from_str::<Agent>(&data) {
                Ok(agent) => {
                    agents.insert(agent.id.clone(), Arc::new(Mutex::new(agent)));
                    loaded += 1;
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "failed to parse agent file, skipping");
                }
            }
        }
        loaded
    }

    pub fn get_skill_data(&self, id: &AgentId) -> Result<Vec<Value>> {
        let handle = self.require(id)?;
        Ok(handle.lock().expect("agent poisoned").skill_data.clone())
    }

    /// Append a self-report payload, keeping only the last
    /// [`SKILL_DATA_WINDOW`] reports.
    pub fn update_skill_data(&self, id: &AgentId, report: Value) -> Result<()> {
        let handle = self.require(id)?;
        let mut agent = handle.lock().expect("agent poisoned");
        agent.skill_data.push(report);
        if agent.skill_data.len() > SKILL_DATA_WINDOW {
            let overflow = agent.skill_data.len() - SKILL_DATA_WINDOW;
            agent.skill_data.drain(0..overflow);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def() -> AgentDefinition {
        AgentDefinition {
            name: "bot".into(),
            agent_type: "chat".into(),
            model: "anthropic/claude".into(),
            system_prompt: "be helpful".into(),
            skills: vec![],
            config_map: HashMap::new(),
            genome: None,
        }
    }

    #[test]
    fn create_then_get_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let reg = AgentRegistry::new(dir.path());
        let id = AgentId::from("a1");
        reg.create(id.clone(), def()).unwrap();
        let snap = reg.get_snapshot(&id).unwrap();
        assert_eq!(snap.definition.name, "bot");
        assert_eq!(snap.status, AgentStatus::Idle);
    }

    #[test]
    fn create_duplicate_fails() {
        let dir = tempfile::tempdir().unwrap();
        let reg = AgentRegistry::new(dir.path());
        let id = AgentId::from("a1");
        reg.create(id.clone(), def()).unwrap();
        assert!(reg.create(id, def()).is_err());
    }

    /// Counters never decrease.
    #[test]
    fn counters_are_monotonic() {
        let dir = tempfile::tempdir().unwrap();
        let reg = AgentRegistry::new(dir.path());
        let id = AgentId::from("a1");
        reg.create(id.clone(), def()).unwrap();
        for _ in 0..5 {
            reg.record_message(&id).unwrap();
        }
        reg.record_error(&id).unwrap();
        let snap = reg.get_snapshot(&id).unwrap();
        assert_eq!(snap.message_count, 5);
        assert_eq!(snap.error_count, 1);
    }

    #[test]
    fn delete_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let reg = AgentRegistry::new(dir.path());
        let id = AgentId::from("a1");
        reg.create(id.clone(), def()).unwrap();
        reg.delete(&id).unwrap();
        assert!(reg.get_snapshot(&id).is_err());
        assert!(!dir.path().join("a1.json").exists());
    }

    #[test]
    fn load_tolerates_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("bad.json"), b"not json").unwrap();
        let reg = AgentRegistry::new(dir.path());
        let reg2 = AgentRegistry::new(dir.path());
        reg2.create(AgentId::from("good"), def()).unwrap();
        let loaded = reg.load();
        assert_eq!(loaded, 1);
    }

    #[test]
    fn skill_data_window_caps_at_fifty() {
        let dir = tempfile::tempdir().unwrap();
        let reg = AgentRegistry::new(dir.path());
        let id = AgentId::from("a1");
        reg.create(id.clone(), def()).unwrap();
        for i in 0..60 {
            reg.update_skill_data(&id, serde_json::json!({"n": i})).unwrap();
        }
        let data = reg.get_skill_data(&id).unwrap();
        assert_eq!(data.len(), 50);
        assert_eq!(data[0]["n"], 10);
    }

    #[test]
    fn check_health_flags_stale_heartbeats() {
        let dir = tempfile::tempdir().unwrap();
        let reg = AgentRegistry::new(dir.path());
        let id = AgentId::from("a1");
        reg.create(id.clone(), def()).unwrap();
        // No heartbeat recorded yet -> not flagged, a non-zero heartbeat is required.
        assert!(reg.check_health(0).is_empty());
        reg.record_heartbeat(&id).unwrap();
        assert!(reg.check_health(0).contains(&id) || reg.check_health(-1).contains(&id));
    }
}
