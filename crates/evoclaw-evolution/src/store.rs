//! Disk-backed cache of per-agent `Strategy` and `Genome` records.
//!
//! Mirrors `evoclaw-memory`'s `MemoryStore` shape: an `RwLock<HashMap<...>>`
//! of `Arc<Mutex<T>>` handles, loaded lazily and written back atomically.
//! The firewall's snapshot stack and circuit breaker state are
//! intentionally process-local only (not written here) — losing them on
//! restart just means one fewer rollback generation and a freshly-closed
//! breaker, not a safety regression.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, RwLock};

use evoclaw_core::fsutil;

use crate::genome::Genome;
use crate::strategy::Strategy;

type StrategyHandle = Arc<Mutex<Strategy>>;
type GenomeHandle = Arc<Mutex<Genome>>;

pub struct EvolutionStore {
    dir: PathBuf,
    strategies: RwLock<HashMap<String, StrategyHandle>>,
    genomes: RwLock<HashMap<String, GenomeHandle>>,
}

impl EvolutionStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), strategies: RwLock::new(HashMap::new()), genomes: RwLock::new(HashMap::new()) }
    }

    fn strategy_path(&self, agent_id: &str) -> PathBuf {
        self.dir.join(format!("{agent_id}-strategy.json"))
    }

    fn genome_path(&self, agent_id: &str) -> PathBuf {
        self.dir.join(format!("{agent_id}-genome.json"))
    }

    pub fn get_strategy(&self, agent_id: &str) -> StrategyHandle {
        if let Some(existing) = self.strategies.read().expect("strategy cache poisoned").get(agent_id) {
            return existing.clone();
        }
        let strategy = self.load_strategy(agent_id).unwrap_or_else(|| Strategy::new(HashMap::new()));
        let handle = Arc::new(Mutex::new(strategy));
        let mut cache = self.strategies.write().expect("strategy cache poisoned");
        cache.entry(agent_id.to_string()).or_insert(handle).clone()
    }

    pub fn get_genome(&self, agent_id: &str) -> GenomeHandle {
        if let Some(existing) = self.genomes.read().expect("genome cache poisoned").get(agent_id) {
            return existing.clone();
        }
        let genome = self.load_genome(agent_id).unwrap_or_else(|| Genome::new(agent_id));
        let handle = Arc::new(Mutex::new(genome));
        let mut cache = self.genomes.write().expect("genome cache poisoned");
        cache.entry(agent_id.to_string()).or_insert(handle).clone()
    }

    fn load_strategy(&self, agent_id: &str) -> Option<Strategy> {
        let data = fs::read_to_string(self.strategy_path(agent_id)).ok()?;
        match serde_json::from_str(&data) {
            Ok(s) => Some(s),
            Err(e) => {
                tracing::warn!(agent_id, error = %e, "failed to parse strategy file, starting fresh");
                None
            }
        }
    }

    fn load_genome(&self, agent_id: &str) -> Option<Genome> {
        let data = fs::read_to_string(self.genome_path(agent_id)).ok()?;
        match serde_json::from_str(&data) {
            Ok(g) => Some(g),
            Err(e) => {
                tracing::warn!(agent_id, error = %e, "failed to parse genome file, starting fresh");
                None
            }
        }
    }

    pub fn save_strategy(&self, agent_id: &str) {
        let handle = match self.strategies.read().expect("strategy cache poisoned").get(agent_id) {
            Some(h) => h.clone(),
            None => return,
        };
        let snapshot = handle.lock().expect("strategy record poisoned").clone();
        if let Err(e) = fsutil::atomic_write_json(&self.strategy_path(agent_id), &snapshot) {
            tracing::warn!(agent_id, error = %e, "failed to persist strategy");
        }
    }

    pub fn save_genome(&self, agent_id: &str) {
        let handle = match self.genomes.read().expect("genome cache poisoned").get(agent_id) {
            Some(h) => h.clone(),
            None => return,
        };
        let snapshot = handle.lock().expect("genome record poisoned").clone();
        if let Err(e) = fsutil::atomic_write_json(&self.genome_path(agent_id), &snapshot) {
            tracing::warn!(agent_id, error = %e, "failed to persist genome");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvolutionStore::new(dir.path());
        {
            let handle = store.get_strategy("a1");
            handle.lock().unwrap().params.insert("x".into(), 1.0);
        }
        store.save_strategy("a1");

        let store2 = EvolutionStore::new(dir.path());
        let loaded = store2.get_strategy("a1");
        assert_eq!(loaded.lock().unwrap().params.get("x"), Some(&1.0));
    }

    #[test]
    fn genome_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvolutionStore::new(dir.path());
        {
            let handle = store.get_genome("a1");
            handle.lock().unwrap().behavior.verbosity = 0.9;
        }
        store.save_genome("a1");

        let store2 = EvolutionStore::new(dir.path());
        let loaded = store2.get_genome("a1");
        assert_eq!(loaded.lock().unwrap().behavior.verbosity, 0.9);
    }

    #[test]
    fn missing_files_create_fresh_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = EvolutionStore::new(dir.path());
        let strategy = store.get_strategy("never-seen");
        assert_eq!(strategy.lock().unwrap().version, 0);
        let genome = store.get_genome("never-seen");
        assert_eq!(genome.lock().unwrap().identity, "never-seen");
    }
}
