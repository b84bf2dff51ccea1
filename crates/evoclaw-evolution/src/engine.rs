//! Top-level API tying `Strategy`/`Genome` storage, the feedback/behavior
//! layer, and the firewall together.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use evoclaw_core::{AgentId, Error, Result};
use evoclaw_registry::AgentRegistry;
use serde_json::Value;
use tracing::{debug, warn};

use crate::feedback::{mutate_behavior, BehaviorMetrics, FeedbackHistory, FeedbackRecord, FeedbackType};
use crate::firewall::{verify_genome_constraints, Firewall, FirewallStatus};
use crate::fitness::{compute_fitness, FitnessMetrics};
use crate::genome::Genome;
use crate::store::EvolutionStore;
use crate::strategy::Strategy;
use crate::vfm::{evaluate_vfm, VfmResult};

/// Minimum evaluations before `should_evolve` considers a strategy warmed up.
const DEFAULT_WARM_UP: u64 = 5;
/// EMA smoothing factor for fitness updates.
const FITNESS_ALPHA: f64 = 0.3;

pub struct EvolutionEngine {
    store: EvolutionStore,
    registry: Arc<AgentRegistry>,
    firewall: Mutex<Firewall>,
    feedback: RwLock<HashMap<String, Mutex<FeedbackHistory>>>,
    warm_up: u64,
}

impl EvolutionEngine {
    pub fn new(dir: impl Into<std::path::PathBuf>, registry: Arc<AgentRegistry>) -> Self {
        let dir = dir.into();
        let snapshots_dir = dir.join("snapshots");
        Self {
            store: EvolutionStore::new(dir),
            registry,
            firewall: Mutex::new(Firewall::with_dir(snapshots_dir)),
            feedback: RwLock::new(HashMap::new()),
            warm_up: DEFAULT_WARM_UP,
        }
    }

    /// Same as [`EvolutionEngine::new`] but with an explicit snapshots
    /// directory, so callers that already track it (e.g. via
    /// [`evoclaw_core::config::EvoClawConfig::snapshots_dir`]) don't
    /// recompute it.
    pub fn with_snapshots_dir(dir: impl Into<std::path::PathBuf>, snapshots_dir: impl Into<std::path::PathBuf>, registry: Arc<AgentRegistry>) -> Self {
        Self {
            store: EvolutionStore::new(dir.into()),
            registry,
            firewall: Mutex::new(Firewall::with_dir(snapshots_dir.into())),
            feedback: RwLock::new(HashMap::new()),
            warm_up: DEFAULT_WARM_UP,
        }
    }

    fn with_feedback<R>(&self, agent_id: &str, f: impl FnOnce(&mut FeedbackHistory) -> R) -> R {
        {
            let map = self.feedback.read().expect("feedback map poisoned");
            if let Some(entry) = map.get(agent_id) {
                return f(&mut entry.lock().expect("feedback history poisoned"));
            }
        }
        let mut map = self.feedback.write().expect("feedback map poisoned");
        let entry = map.entry(agent_id.to_string()).or_insert_with(|| Mutex::new(FeedbackHistory::default()));
        f(&mut entry.lock().expect("feedback history poisoned"))
    }

    // ---- Strategy ----

    pub fn set_strategy(&self, agent_id: &str, strategy: Strategy) -> Result<()> {
        let handle = self.store.get_strategy(agent_id);
        *handle.lock().expect("strategy record poisoned") = strategy;
        self.store.save_strategy(agent_id);
        Ok(())
    }

    pub fn get_strategy(&self, agent_id: &str) -> Result<Strategy> {
        Ok(self.store.get_strategy(agent_id).lock().expect("strategy record poisoned").clone())
    }

    pub fn evaluate(&self, agent_id: &str, metrics: &FitnessMetrics) -> Result<f64> {
        let sample = compute_fitness(metrics);
        let handle = self.store.get_strategy(agent_id);
        let fitness = {
            let mut s = handle.lock().expect("strategy record poisoned");
            s.apply_fitness_sample(sample, FITNESS_ALPHA);
            s.fitness
        };
        self.store.save_strategy(agent_id);
        Ok(fitness)
    }

    pub fn mutate(&self, agent_id: &str, rate: f64) -> Result<Strategy> {
        if !self.firewall.lock().expect("firewall poisoned").allow_mutation(agent_id) {
            return Err(Error::forbidden(format!("circuit breaker open for agent {agent_id}")));
        }
        let handle = self.store.get_strategy(agent_id);
        let mutated = {
            let mut s = handle.lock().expect("strategy record poisoned");
            s.mutate(rate);
            s.clone()
        };
        self.store.save_strategy(agent_id);
        Ok(mutated)
    }

    pub fn revert(&self, agent_id: &str) -> Result<()> {
        let handle = self.store.get_strategy(agent_id);
        let reverted = handle.lock().expect("strategy record poisoned").revert();
        if !reverted {
            return Err(Error::invalid_argument(format!("no previous strategy to revert to for agent {agent_id}")));
        }
        self.store.save_strategy(agent_id);
        Ok(())
    }

    pub fn should_evolve(&self, agent_id: &str, min_fitness: f64) -> Result<bool> {
        let s = self.get_strategy(agent_id)?;
        Ok(s.fitness < min_fitness && s.eval_count >= self.warm_up)
    }

    // ---- Genome ----

    pub fn update_genome(&self, agent_id: &str, genome: Genome) -> Result<()> {
        verify_genome_constraints(&genome)?;
        if !self.firewall.lock().expect("firewall poisoned").allow_mutation(agent_id) {
            return Err(Error::forbidden(format!("circuit breaker open for agent {agent_id}")));
        }

        let handle = self.store.get_genome(agent_id);
        let previous = {
            let current = handle.lock().expect("genome record poisoned");
            current.clone()
        };
        self.firewall.lock().expect("firewall poisoned").snapshot(agent_id, &previous, "update_genome");

        *handle.lock().expect("genome record poisoned") = genome.clone();
        self.store.save_genome(agent_id);
        self.propagate_genome_to_registry(agent_id, &genome);
        Ok(())
    }

    pub fn get_genome(&self, agent_id: &str) -> Result<Genome> {
        Ok(self.store.get_genome(agent_id).lock().expect("genome record poisoned").clone())
    }

    fn propagate_genome_to_registry(&self, agent_id: &str, genome: &Genome) {
        let id = AgentId::new(agent_id);
        let agent = match self.registry.get_snapshot(&id) {
            Ok(a) => a,
            Err(e) => {
                warn!(agent_id, error = %e, "genome updated but agent not found in registry, skipping propagation");
                return;
            }
        };
        let mut definition = agent.definition;
        match serde_json::to_value(genome) {
            Ok(v) => definition.genome = Some(v),
            Err(e) => {
                warn!(agent_id, error = %e, "failed to serialize genome for registry propagation");
                return;
            }
        }
        if let Err(e) = self.registry.update(&id, definition) {
            warn!(agent_id, error = %e, "failed to propagate genome back to registry");
        }
    }

    pub fn rollback(&self, agent_id: &str) -> Result<Genome> {
        let genome = self.firewall.lock().expect("firewall poisoned").rollback(agent_id)?;
        let handle = self.store.get_genome(agent_id);
        *handle.lock().expect("genome record poisoned") = genome.clone();
        self.store.save_genome(agent_id);
        self.propagate_genome_to_registry(agent_id, &genome);
        Ok(genome)
    }

    pub fn reset_firewall(&self, agent_id: &str) {
        self.firewall.lock().expect("firewall poisoned").reset(agent_id);
    }

    pub fn get_firewall_status(&self, agent_id: &str) -> FirewallStatus {
        self.firewall.lock().expect("firewall poisoned").status(agent_id)
    }

    // ---- Per-skill ----

    pub fn evaluate_skill(&self, agent_id: &str, skill: &str, metrics: &FitnessMetrics) -> Result<f64> {
        let sample = compute_fitness(metrics);
        let handle = self.store.get_genome(agent_id);
        let fitness = {
            let mut genome = handle.lock().expect("genome record poisoned");
            let sk = genome
                .skills
                .get_mut(skill)
                .ok_or_else(|| Error::not_found(format!("skill {skill} not found for agent {agent_id}")))?;
            sk.fitness = FITNESS_ALPHA * sample + (1.0 - FITNESS_ALPHA) * sk.fitness;
            sk.eval_count += 1;
            sk.fitness
        };
        self.store.save_genome(agent_id);
        Ok(fitness)
    }

    pub fn mutate_skill(&self, agent_id: &str, skill: &str, rate: f64) -> Result<()> {
        if !self.firewall.lock().expect("firewall poisoned").allow_mutation(agent_id) {
            return Err(Error::forbidden(format!("circuit breaker open for agent {agent_id}")));
        }
        let handle = self.store.get_genome(agent_id);
        {
            let mut genome = handle.lock().expect("genome record poisoned");
            let sk = genome
                .skills
                .get_mut(skill)
                .ok_or_else(|| Error::not_found(format!("skill {skill} not found for agent {agent_id}")))?;
            sk.weight = crate::strategy::mutate_float(sk.weight, rate, 0.0, 1.0);
            sk.version += 1;
        }
        self.store.save_genome(agent_id);
        Ok(())
    }

    pub fn should_evolve_skill(&self, agent_id: &str, skill: &str, threshold: f64, min_evals: u64) -> Result<bool> {
        let genome = self.get_genome(agent_id)?;
        let sk = genome.skills.get(skill).ok_or_else(|| Error::not_found(format!("skill {skill} not found")))?;
        Ok(sk.fitness < threshold && sk.eval_count >= min_evals)
    }

    /// `weight * fitness * dependency_bonus`, where satisfied dependencies
    /// add a small bonus (more integrated skills pull more weight).
    pub fn evaluate_skill_contribution(&self, agent_id: &str, skill: &str) -> Result<f64> {
        let genome = self.get_genome(agent_id)?;
        let sk = genome.skills.get(skill).ok_or_else(|| Error::not_found(format!("skill {skill} not found")))?;
        let dependency_bonus = 1.0 + 0.1 * sk.dependencies.len() as f64;
        Ok(sk.weight * sk.fitness * dependency_bonus)
    }

    /// Normalize enabled skill weights proportional to fitness.
    pub fn optimize_skill_weights(&self, agent_id: &str) -> Result<()> {
        let handle = self.store.get_genome(agent_id);
        {
            let mut genome = handle.lock().expect("genome record poisoned");
            let total_fitness: f64 = genome.skills.values().filter(|s| s.enabled).map(|s| s.fitness).sum();
            let enabled_count = genome.skills.values().filter(|s| s.enabled).count();
            if enabled_count == 0 {
                return Ok(());
            }
            for sk in genome.skills.values_mut().filter(|s| s.enabled) {
                sk.weight = if total_fitness > 0.0 { sk.fitness / total_fitness } else { 1.0 / enabled_count as f64 };
                sk.version += 1;
            }
        }
        self.store.save_genome(agent_id);
        Ok(())
    }

    pub fn should_enable_skill(&self, agent_id: &str, skill: &str, threshold: f64) -> Result<bool> {
        let genome = self.get_genome(agent_id)?;
        let sk = genome.skills.get(skill).ok_or_else(|| Error::not_found(format!("skill {skill} not found")))?;
        Ok(!sk.enabled && sk.fitness >= threshold)
    }

    pub fn should_disable_skill(&self, agent_id: &str, skill: &str, threshold: f64) -> Result<bool> {
        let genome = self.get_genome(agent_id)?;
        let sk = genome.skills.get(skill).ok_or_else(|| Error::not_found(format!("skill {skill} not found")))?;
        Ok(sk.enabled && sk.fitness < threshold)
    }

    /// `0.6 * compute_fitness(metrics) + 0.4 * average(weight * fitness)`
    /// over enabled skills (second term is 0 with no skills).
    pub fn composition_fitness(&self, agent_id: &str, metrics: &FitnessMetrics) -> Result<f64> {
        let genome = self.get_genome(agent_id)?;
        let enabled: Vec<_> = genome.skills.values().filter(|s| s.enabled).collect();
        let skill_avg = if enabled.is_empty() {
            0.0
        } else {
            enabled.iter().map(|s| s.weight * s.fitness).sum::<f64>() / enabled.len() as f64
        };
        Ok((0.6 * compute_fitness(metrics) + 0.4 * skill_avg).clamp(0.0, 1.0))
    }

    /// Compares the fitness implied by `metrics` against the skill's last
    /// recorded fitness without mutating state.
    pub fn verify_mutation(&self, agent_id: &str, skill: &str, metrics: &FitnessMetrics) -> Result<bool> {
        let genome = self.get_genome(agent_id)?;
        let sk = genome.skills.get(skill).ok_or_else(|| Error::not_found(format!("skill {skill} not found")))?;
        Ok(compute_fitness(metrics) >= sk.fitness)
    }

    // ---- Behavioral feedback ----

    pub fn submit_feedback(&self, agent_id: &str, feedback_type: FeedbackType, score: f64, context: &str) -> Result<()> {
        let record = FeedbackRecord::new(agent_id, feedback_type, score, context)?;
        self.with_feedback(agent_id, |history| history.push(record));
        Ok(())
    }

    pub fn get_behavior_metrics(&self, agent_id: &str) -> BehaviorMetrics {
        self.with_feedback(agent_id, |history| history.metrics())
    }

    /// Raw feedback entries in submission order, oldest first.
    pub fn feedback_history(&self, agent_id: &str) -> Vec<FeedbackRecord> {
        self.with_feedback(agent_id, |history| history.entries().iter().cloned().collect())
    }

    pub fn behavioral_fitness(&self, agent_id: &str) -> f64 {
        self.with_feedback(agent_id, |history| history.behavioral_fitness())
    }

    pub fn mutate_behavior(&self, agent_id: &str, feedback_scores: &[f64]) -> Result<()> {
        let handle = self.store.get_genome(agent_id);
        {
            let mut genome = handle.lock().expect("genome record poisoned");
            mutate_behavior(&mut genome.behavior, feedback_scores);
        }
        self.store.save_genome(agent_id);
        Ok(())
    }

    // ---- Divergence / ADL ----

    pub fn divergence_score(&self, agent_id: &str) -> Result<u64> {
        Ok(self.get_strategy(agent_id)?.version)
    }

    pub fn check_adl(&self, agent_id: &str, max_divergence: u64) -> Result<bool> {
        let breach = self.divergence_score(agent_id)? > max_divergence;
        self.firewall.lock().expect("firewall poisoned").record_outcome(agent_id, !breach);
        Ok(breach)
    }

    // ---- VFM ----

    pub fn evaluate_vfm(&self, agent_id: &str, fitness_improvement: f64, cost_delta: f64, risk_delta: f64, budget: f64) -> VfmResult {
        let result = evaluate_vfm(fitness_improvement, cost_delta, risk_delta, budget);
        if !result.accepted {
            debug!(score = result.score, budget, "vfm rejected mutation");
        }
        self.firewall.lock().expect("firewall poisoned").record_outcome(agent_id, result.accepted);
        result
    }
}
