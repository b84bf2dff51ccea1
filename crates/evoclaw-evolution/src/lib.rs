//! Strategy/genome evolution, behavioral feedback, and the snapshot +
//! circuit-breaker firewall that gates every mutation.

mod engine;
mod feedback;
mod firewall;
mod fitness;
mod genome;
mod store;
mod strategy;
mod vfm;

pub use engine::EvolutionEngine;
pub use feedback::{BehaviorMetrics, FeedbackHistory, FeedbackRecord, FeedbackType, MAX_FEEDBACK_ENTRIES};
pub use firewall::{verify_genome_constraints, BreakerState, Firewall, FirewallStatus, Snapshot};
pub use fitness::{compute_fitness, FitnessMetrics};
pub use genome::{Behavior, Genome, SkillGenome};
pub use store::EvolutionStore;
pub use strategy::{mutate_float, Strategy};
pub use vfm::{evaluate_vfm, VfmResult};
