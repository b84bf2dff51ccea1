//! `Strategy` and its single-level mutate/revert history.

use std::collections::HashMap;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Strategy {
    pub params: HashMap<String, f64>,
    pub fitness: f64,
    pub version: u64,
    pub eval_count: u64,
    #[serde(default)]
    pub previous: Option<Box<Strategy>>,
}

impl Strategy {
    pub fn new(params: HashMap<String, f64>) -> Self {
        Self { params, fitness: 0.0, version: 0, eval_count: 0, previous: None }
    }

    /// `f' = alpha*sample + (1-alpha)*f_prev`.
    pub fn apply_fitness_sample(&mut self, sample: f64, alpha: f64) {
        self.fitness = alpha * sample + (1.0 - alpha) * self.fitness;
        self.eval_count += 1;
    }

    /// Clones the current strategy into `previous`, perturbs every float
    /// parameter with bounded Gaussian noise, and bumps `version`.
    pub fn mutate(&mut self, rate: f64) {
        let previous = self.clone();
        for value in self.params.values_mut() {
            *value = mutate_float(*value, rate, 0.0, 1.0);
        }
        self.previous = Some(Box::new(previous));
        self.version += 1;
    }

    /// Restores `previous` if present; no-op otherwise.
    pub fn revert(&mut self) -> bool {
        if let Some(previous) = self.previous.take() {
            *self = *previous;
            true
        } else {
            false
        }
    }
}

/// Bounded Gaussian perturbation via a Box-Muller transform, clamped to
/// `[low, high]`.
pub fn mutate_float(v: f64, rate: f64, low: f64, high: f64) -> f64 {
    let mut rng = rand::thread_rng();
    let u1: f64 = rng.gen_range(f64::EPSILON..1.0);
    let u2: f64 = rng.gen_range(0.0..1.0);
    let gaussian = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
    (v + gaussian * rate).clamp(low, high)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mutate_float_stays_within_bounds() {
        for _ in 0..1000 {
            let out = mutate_float(0.5, 0.3, 0.0, 1.0);
            assert!((0.0..=1.0).contains(&out));
        }
    }

    #[test]
    fn revert_round_trips_params_and_version() {
        let mut s = Strategy::new(HashMap::from([("a".to_string(), 0.5)]));
        let pre_params = s.params.clone();
        let pre_version = s.version;

        s.mutate(0.2);
        assert_eq!(s.version, pre_version + 1);

        assert!(s.revert());
        assert_eq!(s.params, pre_params);
        assert_eq!(s.version, pre_version);
    }

    #[test]
    fn revert_without_history_is_a_no_op() {
        let mut s = Strategy::new(HashMap::new());
        assert!(!s.revert());
    }

    #[test]
    fn apply_fitness_sample_increments_eval_count() {
        let mut s = Strategy::new(HashMap::new());
        s.apply_fitness_sample(0.8, 0.5);
        assert_eq!(s.eval_count, 1);
        assert!((s.fitness - 0.4).abs() < 1e-9);
    }
}
