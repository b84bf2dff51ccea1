//! Scalar fitness from execution metrics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Inputs to [`compute_fitness`]. `response_time_ms` and `cost_efficiency`
/// are raw samples; `custom` carries any additional named signals a caller
/// wants folded in.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FitnessMetrics {
    pub success_rate: f64,
    pub response_time_ms: f64,
    pub cost_efficiency: f64,
    #[serde(default)]
    pub custom: HashMap<String, f64>,
}

/// Response time above which the normalized penalty saturates toward 1.0.
/// 2s matches the router's typical provider round-trip.
const RESPONSE_TIME_BASELINE_MS: f64 = 2000.0;

/// `0.4*success_rate + 0.3*(1 - normalized_response_time) +
/// 0.2*cost_efficiency + 0.1*custom_avg`, clamped to `[0,1]` (weights are an
/// implementer's choice, recorded in DESIGN.md).
pub fn compute_fitness(metrics: &FitnessMetrics) -> f64 {
    let normalized_response_time =
        (metrics.response_time_ms / (metrics.response_time_ms + RESPONSE_TIME_BASELINE_MS)).clamp(0.0, 1.0);
    let custom_avg = if metrics.custom.is_empty() {
        0.0
    } else {
        metrics.custom.values().sum::<f64>() / metrics.custom.len() as f64
    };

    let score = 0.4 * metrics.success_rate
        + 0.3 * (1.0 - normalized_response_time)
        + 0.2 * metrics.cost_efficiency
        + 0.1 * custom_avg;
    score.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_inputs_yield_top_fitness() {
        let m = FitnessMetrics { success_rate: 1.0, response_time_ms: 0.0, cost_efficiency: 1.0, custom: HashMap::new() };
        assert!((compute_fitness(&m) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn worst_inputs_yield_low_fitness() {
        let m = FitnessMetrics { success_rate: 0.0, response_time_ms: 1_000_000.0, cost_efficiency: 0.0, custom: HashMap::new() };
        assert!(compute_fitness(&m) < 0.05);
    }

    #[test]
    fn custom_signals_are_folded_in() {
        let base = FitnessMetrics { success_rate: 0.5, response_time_ms: 200.0, cost_efficiency: 0.5, custom: HashMap::new() };
        let mut with_custom = base.clone();
        with_custom.custom.insert("user_rating".into(), 1.0);
        assert!(compute_fitness(&with_custom) > compute_fitness(&base));
    }
}
