//! Agent execution metrics.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metrics {
    pub total_actions: u64,
    pub successful_actions: u64,
    pub failed_actions: u64,
    pub avg_response_ms: f64,
    pub tokens_used: u64,
    pub cost_usd: f64,
    #[serde(default)]
    pub custom: HashMap<String, f64>,
}

impl Metrics {
    /// Increments totals and updates `avg_response_ms` as a running mean:
    /// `avg' = avg*(n-1)/n + sample/n` where `n = total_actions` after
    /// increment.
    pub fn record_action(&mut self, tokens: u64, cost_usd: f64, response_ms: f64, success: bool) {
        self.total_actions += 1;
        if success {
            self.successful_actions += 1;
        } else {
            self.failed_actions += 1;
        }
        self.tokens_used += tokens;
        self.cost_usd += cost_usd;
        let n = self.total_actions as f64;
        self.avg_response_ms = self.avg_response_ms * (n - 1.0) / n + response_ms / n;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn successful_plus_failed_never_exceeds_total() {
        let mut m = Metrics::default();
        m.record_action(10, 0.01, 100.0, true);
        m.record_action(20, 0.02, 200.0, false);
        assert!(m.successful_actions + m.failed_actions <= m.total_actions);
        assert_eq!(m.total_actions, 2);
    }

    #[test]
    fn running_mean_matches_simple_average_for_equal_samples() {
        let mut m = Metrics::default();
        for _ in 0..4 {
            m.record_action(0, 0.0, 100.0, true);
        }
        assert!((m.avg_response_ms - 100.0).abs() < 1e-9);
    }

    #[test]
    fn running_mean_tracks_varying_samples() {
        let mut m = Metrics::default();
        m.record_action(0, 0.0, 100.0, true);
        m.record_action(0, 0.0, 200.0, true);
        assert!((m.avg_response_ms - 150.0).abs() < 1e-9);
    }
}
