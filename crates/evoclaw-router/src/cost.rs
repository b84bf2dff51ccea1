//! Per-model cost accounting.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::ModelInfo;

#[derive(Debug, Clone, Default, serde::Serialize, serde::Deserialize)]
pub struct CostRecord {
    pub total_requests: u64,
    pub total_tokens_in: u64,
    pub total_tokens_out: u64,
    pub total_cost_usd: f64,
}

#[derive(Default)]
pub struct CostTracker {
    records: Mutex<HashMap<String, CostRecord>>,
}

impl CostTracker {
    /// Update the per-model cost record atomically:
    /// `total_cost_usd += tokens_in*cost_input/1e6 + tokens_out*cost_output/1e6`.
    pub fn record(&self, info: &ModelInfo, tokens_in: u64, tokens_out: u64) {
        let mut records = self.records.lock().expect("cost tracker poisoned");
        let entry = records.entry(info.key()).or_default();
        entry.total_requests += 1;
        entry.total_tokens_in += tokens_in;
        entry.total_tokens_out += tokens_out;
        entry.total_cost_usd += tokens_in as f64 * info.cost_input_per_1m / 1e6
            + tokens_out as f64 * info.cost_output_per_1m / 1e6;
    }

    pub fn get(&self, model_id: &str) -> Option<CostRecord> {
        self.records.lock().expect("cost tracker poisoned").get(model_id).cloned()
    }

    pub fn all(&self) -> HashMap<String, CostRecord> {
        self.records.lock().expect("cost tracker poisoned").clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cost_accumulates_per_model() {
        let tracker = CostTracker::default();
        let info = ModelInfo {
            provider: "P".into(),
            id: "m".into(),
            cost_input_per_1m: 1_000_000.0,
            cost_output_per_1m: 2_000_000.0,
            context_window: 8192,
        };
        tracker.record(&info, 10, 5);
        let rec = tracker.get("P/m").unwrap();
        assert_eq!(rec.total_requests, 1);
        assert!((rec.total_cost_usd - (10.0 + 10.0)).abs() < 1e-9);
    }
}
