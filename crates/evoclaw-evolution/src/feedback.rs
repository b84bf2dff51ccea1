//! Behavioral feedback ingestion and the metrics/fitness derived from it.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use evoclaw_core::{Error, Result};
use serde::{Deserialize, Serialize};

use crate::genome::Behavior;
use crate::strategy::mutate_float;

/// Bounded ring buffer capacity.
pub const MAX_FEEDBACK_ENTRIES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FeedbackType {
    Approval,
    Correction,
    Engagement,
    Dismissal,
    Completion,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub agent_id: String,
    #[serde(rename = "type")]
    pub feedback_type: FeedbackType,
    pub score: f64,
    pub context: String,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    /// `score` must lie in `[-1, 1]`.
    pub fn new(agent_id: impl Into<String>, feedback_type: FeedbackType, score: f64, context: impl Into<String>) -> Result<Self> {
        if !(-1.0..=1.0).contains(&score) {
            return Err(Error::invalid_argument(format!("feedback score out of range [-1,1]: {score}")));
        }
        Ok(Self { agent_id: agent_id.into(), feedback_type, score, context: context.into(), timestamp: Utc::now() })
    }
}

/// Derived, always-available view over a feedback history.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BehaviorMetrics {
    pub approval_rate: f64,
    pub task_completion_rate: f64,
    pub cost_efficiency: f64,
    pub engagement_score: f64,
}

/// A capped append-only history of feedback for one agent.
#[derive(Debug, Clone, Default)]
pub struct FeedbackHistory {
    entries: VecDeque<FeedbackRecord>,
}

impl FeedbackHistory {
    pub fn push(&mut self, record: FeedbackRecord) {
        if self.entries.len() >= MAX_FEEDBACK_ENTRIES {
            self.entries.pop_front();
        }
        self.entries.push_back(record);
    }

    pub fn entries(&self) -> &VecDeque<FeedbackRecord> {
        &self.entries
    }

    /// Defaults to a neutral 0.5 across the board when there is no data yet,
    /// so callers never have to special-case an empty history.
    pub fn metrics(&self) -> BehaviorMetrics {
        if self.entries.is_empty() {
            return BehaviorMetrics { approval_rate: 0.5, task_completion_rate: 0.5, cost_efficiency: 0.5, engagement_score: 0.5 };
        }

        let approvals: Vec<&FeedbackRecord> = self.entries.iter().filter(|r| r.feedback_type == FeedbackType::Approval).collect();
        let approval_rate = if approvals.is_empty() { 0.5 } else { approvals.iter().filter(|r| r.score > 0.0).count() as f64 / approvals.len() as f64 };

        let completions: Vec<&FeedbackRecord> = self.entries.iter().filter(|r| r.feedback_type == FeedbackType::Completion).collect();
        let task_completion_rate = if completions.is_empty() { 0.5 } else { completions.iter().filter(|r| r.score > 0.0).count() as f64 / completions.len() as f64 };

        let dismissals = self.entries.iter().filter(|r| r.feedback_type == FeedbackType::Dismissal).count();
        let engagement_score = (1.0 - dismissals as f64 / self.entries.len() as f64).clamp(0.0, 1.0);

        let avg_score = self.entries.iter().map(|r| r.score).sum::<f64>() / self.entries.len() as f64;
        let cost_efficiency = ((avg_score + 1.0) / 2.0).clamp(0.0, 1.0);

        BehaviorMetrics { approval_rate, task_completion_rate, cost_efficiency, engagement_score }
    }

    /// Weighted combination of the derived metrics.
    pub fn behavioral_fitness(&self) -> f64 {
        let m = self.metrics();
        (0.35 * m.approval_rate + 0.35 * m.task_completion_rate + 0.15 * m.cost_efficiency + 0.15 * m.engagement_score).clamp(0.0, 1.0)
    }
}

/// Nudge `risk_tolerance`/`verbosity`/`autonomy` toward the signal implied by
/// recent feedback scores, each clamped to `[0,1]`.
pub fn mutate_behavior(behavior: &mut Behavior, feedback_scores: &[f64]) {
    if feedback_scores.is_empty() {
        return;
    }
    let avg = feedback_scores.iter().sum::<f64>() / feedback_scores.len() as f64;
    let rate = avg.abs() * 0.1;
    let direction = avg.signum();
    behavior.risk_tolerance = mutate_float(behavior.risk_tolerance + direction * rate, 0.0, 0.0, 1.0);
    behavior.verbosity = mutate_float(behavior.verbosity - direction * rate * 0.5, 0.0, 0.0, 1.0);
    behavior.autonomy = mutate_float(behavior.autonomy + direction * rate, 0.0, 0.0, 1.0);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_score_out_of_range() {
        assert!(FeedbackRecord::new("a1", FeedbackType::Approval, 1.5, "x").is_err());
        assert!(FeedbackRecord::new("a1", FeedbackType::Approval, -1.5, "x").is_err());
    }

    #[test]
    fn empty_history_has_neutral_defaults() {
        let h = FeedbackHistory::default();
        let m = h.metrics();
        assert_eq!(m.approval_rate, 0.5);
    }

    #[test]
    fn ring_buffer_caps_at_max_entries() {
        let mut h = FeedbackHistory::default();
        for i in 0..(MAX_FEEDBACK_ENTRIES + 10) {
            h.push(FeedbackRecord::new("a1", FeedbackType::Engagement, 0.1, format!("e{i}")).unwrap());
        }
        assert_eq!(h.entries().len(), MAX_FEEDBACK_ENTRIES);
        assert_eq!(h.entries().front().unwrap().context, "e10");
    }

    #[test]
    fn positive_feedback_increases_autonomy() {
        let mut b = Behavior { risk_tolerance: 0.5, verbosity: 0.5, autonomy: 0.5 };
        mutate_behavior(&mut b, &[0.8, 0.9]);
        assert!(b.autonomy > 0.5);
    }

    #[test]
    fn negative_feedback_decreases_autonomy() {
        let mut b = Behavior { risk_tolerance: 0.5, verbosity: 0.5, autonomy: 0.5 };
        mutate_behavior(&mut b, &[-0.8, -0.9]);
        assert!(b.autonomy < 0.5);
    }
}
