//! Signed genome constraints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Owner-imposed limits on what the evolution engine may let an agent do.
/// `extra` carries any additional fields a deployment wants signed alongside
/// the two well-known ones, keeping the signed payload extensible without
/// widening this struct.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenomeConstraints {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_loss_usd: Option<f64>,
    #[serde(default)]
    pub blocked_actions: Vec<String>,
    #[serde(flatten)]
    pub extra: HashMap<String, Value>,
}
