//! `Genome` and `SkillGenome`.

use std::collections::HashMap;

use evoclaw_security::GenomeConstraints;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Behavior weights the firewall's behavioral-feedback path tunes
/// . Each field is clamped to `[0,1]`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Behavior {
    pub risk_tolerance: f64,
    pub verbosity: f64,
    pub autonomy: f64,
}

impl Default for Behavior {
    fn default() -> Self {
        Self { risk_tolerance: 0.5, verbosity: 0.5, autonomy: 0.5 }
    }
}

/// A named unit of a genome with its own parameters, weight, fitness, and
/// version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillGenome {
    pub enabled: bool,
    pub weight: f64,
    pub fitness: f64,
    #[serde(default)]
    pub params: HashMap<String, Value>,
    pub version: u64,
    pub eval_count: u64,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

impl SkillGenome {
    pub fn new(dependencies: Vec<String>) -> Self {
        Self {
            enabled: true,
            weight: 1.0,
            fitness: 0.0,
            params: HashMap::new(),
            version: 0,
            eval_count: 0,
            dependencies,
        }
    }

    /// Replace `params`, incrementing `version`.
    pub fn set_params(&mut self, params: HashMap<String, Value>) {
        self.params = params;
        self.version += 1;
    }
}

/// The mutable behavioral configuration for one agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Genome {
    pub identity: String,
    #[serde(default)]
    pub skills: HashMap<String, SkillGenome>,
    #[serde(default)]
    pub behavior: Behavior,
    #[serde(default)]
    pub constraints: GenomeConstraints,
    #[serde(default)]
    pub constraint_signature: Option<String>,
    #[serde(default)]
    pub owner_public_key: Option<String>,
}

impl Genome {
    pub fn new(identity: impl Into<String>) -> Self {
        Self {
            identity: identity.into(),
            skills: HashMap::new(),
            behavior: Behavior::default(),
            constraints: GenomeConstraints::default(),
            constraint_signature: None,
            owner_public_key: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn set_params_bumps_version() {
        let mut s = SkillGenome::new(vec![]);
        assert_eq!(s.version, 0);
        s.set_params(HashMap::from([("k".to_string(), Value::Bool(true))]));
        assert_eq!(s.version, 1);
        s.set_params(HashMap::new());
        assert_eq!(s.version, 2);
    }
}
