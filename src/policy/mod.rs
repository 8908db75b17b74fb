// src/policy/mod.rs
//
// Pluggable control policies ("brains").
//
// A policy maps an observation to a raw proposed action. It may be mistuned
// or aggressive: nothing it returns reaches the plant without passing the
// Safety Shield. Policies are stateless values; any per-episode memory lives
// in `PolicyMemory`, which the Control band owns and threads through `step`.
//
// Design:
// - Policy trait: the seam the Control band is built around
// - PolicyMemory: opaque key/value scratch space, reset every episode
// - arm / point: reference laws for the two plants
// - registry: static name -> constructor table per plant

pub mod arm;
pub mod kinematics;
pub mod point;
pub mod registry;

pub use arm::{ArmLaw, ArmPolicy};
pub use point::PointPolicy;
pub use registry::{available_policies, create_policy, default_policy, PolicyGains};

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Action, Observation};

/// Per-episode policy scratch state, owned by the Control band.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolicyMemory(BTreeMap<String, f64>);

impl PolicyMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<f64> {
        self.0.get(key).copied()
    }

    pub fn set(&mut self, key: &str, value: f64) {
        self.0.insert(key.to_string(), value);
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }
}

/// Trait all brains implement.
pub trait Policy: Send + Sync {
    /// Registry name, also used as the audit `policy_id`.
    fn name(&self) -> &str;

    /// Compute a raw action. Same observation and memory give the same result.
    ///
    /// Fails only if the observation lacks a channel the law needs.
    fn step(&self, obs: &Observation, memory: PolicyMemory) -> Result<(Action, PolicyMemory)>;
}
