// src/policy/point.rs
//
// Proportional brain for the 1-D point mass: u = gain * (x_target - x).

use super::{Policy, PolicyMemory};
use crate::env::point_mass::{CH_X, CH_X_TARGET};
use crate::error::Result;
use crate::types::{Action, Observation};

#[derive(Debug, Clone)]
pub struct PointPolicy {
    name: String,
    gain: f64,
}

impl PointPolicy {
    pub fn new(name: impl Into<String>, gain: f64) -> Self {
        Self {
            name: name.into(),
            gain,
        }
    }

    pub fn gain(&self) -> f64 {
        self.gain
    }
}

impl Policy for PointPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&self, obs: &Observation, memory: PolicyMemory) -> Result<(Action, PolicyMemory)> {
        let x = obs.require(CH_X)?;
        let target = obs.require(CH_X_TARGET)?;
        Ok((Action::new(vec![self.gain * (target - x)]), memory))
    }
}
