// src/policy/arm.rs
//
// Joint-space brains for the 2-link arm.
//
// Every variant solves IK for the current workspace waypoint and then applies
// a P or PD law per joint:
//
//   P:  tau = gain * (theta* - theta)
//   PD: tau = kp * (theta* - theta) - kd * omega
//
// The variants differ only in gains. Mistuned gains are expected; the Shield
// keeps the applied torque in bounds regardless.

use serde::{Deserialize, Serialize};

use super::kinematics::inverse_kinematics;
use super::{Policy, PolicyMemory};
use crate::env::arm::{CH_OMEGA1, CH_OMEGA2, CH_THETA1, CH_THETA2, CH_X_GOAL, CH_Y_GOAL};
use crate::env::{LINK_1, LINK_2};
use crate::error::Result;
use crate::types::{Action, Observation};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "law", rename_all = "snake_case")]
pub enum ArmLaw {
    P { gain: f64 },
    Pd { kp: f64, kd: f64 },
}

#[derive(Debug, Clone)]
pub struct ArmPolicy {
    name: String,
    law: ArmLaw,
    l1: f64,
    l2: f64,
}

impl ArmPolicy {
    pub fn new(name: impl Into<String>, law: ArmLaw) -> Self {
        Self {
            name: name.into(),
            law,
            l1: LINK_1,
            l2: LINK_2,
        }
    }

    pub fn law(&self) -> ArmLaw {
        self.law
    }

    /// Desired joint angles for the current goal.
    pub fn target_angles(&self, obs: &Observation) -> Result<(f64, f64)> {
        let x_goal = obs.require(CH_X_GOAL)?;
        let y_goal = obs.require(CH_Y_GOAL)?;
        Ok(inverse_kinematics(x_goal, y_goal, self.l1, self.l2))
    }
}

impl Policy for ArmPolicy {
    fn name(&self) -> &str {
        &self.name
    }

    fn step(&self, obs: &Observation, memory: PolicyMemory) -> Result<(Action, PolicyMemory)> {
        let theta = [obs.require(CH_THETA1)?, obs.require(CH_THETA2)?];
        let (t1, t2) = self.target_angles(obs)?;
        let target = [t1, t2];

        let torques: Vec<f64> = match self.law {
            ArmLaw::P { gain } => (0..2).map(|i| gain * (target[i] - theta[i])).collect(),
            ArmLaw::Pd { kp, kd } => {
                let omega = [obs.require(CH_OMEGA1)?, obs.require(CH_OMEGA2)?];
                (0..2)
                    .map(|i| kp * (target[i] - theta[i]) - kd * omega[i])
                    .collect()
            }
        };
        Ok((Action::new(torques), memory))
    }
}
