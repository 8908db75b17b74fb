// src/env/arm.rs
//
// 2-DOF planar arm, torque controlled, with a sequential waypoint task.
//
// Dynamics (unit inertia, viscous damping, semi-implicit Euler):
//   tau   <- clamp(tau, +-tau_max)
//   alpha  = tau - damping * omega
//   omega <- clamp(omega + dt * alpha, +-omega_max)
//   theta <- clamp(theta + dt * omega, [theta_min, theta_max])
//
// Damping is a fixed plant property; controllers are tuned for it.

use std::f64::consts::PI;

use serde::{Deserialize, Serialize};

use super::{
    Environment, GoalSpec, InitJitter, JointSpec, StepInfo, StepOutcome, REASON_ALL_WAYPOINTS,
    REASON_MAX_STEPS,
};
use crate::error::{HtiError, Result};
use crate::types::{Action, Observation};

/// Upper link length (m).
pub const LINK_1: f64 = 0.6;
/// Lower link length (m).
pub const LINK_2: f64 = 0.4;

pub const CH_THETA1: &str = "theta1";
pub const CH_THETA2: &str = "theta2";
pub const CH_OMEGA1: &str = "omega1";
pub const CH_OMEGA2: &str = "omega2";
pub const CH_X_EE: &str = "x_ee";
pub const CH_Y_EE: &str = "y_ee";
pub const CH_X_GOAL: &str = "x_goal";
pub const CH_Y_GOAL: &str = "y_goal";
pub const CH_STAGE: &str = "stage_index";

/// End-effector position for the given joint angles.
pub fn forward_kinematics(theta1: f64, theta2: f64) -> (f64, f64) {
    let x = LINK_1 * theta1.cos() + LINK_2 * (theta1 + theta2).cos();
    let y = LINK_1 * theta1.sin() + LINK_2 * (theta1 + theta2).sin();
    (x, y)
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArmConfig {
    pub dt: f64,
    pub damping: f64,
    pub theta_min: f64,
    pub theta_max: f64,
    pub omega_max: f64,
    pub tau_max: f64,
    /// Workspace distance at which a waypoint counts as reached.
    pub tolerance: f64,
    pub max_steps: u64,
    pub waypoints: Vec<(f64, f64)>,
}

impl Default for ArmConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            damping: 0.1,
            theta_min: -PI,
            theta_max: PI,
            omega_max: 4.0,
            tau_max: 5.0,
            tolerance: 0.03,
            max_steps: 2000,
            waypoints: vec![(0.7, 0.0), (0.4, 0.3), (0.3, -0.2)],
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ArmState {
    pub theta1: f64,
    pub theta2: f64,
    pub omega1: f64,
    pub omega2: f64,
}

pub struct ArmEnv {
    cfg: ArmConfig,
    jitter: Option<InitJitter>,
    state: ArmState,
    stage: usize,
    step_count: u64,
}

impl ArmEnv {
    pub fn new(cfg: ArmConfig) -> Self {
        Self {
            cfg,
            jitter: None,
            state: ArmState::default(),
            stage: 0,
            step_count: 0,
        }
    }

    /// Perturb both starting joint angles on each reset.
    pub fn with_jitter(mut self, jitter: InitJitter) -> Self {
        self.jitter = Some(jitter);
        self
    }

    pub fn config(&self) -> &ArmConfig {
        &self.cfg
    }

    pub fn state(&self) -> ArmState {
        self.state
    }

    pub fn stage(&self) -> usize {
        self.stage
    }

    fn current_goal(&self) -> (f64, f64) {
        // reset() guarantees a non-empty waypoint list.
        self.cfg
            .waypoints
            .get(self.stage)
            .copied()
            .unwrap_or((0.0, 0.0))
    }

    fn integrate(&mut self, tau1: f64, tau2: f64) {
        let c = &self.cfg;
        let s = self.state;
        let tau1 = tau1.clamp(-c.tau_max, c.tau_max);
        let tau2 = tau2.clamp(-c.tau_max, c.tau_max);

        let omega1 = (s.omega1 + c.dt * (tau1 - c.damping * s.omega1))
            .clamp(-c.omega_max, c.omega_max);
        let omega2 = (s.omega2 + c.dt * (tau2 - c.damping * s.omega2))
            .clamp(-c.omega_max, c.omega_max);

        self.state = ArmState {
            theta1: (s.theta1 + c.dt * omega1).clamp(c.theta_min, c.theta_max),
            theta2: (s.theta2 + c.dt * omega2).clamp(c.theta_min, c.theta_max),
            omega1,
            omega2,
        };
    }

    fn goal_distance(&self) -> f64 {
        let (x, y) = forward_kinematics(self.state.theta1, self.state.theta2);
        let (gx, gy) = self.current_goal();
        ((gx - x).powi(2) + (gy - y).powi(2)).sqrt()
    }

    fn observe(&self) -> Observation {
        let s = self.state;
        let (x_ee, y_ee) = forward_kinematics(s.theta1, s.theta2);
        let (x_goal, y_goal) = self.current_goal();
        Observation::new()
            .with(CH_THETA1, s.theta1)
            .with(CH_THETA2, s.theta2)
            .with(CH_OMEGA1, s.omega1)
            .with(CH_OMEGA2, s.omega2)
            .with(CH_X_EE, x_ee)
            .with(CH_Y_EE, y_ee)
            .with(CH_X_GOAL, x_goal)
            .with(CH_Y_GOAL, y_goal)
            .with(CH_STAGE, self.stage as f64)
    }
}

impl Environment for ArmEnv {
    fn dof(&self) -> usize {
        2
    }

    fn reset(&mut self) -> Result<Observation> {
        if self.cfg.waypoints.is_empty() {
            return Err(HtiError::InvalidConfig(
                "arm task needs at least one waypoint".to_string(),
            ));
        }
        let (lo, hi) = (self.cfg.theta_min, self.cfg.theta_max);
        let (d1, d2) = match self.jitter.as_mut() {
            Some(j) => (j.sample(), j.sample()),
            None => (0.0, 0.0),
        };
        self.state = ArmState {
            theta1: d1.clamp(lo, hi),
            theta2: d2.clamp(lo, hi),
            omega1: 0.0,
            omega2: 0.0,
        };
        self.stage = 0;
        self.step_count = 0;
        Ok(self.observe())
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome> {
        let tau1 = action.get(0).unwrap_or(0.0);
        let tau2 = action.get(1).unwrap_or(0.0);
        self.integrate(tau1, tau2);
        self.step_count += 1;

        let distance = self.goal_distance();
        let mut info = StepInfo {
            distance,
            ..Default::default()
        };

        if distance <= self.cfg.tolerance {
            if self.stage + 1 < self.cfg.waypoints.len() {
                self.stage += 1;
                info.stage_advanced = true;
            } else {
                info.success = true;
                info.reason = Some(REASON_ALL_WAYPOINTS.to_string());
                return Ok(StepOutcome {
                    observation: self.observe(),
                    done: true,
                    info,
                });
            }
        }

        let done = self.step_count >= self.cfg.max_steps;
        if done {
            info.reason = Some(REASON_MAX_STEPS.to_string());
        }
        Ok(StepOutcome {
            observation: self.observe(),
            done,
            info,
        })
    }

    fn joint_specs(&self) -> Vec<JointSpec> {
        [(CH_THETA1, CH_OMEGA1), (CH_THETA2, CH_OMEGA2)]
            .into_iter()
            .map(|(pos, vel)| JointSpec {
                position: pos.to_string(),
                measured: None,
                velocity: Some(vel.to_string()),
                velocity_limit: Some(self.cfg.omega_max),
                min: self.cfg.theta_min,
                max: self.cfg.theta_max,
            })
            .collect()
    }

    fn goal_spec(&self) -> GoalSpec {
        GoalSpec {
            actual: vec![CH_X_EE.to_string(), CH_Y_EE.to_string()],
            goal: vec![CH_X_GOAL.to_string(), CH_Y_GOAL.to_string()],
            stage: Some(CH_STAGE.to_string()),
            tolerance: self.cfg.tolerance,
        }
    }
}
