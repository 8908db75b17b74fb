// src/env/point_mass.rs
//
// 1-D point mass on [0, 1] with delta-position actuation:
//
//   x_next = clip(x + u, 0, 1)
//
// Optionally injects a deterministic sensor glitch: for steps whose tick
// counter lies in `[start, end)`, the measured channel reads
// `clip(x + magnitude)` while the true channel stays exact.

use serde::{Deserialize, Serialize};

use super::{
    Environment, GoalSpec, InitJitter, JointSpec, StepInfo, StepOutcome, REASON_GOAL_REACHED,
    REASON_MAX_STEPS,
};
use crate::error::{HtiError, Result};
use crate::types::{Action, Observation};

pub const CH_X: &str = "x";
pub const CH_X_TRUE: &str = "x_true";
pub const CH_X_MEAS: &str = "x_meas";
pub const CH_X_TARGET: &str = "x_target";

/// Half-open tick window `[start, end)` with a fixed sensor offset.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GlitchWindow {
    pub start: u64,
    pub end: u64,
    pub magnitude: f64,
}

impl Default for GlitchWindow {
    /// Early enough to land inside a nominal episode (~30 ticks to converge).
    fn default() -> Self {
        Self {
            start: 10,
            end: 20,
            magnitude: 0.3,
        }
    }
}

impl GlitchWindow {
    pub fn contains(&self, tick: u64) -> bool {
        self.start <= tick && tick < self.end
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointMassConfig {
    pub x0: f64,
    pub x_target: f64,
    /// Strict distance below which the episode succeeds.
    pub success_threshold: f64,
    pub max_steps: u64,
    pub glitch: Option<GlitchWindow>,
}

impl Default for PointMassConfig {
    fn default() -> Self {
        Self {
            x0: 0.1,
            x_target: 0.8,
            success_threshold: 0.02,
            max_steps: 2000,
            glitch: None,
        }
    }
}

impl PointMassConfig {
    pub fn with_glitch(mut self, glitch: GlitchWindow) -> Self {
        self.glitch = Some(glitch);
        self
    }
}

pub struct PointMassEnv {
    cfg: PointMassConfig,
    jitter: Option<InitJitter>,
    x: f64,
    step_count: u64,
    current_tick: u64,
}

impl PointMassEnv {
    pub fn new(cfg: PointMassConfig) -> Self {
        Self {
            x: cfg.x0,
            cfg,
            jitter: None,
            step_count: 0,
            current_tick: 0,
        }
    }

    /// Perturb `x0` on each reset (result is clipped into [0, 1]).
    pub fn with_jitter(mut self, jitter: InitJitter) -> Self {
        self.jitter = Some(jitter);
        self
    }

    pub fn config(&self) -> &PointMassConfig {
        &self.cfg
    }

    /// True position.
    pub fn x(&self) -> f64 {
        self.x
    }

    fn glitch_active(&self) -> bool {
        self.cfg
            .glitch
            .is_some_and(|g| g.contains(self.current_tick))
    }

    fn observe(&self) -> Observation {
        let x_meas = match self.cfg.glitch {
            Some(g) if g.contains(self.current_tick) => (self.x + g.magnitude).clamp(0.0, 1.0),
            _ => self.x,
        };
        Observation::new()
            .with(CH_X, self.x)
            .with(CH_X_TRUE, self.x)
            .with(CH_X_MEAS, x_meas)
            .with(CH_X_TARGET, self.cfg.x_target)
    }
}

impl Environment for PointMassEnv {
    fn dof(&self) -> usize {
        1
    }

    fn reset(&mut self) -> Result<Observation> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !in_unit(self.cfg.x0) {
            return Err(HtiError::InvalidConfig(format!(
                "x0 ({}) must be within [0, 1]",
                self.cfg.x0
            )));
        }
        if !in_unit(self.cfg.x_target) {
            return Err(HtiError::InvalidConfig(format!(
                "x_target ({}) must be within [0, 1]",
                self.cfg.x_target
            )));
        }
        let offset = self.jitter.as_mut().map_or(0.0, InitJitter::sample);
        self.x = (self.cfg.x0 + offset).clamp(0.0, 1.0);
        self.step_count = 0;
        self.current_tick = 0;
        Ok(self.observe())
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome> {
        let u = action.get(0).unwrap_or(0.0);
        self.x = (self.x + u).clamp(0.0, 1.0);
        self.step_count += 1;
        self.current_tick += 1;

        let distance = (self.x - self.cfg.x_target).abs();
        let success = distance < self.cfg.success_threshold;
        let reason = if success {
            Some(REASON_GOAL_REACHED.to_string())
        } else if self.step_count >= self.cfg.max_steps {
            Some(REASON_MAX_STEPS.to_string())
        } else {
            None
        };

        Ok(StepOutcome {
            observation: self.observe(),
            done: reason.is_some(),
            info: StepInfo {
                reason,
                success,
                distance,
                stage_advanced: false,
                glitch_active: self.glitch_active(),
            },
        })
    }

    fn joint_specs(&self) -> Vec<JointSpec> {
        vec![JointSpec {
            position: CH_X_TRUE.to_string(),
            measured: Some(CH_X_MEAS.to_string()),
            velocity: None,
            velocity_limit: None,
            min: 0.0,
            max: 1.0,
        }]
    }

    fn goal_spec(&self) -> GoalSpec {
        GoalSpec {
            actual: vec![CH_X.to_string()],
            goal: vec![CH_X_TARGET.to_string()],
            stage: None,
            tolerance: 0.05,
        }
    }
}
