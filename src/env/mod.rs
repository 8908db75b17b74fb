// src/env/mod.rs
//
// Simulated plants driven by the band loop.
//
// An environment exposes gym-style reset/step plus two descriptors the bands
// are configured from: per-DOF joint specs (Reflex) and the goal spec
// (Semantics). Bands never hard-code channel names.

pub mod arm;
pub mod point_mass;

pub use arm::{forward_kinematics, ArmConfig, ArmEnv, LINK_1, LINK_2};
pub use point_mass::{GlitchWindow, PointMassConfig, PointMassEnv};

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::config::Plant;
use crate::error::{HtiError, Result};
use crate::types::{Action, Observation};

/// Limits and channel names for one degree of freedom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JointSpec {
    /// Channel holding the true position.
    pub position: String,
    /// Channel holding the sensed position, when the plant models a sensor.
    pub measured: Option<String>,
    /// Channel holding the velocity, when the plant has one.
    pub velocity: Option<String>,
    pub velocity_limit: Option<f64>,
    pub min: f64,
    pub max: f64,
}

/// Where the task goal lives in the observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalSpec {
    pub actual: Vec<String>,
    pub goal: Vec<String>,
    pub stage: Option<String>,
    pub tolerance: f64,
}

/// Diagnostics attached to every step.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StepInfo {
    /// Why the episode ended (`None` while running).
    pub reason: Option<String>,
    pub success: bool,
    /// Distance to the current goal after the step.
    pub distance: f64,
    /// A waypoint was reached on this step.
    pub stage_advanced: bool,
    /// The sensor glitch was active for this step.
    pub glitch_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepOutcome {
    pub observation: Observation,
    pub done: bool,
    pub info: StepInfo,
}

/// Environment termination reason for a fully achieved task.
pub const REASON_GOAL_REACHED: &str = "goal_reached";
pub const REASON_ALL_WAYPOINTS: &str = "all_waypoints_reached";
pub const REASON_MAX_STEPS: &str = "max_steps";

/// Largest accepted jitter magnitude. Starts are clipped into the plant's
/// range anyway; this keeps the sampling range finite.
pub const MAX_JITTER: f64 = 1.0e6;

/// Seeded perturbation of the initial state, drawn once per `reset()`.
///
/// A magnitude of 0.0 reproduces the nominal start exactly; the same seed
/// always yields the same sequence of episodes.
#[derive(Debug, Clone)]
pub struct InitJitter {
    seed: u64,
    magnitude: f64,
    rng: ChaCha8Rng,
}

impl InitJitter {
    /// Fails unless `0 <= magnitude <= MAX_JITTER`.
    pub fn new(seed: u64, magnitude: f64) -> Result<Self> {
        if !(0.0..=MAX_JITTER).contains(&magnitude) {
            return Err(HtiError::InvalidConfig(format!(
                "jitter magnitude ({magnitude}) must be within [0, {MAX_JITTER}]"
            )));
        }
        Ok(Self {
            seed,
            magnitude,
            rng: ChaCha8Rng::seed_from_u64(seed),
        })
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn magnitude(&self) -> f64 {
        self.magnitude
    }

    /// Uniform sample in `[-magnitude, magnitude]`.
    pub fn sample(&mut self) -> f64 {
        if self.magnitude == 0.0 {
            return 0.0;
        }
        self.rng.gen_range(-self.magnitude..=self.magnitude)
    }
}

pub trait Environment {
    /// Degrees of freedom of the action vector.
    fn dof(&self) -> usize;

    fn reset(&mut self) -> Result<Observation>;

    fn step(&mut self, action: &Action) -> Result<StepOutcome>;

    fn joint_specs(&self) -> Vec<JointSpec>;

    fn goal_spec(&self) -> GoalSpec;
}

impl<E: Environment + ?Sized> Environment for Box<E> {
    fn dof(&self) -> usize {
        (**self).dof()
    }

    fn reset(&mut self) -> Result<Observation> {
        (**self).reset()
    }

    fn step(&mut self, action: &Action) -> Result<StepOutcome> {
        (**self).step(action)
    }

    fn joint_specs(&self) -> Vec<JointSpec> {
        (**self).joint_specs()
    }

    fn goal_spec(&self) -> GoalSpec {
        (**self).goal_spec()
    }
}

/// Plant construction knobs shared by the binaries.
#[derive(Debug, Clone, Default)]
pub struct EnvOptions {
    /// Sensor glitch (point mass only; ignored for the arm).
    pub glitch: Option<GlitchWindow>,
    /// `(seed, magnitude)` for initial-state jitter.
    pub jitter: Option<(u64, f64)>,
}

/// Build the reference environment for `plant`.
///
/// Fails if the requested jitter magnitude is out of range.
pub fn build_env(plant: Plant, opts: &EnvOptions) -> Result<Box<dyn Environment>> {
    let jitter = opts
        .jitter
        .map(|(seed, mag)| InitJitter::new(seed, mag))
        .transpose()?;
    let env: Box<dyn Environment> = match plant {
        Plant::Arm => {
            let env = ArmEnv::new(ArmConfig::default());
            Box::new(match jitter {
                Some(j) => env.with_jitter(j),
                None => env,
            })
        }
        Plant::PointMass => {
            let cfg = PointMassConfig {
                glitch: opts.glitch,
                ..Default::default()
            };
            let env = PointMassEnv::new(cfg);
            Box::new(match jitter {
                Some(j) => env.with_jitter(j),
                None => env,
            })
        }
    };
    Ok(env)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn jitter_is_reproducible_per_seed() {
        let mut a = InitJitter::new(7, 0.05).unwrap();
        let mut b = InitJitter::new(7, 0.05).unwrap();
        for _ in 0..10 {
            let (x, y) = (a.sample(), b.sample());
            assert_eq!(x, y);
            assert!(x.abs() <= 0.05);
        }
    }

    #[test]
    fn zero_jitter_is_nominal() {
        let mut j = InitJitter::new(1, 0.0).unwrap();
        assert_eq!(j.sample(), 0.0);
    }

    #[test]
    fn unbounded_jitter_is_rejected() {
        for mag in [f64::INFINITY, f64::NAN, 1e308, -0.1] {
            assert!(
                matches!(InitJitter::new(0, mag), Err(HtiError::InvalidConfig(_))),
                "accepted {mag}"
            );
        }
        let mut widest = InitJitter::new(0, MAX_JITTER).unwrap();
        assert!(widest.sample().abs() <= MAX_JITTER);

        let opts = EnvOptions {
            glitch: None,
            jitter: Some((3, f64::INFINITY)),
        };
        assert!(build_env(Plant::Arm, &opts).is_err());
    }

    #[test]
    fn build_env_matches_plant_dof() {
        assert_eq!(build_env(Plant::Arm, &EnvOptions::default()).unwrap().dof(), 2);
        let opts = EnvOptions {
            glitch: Some(GlitchWindow::default()),
            jitter: None,
        };
        let env = build_env(Plant::PointMass, &opts).unwrap();
        assert_eq!(env.dof(), 1);
        assert!(env.joint_specs()[0].measured.is_some());
    }
}
