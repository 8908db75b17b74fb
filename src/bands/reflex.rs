// src/bands/reflex.rs
//
// Reflex band (base rate): hazard sensing.
//
// Reads the observation and the current proposal, replaces the flags. Never
// touches either action; only the Shield acts on what Reflex reports.

use crate::config::ReflexConfig;
use crate::env::JointSpec;
use crate::error::{HtiError, Result};
use crate::state::{JointFlags, ReflexFlags, ReflexView};

#[derive(Debug, Clone)]
pub struct ReflexBand {
    joints: Vec<JointSpec>,
    cfg: ReflexConfig,
}

impl ReflexBand {
    pub fn new(joints: Vec<JointSpec>, cfg: ReflexConfig) -> Result<Self> {
        if let Some(j) = joints.iter().find(|j| j.min > j.max) {
            return Err(HtiError::InvalidConfig(format!(
                "joint '{}' has min ({}) > max ({})",
                j.position, j.min, j.max
            )));
        }
        Ok(Self { joints, cfg })
    }

    pub fn joints(&self) -> &[JointSpec] {
        &self.joints
    }

    /// True when the plant exposes at least one measured channel.
    pub fn has_measured_channels(&self) -> bool {
        self.joints.iter().any(|j| j.measured.is_some())
    }

    fn near(&self, distance: f64) -> bool {
        if self.cfg.limit_inclusive {
            distance <= self.cfg.limit_margin
        } else {
            distance < self.cfg.limit_margin
        }
    }

    pub fn step(&self, view: ReflexView<'_>) -> Result<()> {
        let obs = view.observation();
        let proposal = view.action_proposed();

        let mut flags = ReflexFlags {
            joints: Vec::with_capacity(self.joints.len()),
            ..Default::default()
        };
        let mut max_mismatch: Option<f64> = None;

        for (i, joint) in self.joints.iter().enumerate() {
            let pos = obs.require(&joint.position)?;
            let distance = (pos - joint.min).abs().min((joint.max - pos).abs());
            flags.joints.push(JointFlags {
                distance_to_limit: distance,
                near_limit: self.near(distance),
            });

            let fast = match (&joint.velocity, joint.velocity_limit) {
                (Some(ch), Some(limit)) => {
                    obs.require(ch)?.abs() >= self.cfg.velocity_fast_factor * limit
                }
                _ => proposal
                    .and_then(|a| a.get(i))
                    .is_some_and(|u| u.abs() > self.cfg.speed_threshold),
            };
            flags.too_fast |= fast;

            if let Some(ch) = &joint.measured {
                let gap = (pos - obs.require(ch)?).abs();
                max_mismatch = Some(max_mismatch.map_or(gap, |m| m.max(gap)));
            }
        }

        if let Some(m) = max_mismatch {
            flags.mismatch_magnitude = Some(m);
            flags.sensor_mismatch = m > self.cfg.mismatch_threshold;
        }

        view.replace_flags(flags);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, Plant};
    use crate::state::SharedTickState;
    use crate::types::{Action, Observation};

    fn point_joint() -> JointSpec {
        JointSpec {
            position: "x_true".into(),
            measured: Some("x_meas".into()),
            velocity: None,
            velocity_limit: None,
            min: 0.0,
            max: 1.0,
        }
    }

    fn point_band() -> ReflexBand {
        ReflexBand::new(
            vec![point_joint()],
            Config::for_plant(Plant::PointMass).reflex,
        )
        .unwrap()
    }

    fn point_obs(x: f64, meas: f64) -> Observation {
        Observation::new().with("x_true", x).with("x_meas", meas)
    }

    #[test]
    fn near_limit_uses_closest_bound() {
        let band = point_band();
        let mut state = SharedTickState::new(point_obs(0.95, 0.95));
        band.step(state.reflex_view()).unwrap();
        let j = state.reflex_flags().joints[0];
        assert!((j.distance_to_limit - 0.05).abs() < 1e-12);
        assert!(j.near_limit);
        assert!(!state.reflex_flags().sensor_mismatch);
    }

    #[test]
    fn margin_boundary_follows_plant_preset() {
        // x = 0.1 is exactly 0.1 from the lower limit.
        let mut state = SharedTickState::new(point_obs(0.1, 0.1));
        point_band().step(state.reflex_view()).unwrap();
        let j = state.reflex_flags().joints[0];
        assert_eq!(j.distance_to_limit, 0.1);
        assert!(!j.near_limit);

        let mut cfg = Config::for_plant(Plant::PointMass).reflex;
        cfg.limit_inclusive = true;
        let band = ReflexBand::new(vec![point_joint()], cfg).unwrap();
        band.step(state.reflex_view()).unwrap();
        assert!(state.reflex_flags().joints[0].near_limit);

        assert!(Config::for_plant(Plant::Arm).reflex.limit_inclusive);
    }

    #[test]
    fn mismatch_records_magnitude() {
        let band = point_band();
        let mut state = SharedTickState::new(point_obs(0.5, 0.8));
        band.step(state.reflex_view()).unwrap();
        let flags = state.reflex_flags();
        assert!(flags.sensor_mismatch);
        assert!((flags.mismatch_magnitude.unwrap() - 0.3).abs() < 1e-12);
    }

    #[test]
    fn proposal_speed_flags_too_fast_without_velocity_channel() {
        let band = point_band();
        let mut state = SharedTickState::new(point_obs(0.5, 0.5));
        state.control_view().propose(Action::new(vec![0.2]));
        band.step(state.reflex_view()).unwrap();
        assert!(state.reflex_flags().too_fast);
    }

    #[test]
    fn velocity_channel_flags_too_fast() {
        let joint = JointSpec {
            position: "theta1".into(),
            measured: None,
            velocity: Some("omega1".into()),
            velocity_limit: Some(4.0),
            min: -3.0,
            max: 3.0,
        };
        let band = ReflexBand::new(vec![joint], Config::for_plant(Plant::Arm).reflex).unwrap();
        let mut state =
            SharedTickState::new(Observation::new().with("theta1", 0.0).with("omega1", -2.8));
        band.step(state.reflex_view()).unwrap();
        assert!(state.reflex_flags().too_fast);
        assert!(state.reflex_flags().mismatch_magnitude.is_none());
    }

    #[test]
    fn flags_are_replaced_not_merged() {
        let band = point_band();
        let mut state = SharedTickState::new(point_obs(0.5, 0.9));
        band.step(state.reflex_view()).unwrap();
        assert!(state.reflex_flags().sensor_mismatch);

        state.replace_observation(point_obs(0.5, 0.5));
        band.step(state.reflex_view()).unwrap();
        assert!(!state.reflex_flags().sensor_mismatch);
        assert!(!state.reflex_flags().too_fast);
    }

    #[test]
    fn inverted_joint_limits_rejected() {
        let mut joint = point_joint();
        joint.min = 2.0;
        assert!(ReflexBand::new(vec![joint], Config::default().reflex).is_err());
    }
}
