// src/bands/shield.rs
//
// Safety Shield: the last writer before the environment step and the only
// authority over the applied action.
//
// Precedence, highest first:
//   1. sensor mismatch  -> neutral action, always audited
//   2. hazard flag      -> clip to the tightened envelope
//   3. otherwise        -> clip to the nominal envelope
//
// Malformed proposals (absent, wrong arity, non-finite components) are
// repaired with the neutral value and always audited.

use std::collections::BTreeMap;

use serde_json::{json, Value};

use crate::config::ShieldConfig;
use crate::error::{HtiError, Result};
use crate::event_log::{EventPack, InterventionReason, SHIELD_BAND};
use crate::state::{ReflexFlags, ShieldView};
use crate::types::Action;

#[derive(Debug, Clone)]
pub struct SafetyShield {
    cfg: ShieldConfig,
    dof: usize,
    neutral: f64,
}

impl SafetyShield {
    pub fn new(cfg: ShieldConfig, dof: usize) -> Result<Self> {
        cfg.validate()?;
        if dof == 0 {
            return Err(HtiError::InvalidConfig(
                "shield needs at least one degree of freedom".to_string(),
            ));
        }
        let neutral = 0.0_f64.clamp(cfg.u_min, cfg.u_max);
        Ok(Self { cfg, dof, neutral })
    }

    pub fn config(&self) -> &ShieldConfig {
        &self.cfg
    }

    pub fn dof(&self) -> usize {
        self.dof
    }

    /// Per-component neutral value: zero, moved into `[u_min, u_max]` if needed.
    pub fn neutral(&self) -> f64 {
        self.neutral
    }

    pub fn neutral_action(&self) -> Action {
        Action::new(vec![self.neutral; self.dof])
    }

    /// `[lo, hi]` for the current flags, plus the effective scale.
    ///
    /// The tightened envelope shrinks toward the neutral value, so it always
    /// contains it and always sits inside the nominal one.
    pub fn envelope(&self, flags: &ReflexFlags) -> (f64, f64, f64) {
        let n = self.neutral;
        if flags.hazard() {
            let s = self.cfg.hazard_scale;
            (
                n + s * (self.cfg.u_min - n),
                n + s * (self.cfg.u_max - n),
                s,
            )
        } else {
            (self.cfg.u_min, self.cfg.u_max, 1.0)
        }
    }

    pub fn apply(&self, mut view: ShieldView<'_>) -> Option<EventPack> {
        let flags = view.reflex_flags().clone();
        let proposal = view.action_proposed().cloned();
        let proposal_absent = proposal.is_none();
        let proposed: Vec<f64> = proposal.map(Action::into_vec).unwrap_or_default();
        let malformed = proposal_absent
            || proposed.len() != self.dof
            || proposed.iter().any(|v| !v.is_finite());

        let (final_action, reason, scale) = if flags.sensor_mismatch {
            (
                vec![self.neutral; self.dof],
                Some(InterventionReason::StopSensorMismatch),
                0.0,
            )
        } else {
            let (lo, hi, scale) = self.envelope(&flags);
            let mut deviated = false;
            let final_action: Vec<f64> = (0..self.dof)
                .map(|i| match proposed.get(i) {
                    Some(&v) if v.is_finite() => {
                        let clipped = v.clamp(lo, hi);
                        deviated |= (clipped - v).abs() > self.cfg.epsilon;
                        clipped
                    }
                    _ => self.neutral,
                })
                .collect();
            let reason = (deviated || malformed).then_some(if flags.hazard() {
                InterventionReason::ClipNearBoundary
            } else {
                InterventionReason::ClipOutOfBounds
            });
            (final_action, reason, scale)
        };

        let pack = reason.map(|reason| {
            let mut metadata = flag_metadata(&flags);
            metadata.insert("scale_factor".into(), json!(scale));
            metadata.insert("proposal_absent".into(), json!(proposal_absent));
            metadata.insert("proposal_malformed".into(), json!(malformed));
            metadata.insert(
                "policy_id".into(),
                view.active_policy().map_or(Value::Null, |p| json!(p)),
            );
            EventPack {
                timestamp: view.t(),
                tick: view.tick(),
                band: SHIELD_BAND.to_string(),
                obs_before: view.observation().clone(),
                action_proposed: proposed,
                action_final: final_action.clone(),
                reason,
                metadata,
            }
        });

        if pack.is_some() {
            view.record_intervention();
        }
        view.commit_final(Action::new(final_action));
        pack
    }
}

fn flag_metadata(flags: &ReflexFlags) -> BTreeMap<String, Value> {
    let mut m = BTreeMap::new();
    for (i, j) in flags.joints.iter().enumerate() {
        m.insert(format!("joint{}_near_limit", i + 1), json!(j.near_limit));
        m.insert(
            format!("joint{}_distance_to_limit", i + 1),
            json!(j.distance_to_limit),
        );
    }
    m.insert("too_fast".into(), json!(flags.too_fast));
    m.insert("sensor_mismatch".into(), json!(flags.sensor_mismatch));
    m.insert(
        "mismatch_magnitude".into(),
        flags.mismatch_magnitude.map_or(Value::Null, |v| json!(v)),
    );
    m
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{JointFlags, SharedTickState};
    use crate::types::Observation;

    fn shield(limit: f64, dof: usize) -> SafetyShield {
        SafetyShield::new(ShieldConfig::symmetric(limit), dof).unwrap()
    }

    fn run(
        shield: &SafetyShield,
        proposal: Option<Vec<f64>>,
        flags: ReflexFlags,
    ) -> (SharedTickState, Option<EventPack>) {
        let mut state = SharedTickState::new(Observation::new().with("x", 0.5));
        if let Some(p) = proposal {
            state.control_view().propose(Action::new(p));
        }
        state.reflex_view().replace_flags(flags);
        let pack = shield.apply(state.shield_view());
        (state, pack)
    }

    fn near_limit() -> ReflexFlags {
        ReflexFlags {
            joints: vec![JointFlags {
                distance_to_limit: 0.05,
                near_limit: true,
            }],
            ..Default::default()
        }
    }

    #[test]
    fn in_bounds_passes_through_silently() {
        let s = shield(0.05, 1);
        let (state, pack) = run(&s, Some(vec![0.03]), ReflexFlags::default());
        assert!(pack.is_none());
        assert_eq!(state.action_final(), Some(&Action::new(vec![0.03])));
        assert_eq!(state.shield_interventions(), 0);
    }

    #[test]
    fn out_of_bounds_is_clipped_and_audited() {
        let s = shield(0.05, 1);
        let (state, pack) = run(&s, Some(vec![0.21]), ReflexFlags::default());
        let pack = pack.unwrap();
        assert_eq!(pack.reason, InterventionReason::ClipOutOfBounds);
        assert_eq!(pack.action_proposed, vec![0.21]);
        assert_eq!(pack.action_final, vec![0.05]);
        assert_eq!(pack.band, SHIELD_BAND);
        assert_eq!(state.shield_interventions(), 1);
    }

    #[test]
    fn hazard_tightens_envelope_by_half() {
        let s = shield(0.05, 1);
        let (state, pack) = run(&s, Some(vec![0.04]), near_limit());
        let pack = pack.unwrap();
        assert_eq!(pack.reason, InterventionReason::ClipNearBoundary);
        assert!((state.action_final().unwrap().as_slice()[0] - 0.025).abs() < 1e-12);
        assert_eq!(pack.metadata["scale_factor"], json!(0.5));
        assert_eq!(pack.metadata["joint1_near_limit"], json!(true));
    }

    #[test]
    fn hazard_within_tight_envelope_is_silent() {
        let s = shield(0.05, 1);
        let (_, pack) = run(&s, Some(vec![0.01]), near_limit());
        assert!(pack.is_none());
    }

    #[test]
    fn mismatch_overrides_everything() {
        let s = shield(0.05, 1);
        let flags = ReflexFlags {
            sensor_mismatch: true,
            mismatch_magnitude: Some(0.3),
            ..near_limit()
        };
        let (state, pack) = run(&s, Some(vec![0.21]), flags);
        let pack = pack.unwrap();
        assert_eq!(pack.reason, InterventionReason::StopSensorMismatch);
        assert_eq!(state.action_final(), Some(&Action::new(vec![0.0])));
        assert_eq!(pack.metadata["mismatch_magnitude"], json!(0.3));
    }

    #[test]
    fn mismatch_with_neutral_proposal_still_audited() {
        let s = shield(0.05, 1);
        let flags = ReflexFlags {
            sensor_mismatch: true,
            ..Default::default()
        };
        let (state, pack) = run(&s, Some(vec![0.0]), flags);
        assert!(pack.is_some());
        assert_eq!(state.shield_interventions(), 1);
    }

    #[test]
    fn mismatch_still_reports_malformed_proposal() {
        let s = shield(5.0, 2);
        let flags = ReflexFlags {
            sensor_mismatch: true,
            ..Default::default()
        };
        for proposal in [Some(vec![f64::NAN, 1.0]), Some(vec![1.0]), None] {
            let absent = proposal.is_none();
            let (state, pack) = run(&s, proposal, flags.clone());
            let pack = pack.unwrap();
            assert_eq!(pack.reason, InterventionReason::StopSensorMismatch);
            assert_eq!(pack.metadata["proposal_malformed"], json!(true));
            assert_eq!(pack.metadata["proposal_absent"], json!(absent));
            assert_eq!(state.action_final(), Some(&Action::zeros(2)));
        }

        let (_, pack) = run(&s, Some(vec![1.0, -1.0]), flags);
        assert_eq!(pack.unwrap().metadata["proposal_malformed"], json!(false));
    }

    #[test]
    fn absent_proposal_becomes_neutral() {
        let s = shield(5.0, 2);
        let (state, pack) = run(&s, None, ReflexFlags::default());
        assert_eq!(state.action_final(), Some(&Action::zeros(2)));
        let pack = pack.unwrap();
        assert!(pack.action_proposed.is_empty());
        assert_eq!(pack.metadata["proposal_absent"], json!(true));
    }

    #[test]
    fn nan_and_wrong_arity_are_repaired() {
        let s = shield(5.0, 2);
        let (state, pack) = run(&s, Some(vec![f64::NAN]), ReflexFlags::default());
        assert_eq!(state.action_final(), Some(&Action::zeros(2)));
        assert_eq!(pack.unwrap().metadata["proposal_malformed"], json!(true));

        let (state, pack) = run(&s, Some(vec![1.0, 2.0, 3.0]), ReflexFlags::default());
        assert_eq!(state.action_final(), Some(&Action::new(vec![1.0, 2.0])));
        assert!(pack.is_some());
    }

    #[test]
    fn asymmetric_bounds_keep_neutral_inside() {
        let cfg = ShieldConfig {
            u_min: 1.0,
            u_max: 3.0,
            hazard_scale: 0.5,
            epsilon: 1e-9,
        };
        let s = SafetyShield::new(cfg, 1).unwrap();
        assert_eq!(s.neutral(), 1.0);
        let (lo, hi, _) = s.envelope(&near_limit());
        assert_eq!((lo, hi), (1.0, 2.0));
    }

    #[test]
    fn construction_rejects_bad_config() {
        let mut cfg = ShieldConfig::symmetric(1.0);
        assert!(SafetyShield::new(cfg.clone(), 0).is_err());
        cfg.u_min = 2.0;
        assert!(matches!(
            SafetyShield::new(cfg, 1),
            Err(HtiError::InvalidBounds { .. })
        ));
    }
}
