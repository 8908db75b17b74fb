use hti::{
    Action, InterventionReason, JointFlags, Observation, ReflexFlags, SafetyShield,
    SharedTickState, ShieldConfig,
};
use proptest::prelude::*;

fn tick_state(proposal: Option<Vec<f64>>, flags: ReflexFlags) -> SharedTickState {
    let mut state = SharedTickState::new(Observation::new().with("x", 0.1));
    if let Some(p) = proposal {
        let mut view = state.control_view();
        view.set_active_policy("p");
        view.propose(Action::new(p));
    }
    state.reflex_view().replace_flags(flags);
    state
}

fn near_limit_flags() -> ReflexFlags {
    ReflexFlags {
        joints: vec![JointFlags {
            distance_to_limit: 0.02,
            near_limit: true,
        }],
        ..Default::default()
    }
}

#[test]
fn large_proposal_clips_to_nominal_bound() {
    let shield = SafetyShield::new(ShieldConfig::symmetric(0.05), 1).unwrap();
    let mut state = tick_state(Some(vec![10.0]), ReflexFlags::default());

    let pack = shield.apply(state.shield_view()).expect("clip is audited");

    assert_eq!(state.action_final(), Some(&Action::new(vec![0.05])));
    assert_eq!(pack.reason, InterventionReason::ClipOutOfBounds);
    assert_eq!(pack.action_proposed, vec![10.0]);
    assert_eq!(pack.metadata["policy_id"], serde_json::json!("p"));
    assert_eq!(state.shield_interventions(), 1);
}

#[test]
fn near_limit_halves_the_bound() {
    let shield = SafetyShield::new(ShieldConfig::symmetric(0.05), 1).unwrap();
    let mut state = tick_state(Some(vec![10.0]), near_limit_flags());

    let pack = shield.apply(state.shield_view()).unwrap();

    let applied = state.action_final().unwrap().as_slice()[0];
    assert!((applied - 0.025).abs() < 1e-12);
    assert_eq!(pack.reason, InterventionReason::ClipNearBoundary);
}

#[test]
fn mismatch_with_zero_proposal_is_still_audited() {
    let shield = SafetyShield::new(ShieldConfig::symmetric(0.05), 1).unwrap();
    let flags = ReflexFlags {
        sensor_mismatch: true,
        mismatch_magnitude: Some(0.3),
        ..Default::default()
    };
    let mut state = tick_state(Some(vec![0.0]), flags);

    let pack = shield.apply(state.shield_view()).unwrap();

    assert_eq!(state.action_final(), Some(&Action::new(vec![0.0])));
    assert_eq!(pack.reason, InterventionReason::StopSensorMismatch);
    assert_eq!(pack.metadata["scale_factor"], serde_json::json!(0.0));
}

#[test]
fn mismatch_beats_near_limit() {
    let shield = SafetyShield::new(ShieldConfig::symmetric(0.05), 1).unwrap();
    let flags = ReflexFlags {
        sensor_mismatch: true,
        ..near_limit_flags()
    };
    let mut state = tick_state(Some(vec![0.04]), flags);

    let pack = shield.apply(state.shield_view()).unwrap();

    assert_eq!(state.action_final(), Some(&Action::new(vec![0.0])));
    assert_eq!(pack.reason, InterventionReason::StopSensorMismatch);
}

fn component() -> impl Strategy<Value = f64> {
    prop_oneof![
        8 => -50.0f64..50.0,
        1 => Just(f64::NAN),
        1 => Just(f64::INFINITY),
    ]
}

fn flags_strategy() -> impl Strategy<Value = ReflexFlags> {
    (any::<bool>(), any::<bool>(), any::<bool>()).prop_map(|(near, fast, mismatch)| ReflexFlags {
        joints: vec![JointFlags {
            distance_to_limit: 0.1,
            near_limit: near,
        }],
        too_fast: fast,
        sensor_mismatch: mismatch,
        ..Default::default()
    })
}

proptest! {
    /// The applied action never leaves the nominal envelope, whatever arrives.
    #[test]
    fn prop_final_always_within_bounds(
        u_min in -10.0f64..0.5,
        width in 0.0f64..10.0,
        dof in 1usize..4,
        proposal in proptest::option::of(proptest::collection::vec(component(), 0..5)),
        flags in flags_strategy(),
    ) {
        let cfg = ShieldConfig {
            u_min,
            u_max: u_min + width,
            hazard_scale: 0.5,
            epsilon: 1e-9,
        };
        let shield = SafetyShield::new(cfg.clone(), dof).unwrap();
        let mut state = tick_state(proposal, flags);
        shield.apply(state.shield_view());

        let applied = state.action_final().unwrap();
        prop_assert_eq!(applied.dof(), dof);
        for &u in applied.as_slice() {
            prop_assert!(u.is_finite());
            prop_assert!(u >= cfg.u_min && u <= cfg.u_max);
        }
    }

    /// Well-formed proposals without a mismatch produce an event exactly when
    /// some component was changed, and the counter tracks the events.
    #[test]
    fn prop_event_iff_deviation(
        limit in 0.01f64..5.0,
        proposal in proptest::collection::vec(-10.0f64..10.0, 2),
        near in any::<bool>(),
    ) {
        let shield = SafetyShield::new(ShieldConfig::symmetric(limit), 2).unwrap();
        let flags = ReflexFlags {
            joints: vec![JointFlags { distance_to_limit: 0.5, near_limit: near }; 2],
            ..Default::default()
        };
        let mut state = tick_state(Some(proposal.clone()), flags);
        let pack = shield.apply(state.shield_view());

        let applied = state.action_final().unwrap().as_slice().to_vec();
        let deviated = applied
            .iter()
            .zip(&proposal)
            .any(|(f, p)| (f - p).abs() > 1e-9);
        prop_assert_eq!(pack.is_some(), deviated);
        prop_assert_eq!(state.shield_interventions(), u64::from(deviated));
        if !deviated {
            prop_assert_eq!(applied, proposal);
        }
    }
}
