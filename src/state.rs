// src/state.rs
//
// Shared tick state: the single record that carries data between bands
// within one tick.
//
// Write ownership is enforced by construction. The scheduler owns the
// `SharedTickState`; each band is handed a short-lived view that can read what
// the band is allowed to read and exposes exactly the write operations the
// band owns:
//
//   Semantics -> SemanticsView::advise          (advice, full replacement)
//   Control   -> ControlView::propose           (action_proposed)
//   Reflex    -> ReflexView::replace_flags      (reflex_flags, full replacement)
//   Shield    -> ShieldView::commit_final       (action_final)
//
// A view mutably borrows the state, so no band can keep a reference to it
// past its own step call.

use serde::{Deserialize, Serialize};

use crate::types::{Action, Observation, TimestampS};

/// Task-level hint from the Semantics band.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticsAdvice {
    /// Suggested direction along the first goal axis (-1, 0 or +1).
    pub direction_hint: i8,
    /// Confidence in the suggestion, in [0, 1].
    pub confidence: f64,
    /// Current task stage (0 for single-stage tasks).
    pub stage_index: usize,
    /// Goal coordinates the advice refers to.
    pub goal: Vec<f64>,
    /// Euclidean distance from the actual position to the goal.
    pub goal_distance: f64,
    /// Goal reached within tolerance.
    pub stage_complete: bool,
}

/// Per-DOF limit proximity.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JointFlags {
    pub distance_to_limit: f64,
    pub near_limit: bool,
}

/// Hazard indicators computed by the Reflex band.
///
/// The default value means "no hazards observed".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReflexFlags {
    pub joints: Vec<JointFlags>,
    pub too_fast: bool,
    pub sensor_mismatch: bool,
    pub mismatch_magnitude: Option<f64>,
    pub near_obstacle: bool,
    pub obstacle_distance: Option<f64>,
}

impl ReflexFlags {
    pub fn any_near_limit(&self) -> bool {
        self.joints.iter().any(|j| j.near_limit)
    }

    /// Hazards that tighten the Shield envelope (mismatch is handled separately).
    pub fn hazard(&self) -> bool {
        self.any_near_limit() || self.too_fast
    }

    /// Number of raised boolean flags, used for stress statistics.
    pub fn active_count(&self) -> usize {
        self.joints.iter().filter(|j| j.near_limit).count()
            + usize::from(self.too_fast)
            + usize::from(self.sensor_mismatch)
            + usize::from(self.near_obstacle)
    }
}

/// Single source of truth for one tick.
#[derive(Debug, Clone)]
pub struct SharedTickState {
    tick: u64,
    t: TimestampS,
    observation: Observation,
    semantics_advice: SemanticsAdvice,
    reflex_flags: ReflexFlags,
    action_proposed: Option<Action>,
    action_final: Option<Action>,
    shield_interventions: u64,
    active_policy: Option<String>,
}

impl SharedTickState {
    /// Fresh per-episode state around the environment's initial observation.
    pub fn new(observation: Observation) -> Self {
        Self {
            tick: 0,
            t: 0.0,
            observation,
            semantics_advice: SemanticsAdvice::default(),
            reflex_flags: ReflexFlags::default(),
            action_proposed: None,
            action_final: None,
            shield_interventions: 0,
            active_policy: None,
        }
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    pub fn t(&self) -> TimestampS {
        self.t
    }

    pub fn observation(&self) -> &Observation {
        &self.observation
    }

    pub fn semantics_advice(&self) -> &SemanticsAdvice {
        &self.semantics_advice
    }

    pub fn reflex_flags(&self) -> &ReflexFlags {
        &self.reflex_flags
    }

    pub fn action_proposed(&self) -> Option<&Action> {
        self.action_proposed.as_ref()
    }

    pub fn action_final(&self) -> Option<&Action> {
        self.action_final.as_ref()
    }

    pub fn shield_interventions(&self) -> u64 {
        self.shield_interventions
    }

    pub fn active_policy(&self) -> Option<&str> {
        self.active_policy.as_deref()
    }

    // ----- Scheduler-owned writes -----------------------------------------

    pub(crate) fn set_clock(&mut self, tick: u64, dt: f64) {
        self.tick = tick;
        self.t = tick as f64 * dt;
    }

    pub(crate) fn replace_observation(&mut self, observation: Observation) {
        self.observation = observation;
    }

    // ----- Band views ------------------------------------------------------

    pub fn semantics_view(&mut self) -> SemanticsView<'_> {
        SemanticsView { state: self }
    }

    pub fn control_view(&mut self) -> ControlView<'_> {
        ControlView { state: self }
    }

    pub fn reflex_view(&mut self) -> ReflexView<'_> {
        ReflexView { state: self }
    }

    pub fn shield_view(&mut self) -> ShieldView<'_> {
        ShieldView { state: self }
    }
}

/// Semantics: reads the observation, writes advice.
pub struct SemanticsView<'a> {
    state: &'a mut SharedTickState,
}

impl SemanticsView<'_> {
    pub fn observation(&self) -> &Observation {
        &self.state.observation
    }

    pub fn advise(self, advice: SemanticsAdvice) {
        self.state.semantics_advice = advice;
    }
}

/// Control: reads observation and advice, writes the proposal.
pub struct ControlView<'a> {
    state: &'a mut SharedTickState,
}

impl ControlView<'_> {
    pub fn tick(&self) -> u64 {
        self.state.tick
    }

    pub fn observation(&self) -> &Observation {
        &self.state.observation
    }

    pub fn semantics_advice(&self) -> &SemanticsAdvice {
        &self.state.semantics_advice
    }

    /// Tag the state with the policy behind the proposal (audit attribution).
    pub fn set_active_policy(&mut self, name: &str) {
        if self.state.active_policy.as_deref() != Some(name) {
            self.state.active_policy = Some(name.to_string());
        }
    }

    pub fn propose(self, action: Action) {
        self.state.action_proposed = Some(action);
    }
}

/// Reflex: reads observation and proposal, replaces the flags.
pub struct ReflexView<'a> {
    state: &'a mut SharedTickState,
}

impl ReflexView<'_> {
    pub fn observation(&self) -> &Observation {
        &self.state.observation
    }

    pub fn action_proposed(&self) -> Option<&Action> {
        self.state.action_proposed.as_ref()
    }

    /// Flags are always replaced wholesale; there is no merge path.
    pub fn replace_flags(self, flags: ReflexFlags) {
        self.state.reflex_flags = flags;
    }
}

/// Shield: reads clock, observation, proposal and flags; writes the final action.
pub struct ShieldView<'a> {
    state: &'a mut SharedTickState,
}

impl ShieldView<'_> {
    pub fn tick(&self) -> u64 {
        self.state.tick
    }

    pub fn t(&self) -> TimestampS {
        self.state.t
    }

    pub fn observation(&self) -> &Observation {
        &self.state.observation
    }

    pub fn action_proposed(&self) -> Option<&Action> {
        self.state.action_proposed.as_ref()
    }

    pub fn reflex_flags(&self) -> &ReflexFlags {
        &self.state.reflex_flags
    }

    pub fn active_policy(&self) -> Option<&str> {
        self.state.active_policy.as_deref()
    }

    pub fn record_intervention(&mut self) {
        self.state.shield_interventions += 1;
    }

    pub fn commit_final(self, action: Action) {
        self.state.action_final = Some(action);
    }
}
