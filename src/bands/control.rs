// src/bands/control.rs
//
// Control band (mid rate): turns advice plus observation into a raw proposal
// by delegating to the injected policy.
//
// The band owns the policy memory. Other bands never see it.

use crate::error::{HtiError, Result};
use crate::policy::{Policy, PolicyMemory};
use crate::state::ControlView;

/// Below this advice confidence the proposal is halved.
pub const LOW_CONFIDENCE: f64 = 0.3;

pub struct ControlBand {
    policy: Box<dyn Policy>,
    memory: PolicyMemory,
    initialized: bool,
}

impl ControlBand {
    pub fn new(policy: Box<dyn Policy>) -> Self {
        Self {
            policy,
            memory: PolicyMemory::new(),
            initialized: false,
        }
    }

    pub fn policy_name(&self) -> &str {
        self.policy.name()
    }

    pub fn memory(&self) -> &PolicyMemory {
        &self.memory
    }

    /// Clear policy memory. Must be called after every environment reset.
    pub fn reset_episode(&mut self) {
        self.memory.clear();
        self.initialized = true;
    }

    pub fn step(&mut self, mut view: ControlView<'_>) -> Result<()> {
        if !self.initialized {
            return Err(HtiError::ControlNotReset);
        }

        let memory = std::mem::take(&mut self.memory);
        let (mut action, memory) = self.policy.step(view.observation(), memory)?;
        self.memory = memory;

        let confidence = view.semantics_advice().confidence;
        if confidence < LOW_CONFIDENCE {
            action = action.scaled(0.5);
        }

        view.set_active_policy(self.policy.name());
        view.propose(action);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{SemanticsAdvice, SharedTickState};
    use crate::types::{Action, Observation};

    /// Proposes a constant and counts its own calls in memory.
    struct Counting;

    impl Policy for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        fn step(
            &self,
            _obs: &Observation,
            mut memory: PolicyMemory,
        ) -> Result<(Action, PolicyMemory)> {
            let n = memory.get("calls").unwrap_or(0.0) + 1.0;
            memory.set("calls", n);
            Ok((Action::new(vec![1.0]), memory))
        }
    }

    fn confident_state() -> SharedTickState {
        let mut state = SharedTickState::new(Observation::new());
        state.semantics_view().advise(SemanticsAdvice {
            confidence: 0.9,
            ..Default::default()
        });
        state
    }

    #[test]
    fn step_before_reset_is_rejected() {
        let mut band = ControlBand::new(Box::new(Counting));
        let mut state = confident_state();
        assert!(matches!(
            band.step(state.control_view()),
            Err(HtiError::ControlNotReset)
        ));
        assert!(state.action_proposed().is_none());
    }

    #[test]
    fn memory_persists_until_reset() {
        let mut band = ControlBand::new(Box::new(Counting));
        band.reset_episode();
        let mut state = confident_state();
        for _ in 0..3 {
            band.step(state.control_view()).unwrap();
        }
        assert_eq!(band.memory().get("calls"), Some(3.0));
        assert_eq!(state.active_policy(), Some("counting"));
        assert_eq!(state.action_proposed(), Some(&Action::new(vec![1.0])));

        band.reset_episode();
        assert!(band.memory().is_empty());
    }

    #[test]
    fn low_confidence_halves_proposal() {
        let mut band = ControlBand::new(Box::new(Counting));
        band.reset_episode();
        let mut state = SharedTickState::new(Observation::new());
        state.semantics_view().advise(SemanticsAdvice {
            confidence: 0.1,
            ..Default::default()
        });
        band.step(state.control_view()).unwrap();
        assert_eq!(state.action_proposed(), Some(&Action::new(vec![0.5])));
    }
}
