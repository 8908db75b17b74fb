// src/bands/mod.rs
//
// The four time bands, slowest first:
//
//   Semantics (period 10) -> task advice
//   Control   (period 2)  -> raw proposal from the policy
//   Reflex    (every tick) -> hazard flags
//   Shield    (every tick) -> final action + audit events

pub mod control;
pub mod reflex;
pub mod semantics;
pub mod shield;

pub use control::ControlBand;
pub use reflex::ReflexBand;
pub use semantics::SemanticsBand;
pub use shield::SafetyShield;

use crate::config::Config;
use crate::env::Environment;
use crate::error::Result;
use crate::policy::Policy;

/// Everything the scheduler runs each tick, in execution order.
pub struct Bands {
    pub semantics: SemanticsBand,
    pub control: ControlBand,
    pub reflex: ReflexBand,
    pub shield: SafetyShield,
}

impl Bands {
    /// Wire all four bands for `env` from its descriptors and `cfg`.
    pub fn for_env<E: Environment + ?Sized>(
        env: &E,
        policy: Box<dyn Policy>,
        cfg: &Config,
    ) -> Result<Self> {
        Ok(Self {
            semantics: SemanticsBand::new(env.goal_spec())?,
            control: ControlBand::new(policy),
            reflex: ReflexBand::new(env.joint_specs(), cfg.reflex.clone())?,
            shield: SafetyShield::new(cfg.shield.clone(), env.dof())?,
        })
    }
}
