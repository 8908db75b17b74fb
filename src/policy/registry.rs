// src/policy/registry.rs
//
// Static, read-only brain registry: plant -> [(name, template)].
//
// Constructors take optional gain overrides; a `None` field keeps the
// variant's reference gain. Overrides that do not apply to a law (e.g. `kd`
// for a P brain) are ignored.

use serde::{Deserialize, Serialize};

use super::arm::{ArmLaw, ArmPolicy};
use super::point::PointPolicy;
use super::Policy;
use crate::config::Plant;
use crate::error::{HtiError, Result};

/// Optional gain overrides from the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct PolicyGains {
    pub gain: Option<f64>,
    pub kp: Option<f64>,
    pub kd: Option<f64>,
}

/// Reference law and gains for one registry entry.
#[derive(Debug, Clone, Copy)]
enum Template {
    ArmP { gain: f64 },
    ArmPd { kp: f64, kd: f64 },
    PointP { gain: f64 },
}

impl Template {
    fn build(self, name: &str, g: &PolicyGains) -> Box<dyn Policy> {
        match self {
            Template::ArmP { gain } => Box::new(ArmPolicy::new(
                name,
                ArmLaw::P {
                    gain: g.gain.unwrap_or(gain),
                },
            )),
            Template::ArmPd { kp, kd } => Box::new(ArmPolicy::new(
                name,
                ArmLaw::Pd {
                    kp: g.kp.unwrap_or(kp),
                    kd: g.kd.unwrap_or(kd),
                },
            )),
            Template::PointP { gain } => {
                Box::new(PointPolicy::new(name, g.gain.unwrap_or(gain)))
            }
        }
    }
}

static ARM_BRAINS: &[(&str, Template)] = &[
    ("p", Template::ArmP { gain: 5.0 }),
    ("aggressive", Template::ArmP { gain: 12.0 }),
    ("pd", Template::ArmPd { kp: 8.0, kd: 2.0 }),
    ("pd_aggressive", Template::ArmPd { kp: 14.0, kd: 3.5 }),
    // Over-driven and under-damped on purpose.
    ("imperfect", Template::ArmPd { kp: 14.0, kd: 0.5 }),
    ("optimal_pd", Template::ArmPd { kp: 8.0, kd: 3.5 }),
];

static POINT_BRAINS: &[(&str, Template)] = &[
    ("p", Template::PointP { gain: 0.3 }),
    ("aggressive", Template::PointP { gain: 1.0 }),
];

fn table(plant: Plant) -> &'static [(&'static str, Template)] {
    match plant {
        Plant::Arm => ARM_BRAINS,
        Plant::PointMass => POINT_BRAINS,
    }
}

/// Registered brain names for a plant, in registry order.
pub fn available_policies(plant: Plant) -> Vec<&'static str> {
    table(plant).iter().map(|(name, _)| *name).collect()
}

/// Reference brain used when none is requested.
pub fn default_policy(plant: Plant) -> &'static str {
    match plant {
        Plant::Arm => "pd",
        Plant::PointMass => "p",
    }
}

/// Instantiate a brain by registry name.
pub fn create_policy(plant: Plant, name: &str, gains: &PolicyGains) -> Result<Box<dyn Policy>> {
    table(plant)
        .iter()
        .find(|(n, _)| *n == name)
        .map(|(n, template)| template.build(n, gains))
        .ok_or_else(|| HtiError::UnknownPolicy {
            name: name.to_string(),
            available: available_policies(plant).join(", "),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PolicyMemory;
    use crate::types::Observation;

    #[test]
    fn every_registered_name_constructs() {
        for plant in [Plant::Arm, Plant::PointMass] {
            for name in available_policies(plant) {
                let p = create_policy(plant, name, &PolicyGains::default()).unwrap();
                assert_eq!(p.name(), name);
            }
        }
    }

    #[test]
    fn unknown_name_lists_alternatives() {
        let err = create_policy(Plant::Arm, "vla", &PolicyGains::default())
            .err()
            .unwrap();
        match err {
            HtiError::UnknownPolicy { name, available } => {
                assert_eq!(name, "vla");
                assert!(available.contains("pd"));
                assert!(available.contains("optimal_pd"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn gain_override_applies_to_point_brain() {
        let gains = PolicyGains {
            gain: Some(0.5),
            ..Default::default()
        };
        let p = create_policy(Plant::PointMass, "p", &gains).unwrap();
        let obs = Observation::new().with("x", 0.0).with("x_target", 1.0);
        let (action, _) = p.step(&obs, PolicyMemory::new()).unwrap();
        assert!((action.as_slice()[0] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn defaults_are_registered() {
        for plant in [Plant::Arm, Plant::PointMass] {
            assert!(available_policies(plant).contains(&default_policy(plant)));
        }
    }
}
