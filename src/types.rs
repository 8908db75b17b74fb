// src/types.rs
//
// Common shared types for the HTI harness.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{HtiError, Result};

/// Simulated time in seconds (`tick * dt`).
pub type TimestampS = f64;

/// Immutable snapshot of named environment channels.
///
/// Channels are kept in a `BTreeMap` so serialized snapshots are key-ordered
/// and byte-for-byte reproducible across runs.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Observation {
    channels: BTreeMap<String, f64>,
}

impl Observation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style helper used by environments.
    pub fn with(mut self, name: &str, value: f64) -> Self {
        self.channels.insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.channels.get(name).copied()
    }

    /// Channel value, or `MissingChannel` if the environment does not expose it.
    pub fn require(&self, name: &str) -> Result<f64> {
        self.get(name)
            .ok_or_else(|| HtiError::MissingChannel(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.channels.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.channels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.channels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.channels.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for Observation {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self {
            channels: iter.into_iter().collect(),
        }
    }
}

/// Actuation command, one value per degree of freedom.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Action(Vec<f64>);

impl Action {
    pub fn new(values: Vec<f64>) -> Self {
        Self(values)
    }

    /// The neutral action for a plant with `dof` degrees of freedom.
    pub fn zeros(dof: usize) -> Self {
        Self(vec![0.0; dof])
    }

    pub fn dof(&self) -> usize {
        self.0.len()
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn get(&self, i: usize) -> Option<f64> {
        self.0.get(i).copied()
    }

    pub fn scaled(&self, factor: f64) -> Self {
        Self(self.0.iter().map(|v| v * factor).collect())
    }

    /// Sum of absolute per-component differences.
    pub fn l1_distance(&self, other: &Action) -> f64 {
        self.0
            .iter()
            .zip(other.0.iter())
            .map(|(a, b)| (a - b).abs())
            .sum()
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.0
    }
}

impl From<Vec<f64>> for Action {
    fn from(values: Vec<f64>) -> Self {
        Self(values)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, v) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{v:.4}")?;
        }
        write!(f, ")")
    }
}

/// Names of the four bands, used in telemetry and timing stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BandName {
    Semantics,
    Control,
    Reflex,
    Shield,
}

impl BandName {
    pub const ALL: [BandName; 4] = [
        BandName::Semantics,
        BandName::Control,
        BandName::Reflex,
        BandName::Shield,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            BandName::Semantics => "semantics",
            BandName::Control => "control",
            BandName::Reflex => "reflex",
            BandName::Shield => "shield",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_require_reports_missing_channel() {
        let obs = Observation::new().with("x", 0.25);
        assert_eq!(obs.require("x").unwrap(), 0.25);
        match obs.require("theta1") {
            Err(HtiError::MissingChannel(name)) => assert_eq!(name, "theta1"),
            other => panic!("expected MissingChannel, got {other:?}"),
        }
    }

    #[test]
    fn observation_json_is_key_ordered() {
        let obs = Observation::new().with("x_target", 0.8).with("x", 0.1);
        let json = serde_json::to_string(&obs).unwrap();
        assert_eq!(json, r#"{"x":0.1,"x_target":0.8}"#);
    }

    #[test]
    fn action_display_and_distance() {
        let a = Action::new(vec![1.0, -2.0]);
        let b = Action::new(vec![0.5, -1.0]);
        assert_eq!(a.to_string(), "(1.0000, -2.0000)");
        assert!((a.l1_distance(&b) - 1.5).abs() < 1e-12);
    }
}
