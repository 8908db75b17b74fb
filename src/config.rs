// src/config.rs
//
// Central configuration for the HTI harness.
// This is the single source of truth for band cadences, shield bounds and
// reflex thresholds. Plant presets mirror the two reference plants (the
// 1-D point mass and the 2-link arm); environment variables can override a
// small set of research knobs on top of a preset.

use std::env;
use std::fmt::Display;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{HtiError, Result};

/// Reference plant a configuration is tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Plant {
    /// 2-DOF planar arm, torque-controlled.
    Arm,
    /// 1-D point mass on [0, 1], delta-position controlled.
    PointMass,
}

impl Plant {
    /// Stable lowercase name (used in logs/telemetry).
    pub fn as_str(&self) -> &'static str {
        match self {
            Plant::Arm => "arm",
            Plant::PointMass => "point",
        }
    }

    /// Parse a plant name (case-insensitive). Returns None if unrecognized.
    pub fn parse(s: &str) -> Option<Plant> {
        match s.trim().to_ascii_lowercase().as_str() {
            "arm" | "arm2" | "2dof" => Some(Plant::Arm),
            "point" | "point_mass" | "toy" | "1d" => Some(Plant::PointMass),
            _ => None,
        }
    }
}

/// Decimation periods, in base ticks, for the two slow bands.
///
/// Reflex and Shield are not configurable: they always run every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BandPeriods {
    pub semantics: u64,
    pub control: u64,
}

impl Default for BandPeriods {
    fn default() -> Self {
        // 10 Hz and 50 Hz at a 100 Hz base rate.
        Self {
            semantics: 10,
            control: 2,
        }
    }
}

impl BandPeriods {
    /// Derive periods from band frequencies.
    ///
    /// Each band rate must divide the base rate exactly.
    pub fn from_rates(base_hz: u64, semantics_hz: u64, control_hz: u64) -> Result<Self> {
        let period = |band: &str, hz: u64| -> Result<u64> {
            if hz == 0 || hz > base_hz || base_hz % hz != 0 {
                return Err(HtiError::InvalidConfig(format!(
                    "{band} rate {hz} Hz must divide the base rate {base_hz} Hz"
                )));
            }
            Ok(base_hz / hz)
        };
        Ok(Self {
            semantics: period("semantics", semantics_hz)?,
            control: period("control", control_hz)?,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.semantics == 0 || self.control == 0 {
            return Err(HtiError::InvalidConfig(format!(
                "band periods must be >= 1 (semantics={}, control={})",
                self.semantics, self.control
            )));
        }
        Ok(())
    }
}

/// Base-rate loop parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds per base tick.
    pub dt: f64,
    /// Tick budget per episode.
    pub max_ticks: u64,
    pub periods: BandPeriods,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            dt: 0.01,
            max_ticks: 2000,
            periods: BandPeriods::default(),
        }
    }
}

/// Safety Shield envelope.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShieldConfig {
    pub u_min: f64,
    pub u_max: f64,
    /// Fraction of the nominal envelope allowed while a hazard flag is set.
    pub hazard_scale: f64,
    /// Deviation below which final == proposed.
    pub epsilon: f64,
}

impl ShieldConfig {
    pub fn symmetric(limit: f64) -> Self {
        Self {
            u_min: -limit,
            u_max: limit,
            hazard_scale: 0.5,
            epsilon: 1e-9,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.u_min.is_finite() || !self.u_max.is_finite() || self.u_min > self.u_max {
            return Err(HtiError::InvalidBounds {
                u_min: self.u_min,
                u_max: self.u_max,
            });
        }
        let scale = self.hazard_scale;
        if scale.is_nan() || scale <= 0.0 || scale > 1.0 {
            return Err(HtiError::InvalidConfig(format!(
                "hazard_scale ({}) must be in (0, 1]",
                self.hazard_scale
            )));
        }
        if self.epsilon.is_nan() || self.epsilon < 0.0 {
            return Err(HtiError::InvalidConfig(format!(
                "epsilon ({}) must be >= 0",
                self.epsilon
            )));
        }
        Ok(())
    }
}

/// Reflex thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReflexConfig {
    /// Distance to a joint limit considered "near".
    pub limit_margin: f64,
    /// Whether a distance exactly at `limit_margin` counts as near.
    pub limit_inclusive: bool,
    /// Fraction of a joint's velocity limit considered "too fast".
    pub velocity_fast_factor: f64,
    /// Proposed action magnitude considered "too fast" for DOFs without a
    /// velocity channel.
    pub speed_threshold: f64,
    /// |true - measured| considered a sensor fault.
    pub mismatch_threshold: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct Config {
    /// Human-readable config / release version.
    pub version: &'static str,
    pub plant: Plant,
    pub scheduler: SchedulerConfig,
    pub shield: ShieldConfig,
    pub reflex: ReflexConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self::for_plant(Plant::Arm)
    }
}

impl Config {
    /// Preset tuned for the given reference plant.
    pub fn for_plant(plant: Plant) -> Self {
        match plant {
            Plant::Arm => Self {
                version: "hti-v0.5",
                plant,
                scheduler: SchedulerConfig::default(),
                // Matches the arm's actuator torque limit.
                shield: ShieldConfig::symmetric(5.0),
                reflex: ReflexConfig {
                    limit_margin: 0.3,
                    limit_inclusive: true,
                    velocity_fast_factor: 0.7,
                    speed_threshold: 5.0,
                    mismatch_threshold: 0.05,
                },
            },
            Plant::PointMass => Self {
                version: "hti-v0.5",
                plant,
                scheduler: SchedulerConfig::default(),
                shield: ShieldConfig::symmetric(0.05),
                reflex: ReflexConfig {
                    limit_margin: 0.1,
                    // The nominal start x0 = 0.1 sits exactly on the margin.
                    limit_inclusive: false,
                    velocity_fast_factor: 0.7,
                    speed_threshold: 0.08,
                    mismatch_threshold: 0.05,
                },
            },
        }
    }

    /// Plant preset plus environment overrides.
    ///
    /// Recognised variables:
    ///   - HTI_MAX_TICKS          (u64)
    ///   - HTI_SEMANTICS_PERIOD   (u64, ticks)
    ///   - HTI_CONTROL_PERIOD     (u64, ticks)
    ///   - HTI_U_MIN / HTI_U_MAX  (f64)
    ///   - HTI_HAZARD_SCALE       (f64, (0, 1])
    ///
    /// Any variable that fails to parse is ignored with a warning. The result
    /// is not validated here; call `validate()` before running.
    pub fn from_env_or_plant(plant: Plant) -> Self {
        let mut cfg = Self::for_plant(plant);
        env_override("HTI_MAX_TICKS", &mut cfg.scheduler.max_ticks);
        env_override("HTI_SEMANTICS_PERIOD", &mut cfg.scheduler.periods.semantics);
        env_override("HTI_CONTROL_PERIOD", &mut cfg.scheduler.periods.control);
        env_override("HTI_U_MIN", &mut cfg.shield.u_min);
        env_override("HTI_U_MAX", &mut cfg.shield.u_max);
        env_override("HTI_HAZARD_SCALE", &mut cfg.shield.hazard_scale);
        cfg
    }

    /// Plant taken from HTI_PLANT (default arm), then the other overrides.
    pub fn from_env_or_default() -> Self {
        let plant = match env::var("HTI_PLANT") {
            Ok(raw) => Plant::parse(&raw).unwrap_or_else(|| {
                tracing::warn!("[config] unknown HTI_PLANT = {:?}; using arm", raw);
                Plant::Arm
            }),
            Err(_) => Plant::Arm,
        };
        Self::from_env_or_plant(plant)
    }

    pub fn validate(&self) -> Result<()> {
        let dt = self.scheduler.dt;
        if !dt.is_finite() || dt <= 0.0 {
            return Err(HtiError::InvalidConfig(format!(
                "dt ({}) must be positive",
                self.scheduler.dt
            )));
        }
        self.scheduler.periods.validate()?;
        self.shield.validate()
    }
}

fn env_override<T>(name: &str, slot: &mut T)
where
    T: FromStr + Display,
{
    let Ok(raw) = env::var(name) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(v) => {
            tracing::info!("[config] {name} = {v} (overrode default)");
            *slot = v;
        }
        Err(_) => {
            tracing::warn!(
                "[config] could not parse {name} = {:?}; using default {}",
                raw,
                slot
            );
        }
    }
}
