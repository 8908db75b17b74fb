// src/error.rs
//
// Error taxonomy for the harness.
//
// Configuration errors and precondition violations surface here. Numerical
// edge cases (IK reach, NaN proposals) are absorbed locally and never reach
// this type.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HtiError {
    #[error("invalid shield bounds: u_min ({u_min}) must be <= u_max ({u_max}) and finite")]
    InvalidBounds { u_min: f64, u_max: f64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("unknown policy '{name}'. Available: {available}")]
    UnknownPolicy { name: String, available: String },

    #[error("control band stepped before reset_episode(); the scheduler must reset it after env.reset()")]
    ControlNotReset,

    #[error("observation is missing channel '{0}'")]
    MissingChannel(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, HtiError>;
