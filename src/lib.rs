//! HTI core library: a hierarchical, time-banded control harness.
//!
//! Four bands run at fixed sub-multiples of a 100 Hz base tick (Semantics,
//! Control, Reflex, Safety Shield) over a single shared tick state. A
//! pluggable policy proposes raw actions; the Shield is the only authority
//! over what reaches the plant and audits every intervention.
//!
//! The binaries (`src/main.rs`, `src/bin/compare_brains.rs`) are thin
//! harnesses around these components.

pub mod bands;
pub mod compare;
pub mod config;
pub mod env;
pub mod error;
pub mod event_log;
pub mod logging;
pub mod loop_scheduler;
pub mod policy;
pub mod runner;
pub mod state;
pub mod types;

// --- Re-exports for ergonomic external use ---------------------------------

pub use config::{BandPeriods, Config, Plant, ReflexConfig, SchedulerConfig, ShieldConfig};

pub use error::{HtiError, Result};

pub use bands::{Bands, ControlBand, ReflexBand, SafetyShield, SemanticsBand};

pub use env::{
    build_env, ArmConfig, ArmEnv, EnvOptions, Environment, GlitchWindow, GoalSpec, JointSpec,
    PointMassConfig, PointMassEnv, StepInfo, StepOutcome,
};

pub use event_log::{read_event_log, EventLogger, EventPack, EventSummary, InterventionReason};

pub use logging::{BandsRan, FileSink, FlagCounter, NoopSink, TickSink};

pub use loop_scheduler::LoopScheduler;

pub use policy::{
    available_policies, create_policy, default_policy, Policy, PolicyGains, PolicyMemory,
};

pub use runner::{run_episode, EpisodeStats, TerminationReason};

pub use state::{JointFlags, ReflexFlags, SemanticsAdvice, SharedTickState};

pub use types::{Action, BandName, Observation, TimestampS};

pub use compare::{compare_brains, run_n_episodes, BrainMetrics, CompareConfig};
