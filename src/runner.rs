// src/runner.rs
//
// Episode scheduler: the fixed-rate band loop.
//
// Per tick, in strict order:
//   1. clock update
//   2. Semantics   (when due)
//   3. Control     (when due)
//   4. Reflex      (always)
//   5. Shield      (always; any event pack goes to the logger)
//   6. env.step(action_final), observation replaced wholesale
//   7. tick sink
//   8. stop if the environment reports done
//
// The Shield is always the last writer before the environment step.

use std::collections::BTreeMap;
use std::fmt;
use std::time::{Duration, Instant};

use serde::{Serialize, Serializer};

use crate::bands::Bands;
use crate::config::SchedulerConfig;
use crate::env::{Environment, StepInfo, REASON_ALL_WAYPOINTS, REASON_GOAL_REACHED};
use crate::error::Result;
use crate::event_log::{EventLogger, InterventionReason};
use crate::logging::{BandsRan, TickSink};
use crate::loop_scheduler::LoopScheduler;
use crate::state::SharedTickState;
use crate::types::{Action, BandName};

/// Why an episode ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminationReason {
    /// The environment reports the task complete.
    GoalReached,
    /// The scheduler's tick budget ran out first.
    Timeout,
    /// The environment ended the episode for its own reason (e.g. `max_steps`).
    Environment(String),
}

impl TerminationReason {
    fn from_env(info: &StepInfo) -> Self {
        match info.reason.as_deref() {
            Some(REASON_GOAL_REACHED) | Some(REASON_ALL_WAYPOINTS) => Self::GoalReached,
            Some(other) => Self::Environment(other.to_string()),
            None if info.success => Self::GoalReached,
            None => Self::Environment("done".to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::GoalReached => "goal_reached",
            Self::Timeout => "timeout",
            Self::Environment(reason) => reason,
        }
    }
}

impl fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TerminationReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Wall-clock cost of one band.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct BandTiming {
    pub runs: u64,
    pub total: Duration,
    pub max: Duration,
}

impl BandTiming {
    fn record(&mut self, elapsed: Duration) {
        self.runs += 1;
        self.total += elapsed;
        self.max = self.max.max(elapsed);
    }

    pub fn mean(&self) -> Duration {
        if self.runs == 0 {
            return Duration::ZERO;
        }
        // Duration only divides by u32.
        let runs = u32::try_from(self.runs).unwrap_or(u32::MAX);
        self.total / runs
    }
}

impl Serialize for BandTiming {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Micros {
            runs: u64,
            mean_us: f64,
            max_us: f64,
        }
        Micros {
            runs: self.runs,
            mean_us: self.mean().as_secs_f64() * 1e6,
            max_us: self.max.as_secs_f64() * 1e6,
        }
        .serialize(serializer)
    }
}

/// Per-band timing table.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct BandTimings(BTreeMap<BandName, BandTiming>);

impl BandTimings {
    fn time<T>(&mut self, band: BandName, f: impl FnOnce() -> T) -> T {
        let start = Instant::now();
        let out = f();
        self.0.entry(band).or_default().record(start.elapsed());
        out
    }

    pub fn get(&self, band: BandName) -> BandTiming {
        self.0.get(&band).copied().unwrap_or_default()
    }

    pub fn runs(&self) -> BTreeMap<BandName, u64> {
        BandName::ALL
            .iter()
            .map(|b| (*b, self.get(*b).runs))
            .collect()
    }
}

/// Aggregate result of one episode.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeStats {
    pub ticks: u64,
    pub simulated_time: f64,
    pub interventions: u64,
    pub success: bool,
    pub reason: TerminationReason,
    pub final_distance: f64,
    pub band_runs: BTreeMap<BandName, u64>,
    pub reason_counts: BTreeMap<InterventionReason, usize>,
    pub timings: BandTimings,
    pub policy: String,
}

/// Run one episode to completion or until the tick budget is exhausted.
///
/// Resets the environment once, clears the logger, resets Control, then loops.
/// The event log is flushed before returning.
pub fn run_episode<E: Environment + ?Sized>(
    env: &mut E,
    bands: &mut Bands,
    logger: &mut EventLogger,
    sink: &mut dyn TickSink,
    cfg: &SchedulerConfig,
) -> Result<EpisodeStats> {
    let mut sched = LoopScheduler::new(cfg.periods)?;
    let mut state = SharedTickState::new(env.reset()?);
    bands.control.reset_episode();
    logger.clear();

    tracing::info!(
        policy = bands.control.policy_name(),
        max_ticks = cfg.max_ticks,
        dof = env.dof(),
        "[episode] start"
    );

    let mut timings = BandTimings::default();
    let mut ticks: u64 = 0;
    let mut last_info: Option<StepInfo> = None;
    let mut reason = TerminationReason::Timeout;

    while sched.next_tick() < cfg.max_ticks {
        let tick = sched.advance();
        state.set_clock(tick, cfg.dt);
        let mut ran = BandsRan::default();

        if sched.semantics_due(tick) {
            timings.time(BandName::Semantics, || {
                bands.semantics.step(state.semantics_view())
            })?;
            sched.mark_semantics_ran();
            ran.semantics = true;
        }

        if sched.control_due(tick) {
            timings.time(BandName::Control, || {
                bands.control.step(state.control_view())
            })?;
            sched.mark_control_ran();
            ran.control = true;
        }

        timings.time(BandName::Reflex, || bands.reflex.step(state.reflex_view()))?;

        let pack = timings.time(BandName::Shield, || bands.shield.apply(state.shield_view()));
        if let Some(pack) = pack {
            logger.log(pack);
        }

        let action = state
            .action_final()
            .cloned()
            .unwrap_or_else(|| Action::zeros(env.dof()));
        let outcome = env.step(&action)?;
        state.replace_observation(outcome.observation);
        sink.log_tick(&state, ran);
        ticks += 1;

        if tick % 100 == 0 {
            tracing::debug!(
                tick,
                distance = outcome.info.distance,
                action = %action,
                interventions = state.shield_interventions(),
                "[episode] progress"
            );
        }

        let done = outcome.done;
        if done {
            reason = TerminationReason::from_env(&outcome.info);
        }
        last_info = Some(outcome.info);
        if done {
            break;
        }
    }

    logger.flush()?;

    let (success, final_distance) = match &last_info {
        Some(info) => (info.success, info.distance),
        None => (false, state.semantics_advice().goal_distance),
    };

    let stats = EpisodeStats {
        ticks,
        simulated_time: ticks as f64 * cfg.dt,
        interventions: state.shield_interventions(),
        success,
        reason,
        final_distance,
        band_runs: timings.runs(),
        reason_counts: logger.reason_counts(),
        timings,
        policy: bands.control.policy_name().to_string(),
    };

    tracing::info!(
        ticks = stats.ticks,
        success = stats.success,
        reason = %stats.reason,
        interventions = stats.interventions,
        final_distance = stats.final_distance,
        "[episode] end"
    );
    Ok(stats)
}
