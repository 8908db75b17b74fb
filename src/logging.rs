// src/logging.rs
//
// Per-tick telemetry sinks for the band loop.
// - TickSink:    trait called by the scheduler once per tick
// - NoopSink:    discards all ticks
// - FileSink:    writes one JSON object per tick (JSONL)
// - FlagCounter: counts reflex hazard activations for brain comparisons

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

use serde::Serialize;

use crate::state::{ReflexFlags, SharedTickState};

/// Which decimated bands executed on a tick (Reflex and Shield always do).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BandsRan {
    pub semantics: bool,
    pub control: bool,
}

/// Abstract sink for per-tick telemetry.
///
/// Called after the environment step, so `state.observation()` is already
/// the post-step observation while the actions are the ones just applied.
pub trait TickSink {
    fn log_tick(&mut self, state: &SharedTickState, ran: BandsRan);

    /// Push buffered output to its destination. In-memory sinks need nothing.
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Sink that discards all ticks.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl TickSink for NoopSink {
    fn log_tick(&mut self, _state: &SharedTickState, _ran: BandsRan) {}
}

#[derive(Serialize)]
struct TickRecord<'a> {
    tick: u64,
    t: f64,
    semantics_ran: bool,
    control_ran: bool,
    direction_hint: i8,
    confidence: f64,
    goal_distance: f64,
    action_proposed: Option<&'a [f64]>,
    action_final: Option<&'a [f64]>,
    reflex: &'a ReflexFlags,
    interventions: u64,
    policy_id: Option<&'a str>,
}

/// JSONL file sink.
///
/// Output is buffered. Call `TickSink::flush` after the episode; errors
/// during the implicit flush on drop are lost.
pub struct FileSink {
    writer: BufWriter<File>,
}

impl FileSink {
    /// Create (truncate) `path` and write ticks to it.
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl TickSink for FileSink {
    fn log_tick(&mut self, state: &SharedTickState, ran: BandsRan) {
        let advice = state.semantics_advice();
        let record = TickRecord {
            tick: state.tick(),
            t: state.t(),
            semantics_ran: ran.semantics,
            control_ran: ran.control,
            direction_hint: advice.direction_hint,
            confidence: advice.confidence,
            goal_distance: advice.goal_distance,
            action_proposed: state.action_proposed().map(|a| a.as_slice()),
            action_final: state.action_final().map(|a| a.as_slice()),
            reflex: state.reflex_flags(),
            interventions: state.shield_interventions(),
            policy_id: state.active_policy(),
        };

        // Telemetry must never stop the loop; I/O errors are dropped.
        if serde_json::to_writer(&mut self.writer, &record).is_ok() {
            let _ = self.writer.write_all(b"\n");
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

/// Counts ticks with raised reflex flags.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FlagCounter {
    /// Sum of raised flags over all ticks.
    pub activations: u64,
    /// Ticks with at least one flag raised.
    pub flagged_ticks: u64,
    pub near_limit_ticks: u64,
    pub too_fast_ticks: u64,
    pub mismatch_ticks: u64,
}

impl TickSink for FlagCounter {
    fn log_tick(&mut self, state: &SharedTickState, _ran: BandsRan) {
        let flags = state.reflex_flags();
        let raised = flags.active_count() as u64;
        self.activations += raised;
        self.flagged_ticks += u64::from(raised > 0);
        self.near_limit_ticks += u64::from(flags.any_near_limit());
        self.too_fast_ticks += u64::from(flags.too_fast);
        self.mismatch_ticks += u64::from(flags.sensor_mismatch);
    }
}
