// src/loop_scheduler.rs
//
// Deterministic single-thread decimation for the band cadences.
//
// The base loop advances one tick at a time. Semantics and Control are due
// when the tick reaches their next-due counter; marking a band as ran moves
// the counter forward by its period. Starting both counters at tick 0 makes
// this identical to the `tick % period == 0` rule. Reflex and Shield have no
// counters: they run on every tick.

use crate::config::BandPeriods;
use crate::error::Result;

#[derive(Debug, Clone)]
pub struct LoopScheduler {
    semantics_period: u64,
    control_period: u64,
    next_tick: u64,
    next_semantics: u64,
    next_control: u64,
}

impl LoopScheduler {
    pub fn new(periods: BandPeriods) -> Result<Self> {
        periods.validate()?;
        Ok(Self {
            semantics_period: periods.semantics,
            control_period: periods.control,
            next_tick: 0,
            next_semantics: 0,
            next_control: 0,
        })
    }

    pub fn next_tick(&self) -> u64 {
        self.next_tick
    }

    /// Return the tick to execute and move the base clock forward.
    pub fn advance(&mut self) -> u64 {
        let tick = self.next_tick;
        self.next_tick += 1;
        tick
    }

    pub fn semantics_due(&self, tick: u64) -> bool {
        tick >= self.next_semantics
    }

    pub fn control_due(&self, tick: u64) -> bool {
        tick >= self.next_control
    }

    pub fn mark_semantics_ran(&mut self) {
        self.next_semantics += self.semantics_period;
    }

    pub fn mark_control_ran(&mut self) {
        self.next_control += self.control_period;
    }
}
