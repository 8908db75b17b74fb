// src/bands/semantics.rs
//
// Semantics band (slowest): task-level progress and direction advice.
//
// Reads the observation, writes advice. Pure given the goal spec.

use crate::env::GoalSpec;
use crate::error::{HtiError, Result};
use crate::state::{SemanticsAdvice, SemanticsView};

/// Advice confidence once the goal is within tolerance.
pub const COMPLETE_CONFIDENCE: f64 = 0.9;

#[derive(Debug, Clone)]
pub struct SemanticsBand {
    goal: GoalSpec,
}

impl SemanticsBand {
    pub fn new(goal: GoalSpec) -> Result<Self> {
        if goal.actual.is_empty() || goal.actual.len() != goal.goal.len() {
            return Err(HtiError::InvalidConfig(format!(
                "goal spec needs matching, non-empty channel lists ({} actual, {} goal)",
                goal.actual.len(),
                goal.goal.len()
            )));
        }
        Ok(Self { goal })
    }

    pub fn goal_spec(&self) -> &GoalSpec {
        &self.goal
    }

    pub fn step(&self, view: SemanticsView<'_>) -> Result<()> {
        let obs = view.observation();

        let mut goal = Vec::with_capacity(self.goal.goal.len());
        let mut error = Vec::with_capacity(self.goal.goal.len());
        for (actual_ch, goal_ch) in self.goal.actual.iter().zip(&self.goal.goal) {
            let g = obs.require(goal_ch)?;
            error.push(g - obs.require(actual_ch)?);
            goal.push(g);
        }
        let stage_index = match &self.goal.stage {
            Some(ch) => obs.require(ch)?.max(0.0) as usize,
            None => 0,
        };

        let distance = error.iter().map(|e| e * e).sum::<f64>().sqrt();
        let complete = distance <= self.goal.tolerance;

        let direction_hint = if complete {
            0
        } else {
            match error[0] {
                e if e > 0.0 => 1,
                e if e < 0.0 => -1,
                _ => 0,
            }
        };
        let confidence = if complete {
            COMPLETE_CONFIDENCE
        } else {
            (0.5 + distance).min(1.0)
        };

        view.advise(SemanticsAdvice {
            direction_hint,
            confidence,
            stage_index,
            goal,
            goal_distance: distance,
            stage_complete: complete,
        });
        Ok(())
    }
}
