// src/compare.rs
//
// Multi-episode brain comparison.
//
// Runs N episodes per brain against the same plant and Shield settings and
// aggregates how hard the Shield had to work for each one. Episodes may be
// perturbed by seeded initial-state jitter; the same seed reproduces the same
// sequence of starts for every brain.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::bands::Bands;
use crate::config::Config;
use crate::env::{build_env, EnvOptions, InitJitter};
use crate::error::{HtiError, Result};
use crate::event_log::{EventLogger, EventPack, InterventionReason};
use crate::logging::FlagCounter;
use crate::policy::{create_policy, PolicyGains};
use crate::runner::{run_episode, EpisodeStats};

#[derive(Debug, Clone)]
pub struct CompareConfig {
    pub episodes: usize,
    pub seed: u64,
    /// Initial-state jitter magnitude; 0.0 gives identical nominal episodes.
    pub jitter: f64,
    pub gains: PolicyGains,
}

impl Default for CompareConfig {
    fn default() -> Self {
        Self {
            episodes: 10,
            seed: 0,
            jitter: 0.0,
            gains: PolicyGains::default(),
        }
    }
}

impl CompareConfig {
    /// Rejects a zero episode count and out-of-range jitter before any run.
    pub fn validate(&self) -> Result<()> {
        if self.episodes == 0 {
            return Err(HtiError::InvalidConfig(
                "comparison needs at least one episode".to_string(),
            ));
        }
        InitJitter::new(self.seed, self.jitter).map(|_| ())
    }
}

/// Per-episode outcome used for aggregation.
#[derive(Debug, Clone, Serialize)]
pub struct EpisodeRecord {
    pub success: bool,
    pub ticks: u64,
    pub interventions: u64,
    pub clipped_total: f64,
    pub reflex_activations: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct BrainMetrics {
    pub brain: String,
    pub episodes: usize,
    pub success_rate: f64,
    pub avg_interventions: f64,
    /// Mean over episodes of the summed |proposed - final| across all events.
    pub avg_clipped: f64,
    pub avg_reflex_flags: f64,
    /// Mean ticks over successful episodes only (0 when none succeeded).
    pub avg_convergence_ticks: f64,
    pub reason_counts: BTreeMap<InterventionReason, usize>,
}

impl BrainMetrics {
    fn from_records(
        brain: &str,
        records: &[EpisodeRecord],
        reason_counts: BTreeMap<InterventionReason, usize>,
    ) -> Self {
        let n = records.len().max(1) as f64;
        let mean = |f: &dyn Fn(&EpisodeRecord) -> f64| records.iter().map(f).sum::<f64>() / n;
        let successes: Vec<&EpisodeRecord> = records.iter().filter(|r| r.success).collect();
        let avg_convergence_ticks = if successes.is_empty() {
            0.0
        } else {
            successes.iter().map(|r| r.ticks as f64).sum::<f64>() / successes.len() as f64
        };
        Self {
            brain: brain.to_string(),
            episodes: records.len(),
            success_rate: successes.len() as f64 / n,
            avg_interventions: mean(&|r: &EpisodeRecord| r.interventions as f64),
            avg_clipped: mean(&|r: &EpisodeRecord| r.clipped_total),
            avg_reflex_flags: mean(&|r: &EpisodeRecord| r.reflex_activations as f64),
            avg_convergence_ticks,
            reason_counts,
        }
    }
}

/// Sum of per-component |proposed - final| over all events.
///
/// A missing proposed component counts as the neutral value (zero).
pub fn clipped_magnitude(events: &[EventPack]) -> f64 {
    events
        .iter()
        .map(|ev| {
            ev.action_final
                .iter()
                .enumerate()
                .map(|(i, f)| {
                    let p = ev.action_proposed.get(i).copied().unwrap_or(0.0);
                    if p.is_finite() {
                        (p - f).abs()
                    } else {
                        0.0
                    }
                })
                .sum::<f64>()
        })
        .sum()
}

/// Run `cmp.episodes` episodes of `brain` and aggregate them.
pub fn run_n_episodes(
    cfg: &Config,
    brain: &str,
    cmp: &CompareConfig,
) -> Result<(BrainMetrics, Vec<EpisodeStats>)> {
    cmp.validate()?;
    let opts = EnvOptions {
        glitch: None,
        jitter: (cmp.jitter != 0.0).then_some((cmp.seed, cmp.jitter)),
    };
    // One env for all episodes: each reset draws the next jitter sample.
    let mut env = build_env(cfg.plant, &opts)?;
    let policy = create_policy(cfg.plant, brain, &cmp.gains)?;
    let mut bands = Bands::for_env(env.as_ref(), policy, cfg)?;
    let mut logger = EventLogger::in_memory();

    let mut records = Vec::with_capacity(cmp.episodes);
    let mut all_stats = Vec::with_capacity(cmp.episodes);
    let mut reason_counts: BTreeMap<InterventionReason, usize> = BTreeMap::new();

    for episode in 0..cmp.episodes {
        let mut flags = FlagCounter::default();
        let stats = run_episode(
            env.as_mut(),
            &mut bands,
            &mut logger,
            &mut flags,
            &cfg.scheduler,
        )?;
        tracing::debug!(
            brain,
            episode,
            success = stats.success,
            ticks = stats.ticks,
            "[compare] episode done"
        );
        for (reason, count) in &stats.reason_counts {
            *reason_counts.entry(*reason).or_insert(0) += count;
        }
        records.push(EpisodeRecord {
            success: stats.success,
            ticks: stats.ticks,
            interventions: stats.interventions,
            clipped_total: clipped_magnitude(logger.events()),
            reflex_activations: flags.activations,
        });
        all_stats.push(stats);
    }

    Ok((
        BrainMetrics::from_records(brain, &records, reason_counts),
        all_stats,
    ))
}

/// Run every brain in `brains` under identical conditions.
pub fn compare_brains(
    cfg: &Config,
    brains: &[String],
    cmp: &CompareConfig,
) -> Result<Vec<BrainMetrics>> {
    brains
        .iter()
        .map(|b| run_n_episodes(cfg, b, cmp).map(|(m, _)| m))
        .collect()
}
