// src/bin/compare_brains.rs
//
// Multi-episode brain comparison harness.
//
// Runs N episodes per brain under identical Shield settings and prints how
// hard the Shield had to work for each one.
//
// Run examples:
//   cargo run --bin compare_brains -- --episodes 10 --brains pd,imperfect
//   cargo run --bin compare_brains -- --plant point --brains p,aggressive --out cmp.json
//   cargo run --bin compare_brains -- --episodes 20 --seed 7 --jitter 0.1

use std::fs::File;
use std::io::BufWriter;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hti::{compare_brains, BrainMetrics, CompareConfig, Config, Plant, PolicyGains};

#[derive(Parser, Debug)]
#[command(name = "compare_brains", about = "Compare brains under the same Shield")]
struct Args {
    #[arg(long, default_value = "arm")]
    plant: String,

    #[arg(long, default_value_t = 10)]
    episodes: usize,

    /// Scheduler tick budget per episode (default 2000, or HTI_MAX_TICKS).
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Seed for initial-state jitter.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Initial-state jitter magnitude (0 = nominal start every episode).
    #[arg(long, default_value_t = 0.0)]
    jitter: f64,

    /// Comma-separated brain names.
    #[arg(long, value_delimiter = ',', default_value = "pd,imperfect")]
    brains: Vec<String>,

    /// Optional JSON summary path.
    #[arg(long)]
    out: Option<String>,

    #[arg(long, short)]
    verbose: bool,
}

fn print_table(plant: Plant, episodes: usize, metrics: &[BrainMetrics]) {
    println!(
        "Brain comparison: plant={} episodes/brain={}",
        plant.as_str(),
        episodes
    );
    println!(
        "{:<14} {:>8} {:>14} {:>14} {:>12} {:>12}",
        "brain", "success", "interventions", "clipped", "reflex", "conv_ticks"
    );
    for m in metrics {
        println!(
            "{:<14} {:>7.0}% {:>14.1} {:>14.2} {:>12.1} {:>12.0}",
            m.brain,
            m.success_rate * 100.0,
            m.avg_interventions,
            m.avg_clipped,
            m.avg_reflex_flags,
            m.avg_convergence_ticks
        );
    }

    if let [base, other, ..] = metrics {
        if base.avg_interventions > 0.0 {
            println!(
                "{} vs {}: {:.2}x interventions",
                other.brain,
                base.brain,
                other.avg_interventions / base.avg_interventions
            );
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();
    let default = if args.verbose { "hti=debug" } else { "hti=warn" };
    let filter = EnvFilter::try_from_env("HTI_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let plant = Plant::parse(&args.plant)
        .with_context(|| format!("unknown plant '{}' (expected arm | point)", args.plant))?;
    let mut cfg = Config::from_env_or_plant(plant);
    if let Some(max_ticks) = args.max_ticks {
        cfg.scheduler.max_ticks = max_ticks;
    }
    cfg.validate()?;

    let cmp = CompareConfig {
        episodes: args.episodes,
        seed: args.seed,
        jitter: args.jitter,
        gains: PolicyGains::default(),
    };
    let metrics = compare_brains(&cfg, &args.brains, &cmp)?;
    print_table(plant, args.episodes, &metrics);

    if let Some(path) = &args.out {
        let file = File::create(path).with_context(|| format!("creating {path}"))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &metrics)?;
        println!("summary written to {path}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_budget_defers_to_config_unless_given() {
        let args = Args::try_parse_from(["compare_brains"]).unwrap();
        assert_eq!(args.max_ticks, None);
        assert_eq!(args.brains, vec!["pd", "imperfect"]);

        let args = Args::try_parse_from(["compare_brains", "--max-ticks", "300"]).unwrap();
        assert_eq!(args.max_ticks, Some(300));
    }
}
