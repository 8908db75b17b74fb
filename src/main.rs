// src/main.rs
//
// Thin harness around the HTI library: run one episode on a reference plant
// with a named brain and report what the Shield had to do.

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use hti::{
    available_policies, build_env, create_policy, default_policy, run_episode, Bands,
    Config, EnvOptions, EventLogger, FileSink, GlitchWindow, NoopSink, Plant, PolicyGains,
    TickSink,
};

/// Command-line arguments for the `hti` binary.
#[derive(Parser, Debug)]
#[command(name = "hti", version, about = "Run one time-banded control episode")]
struct Cli {
    /// Reference plant: `arm` (2-DOF torque) or `point` (1-D position).
    #[arg(long, default_value = "arm")]
    plant: String,

    /// Brain name from the registry (default: `pd` for arm, `p` for point).
    #[arg(long)]
    brain: Option<String>,

    /// P gain override.
    #[arg(long)]
    gain: Option<f64>,

    /// PD proportional gain override.
    #[arg(long)]
    kp: Option<f64>,

    /// PD derivative gain override.
    #[arg(long)]
    kd: Option<f64>,

    /// Scheduler tick budget (default 2000, or HTI_MAX_TICKS).
    #[arg(long)]
    max_ticks: Option<u64>,

    /// Debug-level logging (per intervention and every 100 ticks).
    #[arg(long, short)]
    verbose: bool,

    /// JSONL path for Shield events (truncated each run).
    #[arg(long, default_value = "event_log.jsonl")]
    event_log: String,

    /// Optional JSONL path for per-tick telemetry.
    #[arg(long)]
    tick_log: Option<String>,

    /// Inject the point-mass sensor glitch window.
    #[arg(long)]
    glitch: bool,
}

/// `HTI_LOG` wins; otherwise `hti=info`, or `hti=debug` with --verbose.
fn init_tracing(verbose: bool) {
    let default = if verbose { "hti=debug" } else { "hti=info" };
    let filter = EnvFilter::try_from_env("HTI_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Tick sink as a trait object so the file sink is optional at runtime.
fn build_sink(tick_log: Option<&str>) -> Result<Box<dyn TickSink>> {
    match tick_log {
        Some(path) => {
            let sink = FileSink::create(path)
                .with_context(|| format!("creating tick log {path}"))?;
            Ok(Box::new(sink))
        }
        None => Ok(Box::new(NoopSink)),
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let plant = Plant::parse(&cli.plant)
        .with_context(|| format!("unknown plant '{}' (expected arm | point)", cli.plant))?;

    let mut cfg = Config::from_env_or_plant(plant);
    if let Some(max_ticks) = cli.max_ticks {
        cfg.scheduler.max_ticks = max_ticks;
    }
    cfg.validate()?;

    let brain = cli
        .brain
        .clone()
        .unwrap_or_else(|| default_policy(plant).to_string());
    let gains = PolicyGains {
        gain: cli.gain,
        kp: cli.kp,
        kd: cli.kd,
    };
    let policy = create_policy(plant, &brain, &gains)?;

    if cli.glitch && plant != Plant::PointMass {
        tracing::warn!("--glitch only applies to the point plant; ignoring");
    }
    let opts = EnvOptions {
        glitch: cli.glitch.then(GlitchWindow::default),
        jitter: None,
    };
    let mut env = build_env(plant, &opts)?;
    let mut bands = Bands::for_env(env.as_ref(), policy, &cfg)?;
    let mut logger = EventLogger::to_file(&cli.event_log);
    let mut sink = build_sink(cli.tick_log.as_deref())?;

    println!(
        "HTI {} | plant={} brain={} (available: {})",
        cfg.version,
        plant.as_str(),
        brain,
        available_policies(plant).join(", ")
    );

    let stats = run_episode(
        env.as_mut(),
        &mut bands,
        &mut logger,
        sink.as_mut(),
        &cfg.scheduler,
    )?;
    sink.flush().context("flushing tick log")?;

    let summary = logger.summary();
    println!("--- episode summary ---");
    println!("ticks:          {}", stats.ticks);
    println!("simulated time: {:.2} s", stats.simulated_time);
    println!("success:        {}", stats.success);
    println!("reason:         {}", stats.reason);
    println!("final distance: {:.4}", stats.final_distance);
    println!("interventions:  {}", stats.interventions);
    for (reason, count) in &summary.by_reason {
        println!("  {:<22} {}", reason.as_str(), count);
    }
    if let (Some(first), Some(last)) = (&summary.first, &summary.last) {
        println!(
            "  first at tick {} ({}), last at tick {} ({})",
            first.tick,
            first.reason.as_str(),
            last.tick,
            last.reason.as_str()
        );
    }
    println!("band timings (mean / max us):");
    for (band, runs) in &stats.band_runs {
        let t = stats.timings.get(*band);
        println!(
            "  {:<10} runs={:<5} {:>8.2} / {:>8.2}",
            band.as_str(),
            runs,
            t.mean().as_secs_f64() * 1e6,
            t.max.as_secs_f64() * 1e6
        );
    }
    println!("event log: {}", cli.event_log);

    Ok(())
}
