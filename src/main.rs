//! Demo driver: runs a full tune against the built-in simulated vehicle at
//! the real 40 Hz cadence (fast-forwarded), streaming status messages as a
//! ground station would show them and finishing with a before/after gain
//! table.

use std::io::Write;
use std::path::PathBuf;

use clap::Parser;
use colored::*;
use tracing_subscriber::EnvFilter;

use rate_autotune::sim::{SimRates, SimStatus, SimStore};
use rate_autotune::{
    Axis, MemorySink, Param, RateController, RateTuner, Severity, Stage, SwitchPos, TuneConfig,
    TICK_RATE_HZ,
};

#[derive(Parser)]
#[command(name = "rate-autotune")]
#[command(version)]
#[command(about = "Run the in-flight gain tuner against a simulated vehicle")]
struct Args {
    /// TOML config file. Omitted: defaults with tuning enabled and a 5 s
    /// auto-save, which completes unattended
    #[arg(long)]
    config: Option<PathBuf>,

    /// Give up after this many simulated seconds
    #[arg(long, default_value = "180")]
    max_secs: u64,

    /// Seed for the simulated vehicle's measurement noise
    #[arg(long, default_value = "7")]
    seed: u64,

    /// Write every gain-adjustment record to this file as JSON lines
    #[arg(long)]
    log_json: Option<PathBuf>,
}

fn severity_paint(sev: Severity, msg: &str) -> ColoredString {
    match sev {
        Severity::Info      => msg.normal(),
        Severity::Notice    => msg.green(),
        Severity::Warning   => msg.yellow(),
        Severity::Emergency => msg.red().bold(),
    }
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let cfg = match &args.config {
        Some(path) => TuneConfig::load(path)?,
        None => TuneConfig { enabled: true, auto_save_s: 5, ..Default::default() },
    };

    let tune_switch = if cfg.two_position_switch { SwitchPos::High } else { SwitchPos::Mid };
    let mut tuner = RateTuner::new(
        cfg,
        SimRates::new(args.seed),
        SimStatus::default(),
        SimStore::default(),
        MemorySink::new(1 << 16),
    )?;

    let gains_before: Vec<(Param, f32)> = tuned_gains()
        .map(|p| (p, tuner.controller().gain(p)))
        .collect();

    println!("{}", "rate-autotune simulation".bold());
    println!("switch -> tune; vehicle armed and flying\n");
    tuner.set_switch_pos(tune_switch);

    // Start the clock a minute after "boot" so the input/warning throttles
    // behave the way they do on a real vehicle mid-flight.
    let tick_ms = 1000 / u64::from(TICK_RATE_HZ);
    let mut now: u64 = 60_000;
    let mut printed = 0;

    for _ in 0..args.max_secs * u64::from(TICK_RATE_HZ) {
        tuner.controller_mut().step();
        tuner.tick(now);
        now += tick_ms;

        let statuses = tuner.telemetry().statuses();
        for s in &statuses[printed..] {
            let t_secs = (now - 60_000) as f64 / 1000.0;
            println!("{:7.2}s  {}", t_secs, severity_paint(s.severity, &s.message));
        }
        printed = statuses.len();

        // Auto-save has fired once the store is populated and nothing is
        // left to revert.
        if !tuner.store().persisted().is_empty() && !tuner.session().need_restore() {
            break;
        }
    }

    println!();
    if tuner.store().persisted().is_empty() {
        println!("{}", "tune did not complete within the time limit".yellow());
    } else {
        println!("{}", format!("{} gains persisted", tuner.store().persisted().len()).green());
    }

    println!("\n{:<10} {:>12} {:>12}", "param".bold(), "before".bold(), "after".bold());
    for (p, before) in &gains_before {
        let after = tuner.controller().gain(*p);
        let after_str = format!("{after:>12.5}");
        let after_col = if (after - before).abs() > 1e-9 { after_str.green() } else { after_str.normal() };
        println!("{:<10} {:>12.5} {}", p.name(), before, after_col);
    }

    if let Some(path) = &args.log_json {
        let mut f = std::fs::File::create(path)?;
        for value in tuner.telemetry().records_json() {
            writeln!(f, "{value}")?;
        }
        println!("\nwrote {} gain records to {}", tuner.telemetry().records().len(), path.display());
    }

    Ok(())
}

/// The nine stepped/coupled gains shown in the summary table.
fn tuned_gains() -> impl Iterator<Item = Param> {
    Axis::all().iter().flat_map(|&axis| {
        [Stage::P, Stage::I, Stage::D].into_iter().map(move |s| Param::new(axis, s))
    })
}
