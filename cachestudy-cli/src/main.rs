//! Cachestudy CLI.
//!
//! Runs one simulation scenario and writes the per-request journal for
//! offline analysis.

mod journal;

use std::path::PathBuf;
use std::process;

use anyhow::Context;
use chrono::Local;
use clap::{Parser, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

use cachestudy_core::{InvalidationConfig, Simulation, SimulationConfig};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Scenario {
    /// Baseline two-tier study, no TTL extension.
    Baseline,
    /// Baseline with TTL extension on half of all cache hits.
    TtlExtension,
    /// Cache stampede: short TTLs and a full wipe one minute in.
    Stampede,
    /// Large key space with mid-length TTLs.
    DynamicExpiration,
}

impl Scenario {
    fn config(self) -> SimulationConfig {
        match self {
            Scenario::Baseline => SimulationConfig::default(),
            Scenario::TtlExtension => SimulationConfig::ttl_extension(),
            Scenario::Stampede => SimulationConfig::stampede(),
            Scenario::DynamicExpiration => SimulationConfig::dynamic_expiration(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    fn as_str(self) -> &'static str {
        match self {
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
            LogLevel::Trace => "trace",
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "cachestudy")]
#[command(about = "Discrete-event simulation of a two-tier cache system")]
struct Cli {
    /// Scenario preset to run.
    #[arg(long, value_enum, default_value = "baseline")]
    scenario: Scenario,

    /// Override the simulated run length in milliseconds.
    #[arg(long)]
    duration_ms: Option<f64>,

    /// Override the random seed.
    #[arg(long)]
    seed: Option<u64>,

    /// Override the number of prefilled keys.
    #[arg(long)]
    prefill_keys: Option<u64>,

    /// Override the cache TTL for workload keys, in milliseconds.
    #[arg(long)]
    cache_ttl_ms: Option<f64>,

    /// Override the TTL extension probability.
    #[arg(long)]
    ttl_extension_probability: Option<f64>,

    /// Schedule a cache invalidation sweep at this time, in
    /// milliseconds. Requires --invalidate-fraction.
    #[arg(long, requires = "invalidate_fraction")]
    invalidate_at_ms: Option<f64>,

    /// Fraction of cache entries the sweep drops.
    #[arg(long, requires = "invalidate_at_ms")]
    invalidate_fraction: Option<f64>,

    /// Override the cache tier's slot count.
    #[arg(long)]
    cache_capacity: Option<usize>,

    /// Override the database tier's slot count.
    #[arg(long)]
    db_capacity: Option<usize>,

    /// Journal output path.
    #[arg(long, default_value = "journal.csv")]
    journal: PathBuf,

    /// Console log level.
    #[arg(long, value_enum, default_value = "info")]
    log_level: LogLevel,
}

impl Cli {
    fn build_config(&self) -> SimulationConfig {
        let mut config = self.scenario.config();
        if let Some(duration_ms) = self.duration_ms {
            config.run.duration_ms = duration_ms;
        }
        if let Some(seed) = self.seed {
            config.run.seed = seed;
        }
        if let Some(prefill_keys) = self.prefill_keys {
            config.run.prefill_keys = prefill_keys;
        }
        if let Some(cache_ttl_ms) = self.cache_ttl_ms {
            config.run.key_cache_ttl_ms = cache_ttl_ms;
        }
        if let Some(probability) = self.ttl_extension_probability {
            config.run.ttl_extension_probability = probability;
        }
        if let (Some(at_ms), Some(fraction)) = (self.invalidate_at_ms, self.invalidate_fraction) {
            config.run.invalidation = Some(InvalidationConfig { at_ms, fraction });
        }
        if let Some(capacity) = self.cache_capacity {
            config.cache.capacity = capacity;
        }
        if let Some(capacity) = self.db_capacity {
            config.database.capacity = capacity;
        }
        config
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.log_level.as_str()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(error) = run(&cli) {
        error!("{error:#}");
        process::exit(1);
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let config = cli.build_config();
    let mut sim = Simulation::new(config.clone()).context("invalid configuration")?;

    info!(scenario = ?cli.scenario, seed = config.run.seed, "starting simulation");
    let started = Local::now();
    let summary = sim.run().context("simulation failed")?;
    let finished = Local::now();

    journal::write_journal(
        &cli.journal,
        &config,
        &summary,
        &sim.stats().sorted_samples(),
        started,
        finished,
    )
    .with_context(|| format!("writing journal to {}", cli.journal.display()))?;

    info!(journal = %cli.journal.display(), "journal written");
    println!("{summary}");
    Ok(())
}
