//! `breakers`: inspect and simulate circuit breaker configurations.
//!
//! # Usage
//!
//! ```text
//! breakers simulate --threshold 2 --events "ok,err,err,wait:300,ok"
//! breakers simulate -c breaker.yaml --events "ok*60,err*7" --format json
//! breakers validate breaker.yaml
//! breakers key --service payments errors
//! ```

mod script;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use breakers_core::{
    Breaker, BreakerBuilder, BreakerConfig, BreakerSnapshot, ManualClock, Strategy,
};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;

use script::Event;

#[derive(Parser)]
#[command(
    name = "breakers",
    version,
    about = "Simulate and validate circuit breaker configurations"
)]
struct Cli {
    /// Log level filter (overridden by RUST_LOG).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Replay an event script against a breaker driven by a manual clock.
    Simulate {
        /// Path to a YAML or JSON breaker config.
        #[arg(short, long)]
        config: Option<PathBuf>,

        #[command(flatten)]
        overrides: ConfigOverrides,

        /// Events to replay, e.g. "ok*10,err,wait:60,ok".
        #[arg(short, long)]
        events: String,

        /// Unix time the simulated clock starts at.
        #[arg(long, default_value_t = 0)]
        start: i64,

        /// Output format.
        #[arg(short, long, value_enum, default_value_t = Format::Text)]
        format: Format,
    },

    /// Load and validate a config file, printing the normalized config.
    Validate {
        /// Path to a YAML or JSON breaker config.
        path: PathBuf,
    },

    /// Print the metrics key for a service.
    Key {
        #[arg(short, long, default_value = breakers_core::config::DEFAULT_SERVICE)]
        service: String,

        name: String,
    },
}

/// Flags that override (or, without a config file, define) the breaker.
#[derive(clap::Args)]
struct ConfigOverrides {
    /// Error count or percentage that trips the breaker.
    #[arg(short, long)]
    threshold: Option<f64>,

    #[arg(long)]
    service: Option<String>,

    /// Rolling-window length in seconds.
    #[arg(long)]
    duration: Option<u64>,

    /// Seconds to stay open before probing.
    #[arg(long)]
    reenable_after: Option<u64>,

    /// "absolute" or "percentage".
    #[arg(long)]
    strategy: Option<String>,
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Text,
    Json,
}

/// Outcome of one replayed event.
#[derive(Serialize)]
struct Step {
    step: usize,
    #[serde(flatten)]
    event: Event,
    at: i64,
    outcome: &'static str,
    #[serde(flatten)]
    snapshot: BreakerSnapshot,
}

#[derive(Debug)]
struct SimulatedFailure;

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing(&cli.log_level);

    match cli.command {
        Commands::Simulate {
            config,
            overrides,
            events,
            start,
            format,
        } => {
            let config = resolve_config(config.as_deref(), overrides)?;
            let events = script::parse(&events)?;
            cmd_simulate(config, &events, start, format)
        }
        Commands::Validate { path } => cmd_validate(&path),
        Commands::Key { service, name } => {
            let breaker = Breaker::new(BreakerConfig::new(0.0).service(service))?;
            println!("{}", breaker.key(&name));
            Ok(())
        }
    }
}

/// Initialize the `tracing` subscriber with the given level filter.
///
/// Respects `RUST_LOG` env var if set.
fn setup_tracing(level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn load_config(path: &Path) -> Result<BreakerConfig> {
    let is_json = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));

    let config = if is_json {
        BreakerConfig::from_json_file(path)
    } else {
        BreakerConfig::from_yaml_file(path)
    };
    config.with_context(|| format!("failed to load config from {}", path.display()))
}

fn resolve_config(path: Option<&Path>, overrides: ConfigOverrides) -> Result<BreakerConfig> {
    let mut config = match (path, overrides.threshold) {
        (Some(path), _) => load_config(path)?,
        (None, Some(threshold)) => BreakerConfig::new(threshold),
        (None, None) => anyhow::bail!("either --config or --threshold is required"),
    };

    if let Some(threshold) = overrides.threshold {
        config.threshold = threshold;
    }
    if let Some(service) = overrides.service {
        config.service = service;
    }
    if let Some(duration) = overrides.duration {
        config.duration_secs = duration;
    }
    if let Some(reenable_after) = overrides.reenable_after {
        config.reenable_after_secs = reenable_after;
    }
    if let Some(strategy) = overrides.strategy {
        config.strategy = strategy.parse::<Strategy>()?;
    }

    config.validate()?;
    Ok(config)
}

fn cmd_simulate(config: BreakerConfig, events: &[Event], start: i64, format: Format) -> Result<()> {
    let clock = ManualClock::new(start);
    let breaker = BreakerBuilder::from_config(config)
        .clock(clock.clone())
        .build()?;
    tracing::debug!(config = ?breaker.config(), events = events.len(), "starting simulation");

    let mut steps = Vec::with_capacity(events.len());
    let mut now = start;

    for (index, event) in events.iter().enumerate() {
        let outcome = match event {
            Event::Ok => match breaker.execute(|| Ok::<(), SimulatedFailure>(())) {
                Ok(()) => "ok",
                Err(e) if e.is_open() => "rejected",
                Err(_) => "failed",
            },
            Event::Err => match breaker.execute(|| Err::<(), SimulatedFailure>(SimulatedFailure)) {
                Err(e) if e.is_open() => "rejected",
                _ => "failed",
            },
            Event::Wait(secs) => {
                now = now
                    .checked_add(*secs)
                    .with_context(|| format!("simulated clock overflows at step {}", index + 1))?;
                clock.set(now);
                "waited"
            }
            Event::Reset => {
                breaker.reset();
                "reset"
            }
        };

        steps.push(Step {
            step: index + 1,
            event: *event,
            at: now,
            outcome,
            snapshot: breaker.snapshot(),
        });
    }

    match format {
        Format::Json => println!("{}", serde_json::to_string_pretty(&steps)?),
        Format::Text => {
            println!(
                "{:>5}  {:<10}  {:>8}  {:<9}  {:<9}  {:>6}  {:>6}",
                "step", "event", "t", "outcome", "state", "calls", "errors"
            );
            for step in &steps {
                println!(
                    "{:>5}  {:<10}  {:>8}  {:<9}  {:<9}  {:>6}  {:>6}",
                    step.step,
                    step.event.to_string(),
                    step.at,
                    step.outcome,
                    step.snapshot.state.to_string(),
                    step.snapshot.calls,
                    step.snapshot.errors
                );
            }
        }
    }

    Ok(())
}

fn cmd_validate(path: &Path) -> Result<()> {
    let config = load_config(path)?;
    print!("{}", serde_yaml::to_string(&config)?);
    Ok(())
}
