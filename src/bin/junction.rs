//! Command-line runner for the intersection controller.
//!
//! Frames go to stdout, one JSON object per line; logs go to stderr.

use std::io::{self, BufRead};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use junction_rl::control::ChannelSink;
use junction_rl::source::BridgeConfig;
use junction_rl::{SimulationConfig, StopHandle};

/// Frames buffered between the loop and the stdout writer.
const OUTPUT_BUFFER: usize = 64;

/// Reinforcement-learning traffic-signal controller
#[derive(Parser, Debug)]
#[command(name = "junction")]
#[command(version)]
#[command(about = "Runs a DQN signal controller and streams one JSON frame per tick", long_about = None)]
struct Args {
    /// JSON run configuration; defaults apply to omitted fields
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of ticks to run
    #[arg(long)]
    ticks: Option<u64>,

    /// Master random seed
    #[arg(long)]
    seed: Option<u64>,

    /// Simulator bridge address (host:port); enables the live backend
    #[arg(long)]
    bridge: Option<String>,

    /// Ignore any configured bridge and use synthetic traffic only
    #[arg(long, conflicts_with = "bridge")]
    synthetic: bool,

    /// Ticks per episode
    #[arg(long)]
    episode_length: Option<u64>,

    /// Real-time delay between ticks in milliseconds
    #[arg(long)]
    tick_delay_ms: Option<u64>,

    /// Restore the online network from this file before running
    #[arg(long)]
    load_model: Option<PathBuf>,

    /// Save the online network to this file after an orderly stop
    #[arg(long)]
    save_model: Option<PathBuf>,

    /// Stop when stdin yields a `stop` line or reaches EOF
    #[arg(long)]
    stop_on_stdin: bool,

    /// Verbosity level (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

impl Args {
    fn apply(&self, config: &mut SimulationConfig) {
        if let Some(ticks) = self.ticks {
            config.control.total_ticks = ticks;
        }
        if let Some(seed) = self.seed {
            config.seed = Some(seed);
        }
        if let Some(address) = &self.bridge {
            let bridge = config.bridge.get_or_insert_with(BridgeConfig::default);
            bridge.address = address.clone();
        }
        if self.synthetic {
            config.bridge = None;
        }
        if let Some(length) = self.episode_length {
            config.control.episode_length = length;
        }
        if let Some(delay) = self.tick_delay_ms {
            config.control.tick_delay_ms = delay;
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level)))
        .with_writer(io::stderr)
        .init();

    let mut config = match &args.config {
        Some(path) => SimulationConfig::from_json_file(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SimulationConfig::default(),
    };
    args.apply(&mut config);

    let seed = config.resolve_seed();
    info!(seed, live = config.bridge.is_some(), "configuration loaded");
    let mut control = config.build(seed)?;

    if let Some(path) = &args.load_model {
        control
            .agent_mut()
            .load(path)
            .with_context(|| format!("loading model {}", path.display()))?;
    }
    if args.stop_on_stdin {
        watch_stdin(control.stop_handle());
    }

    let timeout = Duration::from_millis(config.control.emit_timeout_ms);
    let (mut sink, writer) = ChannelSink::spawn_writer(io::stdout(), OUTPUT_BUFFER, timeout);
    let outcome = control.run(&mut sink);
    drop(sink);
    match writer.join() {
        Ok(Ok(lines)) => info!(lines, "output stream closed"),
        Ok(Err(err)) => warn!(error = %err, "output stream failed"),
        Err(_) => warn!("output writer panicked"),
    }

    let summary = outcome?;
    info!(
        ticks = summary.ticks,
        reason = ?summary.reason,
        episodes = summary.episodes.len(),
        final_epsilon = summary.final_epsilon,
        "run complete"
    );

    if let Some(path) = &args.save_model {
        control
            .agent()
            .save(path)
            .with_context(|| format!("saving model {}", path.display()))?;
    }
    Ok(())
}

/// Requests a stop on a `stop` line or EOF.
fn watch_stdin(stop: StopHandle) {
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) if line.trim().eq_ignore_ascii_case("stop") => break,
                Ok(_) => {}
                Err(_) => break,
            }
        }
        info!("stop requested on stdin");
        stop.stop();
    });
}
