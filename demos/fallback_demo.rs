// Demonstration: a live backend that dies mid-run and the synthetic fallback
// taking over without a gap in the frame stream.
//
// Build/run from this repo root:
//   cargo run --features testing --example fallback_demo -- --ticks 600 --fail-after 40 --seed 7

use std::env;
use std::io;

use junction_rl::control::{ControlLoop, JsonLinesSink, LoopConfig};
use junction_rl::environment::{Environment, RewardWeights};
use junction_rl::intersection::PhaseTiming;
use junction_rl::rl::{AgentConfig, DqnAgent};
use junction_rl::source::{FaultPoint, ScriptedBackend, SyntheticConfig, SyntheticGenerator, TrafficSource};

fn main() {
    let args: Vec<String> = env::args().collect();
    let ticks: u64 = arg_value(&args, "--ticks")
        .and_then(|s| s.parse().ok())
        .unwrap_or(600);
    let fail_after: usize = arg_value(&args, "--fail-after")
        .and_then(|s| s.parse().ok())
        .unwrap_or(40);
    let seed: u64 = arg_value(&args, "--seed")
        .and_then(|s| s.parse().ok())
        .unwrap_or(7);

    tracing_subscriber::fmt().with_writer(io::stderr).init();

    // Rush-hour snapshots. `--fail-after` counts observations: each one reads
    // four queues and every tick observes twice.
    let backend = ScriptedBackend::new(vec![[12, 9, 3, 2], [14, 10, 4, 2], [11, 8, 6, 3]])
        .failing_at(FaultPoint::ReadQueue, fail_after * 4);
    let probe = backend.probe();

    let source = TrafficSource::new(
        Some(Box::new(backend)),
        SyntheticGenerator::new(SyntheticConfig::default(), seed + 1),
    );
    let env = Environment::new(PhaseTiming::default(), source, RewardWeights::default());
    let agent = match DqnAgent::new(AgentConfig::default(), seed) {
        Ok(agent) => agent,
        Err(err) => {
            eprintln!("could not build agent: {err}");
            std::process::exit(2);
        }
    };
    let config = LoopConfig {
        total_ticks: ticks,
        ..LoopConfig::default()
    };

    let mut control = match ControlLoop::new(env, agent, config) {
        Ok(control) => control,
        Err(err) => {
            eprintln!("invalid loop configuration: {err}");
            std::process::exit(2);
        }
    };

    let mut sink = JsonLinesSink::new(io::stdout().lock());
    match control.run(&mut sink) {
        Ok(summary) => {
            eprintln!(
                "ran {} ticks ({:?}); fell back: {}; live queue reads: {}; backend released: {}",
                summary.ticks,
                summary.reason,
                summary.fell_back,
                probe.queue_reads(),
                probe.is_closed()
            );
            for episode in &summary.episodes {
                eprintln!("  {episode}");
            }
        }
        Err(err) => {
            eprintln!("run aborted: {err}");
            std::process::exit(1);
        }
    }
}

fn arg_value<'a>(args: &'a [String], key: &str) -> Option<&'a str> {
    args.iter()
        .position(|a| a == key)
        .and_then(|i| args.get(i + 1))
        .map(|s| s.as_str())
}
