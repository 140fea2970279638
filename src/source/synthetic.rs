//! Synthetic traffic generator used when no live simulator is reachable.
//!
//! Queue dynamics are driven by a cycle of named traffic patterns plus bounded
//! random perturbation, with extra clearing on the axis the signal serves.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::intersection::{Direction, Phase, QueueLengths};

/// A named set of baseline queue levels `[north, south, east, west]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrafficPattern {
    pub name: String,
    pub baseline: [u32; 4],
}

impl TrafficPattern {
    pub fn new(name: impl Into<String>, baseline: [u32; 4]) -> Self {
        Self {
            name: name.into(),
            baseline,
        }
    }

    /// The default rotation: morning rush, evening rush, normal.
    pub fn defaults() -> Vec<TrafficPattern> {
        vec![
            TrafficPattern::new("morning_rush", [8, 6, 3, 2]),
            TrafficPattern::new("evening_rush", [5, 7, 6, 4]),
            TrafficPattern::new("normal", [3, 2, 4, 1]),
        ]
    }
}

/// Parameters of the synthetic generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    /// Queues before the first request.
    pub initial_queues: [u32; 4],
    /// Patterns cycled through over simulated time.
    pub patterns: Vec<TrafficPattern>,
    /// Ticks each pattern stays active.
    pub pattern_window: u64,
    /// Upper clamp for every queue.
    pub max_queue: u32,
    /// Symmetric bound of the per-request random change.
    pub perturbation: i64,
    /// Smallest extra reduction on the served axis.
    pub clearing_min: i64,
    /// Largest extra reduction on the served axis.
    pub clearing_max: i64,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            initial_queues: [3, 2, 4, 1],
            patterns: TrafficPattern::defaults(),
            pattern_window: 1000,
            max_queue: 30,
            perturbation: 5,
            clearing_min: 1,
            clearing_max: 3,
        }
    }
}

/// Seedable generator of plausible queue dynamics.
#[derive(Debug, Clone)]
pub struct SyntheticGenerator {
    config: SyntheticConfig,
    queues: QueueLengths,
    rng: StdRng,
}

impl SyntheticGenerator {
    /// Creates a generator with a deterministic random stream.
    pub fn new(config: SyntheticConfig, seed: u64) -> Self {
        let queues = QueueLengths::new(config.initial_queues);
        Self {
            config,
            queues,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &SyntheticConfig {
        &self.config
    }

    /// Queues produced by the most recent request.
    pub fn queues(&self) -> QueueLengths {
        self.queues
    }

    /// Index of the pattern active at `elapsed` ticks.
    pub fn pattern_index(&self, elapsed: u64) -> usize {
        let count = self.config.patterns.len().max(1) as u64;
        let window = self.config.pattern_window.max(1);
        ((elapsed / window) % count) as usize
    }

    /// The pattern active at `elapsed` ticks, if any are configured.
    pub fn pattern_at(&self, elapsed: u64) -> Option<&TrafficPattern> {
        self.config.patterns.get(self.pattern_index(elapsed))
    }

    /// Produces the next queue lengths.
    ///
    /// Each queue moves by `baseline / 2` of the active pattern plus a uniform
    /// change in `[-perturbation, perturbation]`. Approaches on the axis served
    /// by `phase` lose an additional `[clearing_min, clearing_max]`. Results
    /// are clamped to `[0, max_queue]`.
    pub fn next_queues(&mut self, phase: Phase, elapsed: u64) -> QueueLengths {
        let baseline = self
            .pattern_at(elapsed)
            .map(|p| p.baseline)
            .unwrap_or([0; 4]);
        let spread = self.config.perturbation.saturating_abs();
        let max_queue = i64::from(self.config.max_queue);

        for direction in Direction::all() {
            let mut change = self.rng.gen_range(-spread..=spread);
            if direction.axis() == phase.axis() {
                let cleared = self
                    .rng
                    .gen_range(self.config.clearing_min..=self.config.clearing_max);
                change = change.saturating_sub(cleared);
            }
            let base = i64::from(baseline[direction.index()]) / 2;
            let next = i64::from(self.queues[direction])
                .saturating_add(change)
                .saturating_add(base);
            self.queues[direction] = next.clamp(0, max_queue) as u32;
        }

        self.queues
    }
}
