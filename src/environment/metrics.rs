//! Performance reporting.
//!
//! [`PerformanceSnapshot`] is a per-tick projection of the current queues;
//! it is recomputed every tick and never fed back into learning.
//! [`PerformanceTracker`] folds snapshots and rewards into per-episode
//! [`EpisodeSummary`] records.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::intersection::QueueLengths;

/// Derived traffic-performance figures for one tick.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSnapshot {
    /// Estimated mean wait in seconds: `20 + 0.8·Σq`.
    pub avg_wait_time: f64,
    /// Vehicles per hour: `max(1200 − 50·Σq, 800)`.
    pub throughput: f64,
    pub max_queue: u32,
    /// Score in `[50, 100]`: `max(50, 100 − 2·Σq)`.
    pub efficiency_score: f64,
}

impl PerformanceSnapshot {
    pub fn from_queues(queues: &QueueLengths) -> Self {
        let total = queues.total() as f64;
        Self {
            avg_wait_time: 20.0 + total * 0.8,
            throughput: (1200.0 - total * 50.0).max(800.0),
            max_queue: queues.max(),
            efficiency_score: (100.0 - total * 2.0).max(50.0),
        }
    }
}

/// Aggregate of one finished episode.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeSummary {
    pub episode: u64,
    pub ticks: u64,
    pub total_reward: f64,
    pub mean_wait_time: f64,
    pub max_queue: u32,
    /// Sum of per-minute throughput samples (vehicles per hour / 60).
    pub vehicles_served: f64,
    /// Net vehicles cleared over the episode.
    pub vehicles_cleared: i64,
    pub epsilon: f64,
}

impl EpisodeSummary {
    pub fn mean_reward(&self) -> f64 {
        if self.ticks == 0 {
            0.0
        } else {
            self.total_reward / self.ticks as f64
        }
    }
}

impl fmt::Display for EpisodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "episode {}: {} ticks, reward {:.2} (mean {:.3}), wait {:.1}s, max queue {}, served {:.0}",
            self.episode,
            self.ticks,
            self.total_reward,
            self.mean_reward(),
            self.mean_wait_time,
            self.max_queue,
            self.vehicles_served
        )
    }
}

/// Accumulates per-tick figures until the episode closes.
#[derive(Debug, Clone, Default)]
pub struct PerformanceTracker {
    ticks: u64,
    total_reward: f64,
    wait_sum: f64,
    max_queue: u32,
    vehicles_served: f64,
    vehicles_cleared: i64,
}

impl PerformanceTracker {
    /// Ticks per throughput sample.
    pub const SAMPLE_TICKS: u64 = 60;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, snapshot: &PerformanceSnapshot, reward: f64, cleared: i64) {
        self.ticks += 1;
        self.total_reward += reward;
        self.wait_sum += snapshot.avg_wait_time;
        self.max_queue = self.max_queue.max(snapshot.max_queue);
        self.vehicles_cleared += cleared;
        if self.ticks % Self::SAMPLE_TICKS == 0 {
            self.vehicles_served += snapshot.throughput / Self::SAMPLE_TICKS as f64;
        }
    }

    /// Ticks recorded in the open episode.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Closes the open episode and starts a fresh one.
    pub fn finish_episode(&mut self, episode: u64, epsilon: f64) -> EpisodeSummary {
        let done = std::mem::take(self);
        EpisodeSummary {
            episode,
            ticks: done.ticks,
            total_reward: done.total_reward,
            mean_wait_time: if done.ticks == 0 {
                0.0
            } else {
                done.wait_sum / done.ticks as f64
            },
            max_queue: done.max_queue,
            vehicles_served: done.vehicles_served,
            vehicles_cleared: done.vehicles_cleared,
            epsilon,
        }
    }
}
