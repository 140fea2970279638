//! The controlled environment: phase machine, traffic source and reward.

#[allow(clippy::module_inception)]
pub mod environment;
pub mod metrics;
pub mod reward;

pub use environment::{Environment, StepResult};
pub use metrics::{EpisodeSummary, PerformanceSnapshot, PerformanceTracker};
pub use reward::{RewardBreakdown, RewardComputer, RewardWeights};
