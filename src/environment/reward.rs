//! Reward function for the intersection controller.
//!
//! `r = -a·Σq + b / (1 + (max q − min q)) − c·[switch]` with the default
//! weights `a = 0.1`, `b = 1.0`, `c = 0.5`.

use serde::{Deserialize, Serialize};

use crate::rl::{Action, Observation};

/// Coefficients of the three reward terms.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RewardWeights {
    /// Penalty per queued vehicle.
    pub queue_penalty: f64,
    /// Numerator of the balance bonus.
    pub balance_bonus: f64,
    /// Flat penalty for `SWITCH_*` actions.
    pub switch_penalty: f64,
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            queue_penalty: 0.1,
            balance_bonus: 1.0,
            switch_penalty: 0.5,
        }
    }
}

/// The reward split into its terms, each with its sign applied.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct RewardBreakdown {
    pub queue_penalty: f64,
    pub balance_bonus: f64,
    pub switch_penalty: f64,
    /// Vehicles that left the intersection since the previous observation
    /// (negative when queues grew). Reporting only, not part of the reward.
    pub cleared: i64,
}

impl RewardBreakdown {
    pub fn total(&self) -> f64 {
        self.queue_penalty + self.balance_bonus + self.switch_penalty
    }
}

/// Computes rewards for the control loop.
pub struct RewardComputer;

impl RewardComputer {
    /// Reward for taking `action` in `previous` and landing in `current`.
    ///
    /// # Components
    ///
    /// 1. **Queue penalty**: `-queue_penalty × Σ current queues`.
    /// 2. **Balance bonus**: `balance_bonus / (1 + (max − min))` over current queues.
    /// 3. **Switch penalty**: `-switch_penalty` for either `SWITCH_*` action.
    pub fn compute(
        previous: &Observation,
        current: &Observation,
        action: Action,
        weights: &RewardWeights,
    ) -> RewardBreakdown {
        let queues = &current.queues;
        let spread = f64::from(queues.max() - queues.min());

        RewardBreakdown {
            queue_penalty: -weights.queue_penalty * queues.total() as f64,
            balance_bonus: weights.balance_bonus / (1.0 + spread),
            switch_penalty: if action.is_switch() {
                -weights.switch_penalty
            } else {
                0.0
            },
            // Each total is below 2^34, so the casts are lossless.
            cleared: previous.queues.total() as i64 - queues.total() as i64,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intersection::{Phase, QueueLengths};

    fn obs(q: [u32; 4]) -> Observation {
        Observation::new(QueueLengths::new(q), Phase::NsGreen)
    }

    #[test]
    fn empty_intersection_without_switch_is_exactly_one() {
        let zero = obs([0, 0, 0, 0]);
        for action in [Action::ExtendCurrentNs, Action::ExtendCurrentEw] {
            let r = RewardComputer::compute(&zero, &zero, action, &RewardWeights::default());
            assert_eq!(r.total(), 1.0);
        }
    }

    #[test]
    fn switching_costs_half_a_point() {
        let zero = obs([0, 0, 0, 0]);
        let r = RewardComputer::compute(&zero, &zero, Action::SwitchToEw, &RewardWeights::default());
        assert!((r.total() - 0.5).abs() < 1e-10);
        assert!((r.switch_penalty + 0.5).abs() < 1e-10);
    }

    #[test]
    fn queue_and_balance_terms() {
        let prev = obs([5, 5, 5, 5]);
        let cur = obs([8, 6, 3, 2]);
        let r = RewardComputer::compute(&prev, &cur, Action::ExtendCurrentNs, &RewardWeights::default());
        // Σ = 19, spread = 6
        assert!((r.queue_penalty + 1.9).abs() < 1e-10);
        assert!((r.balance_bonus - 1.0 / 7.0).abs() < 1e-10);
        assert!((r.total() - (-1.9 + 1.0 / 7.0)).abs() < 1e-10);
        assert_eq!(r.cleared, 1);
    }

    #[test]
    fn saturated_live_counts_do_not_overflow() {
        let big = obs([u32::MAX / 2; 4]);
        let r = RewardComputer::compute(&obs([0, 0, 0, 0]), &big, Action::ExtendCurrentNs, &RewardWeights::default());
        assert!(r.queue_penalty < -8.0e8);
        assert_eq!(r.balance_bonus, 1.0);
        assert_eq!(r.cleared, -4 * i64::from(u32::MAX / 2));
    }

    #[test]
    fn reward_depends_on_current_queues_only() {
        let cur = obs([1, 2, 3, 4]);
        let w = RewardWeights::default();
        let a = RewardComputer::compute(&obs([0, 0, 0, 0]), &cur, Action::SwitchToNs, &w);
        let b = RewardComputer::compute(&obs([30, 30, 30, 30]), &cur, Action::SwitchToNs, &w);
        assert_eq!(a.total(), b.total());
    }

    #[test]
    fn never_above_one() {
        let w = RewardWeights::default();
        for q in [[0, 0, 0, 0], [1, 1, 1, 1], [30, 0, 0, 0], [2, 2, 2, 3]] {
            let o = obs(q);
            for action in Action::all() {
                assert!(RewardComputer::compute(&o, &o, action, &w).total() <= 1.0);
            }
        }
    }
}
