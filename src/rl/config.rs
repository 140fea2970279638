//! Hyperparameters of the learning agent.

use serde::{Deserialize, Serialize};

use super::action::Action;
use super::observation::Observation;

/// Configuration for [`super::DqnAgent`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    // --- Shapes ---
    /// Length of the observation vector.
    pub state_dim: usize,
    /// Number of actions (approximator output width).
    pub action_count: usize,
    /// Hidden layer widths of the default approximator.
    pub hidden_layers: Vec<usize>,

    // --- Optimisation ---
    pub learning_rate: f64,
    /// Discount factor γ.
    pub gamma: f64,
    pub batch_size: usize,
    pub replay_capacity: usize,

    // --- Exploration ---
    pub epsilon: f64,
    pub epsilon_min: f64,
    /// Multiplicative decay applied after each training step.
    pub epsilon_decay: f64,

    // --- Encoding ---
    /// Clip queue features at this value before they reach the approximator.
    pub queue_ceiling: Option<u32>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            state_dim: Observation::DIM,
            action_count: Action::COUNT,
            hidden_layers: vec![64, 64, 32],
            learning_rate: 0.001,
            gamma: 0.95,
            batch_size: 32,
            replay_capacity: 10_000,
            epsilon: 1.0,
            epsilon_min: 0.01,
            epsilon_decay: 0.995,
            queue_ceiling: None,
        }
    }
}

impl AgentConfig {
    /// Layer widths of the approximator, input to output.
    pub fn layer_sizes(&self) -> Vec<usize> {
        let mut sizes = Vec::with_capacity(self.hidden_layers.len() + 2);
        sizes.push(self.state_dim);
        sizes.extend(&self.hidden_layers);
        sizes.push(self.action_count);
        sizes
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_catalog() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.state_dim, 5);
        assert_eq!(cfg.action_count, 4);
        assert!(cfg.batch_size <= cfg.replay_capacity);
        assert!(cfg.epsilon_min < cfg.epsilon);
    }

    #[test]
    fn layer_sizes_span_input_to_output() {
        let cfg = AgentConfig::default();
        assert_eq!(cfg.layer_sizes(), vec![5, 64, 64, 32, 4]);
    }
}
