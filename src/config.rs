//! Run configuration.
//!
//! [`SimulationConfig`] gathers every tunable of a run. Each field has a
//! default, so a JSON file only needs to name what it overrides.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::control::{ControlError, ControlLoop, LoopConfig};
use crate::environment::{Environment, RewardWeights};
use crate::intersection::PhaseTiming;
use crate::rl::{Action, AgentConfig, AgentError, DqnAgent, Observation};
use crate::source::{BridgeBackend, BridgeConfig, LiveBackend, SyntheticConfig, SyntheticGenerator, TrafficSource};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid configuration file: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("invalid configuration: {message}")]
    Invalid { message: String },

    #[error(transparent)]
    Agent(#[from] AgentError),
}

impl ConfigError {
    fn invalid(message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            message: message.into(),
        }
    }
}

impl From<ControlError> for ConfigError {
    fn from(err: ControlError) -> Self {
        ConfigError::invalid(err.to_string())
    }
}

/// Everything needed to assemble a [`ControlLoop`].
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Master seed; a random one is drawn when absent.
    pub seed: Option<u64>,
    pub timing: PhaseTiming,
    pub synthetic: SyntheticConfig,
    pub agent: AgentConfig,
    pub reward: RewardWeights,
    #[serde(rename = "loop")]
    pub control: LoopConfig,
    /// Live simulator bridge; synthetic traffic only when absent.
    pub bridge: Option<BridgeConfig>,
}

impl SimulationConfig {
    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            operation: format!("read {}", path.display()),
            source,
        })?;
        Self::from_json_str(&text)
    }

    /// Checks cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let t = &self.timing;
        if !(t.green > 0.0 && t.yellow > 0.0 && t.extension >= 0.0) {
            return Err(ConfigError::invalid(
                "green and yellow durations must be positive, extension non-negative",
            ));
        }
        if t.max_green < t.green {
            return Err(ConfigError::invalid("max_green must be at least green"));
        }

        let a = &self.agent;
        if a.state_dim != Observation::DIM {
            return Err(ConfigError::invalid(format!(
                "state_dim must be {}, got {}",
                Observation::DIM,
                a.state_dim
            )));
        }
        if a.action_count != Action::COUNT {
            return Err(ConfigError::invalid(format!(
                "action_count must be {}, got {}",
                Action::COUNT,
                a.action_count
            )));
        }
        if a.batch_size == 0 || a.batch_size > a.replay_capacity {
            return Err(ConfigError::invalid(
                "batch_size must be positive and no larger than replay_capacity",
            ));
        }
        if !(0.0..=1.0).contains(&a.epsilon) || !(0.0..=1.0).contains(&a.epsilon_min) {
            return Err(ConfigError::invalid("epsilon and epsilon_min must lie in [0, 1]"));
        }
        if !(a.epsilon_decay > 0.0 && a.epsilon_decay <= 1.0) {
            return Err(ConfigError::invalid("epsilon_decay must lie in (0, 1]"));
        }
        if !(a.learning_rate > 0.0) || !(0.0..=1.0).contains(&a.gamma) {
            return Err(ConfigError::invalid(
                "learning_rate must be positive and gamma in [0, 1]",
            ));
        }

        let s = &self.synthetic;
        if s.clearing_min > s.clearing_max || s.clearing_min < 0 {
            return Err(ConfigError::invalid(
                "synthetic clearing range must satisfy 0 <= clearing_min <= clearing_max",
            ));
        }
        if !(0..=i64::from(s.max_queue)).contains(&s.perturbation)
            || s.clearing_max > i64::from(s.max_queue)
        {
            return Err(ConfigError::invalid(
                "synthetic perturbation and clearing must lie in [0, max_queue]",
            ));
        }
        if s.pattern_window == 0 {
            return Err(ConfigError::invalid("synthetic pattern_window must be positive"));
        }

        self.control.validate()?;
        Ok(())
    }

    /// The configured seed, or a fresh random one.
    pub fn resolve_seed(&self) -> u64 {
        self.seed.unwrap_or_else(rand::random)
    }

    /// Validates and wires the environment, agent and loop.
    ///
    /// The agent uses `seed`, the synthetic generator `seed + 1`.
    pub fn build(&self, seed: u64) -> Result<ControlLoop, ConfigError> {
        self.validate()?;

        let backend = self
            .bridge
            .clone()
            .map(|bridge| Box::new(BridgeBackend::new(bridge)) as Box<dyn LiveBackend>);
        let synthetic = SyntheticGenerator::new(self.synthetic.clone(), seed.wrapping_add(1));
        let env = Environment::new(
            self.timing.clone(),
            TrafficSource::new(backend, synthetic),
            self.reward,
        )
        .with_queue_ceiling(self.agent.queue_ceiling);
        let agent = DqnAgent::new(self.agent.clone(), seed)?;

        Ok(ControlLoop::new(env, agent, self.control.clone())?)
    }
}
