//! Deep Q-learning agent.
//!
//! Epsilon-greedy over an online [`QFunction`], trained from a replay buffer
//! against a separately held target approximator. The target only changes on
//! an explicit [`DqnAgent::sync_target`]; the caller owns that cadence.

use std::path::Path;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info};

use super::approximator::{Mlp, QFunction};
use super::config::AgentConfig;
use super::error::AgentError;
use super::replay::{ReplayBuffer, Transition};

/// DQN agent with experience replay and a target network.
pub struct DqnAgent<Q: QFunction = Mlp> {
    online: Q,
    target: Q,
    memory: ReplayBuffer,
    config: AgentConfig,
    epsilon: f64,
    episode: u64,
    train_steps: u64,
    rng: StdRng,
}

impl DqnAgent<Mlp> {
    /// Builds an agent over the default dense network.
    ///
    /// `seed` drives both parameter initialisation and exploration.
    pub fn new(config: AgentConfig, seed: u64) -> Result<Self, AgentError> {
        let mut rng = StdRng::seed_from_u64(seed);
        let online = Mlp::new(&config.layer_sizes(), config.learning_rate, &mut rng)?;
        let target = online.clone();
        Ok(Self::assemble(config, online, target, rng))
    }
}

impl<Q: QFunction> DqnAgent<Q> {
    /// Builds an agent over caller-provided approximators.
    ///
    /// `target` is overwritten with `online`'s parameters before returning.
    pub fn with_networks(
        config: AgentConfig,
        online: Q,
        mut target: Q,
        seed: u64,
    ) -> Result<Self, AgentError> {
        if online.input_dim() != config.state_dim {
            return Err(AgentError::ApproximatorShape {
                expected: config.state_dim,
                got: online.input_dim(),
            });
        }
        if online.output_dim() != config.action_count {
            return Err(AgentError::OutputShape {
                expected: config.action_count,
                got: online.output_dim(),
            });
        }
        target.copy_from(&online)?;
        Ok(Self::assemble(
            config,
            online,
            target,
            StdRng::seed_from_u64(seed),
        ))
    }

    fn assemble(config: AgentConfig, online: Q, target: Q, rng: StdRng) -> Self {
        Self {
            memory: ReplayBuffer::new(config.replay_capacity),
            epsilon: config.epsilon,
            online,
            target,
            config,
            episode: 0,
            train_steps: 0,
            rng,
        }
    }

    /// Chooses an action index for `state`.
    ///
    /// Explores uniformly iff a draw from `[0, 1)` falls below epsilon, so an
    /// epsilon of zero is always greedy.
    pub fn act(&mut self, state: &[f64]) -> Result<usize, AgentError> {
        self.check_shape(state)?;
        if self.rng.gen::<f64>() < self.epsilon {
            return Ok(self.rng.gen_range(0..self.config.action_count));
        }
        self.greedy_action(state)
    }

    /// Index of the highest online value; ties go to the lowest index.
    pub fn greedy_action(&self, state: &[f64]) -> Result<usize, AgentError> {
        let values = self.q_values(state)?;
        let mut best = 0;
        for (i, &v) in values.iter().enumerate().skip(1) {
            if v > values[best] {
                best = i;
            }
        }
        Ok(best)
    }

    /// Online approximator output for `state`.
    pub fn q_values(&self, state: &[f64]) -> Result<Vec<f64>, AgentError> {
        self.check_shape(state)?;
        Ok(self.online.predict(state))
    }

    /// Stores a transition, evicting the oldest one when memory is full.
    pub fn remember(&mut self, transition: Transition) -> Result<(), AgentError> {
        self.check_shape(&transition.state)?;
        self.check_shape(&transition.next_state)?;
        if transition.action >= self.config.action_count {
            return Err(AgentError::InvalidAction {
                index: transition.action,
                count: self.config.action_count,
            });
        }
        self.memory.push(transition);
        Ok(())
    }

    /// One training step on a uniformly sampled batch.
    ///
    /// Returns `None` without touching any parameter while memory holds fewer
    /// than `batch_size` transitions. Otherwise fits the online approximator
    /// once, decays epsilon and returns the batch loss.
    pub fn replay(&mut self) -> Option<f64> {
        let batch_size = self.config.batch_size;
        if batch_size == 0 || self.memory.len() < batch_size {
            return None;
        }

        let batch: Vec<Transition> = self
            .memory
            .sample(&mut self.rng, batch_size)
            .into_iter()
            .cloned()
            .collect();
        let states: Vec<Vec<f64>> = batch.iter().map(|t| t.state.clone()).collect();
        let next_states: Vec<Vec<f64>> = batch.iter().map(|t| t.next_state.clone()).collect();

        // Untaken actions keep the online prediction so only the taken one is trained.
        let mut targets = self.online.predict_batch(&states);
        let next_values = self.target.predict_batch(&next_states);
        for ((transition, target), next) in batch.iter().zip(&mut targets).zip(&next_values) {
            target[transition.action] = if transition.terminal {
                transition.reward
            } else {
                let best_next = next.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                transition.reward + self.config.gamma * best_next
            };
        }

        let loss = self.online.fit_batch(&states, &targets);
        self.train_steps += 1;
        if self.epsilon > self.config.epsilon_min {
            self.epsilon = (self.epsilon * self.config.epsilon_decay).max(self.config.epsilon_min);
        }
        debug!(loss, epsilon = self.epsilon, step = self.train_steps, "replay step");
        Some(loss)
    }

    /// Copies every online parameter into the target approximator.
    pub fn sync_target(&mut self) -> Result<(), AgentError> {
        self.target.copy_from(&self.online)?;
        info!(episode = self.episode, "target network synchronized");
        Ok(())
    }

    /// Persists the online approximator only.
    pub fn save(&self, path: &Path) -> Result<(), AgentError> {
        self.online.save(path)?;
        info!(path = %path.display(), "model saved");
        Ok(())
    }

    /// Restores the online approximator and re-syncs the target to it.
    pub fn load(&mut self, path: &Path) -> Result<(), AgentError> {
        self.online.load(path)?;
        self.target.copy_from(&self.online)?;
        info!(path = %path.display(), "model loaded");
        Ok(())
    }

    /// Marks an episode boundary and returns the new episode count.
    pub fn end_episode(&mut self) -> u64 {
        self.episode += 1;
        self.episode
    }

    pub fn epsilon(&self) -> f64 {
        self.epsilon
    }

    /// Overrides the exploration rate, clamped to `[0, 1]`.
    pub fn set_epsilon(&mut self, epsilon: f64) {
        self.epsilon = epsilon.clamp(0.0, 1.0);
    }

    pub fn episode(&self) -> u64 {
        self.episode
    }

    /// Number of completed training steps.
    pub fn train_steps(&self) -> u64 {
        self.train_steps
    }

    pub fn memory(&self) -> &ReplayBuffer {
        &self.memory
    }

    pub fn memory_fill_percent(&self) -> f64 {
        self.memory.fill_percent()
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub fn online(&self) -> &Q {
        &self.online
    }

    pub fn target(&self) -> &Q {
        &self.target
    }

    fn check_shape(&self, state: &[f64]) -> Result<(), AgentError> {
        if state.len() != self.config.state_dim {
            return Err(AgentError::ApproximatorShape {
                expected: self.config.state_dim,
                got: state.len(),
            });
        }
        Ok(())
    }
}
