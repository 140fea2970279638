//! The tick-driven control loop.
//!
//! Each tick runs strictly in sequence:
//! advance source → observe → act → step environment → remember →
//! train → report. Episodes are fixed blocks of ticks; the target network
//! is synced every `target_sync_episodes` episodes, never from inside
//! training.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{error, info, info_span, trace, warn};
use uuid::Uuid;

use super::error::ControlError;
use super::frame::{ActionHistory, AgentFrame, Frame, IntersectionFrame, Record, TerminalMarker};
use super::sink::FrameSink;
use crate::environment::{Environment, EpisodeSummary, PerformanceSnapshot, PerformanceTracker};
use crate::rl::{Action, DqnAgent, Mlp, QFunction, Transition};
use crate::source::SourceMode;

/// Scheduling parameters of the control loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoopConfig {
    /// Ticks to run before stopping on its own.
    pub total_ticks: u64,
    /// Ticks per episode.
    pub episode_length: u64,
    /// Episodes between target-network syncs.
    pub target_sync_episodes: u64,
    /// Ticks between training steps.
    pub train_interval: u64,
    /// Length of the `recentActions` list in each frame.
    pub recent_actions: usize,
    /// Real-time pacing between ticks; 0 runs flat out.
    pub tick_delay_ms: u64,
    /// How long a frame may wait on a stalled consumer.
    pub emit_timeout_ms: u64,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            total_ticks: 36_000,
            episode_length: 60,
            target_sync_episodes: 10,
            train_interval: 1,
            recent_actions: 3,
            tick_delay_ms: 0,
            emit_timeout_ms: 5_000,
        }
    }
}

impl LoopConfig {
    pub fn validate(&self) -> Result<(), ControlError> {
        let positive = [
            ("episode_length", self.episode_length),
            ("target_sync_episodes", self.target_sync_episodes),
            ("train_interval", self.train_interval),
        ];
        for (name, value) in positive {
            if value == 0 {
                return Err(ControlError::InvalidConfiguration(format!(
                    "{name} must be positive"
                )));
            }
        }
        Ok(())
    }
}

/// Cloneable request to stop the loop after its current tick.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Why an orderly run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The tick budget was used up.
    Completed,
    /// A [`StopHandle`] was triggered.
    Stopped,
    /// The frame consumer went away or stalled past the emit timeout.
    ConsumerLost,
}

/// Outcome of an orderly run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunSummary {
    pub run_id: Uuid,
    /// Frames successfully emitted.
    pub ticks: u64,
    pub reason: StopReason,
    /// Whether the live backend was demoted during the run.
    pub fell_back: bool,
    pub final_epsilon: f64,
    pub episodes: Vec<EpisodeSummary>,
}

/// Drives the environment and the agent, one frame per tick.
pub struct ControlLoop<Q: QFunction = Mlp> {
    env: Environment,
    agent: DqnAgent<Q>,
    config: LoopConfig,
    stop: StopHandle,
    tracker: PerformanceTracker,
    history: ActionHistory,
    episodes: Vec<EpisodeSummary>,
    tick: u64,
    emitted: u64,
}

impl<Q: QFunction> ControlLoop<Q> {
    pub fn new(env: Environment, agent: DqnAgent<Q>, config: LoopConfig) -> Result<Self, ControlError> {
        config.validate()?;
        Ok(Self {
            history: ActionHistory::new(config.recent_actions),
            env,
            agent,
            config,
            stop: StopHandle::new(),
            tracker: PerformanceTracker::new(),
            episodes: Vec::new(),
            tick: 0,
            emitted: 0,
        })
    }

    /// Uses `stop` instead of the loop's own handle.
    pub fn with_stop_handle(mut self, stop: StopHandle) -> Self {
        self.stop = stop;
        self
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn agent(&self) -> &DqnAgent<Q> {
        &self.agent
    }

    pub fn agent_mut(&mut self) -> &mut DqnAgent<Q> {
        &mut self.agent
    }

    pub fn environment(&self) -> &Environment {
        &self.env
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// Runs until the tick budget, a stop request, or loss of the consumer.
    ///
    /// The live backend is released on every exit path. On a fatal error a
    /// terminal marker is emitted before the error is returned.
    pub fn run<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> Result<RunSummary, ControlError> {
        let run_id = Uuid::new_v4();
        let span = info_span!("control_loop", %run_id);
        let _guard = span.enter();

        info!(
            total_ticks = self.config.total_ticks,
            episode_length = self.config.episode_length,
            "control loop starting"
        );
        self.env.connect();

        let outcome = self.drive(sink);
        let fell_back = self.env.source().demotion().is_some();
        self.env.close();

        match outcome {
            Ok(reason) => {
                info!(?reason, ticks = self.emitted, fell_back, "control loop finished");
                Ok(RunSummary {
                    run_id,
                    ticks: self.emitted,
                    reason,
                    fell_back,
                    final_epsilon: self.agent.epsilon(),
                    episodes: self.episodes.clone(),
                })
            }
            Err(err) => {
                error!(error = %err, tick = self.emitted, "control loop aborted");
                let marker = Record::Terminal(TerminalMarker::new(self.emitted, err.to_string()));
                if let Err(emit_err) = sink.emit(&marker) {
                    warn!(error = %emit_err, "could not emit terminal marker");
                }
                Err(err)
            }
        }
    }

    fn drive<S: FrameSink + ?Sized>(&mut self, sink: &mut S) -> Result<StopReason, ControlError> {
        while self.tick < self.config.total_ticks {
            if self.stop.is_stopped() {
                info!(tick = self.tick, "stop requested");
                return Ok(StopReason::Stopped);
            }

            let frame = self.step()?;
            if let Err(err) = sink.emit(&Record::Tick(Box::new(frame))) {
                warn!(error = %err, tick = self.tick, "frame consumer lost, shutting down");
                return Ok(StopReason::ConsumerLost);
            }
            self.emitted += 1;

            if self.config.tick_delay_ms > 0 {
                thread::sleep(Duration::from_millis(self.config.tick_delay_ms));
            }
        }
        Ok(StopReason::Completed)
    }

    /// Runs one full tick and returns its frame.
    pub fn step(&mut self) -> Result<Frame, ControlError> {
        self.env.advance_source();
        let observation = self.env.observe();
        let state = self.env.features(&observation);

        let index = self.agent.act(&state)?;
        let action = Action::from_index(index)?;
        let result = self.env.step(action);
        let next_state = self.env.features(&result.observation);
        let reward = result.reward.total();

        self.agent.remember(Transition {
            state,
            action: index,
            reward,
            next_state,
            terminal: false,
        })?;
        self.tick += 1;
        if self.tick % self.config.train_interval == 0 {
            self.agent.replay();
        }
        trace!(tick = self.tick, %action, reward, "tick");

        let performance = PerformanceSnapshot::from_queues(&result.observation.queues);
        self.tracker.record(&performance, reward, result.reward.cleared);
        self.history.push(self.tick, action);

        let phases = self.env.phase_machine();
        let frame = Frame {
            simulation_time: self.tick,
            cycle_number: phases.cycle_count(),
            intersection: IntersectionFrame::new(&result.observation, phases),
            performance,
            agent: AgentFrame {
                last_action: action,
                epsilon: self.agent.epsilon(),
                episode: self.agent.episode(),
                replay_buffer_full: self.agent.memory_fill_percent(),
                recent_actions: self.history.snapshot(),
            },
        };

        if self.tick % self.config.episode_length == 0 {
            self.finish_episode()?;
        }
        Ok(frame)
    }

    fn finish_episode(&mut self) -> Result<(), ControlError> {
        let episode = self.agent.end_episode();
        let summary = self.tracker.finish_episode(episode, self.agent.epsilon());
        info!(
            episode,
            total_reward = summary.total_reward,
            mean_wait = summary.mean_wait_time,
            max_queue = summary.max_queue,
            live = self.env.source_mode() == SourceMode::Live,
            "episode finished"
        );
        self.episodes.push(summary);

        if episode % self.config.target_sync_episodes == 0 {
            self.agent.sync_target()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_loop_config() {
        let cfg = LoopConfig::default();
        assert_eq!(cfg.total_ticks, 36_000);
        assert_eq!(cfg.episode_length, 60);
        assert_eq!(cfg.target_sync_episodes, 10);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn zero_episode_length_is_rejected() {
        let cfg = LoopConfig {
            episode_length: 0,
            ..LoopConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(ControlError::InvalidConfiguration(_))
        ));
    }

    #[test]
    fn stop_handle_is_shared() {
        let handle = StopHandle::new();
        let other = handle.clone();
        assert!(!handle.is_stopped());
        other.stop();
        assert!(handle.is_stopped());
    }
}
