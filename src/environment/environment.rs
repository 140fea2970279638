//! Single-intersection environment.
//!
//! One step applies an action to the phase machine, mirrors the phase onto
//! the live simulator (if any), ticks the signal timer, reads fresh queues
//! and scores the result:
//! act → actuate → tick → observe → reward.

use tracing::{debug, trace};

use super::reward::{RewardBreakdown, RewardComputer, RewardWeights};
use crate::intersection::{Phase, PhaseMachine, PhaseTiming, QueueLengths};
use crate::rl::{Action, Observation};
use crate::source::{SourceMode, TrafficSource};

/// Result of a single environment step.
#[derive(Debug, Clone, PartialEq)]
pub struct StepResult {
    pub action: Action,
    /// Whether the action changed the phase machine (extend/switch accepted).
    pub applied: bool,
    /// Phase entered by the timer during this step, if any.
    pub transition: Option<Phase>,
    /// Observation after the step.
    pub observation: Observation,
    pub reward: RewardBreakdown,
}

/// Phase machine, traffic source and reward wired into one step function.
#[derive(Debug)]
pub struct Environment {
    phases: PhaseMachine,
    source: TrafficSource,
    weights: RewardWeights,
    queue_ceiling: Option<u32>,
    queues: QueueLengths,
    elapsed: u64,
}

impl Environment {
    pub fn new(timing: PhaseTiming, source: TrafficSource, weights: RewardWeights) -> Self {
        Self {
            phases: PhaseMachine::new(timing),
            source,
            weights,
            queue_ceiling: None,
            queues: QueueLengths::default(),
            elapsed: 0,
        }
    }

    /// Clips queue features at `ceiling` when encoding observations.
    pub fn with_queue_ceiling(mut self, ceiling: Option<u32>) -> Self {
        self.queue_ceiling = ceiling;
        self
    }

    /// Connects the live backend, falling back to synthetic data on failure.
    pub fn connect(&mut self) {
        self.source.connect();
        self.source.sync_phase(self.phases.phase());
    }

    /// Steps the live simulator clock, if one is attached.
    pub fn advance_source(&mut self) {
        self.source.advance();
    }

    /// Reads fresh queues and returns the current observation.
    pub fn observe(&mut self) -> Observation {
        self.queues = self.source.read_queues(self.phases.phase(), self.elapsed);
        self.observation()
    }

    /// The most recently observed state, without querying the source.
    pub fn observation(&self) -> Observation {
        Observation::new(self.queues, self.phases.phase())
    }

    /// Feature vector for `observation` under this environment's ceiling.
    pub fn features(&self, observation: &Observation) -> Vec<f64> {
        observation.features(self.queue_ceiling)
    }

    /// Applies `action`, ticks the signal and returns the scored outcome.
    ///
    /// Actions that do not fit the current phase are accepted as no-ops.
    pub fn step(&mut self, action: Action) -> StepResult {
        let previous = self.observation();

        let applied = if action.is_switch() {
            self.phases.request_switch(action.axis())
        } else {
            self.phases.extend(action.axis())
        };
        if applied {
            self.source.sync_phase(self.phases.phase());
        }

        let transition = self.phases.tick();
        if let Some(phase) = transition {
            debug!(%phase, cycle = self.phases.cycle_count(), "phase timer expired");
            self.source.sync_phase(phase);
        }
        self.elapsed += 1;

        let observation = self.observe();
        let reward = RewardComputer::compute(&previous, &observation, action, &self.weights);
        trace!(%action, applied, reward = reward.total(), queues = %observation.queues, "step");

        StepResult {
            action,
            applied,
            transition,
            observation,
            reward,
        }
    }

    pub fn phase_machine(&self) -> &PhaseMachine {
        &self.phases
    }

    pub fn source(&self) -> &TrafficSource {
        &self.source
    }

    pub fn source_mode(&self) -> SourceMode {
        self.source.mode()
    }

    /// Simulated ticks stepped so far.
    pub fn elapsed(&self) -> u64 {
        self.elapsed
    }

    /// Releases the live backend. Safe to call repeatedly.
    pub fn close(&mut self) {
        self.source.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intersection::Axis;
    use crate::source::{
        FaultPoint, ScriptedBackend, SyntheticConfig, SyntheticGenerator, TrafficPattern,
    };

    fn quiet_synthetic() -> SyntheticGenerator {
        let config = SyntheticConfig {
            initial_queues: [0, 0, 0, 0],
            patterns: vec![TrafficPattern::new("empty", [0, 0, 0, 0])],
            perturbation: 0,
            clearing_min: 0,
            clearing_max: 0,
            ..SyntheticConfig::default()
        };
        SyntheticGenerator::new(config, 0)
    }

    fn env_with(source: TrafficSource) -> Environment {
        Environment::new(PhaseTiming::default(), source, RewardWeights::default())
    }

    #[test]
    fn empty_intersection_scores_one() {
        let mut env = env_with(TrafficSource::synthetic(quiet_synthetic()));
        env.connect();
        env.observe();
        let result = env.step(Action::ExtendCurrentEw);
        assert!(!result.applied);
        assert_eq!(result.reward.total(), 1.0);
        assert_eq!(result.observation.queues.total(), 0);
    }

    #[test]
    fn switch_moves_to_yellow_and_is_penalised() {
        let mut env = env_with(TrafficSource::synthetic(quiet_synthetic()));
        env.observe();
        let result = env.step(Action::SwitchToEw);
        assert!(result.applied);
        assert_eq!(env.phase_machine().phase(), Phase::NsYellow);
        assert!((result.reward.total() - 0.5).abs() < 1e-10);
    }

    #[test]
    fn timer_transition_is_reported() {
        let timing = PhaseTiming {
            green: 2.0,
            ..PhaseTiming::default()
        };
        let mut env = Environment::new(
            timing,
            TrafficSource::synthetic(quiet_synthetic()),
            RewardWeights::default(),
        );
        env.observe();
        assert_eq!(env.step(Action::ExtendCurrentEw).transition, None);
        assert_eq!(
            env.step(Action::ExtendCurrentEw).transition,
            Some(Phase::NsYellow)
        );
        assert_eq!(env.elapsed(), 2);
    }

    #[test]
    fn live_queues_flow_into_observations() {
        let backend = ScriptedBackend::new(vec![[1, 2, 3, 4], [5, 6, 7, 8]]);
        let mut env = env_with(TrafficSource::new(Some(Box::new(backend)), quiet_synthetic()));
        env.connect();
        assert_eq!(env.source_mode(), SourceMode::Live);
        assert_eq!(env.observe().queues.as_array(), [1, 2, 3, 4]);
        env.advance_source();
        let result = env.step(Action::ExtendCurrentNs);
        assert_eq!(result.observation.queues.as_array(), [5, 6, 7, 8]);
    }

    #[test]
    fn actuation_failure_falls_back_mid_step() {
        let backend = ScriptedBackend::new(vec![[9, 9, 9, 9]]).failing_at(FaultPoint::SetPhase, 1);
        let probe = backend.probe();
        let mut env = env_with(TrafficSource::new(Some(Box::new(backend)), quiet_synthetic()));
        env.connect();
        assert_eq!(env.observe().queues.as_array(), [9, 9, 9, 9]);

        let result = env.step(Action::SwitchToEw);
        assert_eq!(env.source_mode(), SourceMode::Synthetic);
        assert!(probe.is_closed());
        assert_eq!(result.observation.queues.total(), 0);
        assert_eq!(env.phase_machine().phase(), Phase::yellow(Axis::NorthSouth));
    }

    #[test]
    fn ceiling_applies_to_features() {
        let env = env_with(TrafficSource::synthetic(quiet_synthetic())).with_queue_ceiling(Some(3));
        let obs = Observation::new(QueueLengths::new([10, 1, 3, 4]), Phase::EwGreen);
        assert_eq!(env.features(&obs), vec![3.0, 1.0, 3.0, 3.0, 1.0]);
    }
}
