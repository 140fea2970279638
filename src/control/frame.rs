//! Wire shapes of the per-tick output stream.
//!
//! Every record is one self-contained JSON object. Tick frames carry the
//! end-of-tick state; the terminal marker is written once, only when the
//! loop aborts on a fatal error.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::environment::PerformanceSnapshot;
use crate::intersection::{Direction, Phase, PhaseMachine};
use crate::rl::{Action, Observation};

/// One tick of controller state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Tick number, starting at 1 and increasing by one per frame.
    pub simulation_time: u64,
    pub cycle_number: u64,
    pub intersection: IntersectionFrame,
    pub performance: PerformanceSnapshot,
    pub agent: AgentFrame,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IntersectionFrame {
    pub north_queue: u32,
    pub south_queue: u32,
    pub east_queue: u32,
    pub west_queue: u32,
    pub current_phase: Phase,
    pub phase_time_remaining: f64,
    /// Per-vehicle detail. Reserved; always empty.
    pub vehicles: Vec<serde_json::Value>,
}

impl IntersectionFrame {
    pub fn new(observation: &Observation, phases: &PhaseMachine) -> Self {
        let q = &observation.queues;
        Self {
            north_queue: q[Direction::North],
            south_queue: q[Direction::South],
            east_queue: q[Direction::East],
            west_queue: q[Direction::West],
            current_phase: phases.phase(),
            phase_time_remaining: phases.time_remaining(),
            vehicles: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentFrame {
    pub last_action: Action,
    pub epsilon: f64,
    pub episode: u64,
    /// Replay fill level in percent, `0..=100`.
    pub replay_buffer_full: f64,
    /// Newest first.
    pub recent_actions: Vec<RecentAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecentAction {
    /// Simulated wall clock `HH:MM:SS`.
    pub time: String,
    pub action: Action,
}

impl RecentAction {
    pub fn new(tick: u64, action: Action) -> Self {
        Self {
            time: clock(tick),
            action,
        }
    }
}

/// Formats a tick count as a simulated `HH:MM:SS` clock, one tick per second.
pub fn clock(tick: u64) -> String {
    format!(
        "{:02}:{:02}:{:02}",
        (tick / 3600) % 24,
        (tick / 60) % 60,
        tick % 60
    )
}

/// Bounded newest-first history of taken actions.
#[derive(Debug, Clone)]
pub struct ActionHistory {
    entries: VecDeque<RecentAction>,
    limit: usize,
}

impl ActionHistory {
    pub fn new(limit: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(limit),
            limit,
        }
    }

    pub fn push(&mut self, tick: u64, action: Action) {
        if self.limit == 0 {
            return;
        }
        if self.entries.len() == self.limit {
            self.entries.pop_back();
        }
        self.entries.push_front(RecentAction::new(tick, action));
    }

    pub fn snapshot(&self) -> Vec<RecentAction> {
        self.entries.iter().cloned().collect()
    }
}

/// Emitted once before the loop exits on a fatal error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminalMarker {
    /// Always `"simulation_stopped"`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Last tick that was fully emitted.
    pub simulation_time: u64,
    pub reason: String,
}

impl TerminalMarker {
    pub const KIND: &'static str = "simulation_stopped";

    pub fn new(simulation_time: u64, reason: impl Into<String>) -> Self {
        Self {
            kind: Self::KIND.to_string(),
            simulation_time,
            reason: reason.into(),
        }
    }
}

/// Anything written to the output stream.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Record {
    Tick(Box<Frame>),
    Terminal(TerminalMarker),
}

impl Record {
    /// Tick number the record refers to.
    pub fn simulation_time(&self) -> u64 {
        match self {
            Record::Tick(frame) => frame.simulation_time,
            Record::Terminal(marker) => marker.simulation_time,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Record::Terminal(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intersection::{PhaseTiming, QueueLengths};

    fn frame() -> Frame {
        let obs = Observation::new(QueueLengths::new([1, 2, 3, 4]), Phase::NsGreen);
        let phases = PhaseMachine::new(PhaseTiming::default());
        Frame {
            simulation_time: 7,
            cycle_number: 0,
            intersection: IntersectionFrame::new(&obs, &phases),
            performance: PerformanceSnapshot::from_queues(&obs.queues),
            agent: AgentFrame {
                last_action: Action::SwitchToNs,
                epsilon: 0.5,
                episode: 2,
                replay_buffer_full: 12.5,
                recent_actions: vec![RecentAction::new(7, Action::SwitchToNs)],
            },
        }
    }

    #[test]
    fn frame_uses_wire_field_names() {
        let json = serde_json::to_value(Record::Tick(Box::new(frame()))).unwrap();
        assert_eq!(json["simulationTime"], 7);
        assert_eq!(json["cycleNumber"], 0);
        assert_eq!(json["intersection"]["northQueue"], 1);
        assert_eq!(json["intersection"]["westQueue"], 4);
        assert_eq!(json["intersection"]["currentPhase"], "NS_GREEN");
        assert_eq!(json["intersection"]["phaseTimeRemaining"], 30.0);
        assert_eq!(json["intersection"]["vehicles"], serde_json::json!([]));
        assert_eq!(json["agent"]["lastAction"], "SWITCH_TO_NS");
        assert_eq!(json["agent"]["replayBufferFull"], 12.5);
        assert_eq!(json["agent"]["recentActions"][0]["time"], "00:00:07");
        assert!(json["performance"].get("avgWaitTime").is_some());
    }

    #[test]
    fn frame_round_trips() {
        let f = frame();
        let text = serde_json::to_string(&f).unwrap();
        let back: Frame = serde_json::from_str(&text).unwrap();
        assert_eq!(back, f);
    }

    #[test]
    fn terminal_marker_shape() {
        let json = serde_json::to_value(Record::Terminal(TerminalMarker::new(41, "boom"))).unwrap();
        assert_eq!(json["type"], "simulation_stopped");
        assert_eq!(json["simulationTime"], 41);
        assert_eq!(json["reason"], "boom");
    }

    #[test]
    fn simulated_clock() {
        assert_eq!(clock(0), "00:00:00");
        assert_eq!(clock(61), "00:01:01");
        assert_eq!(clock(3600 * 10 + 59), "10:00:59");
        assert_eq!(clock(86_400), "00:00:00");
    }

    #[test]
    fn history_is_newest_first_and_bounded() {
        let mut history = ActionHistory::new(3);
        for (t, a) in Action::all().into_iter().enumerate() {
            history.push(t as u64 + 1, a);
        }
        let recent: Vec<Action> = history.snapshot().into_iter().map(|r| r.action).collect();
        assert_eq!(
            recent,
            vec![Action::SwitchToEw, Action::SwitchToNs, Action::ExtendCurrentEw]
        );
    }
}
