//! Traffic-light phase state machine.
//!
//! The complete transition table is:
//!
//! ```text
//! NS_GREEN --timer/switch--> NS_YELLOW --timer--> EW_GREEN
//!    ^                                                |
//!    +------timer------ EW_YELLOW <--timer/switch-----+
//! ```
//!
//! Green phases may additionally be extended by the controller. Yellow phases
//! are always transient.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::types::Axis;

/// Signal phase of the intersection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Phase {
    NsGreen,
    NsYellow,
    EwGreen,
    EwYellow,
}

impl Phase {
    /// Returns all phases in cycle order.
    pub fn all() -> [Phase; 4] {
        [
            Phase::NsGreen,
            Phase::NsYellow,
            Phase::EwGreen,
            Phase::EwYellow,
        ]
    }

    /// Wire name of the phase (`NS_GREEN`, ...).
    pub fn name(&self) -> &'static str {
        match self {
            Phase::NsGreen => "NS_GREEN",
            Phase::NsYellow => "NS_YELLOW",
            Phase::EwGreen => "EW_GREEN",
            Phase::EwYellow => "EW_YELLOW",
        }
    }

    /// Categorical encoding used as the fifth observation feature.
    ///
    /// `NS_GREEN=0, EW_GREEN=1, NS_YELLOW=2, EW_YELLOW=3`. Saved policies depend
    /// on this mapping.
    pub fn encoding(&self) -> u8 {
        match self {
            Phase::NsGreen => 0,
            Phase::EwGreen => 1,
            Phase::NsYellow => 2,
            Phase::EwYellow => 3,
        }
    }

    /// Phase program index on the simulator's traffic light.
    pub fn signal_index(&self) -> u32 {
        match self {
            Phase::NsGreen => 0,
            Phase::NsYellow => 1,
            Phase::EwGreen => 2,
            Phase::EwYellow => 3,
        }
    }

    /// The axis this phase serves.
    pub fn axis(&self) -> Axis {
        match self {
            Phase::NsGreen | Phase::NsYellow => Axis::NorthSouth,
            Phase::EwGreen | Phase::EwYellow => Axis::EastWest,
        }
    }

    pub fn is_green(&self) -> bool {
        matches!(self, Phase::NsGreen | Phase::EwGreen)
    }

    pub fn is_yellow(&self) -> bool {
        !self.is_green()
    }

    /// The green phase of `axis`.
    pub fn green(axis: Axis) -> Phase {
        match axis {
            Axis::NorthSouth => Phase::NsGreen,
            Axis::EastWest => Phase::EwGreen,
        }
    }

    /// The yellow phase of `axis`.
    pub fn yellow(axis: Axis) -> Phase {
        match axis {
            Axis::NorthSouth => Phase::NsYellow,
            Axis::EastWest => Phase::EwYellow,
        }
    }

    /// The unconditional successor of this phase on timer expiry.
    pub fn next(&self) -> Phase {
        match self {
            Phase::NsGreen => Phase::NsYellow,
            Phase::NsYellow => Phase::EwGreen,
            Phase::EwGreen => Phase::EwYellow,
            Phase::EwYellow => Phase::NsGreen,
        }
    }

    /// Decodes which axis is green from a raw red/yellow/green signal string.
    ///
    /// The first two signal characters are the NS links, the next two the EW
    /// links. Returns `None` when neither axis shows green.
    pub fn green_axis_from_signal(signal: &str) -> Option<Axis> {
        let links: Vec<char> = signal.chars().collect();
        let has_green = |range: std::ops::Range<usize>| {
            links
                .get(range)
                .map(|s| s.iter().any(|c| c.eq_ignore_ascii_case(&'g')))
                .unwrap_or(false)
        };
        if has_green(0..links.len().min(2)) {
            Some(Axis::NorthSouth)
        } else if has_green(links.len().min(2)..links.len().min(4)) {
            Some(Axis::EastWest)
        } else {
            None
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Phase durations in ticks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PhaseTiming {
    /// Duration assigned when a green phase begins.
    pub green: f64,
    /// Duration of every yellow phase.
    pub yellow: f64,
    /// Time added by a valid extend request.
    pub extension: f64,
    /// Cap on the remaining time after an extension.
    pub max_green: f64,
}

impl PhaseTiming {
    /// Duration assigned when entering `phase`.
    pub fn duration_for(&self, phase: Phase) -> f64 {
        if phase.is_green() {
            self.green
        } else {
            self.yellow
        }
    }
}

impl Default for PhaseTiming {
    fn default() -> Self {
        Self {
            green: 30.0,
            yellow: 5.0,
            extension: 10.0,
            max_green: 60.0,
        }
    }
}

/// Pure state machine for a single four-way signal.
#[derive(Debug, Clone)]
pub struct PhaseMachine {
    phase: Phase,
    time_remaining: f64,
    cycle_count: u64,
    timing: PhaseTiming,
}

impl PhaseMachine {
    /// Starts at `NS_GREEN` with a full green timer.
    pub fn new(timing: PhaseTiming) -> Self {
        Self {
            phase: Phase::NsGreen,
            time_remaining: timing.green,
            cycle_count: 0,
            timing,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn time_remaining(&self) -> f64 {
        self.time_remaining
    }

    /// Number of completed `EW_YELLOW -> NS_GREEN` traversals.
    pub fn cycle_count(&self) -> u64 {
        self.cycle_count
    }

    pub fn timing(&self) -> &PhaseTiming {
        &self.timing
    }

    /// Advances the timer by one tick.
    ///
    /// Returns the new phase if the timer expired and a transition happened.
    pub fn tick(&mut self) -> Option<Phase> {
        self.time_remaining -= 1.0;
        if self.time_remaining > 0.0 {
            return None;
        }
        let next = self.phase.next();
        if self.phase == Phase::EwYellow {
            self.cycle_count += 1;
        }
        self.enter(next);
        Some(next)
    }

    /// Extends the green phase of `axis`.
    ///
    /// Only valid while `axis` is green; otherwise a no-op. Returns whether the
    /// extension was applied.
    pub fn extend(&mut self, axis: Axis) -> bool {
        if self.phase != Phase::green(axis) {
            return false;
        }
        self.time_remaining = (self.time_remaining + self.timing.extension).min(self.timing.max_green);
        true
    }

    /// Requests that `axis` receive green.
    ///
    /// Only valid while the opposite axis is green, in which case that axis
    /// goes to yellow immediately. Otherwise a no-op. Returns whether the
    /// switch was applied.
    pub fn request_switch(&mut self, axis: Axis) -> bool {
        let serving = axis.opposite();
        if self.phase != Phase::green(serving) {
            return false;
        }
        self.enter(Phase::yellow(serving));
        true
    }

    fn enter(&mut self, phase: Phase) {
        self.phase = phase;
        self.time_remaining = self.timing.duration_for(phase);
    }
}

impl Default for PhaseMachine {
    fn default() -> Self {
        Self::new(PhaseTiming::default())
    }
}
