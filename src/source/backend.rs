//! Capability interface of a live microscopic traffic simulator.

use serde::{Deserialize, Serialize};

use super::error::SourceError;
use crate::intersection::{Direction, Phase};

/// A running traffic simulator the control loop can observe and actuate.
///
/// Every operation may fail independently. Callers never retry: the first
/// failure demotes the whole run to the synthetic generator.
pub trait LiveBackend: Send {
    /// Human-readable name used in logs.
    fn name(&self) -> &str;

    /// Establishes the connection to the simulator.
    fn connect(&mut self) -> Result<(), SourceError>;

    /// Number of vehicles currently on the approach lane for `direction`.
    fn read_queue(&mut self, direction: Direction) -> Result<u32, SourceError>;

    /// Raw red/yellow/green state string of the controlled signal.
    fn read_phase_signal(&mut self) -> Result<String, SourceError>;

    /// Forces the simulator's signal into `phase`.
    fn set_phase(&mut self, phase: Phase) -> Result<(), SourceError>;

    /// Steps the simulator clock by one tick.
    fn advance(&mut self) -> Result<(), SourceError>;

    /// Whether the simulator has no more scheduled activity.
    fn is_exhausted(&mut self) -> Result<bool, SourceError>;

    /// Releases simulator resources. Must be safe to call more than once.
    fn close(&mut self);
}

/// Simulator lane identifiers for each approach and the signal id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LaneMap {
    pub north: String,
    pub south: String,
    pub east: String,
    pub west: String,
    /// Identifier of the controlled traffic light.
    pub traffic_light: String,
}

impl LaneMap {
    pub fn lane(&self, direction: Direction) -> &str {
        match direction {
            Direction::North => &self.north,
            Direction::South => &self.south,
            Direction::East => &self.east,
            Direction::West => &self.west,
        }
    }
}

impl Default for LaneMap {
    fn default() -> Self {
        Self {
            north: "N_to_C_0".into(),
            south: "S_to_C_0".into(),
            east: "E_to_C_0".into(),
            west: "W_to_C_0".into(),
            traffic_light: "C".into(),
        }
    }
}
