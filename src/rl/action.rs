//! The controller's action catalog.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::error::AgentError;
use crate::intersection::Axis;

/// Phase-control command chosen by the agent once per tick.
///
/// The discriminant order is part of the contract: a saved policy's output
/// layer is indexed by it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    ExtendCurrentNs,
    ExtendCurrentEw,
    SwitchToNs,
    SwitchToEw,
}

impl Action {
    /// Size of the catalog.
    pub const COUNT: usize = 4;

    /// Returns the catalog in index order.
    pub fn all() -> [Action; Self::COUNT] {
        [
            Action::ExtendCurrentNs,
            Action::ExtendCurrentEw,
            Action::SwitchToNs,
            Action::SwitchToEw,
        ]
    }

    pub fn index(&self) -> usize {
        match self {
            Action::ExtendCurrentNs => 0,
            Action::ExtendCurrentEw => 1,
            Action::SwitchToNs => 2,
            Action::SwitchToEw => 3,
        }
    }

    /// Looks up an action by catalog index.
    pub fn from_index(index: usize) -> Result<Action, AgentError> {
        Self::all()
            .get(index)
            .copied()
            .ok_or(AgentError::InvalidAction {
                index,
                count: Self::COUNT,
            })
    }

    pub fn name(&self) -> &'static str {
        match self {
            Action::ExtendCurrentNs => "EXTEND_CURRENT_NS",
            Action::ExtendCurrentEw => "EXTEND_CURRENT_EW",
            Action::SwitchToNs => "SWITCH_TO_NS",
            Action::SwitchToEw => "SWITCH_TO_EW",
        }
    }

    /// The axis the command targets.
    pub fn axis(&self) -> Axis {
        match self {
            Action::ExtendCurrentNs | Action::SwitchToNs => Axis::NorthSouth,
            Action::ExtendCurrentEw | Action::SwitchToEw => Axis::EastWest,
        }
    }

    pub fn is_switch(&self) -> bool {
        matches!(self, Action::SwitchToNs | Action::SwitchToEw)
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
