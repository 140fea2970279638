//! Core types for the controlled intersection.
//!
//! Defines approach directions, signal axes, and per-direction queue lengths
//! used throughout the control loop.

use std::fmt;
use std::ops::{Index, IndexMut};

use serde::{Deserialize, Serialize};

/// One of the four approaches to the intersection.
///
/// The declaration order is the feature order of the observation vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Returns all directions in observation order.
    pub fn all() -> [Direction; 4] {
        [
            Direction::North,
            Direction::South,
            Direction::East,
            Direction::West,
        ]
    }

    /// Returns the index of this direction (0=N, 1=S, 2=E, 3=W).
    pub fn index(&self) -> usize {
        match self {
            Direction::North => 0,
            Direction::South => 1,
            Direction::East => 2,
            Direction::West => 3,
        }
    }

    /// The signal axis this approach is served by.
    pub fn axis(&self) -> Axis {
        match self {
            Direction::North | Direction::South => Axis::NorthSouth,
            Direction::East | Direction::West => Axis::EastWest,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::North => write!(f, "north"),
            Direction::South => write!(f, "south"),
            Direction::East => write!(f, "east"),
            Direction::West => write!(f, "west"),
        }
    }
}

/// A pair of opposing approaches that share a green phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Axis {
    #[serde(rename = "NS")]
    NorthSouth,
    #[serde(rename = "EW")]
    EastWest,
}

impl Axis {
    /// Returns the crossing axis.
    pub fn opposite(&self) -> Axis {
        match self {
            Axis::NorthSouth => Axis::EastWest,
            Axis::EastWest => Axis::NorthSouth,
        }
    }
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::NorthSouth => write!(f, "NS"),
            Axis::EastWest => write!(f, "EW"),
        }
    }
}

/// Number of queued vehicles on each approach, in [`Direction::all`] order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct QueueLengths(pub [u32; 4]);

impl QueueLengths {
    /// Creates queue lengths from `[north, south, east, west]`.
    pub fn new(queues: [u32; 4]) -> Self {
        Self(queues)
    }

    /// Total vehicles waiting across all approaches.
    ///
    /// Widened to `u64` since four live counts can exceed `u32::MAX`.
    pub fn total(&self) -> u64 {
        self.0.iter().map(|&q| u64::from(q)).sum()
    }

    /// Longest queue.
    pub fn max(&self) -> u32 {
        self.0.iter().copied().max().unwrap_or(0)
    }

    /// Shortest queue.
    pub fn min(&self) -> u32 {
        self.0.iter().copied().min().unwrap_or(0)
    }

    /// Returns the queues as an array `[north, south, east, west]`.
    pub fn as_array(&self) -> [u32; 4] {
        self.0
    }
}

impl Index<Direction> for QueueLengths {
    type Output = u32;

    fn index(&self, direction: Direction) -> &u32 {
        &self.0[direction.index()]
    }
}

impl IndexMut<Direction> for QueueLengths {
    fn index_mut(&mut self, direction: Direction) -> &mut u32 {
        &mut self.0[direction.index()]
    }
}

impl fmt::Display for QueueLengths {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [n, s, e, w] = self.0;
        write!(f, "N={} S={} E={} W={}", n, s, e, w)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direction_indices_follow_observation_order() {
        for (i, d) in Direction::all().iter().enumerate() {
            assert_eq!(d.index(), i);
        }
    }

    #[test]
    fn direction_axes() {
        assert_eq!(Direction::North.axis(), Axis::NorthSouth);
        assert_eq!(Direction::South.axis(), Axis::NorthSouth);
        assert_eq!(Direction::East.axis(), Axis::EastWest);
        assert_eq!(Direction::West.axis(), Axis::EastWest);
    }

    #[test]
    fn axis_opposite_is_involution() {
        assert_eq!(Axis::NorthSouth.opposite(), Axis::EastWest);
        assert_eq!(Axis::NorthSouth.opposite().opposite(), Axis::NorthSouth);
    }

    #[test]
    fn queue_aggregates() {
        let q = QueueLengths::new([3, 7, 0, 2]);
        assert_eq!(q.total(), 12);
        assert_eq!(q.max(), 7);
        assert_eq!(q.min(), 0);
        assert_eq!(q[Direction::South], 7);

        let full = QueueLengths::new([u32::MAX; 4]);
        assert_eq!(full.total(), 4 * u64::from(u32::MAX));
    }

    #[test]
    fn queue_index_mut() {
        let mut q = QueueLengths::default();
        q[Direction::West] = 4;
        assert_eq!(q.as_array(), [0, 0, 0, 4]);
    }
}
