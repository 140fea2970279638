//! Observation encoding.
//!
//! The state vector is `[north, south, east, west, phase]` where queue
//! features may be clipped at a ceiling and `phase` is [`Phase::encoding`].

use serde::{Deserialize, Serialize};

use crate::intersection::{Phase, QueueLengths};

/// What the controller sees at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Observation {
    pub queues: QueueLengths,
    pub phase: Phase,
}

impl Observation {
    /// Number of features produced by [`Self::features`].
    pub const DIM: usize = 5;

    pub fn new(queues: QueueLengths, phase: Phase) -> Self {
        Self { queues, phase }
    }

    /// Flat feature vector.
    ///
    /// With `ceiling = Some(c)` every queue feature is clipped to `c`.
    pub fn features(&self, ceiling: Option<u32>) -> Vec<f64> {
        let mut features: Vec<f64> = self
            .queues
            .as_array()
            .iter()
            .map(|&q| f64::from(ceiling.map_or(q, |c| q.min(c))))
            .collect();
        features.push(f64::from(self.phase.encoding()));
        features
    }
}
