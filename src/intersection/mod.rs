//! The controlled four-way intersection: approaches, axes and the signal
//! phase machine.

pub mod phase;
pub mod types;

pub use phase::{Phase, PhaseMachine, PhaseTiming};
pub use types::{Axis, Direction, QueueLengths};
