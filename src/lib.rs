//! junction_rl - reinforcement-learning control of a four-way intersection
//!
//! A DQN agent picks a phase-control action every tick. Traffic comes from a
//! live microscopic simulator when one is reachable and from a seeded
//! synthetic generator otherwise; the switch is one-way and invisible to the
//! agent. Each tick produces one JSON frame on an ordered output stream.

pub mod config;
pub mod control;
pub mod environment;
pub mod intersection;
pub mod rl;
pub mod source;

pub use config::{ConfigError, SimulationConfig};
pub use control::{ControlLoop, LoopConfig, RunSummary, StopHandle};
