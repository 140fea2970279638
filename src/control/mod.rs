//! Closed-loop orchestration and the per-tick output stream.

pub mod error;
pub mod frame;
pub mod runner;
pub mod sink;


pub use error::{ControlError, SinkError};
pub use frame::{AgentFrame, Frame, IntersectionFrame, RecentAction, Record, TerminalMarker};
pub use runner::{ControlLoop, LoopConfig, RunSummary, StopHandle, StopReason};
pub use sink::{ChannelSink, FrameSink, JsonLinesSink};
