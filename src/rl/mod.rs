//! Learning side of the controller.
//!
//! The default approximator is the dependency-free [`Mlp`]. The libtorch
//! backed [`TorchQNetwork`] additionally requires the `rl-nn` feature flag.

pub mod action;
pub mod agent;
pub mod approximator;
pub mod config;
pub mod error;
pub mod observation;
pub mod replay;

#[cfg(feature = "rl-nn")]
pub mod network;

pub use action::Action;
pub use agent::DqnAgent;
pub use approximator::{Mlp, QFunction};
pub use config::AgentConfig;
pub use error::{AgentError, ModelError};
pub use observation::Observation;
pub use replay::{ReplayBuffer, Transition};

#[cfg(feature = "rl-nn")]
pub use network::TorchQNetwork;
