use thiserror::Error;

use crate::rl::AgentError;

/// Failures of the frame output stream.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("consumer did not accept frame within {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },

    #[error("consumer disconnected")]
    Disconnected,

    #[error("failed to write frame: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SinkError {
    /// Whether the consumer is gone for good (as opposed to slow).
    pub fn is_consumer_lost(&self) -> bool {
        match self {
            SinkError::Disconnected => true,
            SinkError::Io(err) => err.kind() == std::io::ErrorKind::BrokenPipe,
            SinkError::Timeout { .. } | SinkError::Encode(_) => false,
        }
    }
}

/// Fatal errors that abort the control loop.
#[derive(Debug, Error)]
pub enum ControlError {
    #[error("agent contract violated: {0}")]
    Agent(#[from] AgentError),

    #[error("invalid loop configuration: {0}")]
    InvalidConfiguration(String),
}
