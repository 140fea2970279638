use thiserror::Error;

/// Failures of a value-function approximator's persistence layer.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to {operation}: {source}")]
    Io {
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("model serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("model layout mismatch: expected {expected}, found {found}")]
    LayoutMismatch { expected: String, found: String },

    #[cfg(feature = "rl-nn")]
    #[error("torch error: {0}")]
    Torch(#[from] tch::TchError),
}

/// Fatal contract violations between the agent and its environment.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("invalid action index {index}: catalog has {count} actions")]
    InvalidAction { index: usize, count: usize },

    #[error("observation has {got} features, approximator expects {expected}")]
    ApproximatorShape { expected: usize, got: usize },

    #[error("approximator produces {got} action values, catalog has {expected}")]
    OutputShape { expected: usize, got: usize },

    #[error(transparent)]
    Model(#[from] ModelError),
}
