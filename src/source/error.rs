use thiserror::Error;

/// Failures raised by a live traffic-state backend.
///
/// These never reach the agent: [`super::TrafficSource`] converts any of them
/// into a permanent fallback to the synthetic generator.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SourceError {
    #[error("backend '{backend}' unavailable: {reason}")]
    BackendUnavailable { backend: String, reason: String },

    #[error("backend query '{operation}' failed: {reason}")]
    BackendQueryError { operation: String, reason: String },
}

impl SourceError {
    pub fn unavailable(backend: impl Into<String>, reason: impl ToString) -> Self {
        SourceError::BackendUnavailable {
            backend: backend.into(),
            reason: reason.to_string(),
        }
    }

    pub fn query(operation: impl Into<String>, reason: impl ToString) -> Self {
        SourceError::BackendQueryError {
            operation: operation.into(),
            reason: reason.to_string(),
        }
    }
}
