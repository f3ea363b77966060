//! Error types for Frontier Core.

use std::time::Duration;
use thiserror::Error;

/// Result type alias for Frontier operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Errors that can occur while building or driving a search.
#[derive(Error, Debug)]
pub enum SearchError {
    /// A single node could not be evaluated. Absorbed by the search: the node
    /// is annotated and dropped.
    #[error("evaluation failed: {0}")]
    EvaluationFailed(String),

    /// The run was cancelled by the caller.
    #[error("execution cancelled")]
    Cancelled,

    /// The wall-clock budget of the run was exceeded.
    #[error("execution timed out ({overshoot:?} past the deadline)")]
    TimedOut {
        /// How far past the deadline the timeout was observed.
        overshoot: Duration,
    },

    /// Unexpected failure of a generator or evaluator.
    #[error("algorithm failed: {message} (path: {})", path.join(" -> "))]
    Algorithm {
        /// Description of the failure.
        message: String,
        /// Root-to-node states of the node being processed.
        path: Vec<String>,
    },

    /// Failure raised by a graph generator.
    #[error("graph generator failed: {0}")]
    Generator(String),

    /// The algorithm was driven in a state that does not allow it.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// The algorithm is suspended; no work was performed.
    #[error("execution suspended")]
    Suspended,

    /// Invalid configuration or contract violation detected at construction.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A listener failed to process an event.
    #[error("listener error: {0}")]
    Listener(String),

    /// I/O error.
    #[error("io error: {0}")]
    IoError(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl SearchError {
    /// Shorthand for an [`SearchError::EvaluationFailed`].
    pub fn evaluation(message: impl Into<String>) -> Self {
        Self::EvaluationFailed(message.into())
    }

    /// Shorthand for an [`SearchError::Generator`].
    pub fn generator(message: impl Into<String>) -> Self {
        Self::Generator(message.into())
    }

    /// Whether this error only concerns a single node.
    pub fn is_controlled(&self) -> bool {
        matches!(self, Self::EvaluationFailed(_))
    }

    /// Whether this error ends a run (cancel, timeout, algorithm failure).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Cancelled | Self::TimedOut { .. } | Self::Algorithm { .. }
        )
    }

    /// Attach a root-to-node path, turning the error into an
    /// [`SearchError::Algorithm`] unless it already is a terminal signal.
    pub fn at_path(self, path: Vec<String>) -> Self {
        match self {
            Self::Cancelled | Self::TimedOut { .. } => self,
            Self::Algorithm { message, .. } => Self::Algorithm { message, path },
            other => Self::Algorithm {
                message: other.to_string(),
                path,
            },
        }
    }
}
