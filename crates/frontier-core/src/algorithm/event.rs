//! Events emitted by search algorithms.

use crate::error::SearchError;
use crate::graph::{NodeId, SearchPath};
use crate::mcts::Rollout;
use crate::search::Anomaly;
use std::time::Duration;

/// One unit of observable progress.
///
/// Each call to `next_event` returns exactly one of these; listeners receive
/// the same value before it is returned.
#[derive(Debug, Clone)]
pub enum AlgorithmEvent<N, A, V> {
    /// Setup finished; the algorithm is now active.
    Initialized {
        /// Id of the algorithm instance.
        algorithm_id: String,
    },
    /// A node was created.
    NodeAdded {
        /// The new node.
        node: NodeId,
        /// Its parent (None for roots).
        parent: Option<NodeId>,
        /// State of the new node.
        state: N,
        /// Cached goal flag.
        is_goal: bool,
    },
    /// A queued node was superseded by a better node for the same state
    /// and will never be expanded.
    NodeRemoved {
        /// The superseded node.
        node: NodeId,
    },
    /// A node was expanded and will not be expanded again.
    NodeClosed {
        /// The expanded node.
        node: NodeId,
    },
    /// A root-to-goal path was found.
    SolutionCandidateFound(SearchPath<N, A, V>),
    /// An MCTS playout completed.
    RolloutPerformed(Rollout<N, A>),
    /// The sanity checker found a cycle or a dead end.
    AnomalyDetected(Anomaly<N, A>),
    /// No more work remains.
    Finished,
    /// The run was cancelled.
    Cancelled,
    /// The run exceeded its wall-clock budget.
    TimedOut {
        /// How far past the deadline the timeout was observed.
        overshoot: Duration,
    },
    /// The run failed.
    Errored {
        /// Failure description.
        message: String,
        /// Root-to-node states of the node being processed, if any.
        path: Vec<String>,
    },
}

impl<N, A, V> AlgorithmEvent<N, A, V> {
    /// Whether this event ends the run.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Finished | Self::Cancelled | Self::TimedOut { .. } | Self::Errored { .. }
        )
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Initialized { .. } => "initialized",
            Self::NodeAdded { .. } => "node_added",
            Self::NodeRemoved { .. } => "node_removed",
            Self::NodeClosed { .. } => "node_closed",
            Self::SolutionCandidateFound(_) => "solution_candidate_found",
            Self::RolloutPerformed(_) => "rollout_performed",
            Self::AnomalyDetected(_) => "anomaly_detected",
            Self::Finished => "finished",
            Self::Cancelled => "cancelled",
            Self::TimedOut { .. } => "timed_out",
            Self::Errored { .. } => "errored",
        }
    }

    /// The error matching an abnormal terminal event.
    ///
    /// `Finished` and non-terminal events yield `None`.
    pub fn to_error(&self) -> Option<SearchError> {
        match self {
            Self::Cancelled => Some(SearchError::Cancelled),
            Self::TimedOut { overshoot } => Some(SearchError::TimedOut {
                overshoot: *overshoot,
            }),
            Self::Errored { message, path } => Some(SearchError::Algorithm {
                message: message.clone(),
                path: path.clone(),
            }),
            _ => None,
        }
    }

    /// The solution carried by this event, if any.
    pub fn solution(&self) -> Option<&SearchPath<N, A, V>> {
        match self {
            Self::SolutionCandidateFound(path) => Some(path),
            _ => None,
        }
    }
}
