//! Solving one problem by reducing it to a search over another.

use super::{
    AlgorithmEvent, ExecutionControl, ExecutionState, ListenerRegistry, SearchAlgorithm,
};
use crate::error::Result;
use crate::graph::SearchPath;
use std::sync::Arc;
use tracing::{debug, warn};

/// A problem transformation wrapped around an inner search.
pub trait Reduction {
    /// The outer problem.
    type Problem;
    /// The search the problem is reduced to.
    type Inner: SearchAlgorithm;
    /// Solutions of the outer problem.
    type Solution;

    /// Build the inner search for `problem`.
    fn encode(&self, problem: Self::Problem) -> Result<Self::Inner>;

    /// Map an inner solution back. `Ok(None)` rejects the candidate.
    #[allow(clippy::type_complexity)]
    fn decode(
        &self,
        path: &SearchPath<
            <Self::Inner as SearchAlgorithm>::State,
            <Self::Inner as SearchAlgorithm>::Action,
            <Self::Inner as SearchAlgorithm>::Label,
        >,
    ) -> Result<Option<Self::Solution>>;
}

/// Exposes the inner search's event stream unchanged while decoding every
/// solution candidate it reports.
pub struct ReducingAlgorithm<R: Reduction> {
    reduction: R,
    inner: R::Inner,
    solutions: Vec<R::Solution>,
    delivered: usize,
}

impl<R: Reduction> ReducingAlgorithm<R> {
    /// Encode `problem` and wrap the resulting search.
    pub fn new(reduction: R, problem: R::Problem) -> Result<Self> {
        let inner = reduction.encode(problem)?;
        Ok(Self {
            reduction,
            inner,
            solutions: Vec::new(),
            delivered: 0,
        })
    }

    /// The inner search.
    pub fn inner(&self) -> &R::Inner {
        &self.inner
    }

    /// The reduction.
    pub fn reduction(&self) -> &R {
        &self.reduction
    }

    /// Every decoded solution so far.
    pub fn decoded_solutions(&self) -> &[R::Solution] {
        &self.solutions
    }
}

impl<R> ReducingAlgorithm<R>
where
    R: Reduction,
    R::Solution: Clone,
{
    /// Pull events until a candidate decodes to an outer solution.
    ///
    /// Returns `Ok(None)` once the inner search has finished.
    pub fn next_decoded_solution(&mut self) -> Result<Option<R::Solution>> {
        loop {
            if let Some(solution) = self.solutions.get(self.delivered) {
                self.delivered += 1;
                return Ok(Some(solution.clone()));
            }
            if self.next_solution()?.is_none() {
                return Ok(None);
            }
        }
    }
}

impl<R: Reduction> SearchAlgorithm for ReducingAlgorithm<R> {
    type State = <R::Inner as SearchAlgorithm>::State;
    type Action = <R::Inner as SearchAlgorithm>::Action;
    type Label = <R::Inner as SearchAlgorithm>::Label;

    fn id(&self) -> &str {
        self.inner.id()
    }

    /// Decoding failures are returned to the caller; the inner search keeps
    /// its state and can be driven further.
    fn next_event(&mut self) -> Result<AlgorithmEvent<Self::State, Self::Action, Self::Label>> {
        let event = self.inner.next_event()?;
        if let AlgorithmEvent::SolutionCandidateFound(path) = &event {
            match self.reduction.decode(path) {
                Ok(Some(solution)) => {
                    debug!(algorithm = %self.inner.id(), "decoded solution");
                    self.solutions.push(solution);
                }
                Ok(None) => debug!(algorithm = %self.inner.id(), "candidate rejected by decoder"),
                Err(err) => {
                    warn!(algorithm = %self.inner.id(), error = %err, "decoding failed");
                    return Err(err);
                }
            }
        }
        Ok(event)
    }

    fn execution_state(&self) -> ExecutionState {
        self.inner.execution_state()
    }

    fn control(&self) -> &ExecutionControl {
        self.inner.control()
    }

    fn listeners(&self) -> &Arc<ListenerRegistry<AlgorithmEvent<Self::State, Self::Action, Self::Label>>> {
        self.inner.listeners()
    }
}
