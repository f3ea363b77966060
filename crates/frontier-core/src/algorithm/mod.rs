//! The step-wise execution contract shared by all algorithms.
//!
//! Every algorithm is driven by repeated [`SearchAlgorithm::next_event`]
//! calls. Each call performs at most one unit of work and returns one
//! [`AlgorithmEvent`]; the same event is delivered to the algorithm's
//! listeners first.
//!
//! ```text
//! CREATED --next--> ACTIVE --next--> ... --next--> TERMINATED
//!                    |  ^
//!          suspend   v  | resume
//!                  INACTIVE
//! ```
//!
//! The call that observes a cancellation, a timeout or a fatal failure
//! returns the matching terminal event (`Cancelled`, `TimedOut`,
//! `Errored`); every later call returns the matching error.

mod control;
mod event;
mod execution;
mod listener;
mod reduction;

#[cfg(test)]
pub(crate) mod testing;

pub use control::{ExecutionConfig, ExecutionControl, StepContext};
pub use event::AlgorithmEvent;
pub use execution::{Execution, ExecutionState, Progress, Stepper, Termination};
pub use listener::{listener_error, EventCollector, Listener, ListenerId, ListenerRegistry};
pub use reduction::{ReducingAlgorithm, Reduction};

use crate::error::{Result, SearchError};
use crate::graph::SearchPath;
use std::sync::Arc;
use std::time::Duration;

/// Event type of an algorithm.
pub type EventOf<S> = AlgorithmEvent<
    <S as SearchAlgorithm>::State,
    <S as SearchAlgorithm>::Action,
    <S as SearchAlgorithm>::Label,
>;

/// Solution path type of an algorithm.
pub type SolutionOf<S> = SearchPath<
    <S as SearchAlgorithm>::State,
    <S as SearchAlgorithm>::Action,
    <S as SearchAlgorithm>::Label,
>;

/// How a completed run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// All work was done.
    Finished,
    /// Cancelled; solutions found so far are kept.
    Cancelled,
    /// Timed out; solutions found so far are kept.
    TimedOut,
}

/// Result of running an algorithm to completion.
#[derive(Debug, Clone)]
pub struct SearchOutcome<N, A, V> {
    /// How the run ended.
    pub completion: Completion,
    /// Solution candidates in discovery order.
    pub solutions: Vec<SearchPath<N, A, V>>,
}

impl<N, A, V> SearchOutcome<N, A, V> {
    /// Whether the run explored everything it was allowed to.
    pub fn is_complete(&self) -> bool {
        self.completion == Completion::Finished
    }

    /// The first solution found.
    pub fn first(&self) -> Option<&SearchPath<N, A, V>> {
        self.solutions.first()
    }
}

impl<N, A, V: PartialOrd> SearchOutcome<N, A, V> {
    /// The solution with the smallest label.
    pub fn best(&self) -> Option<&SearchPath<N, A, V>> {
        self.solutions
            .iter()
            .filter(|path| path.label.is_some())
            .min_by(|a, b| {
                a.label
                    .partial_cmp(&b.label)
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
    }
}

/// A search algorithm driven one event at a time.
pub trait SearchAlgorithm {
    /// State type of the searched graph.
    type State;
    /// Action type of the searched graph.
    type Action;
    /// Label type of solutions.
    type Label;

    /// Instance id.
    fn id(&self) -> &str;

    /// Perform at most one unit of work and return its event.
    fn next_event(&mut self) -> Result<AlgorithmEvent<Self::State, Self::Action, Self::Label>>;

    /// Current lifecycle state.
    fn execution_state(&self) -> ExecutionState;

    /// Handle for cancelling, suspending or limiting the run from elsewhere.
    fn control(&self) -> &ExecutionControl;

    /// Listener list of this instance.
    fn listeners(&self) -> &Arc<ListenerRegistry<AlgorithmEvent<Self::State, Self::Action, Self::Label>>>;

    /// Whether another call can produce an event.
    fn has_next(&self) -> bool {
        self.execution_state() != ExecutionState::Terminated
    }

    /// Request cancellation, observed at the start of the next step.
    fn cancel(&self) {
        self.control().cancel();
    }

    /// Limit the run's wall-clock time, measured from activation.
    fn set_timeout(&self, timeout: Duration) {
        self.control().set_timeout(timeout);
    }

    /// Register a listener.
    fn register_listener(
        &self,
        listener: Arc<dyn Listener<AlgorithmEvent<Self::State, Self::Action, Self::Label>>>,
    ) -> ListenerId {
        self.listeners().register(listener)
    }

    /// Pull events until the next solution candidate.
    ///
    /// Returns `Ok(None)` once the run has finished; cancellation, timeout
    /// and fatal failures are returned as errors.
    fn next_solution(&mut self) -> Result<Option<SearchPath<Self::State, Self::Action, Self::Label>>> {
        loop {
            let event = self.next_event()?;
            if let Some(err) = event.to_error() {
                return Err(err);
            }
            match event {
                AlgorithmEvent::SolutionCandidateFound(path) => return Ok(Some(path)),
                AlgorithmEvent::Finished => return Ok(None),
                _ => {}
            }
        }
    }

    /// Run until the end, collecting every solution candidate.
    ///
    /// Cancellation and timeouts count as completion; fatal failures are
    /// returned as [`SearchError::Algorithm`].
    fn call(&mut self) -> Result<SearchOutcome<Self::State, Self::Action, Self::Label>> {
        let mut solutions = Vec::new();
        loop {
            let completion = match self.next_event()? {
                AlgorithmEvent::SolutionCandidateFound(path) => {
                    solutions.push(path);
                    continue;
                }
                AlgorithmEvent::Finished => Completion::Finished,
                AlgorithmEvent::Cancelled => Completion::Cancelled,
                AlgorithmEvent::TimedOut { .. } => Completion::TimedOut,
                AlgorithmEvent::Errored { message, path } => {
                    return Err(SearchError::Algorithm { message, path })
                }
                _ => continue,
            };
            return Ok(SearchOutcome {
                completion,
                solutions,
            });
        }
    }
}

impl<S: SearchAlgorithm + ?Sized> SearchAlgorithm for Box<S> {
    type State = S::State;
    type Action = S::Action;
    type Label = S::Label;

    fn id(&self) -> &str {
        (**self).id()
    }

    fn next_event(&mut self) -> Result<AlgorithmEvent<Self::State, Self::Action, Self::Label>> {
        (**self).next_event()
    }

    fn execution_state(&self) -> ExecutionState {
        (**self).execution_state()
    }

    fn control(&self) -> &ExecutionControl {
        (**self).control()
    }

    fn listeners(&self) -> &Arc<ListenerRegistry<AlgorithmEvent<Self::State, Self::Action, Self::Label>>> {
        (**self).listeners()
    }
}

#[cfg(test)]
mod tests {
    use super::testing::Scripted;
    use super::*;

    #[test]
    fn next_solution_skips_other_events() {
        let mut algorithm = Scripted::new(vec![Some(3), None, Some(1)]);
        let first = algorithm.next_solution().unwrap().unwrap();
        assert_eq!(first.head(), Some(&3));
        let second = algorithm.next_solution().unwrap().unwrap();
        assert_eq!(second.head(), Some(&1));
        assert!(algorithm.next_solution().unwrap().is_none());
        assert!(!algorithm.has_next());
    }

    #[test]
    fn call_collects_solutions() {
        let mut algorithm = Scripted::new(vec![Some(5), Some(2), None]);
        let outcome = algorithm.call().unwrap();
        assert!(outcome.is_complete());
        assert_eq!(outcome.solutions.len(), 2);
        assert_eq!(outcome.best().and_then(|p| p.head()), Some(&2));
    }

    #[test]
    fn call_reports_cancellation_as_outcome() {
        let mut algorithm = Scripted::new(vec![Some(5), None, None]);
        assert!(algorithm.next_solution().unwrap().is_some());
        algorithm.cancel();
        let outcome = algorithm.call().unwrap();
        assert_eq!(outcome.completion, Completion::Cancelled);
        assert!(outcome.solutions.is_empty());
        assert!(matches!(algorithm.call(), Err(SearchError::Cancelled)));
    }

    #[test]
    fn next_solution_reports_timeout_as_error() {
        let mut algorithm = Scripted::new(vec![None, None]);
        algorithm.set_timeout(Duration::ZERO);
        assert!(matches!(
            algorithm.next_solution(),
            Err(SearchError::TimedOut { .. })
        ));
    }

    #[test]
    fn boxed_algorithms_delegate() {
        let mut boxed: Box<Scripted> = Box::new(Scripted::new(vec![Some(9)]));
        let collector: Arc<EventCollector<EventOf<Scripted>>> = Arc::new(EventCollector::new());
        boxed.register_listener(collector.clone());
        assert_eq!(boxed.call().unwrap().solutions.len(), 1);
        assert_eq!(collector.len(), 3);
    }
}
