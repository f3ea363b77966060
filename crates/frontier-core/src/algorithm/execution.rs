//! Lifecycle driver shared by every algorithm.
//!
//! An [`Execution`] owns the lifecycle state, the control handle and the
//! listener list of one algorithm instance. The algorithm itself only
//! implements [`Stepper`]: setup plus one unit of work per call. The driver
//! turns that into the pull protocol:
//!
//! | State | `advance` |
//! |-------|-----------|
//! | `Created` | runs setup, returns `Initialized` |
//! | `Active` | returns the next queued event, stepping when the queue is empty |
//! | `Inactive` | `Err(Suspended)` until resumed |
//! | `Terminated` | the error matching how the run ended |
//!
//! Cancellation and timeouts are checked before every unit of work; events
//! queued by an interrupted step are dropped.

use super::control::{ExecutionControl, StepContext};
use super::event::AlgorithmEvent;
use super::listener::ListenerRegistry;
use crate::error::{Result, SearchError};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

static NEXT_ALGORITHM_ID: AtomicU64 = AtomicU64::new(1);

/// Lifecycle state of an algorithm instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionState {
    /// Constructed, not started.
    Created,
    /// Running.
    Active,
    /// Paused; calls perform no work.
    Inactive,
    /// Done. Further calls fail.
    Terminated,
}

/// Result of one unit of work.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Progress {
    /// More work may remain.
    Continue,
    /// Nothing left to do; the run finishes once queued events are drained.
    Exhausted,
}

/// How a run ended.
#[derive(Debug, Clone, PartialEq)]
pub enum Termination {
    /// All work was done.
    Finished,
    /// Cancelled by the caller.
    Cancelled,
    /// Wall-clock budget exceeded.
    TimedOut(Duration),
    /// A fatal failure.
    Errored {
        /// Failure description.
        message: String,
        /// Root-to-node states of the offending node.
        path: Vec<String>,
    },
}

/// The algorithm-specific part of a search: setup and single steps.
///
/// Steps push the events they produce into `out`, in order.
pub trait Stepper {
    /// State type of the searched graph.
    type State;
    /// Action type of the searched graph.
    type Action;
    /// Label type of solutions.
    type Label;

    /// One-time setup, run by the first `next_event` call.
    fn initialize(
        &mut self,
        ctx: &StepContext,
        out: &mut Vec<AlgorithmEvent<Self::State, Self::Action, Self::Label>>,
    ) -> Result<Progress>;

    /// One unit of work (one expansion, one iteration).
    fn step(
        &mut self,
        ctx: &StepContext,
        out: &mut Vec<AlgorithmEvent<Self::State, Self::Action, Self::Label>>,
    ) -> Result<Progress>;
}

/// Lifecycle, control and listeners of one algorithm instance.
pub struct Execution<N, A, V> {
    id: String,
    state: ExecutionState,
    control: ExecutionControl,
    listeners: Arc<ListenerRegistry<AlgorithmEvent<N, A, V>>>,
    pending: VecDeque<AlgorithmEvent<N, A, V>>,
    activated_at: Option<Instant>,
    exhausted: bool,
    termination: Option<Termination>,
}

impl<N, A, V> std::fmt::Debug for Execution<N, A, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Execution")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .field("termination", &self.termination)
            .finish()
    }
}

impl<N, A, V> Execution<N, A, V> {
    /// Create a driver for an algorithm of the given kind, e.g. `"best-first"`.
    pub fn new(kind: &str) -> Self {
        Self::with_listeners(kind, Arc::new(ListenerRegistry::new()))
    }

    /// Create a driver delivering to an existing listener list.
    pub fn with_listeners(
        kind: &str,
        listeners: Arc<ListenerRegistry<AlgorithmEvent<N, A, V>>>,
    ) -> Self {
        let counter = NEXT_ALGORITHM_ID.fetch_add(1, Ordering::Relaxed);
        Self {
            id: format!("{kind}-{counter}"),
            state: ExecutionState::Created,
            control: ExecutionControl::new(),
            listeners,
            pending: VecDeque::new(),
            activated_at: None,
            exhausted: false,
            termination: None,
        }
    }

    /// Instance id, `<kind>-<counter>`.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ExecutionState {
        self.state
    }

    /// Control handle.
    pub fn control(&self) -> &ExecutionControl {
        &self.control
    }

    /// Listener list.
    pub fn listeners(&self) -> &Arc<ListenerRegistry<AlgorithmEvent<N, A, V>>> {
        &self.listeners
    }

    /// How the run ended, once it has.
    pub fn termination(&self) -> Option<&Termination> {
        self.termination.as_ref()
    }

    /// Whether another call can produce an event.
    pub fn has_next(&self) -> bool {
        self.state != ExecutionState::Terminated
    }

    /// Timing information as seen by the next step.
    pub fn context(&self) -> StepContext {
        StepContext::new(
            self.activated_at.unwrap_or_else(Instant::now),
            self.control.timeout(),
        )
    }

    /// Produce the next event, running setup or work as needed.
    pub fn advance<S>(&mut self, stepper: &mut S) -> Result<AlgorithmEvent<N, A, V>>
    where
        S: Stepper<State = N, Action = A, Label = V>,
    {
        match self.state {
            ExecutionState::Terminated => return Err(self.termination_error()),
            ExecutionState::Created => return Ok(self.activate(stepper)),
            ExecutionState::Inactive => {
                if self.control.is_suspended() && !self.control.is_cancelled() {
                    return Err(SearchError::Suspended);
                }
                info!(algorithm = %self.id, "resumed");
                self.state = ExecutionState::Active;
            }
            ExecutionState::Active => {}
        }

        loop {
            if let Some(event) = self.interruption() {
                return Ok(event);
            }
            if self.control.is_suspended() {
                info!(algorithm = %self.id, "suspended");
                self.state = ExecutionState::Inactive;
                return Err(SearchError::Suspended);
            }
            if let Some(event) = self.pending.pop_front() {
                return Ok(self.emit(event));
            }
            if self.exhausted {
                return Ok(self.terminate(Termination::Finished));
            }

            let ctx = self.context();
            let mut produced = Vec::new();
            match stepper.step(&ctx, &mut produced) {
                Ok(progress) => {
                    self.pending.extend(produced);
                    self.exhausted = progress == Progress::Exhausted;
                }
                Err(err) => return Ok(self.fail(err)),
            }
        }
    }

    fn activate<S>(&mut self, stepper: &mut S) -> AlgorithmEvent<N, A, V>
    where
        S: Stepper<State = N, Action = A, Label = V>,
    {
        self.activated_at = Some(Instant::now());
        if self.control.is_cancelled() {
            return self.terminate(Termination::Cancelled);
        }

        info!(algorithm = %self.id, timeout = ?self.control.timeout(), "initializing");
        let ctx = self.context();
        let mut produced = Vec::new();
        match stepper.initialize(&ctx, &mut produced) {
            Ok(progress) => {
                self.state = ExecutionState::Active;
                self.pending.extend(produced);
                self.exhausted = progress == Progress::Exhausted;
                let algorithm_id = self.id.clone();
                self.emit(AlgorithmEvent::Initialized { algorithm_id })
            }
            Err(err) => self.fail(err),
        }
    }

    fn interruption(&mut self) -> Option<AlgorithmEvent<N, A, V>> {
        if self.control.is_cancelled() {
            return Some(self.terminate(Termination::Cancelled));
        }
        let deadline = self.context().deadline()?;
        let now = Instant::now();
        if now >= deadline {
            return Some(self.terminate(Termination::TimedOut(now - deadline)));
        }
        None
    }

    fn fail(&mut self, err: SearchError) -> AlgorithmEvent<N, A, V> {
        let termination = match err {
            SearchError::Cancelled => Termination::Cancelled,
            SearchError::TimedOut { overshoot } => Termination::TimedOut(overshoot),
            SearchError::Algorithm { message, path } => Termination::Errored { message, path },
            other => Termination::Errored {
                message: other.to_string(),
                path: Vec::new(),
            },
        };
        self.terminate(termination)
    }

    fn terminate(&mut self, termination: Termination) -> AlgorithmEvent<N, A, V> {
        self.state = ExecutionState::Terminated;
        self.pending.clear();

        let event = match &termination {
            Termination::Finished => {
                info!(algorithm = %self.id, "finished");
                AlgorithmEvent::Finished
            }
            Termination::Cancelled => {
                info!(algorithm = %self.id, "cancelled");
                AlgorithmEvent::Cancelled
            }
            Termination::TimedOut(overshoot) => {
                info!(algorithm = %self.id, ?overshoot, "timed out");
                AlgorithmEvent::TimedOut {
                    overshoot: *overshoot,
                }
            }
            Termination::Errored { message, path } => {
                error!(algorithm = %self.id, %message, path = ?path, "errored");
                AlgorithmEvent::Errored {
                    message: message.clone(),
                    path: path.clone(),
                }
            }
        };
        self.termination = Some(termination);
        self.emit(event)
    }

    fn emit(&self, event: AlgorithmEvent<N, A, V>) -> AlgorithmEvent<N, A, V> {
        debug!(algorithm = %self.id, event = event.name(), "event");
        self.listeners.publish(&event);
        event
    }

    fn termination_error(&self) -> SearchError {
        match &self.termination {
            Some(Termination::Cancelled) => SearchError::Cancelled,
            Some(Termination::TimedOut(overshoot)) => SearchError::TimedOut {
                overshoot: *overshoot,
            },
            Some(Termination::Errored { message, path }) => SearchError::Algorithm {
                message: message.clone(),
                path: path.clone(),
            },
            Some(Termination::Finished) | None => {
                SearchError::InvalidState(format!("{} has already finished", self.id))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::listener::EventCollector;
    use crate::graph::NodeId;

    type Event = AlgorithmEvent<u32, u32, f64>;

    /// Closes `steps` nodes, one per step, then runs out of work.
    struct Countdown {
        steps: usize,
        done: usize,
        fail_at: Option<usize>,
    }

    impl Countdown {
        fn new(steps: usize) -> Self {
            Self {
                steps,
                done: 0,
                fail_at: None,
            }
        }
    }

    impl Stepper for Countdown {
        type State = u32;
        type Action = u32;
        type Label = f64;

        fn initialize(&mut self, _ctx: &StepContext, _out: &mut Vec<Event>) -> Result<Progress> {
            Ok(if self.steps == 0 {
                Progress::Exhausted
            } else {
                Progress::Continue
            })
        }

        fn step(&mut self, _ctx: &StepContext, out: &mut Vec<Event>) -> Result<Progress> {
            if self.fail_at == Some(self.done) {
                return Err(SearchError::generator("boom").at_path(vec!["root".into()]));
            }
            out.push(AlgorithmEvent::NodeClosed {
                node: NodeId(self.done),
            });
            self.done += 1;
            Ok(if self.done == self.steps {
                Progress::Exhausted
            } else {
                Progress::Continue
            })
        }
    }

    #[test]
    fn lifecycle_runs_to_finished() {
        let mut execution: Execution<u32, u32, f64> = Execution::new("countdown");
        let mut stepper = Countdown::new(2);
        assert_eq!(execution.state(), ExecutionState::Created);

        let first = execution.advance(&mut stepper).unwrap();
        assert!(matches!(first, AlgorithmEvent::Initialized { ref algorithm_id } if algorithm_id.starts_with("countdown-")));
        assert_eq!(execution.state(), ExecutionState::Active);

        let names: Vec<_> = (0..3)
            .map(|_| execution.advance(&mut stepper).unwrap().name())
            .collect();
        assert_eq!(names, vec!["node_closed", "node_closed", "finished"]);
        assert_eq!(execution.state(), ExecutionState::Terminated);
        assert!(!execution.has_next());

        assert!(matches!(
            execution.advance(&mut stepper),
            Err(SearchError::InvalidState(_))
        ));
    }

    #[test]
    fn ids_are_unique() {
        let a: Execution<u32, u32, f64> = Execution::new("x");
        let b: Execution<u32, u32, f64> = Execution::new("x");
        assert_ne!(a.id(), b.id());
    }

    #[test]
    fn cancel_stops_further_work() {
        let mut execution: Execution<u32, u32, f64> = Execution::new("countdown");
        let mut stepper = Countdown::new(10);
        execution.advance(&mut stepper).unwrap();
        execution.advance(&mut stepper).unwrap();

        execution.control().clone().cancel();
        assert!(matches!(
            execution.advance(&mut stepper).unwrap(),
            AlgorithmEvent::Cancelled
        ));
        assert_eq!(stepper.done, 1);
        assert!(matches!(
            execution.advance(&mut stepper),
            Err(SearchError::Cancelled)
        ));
    }

    #[test]
    fn cancel_before_start() {
        let mut execution: Execution<u32, u32, f64> = Execution::new("countdown");
        execution.control().cancel();
        let event = execution.advance(&mut Countdown::new(3)).unwrap();
        assert!(matches!(event, AlgorithmEvent::Cancelled));
    }

    #[test]
    fn timeout_is_distinct_from_cancel() {
        let mut execution: Execution<u32, u32, f64> = Execution::new("countdown");
        let mut stepper = Countdown::new(10);
        execution.control().set_timeout(Duration::ZERO);
        execution.advance(&mut stepper).unwrap();

        let event = execution.advance(&mut stepper).unwrap();
        assert!(matches!(event, AlgorithmEvent::TimedOut { .. }));
        assert!(matches!(
            execution.advance(&mut stepper),
            Err(SearchError::TimedOut { .. })
        ));
        assert!(matches!(
            execution.termination(),
            Some(Termination::TimedOut(_))
        ));
    }

    #[test]
    fn step_failure_becomes_errored() {
        let mut execution: Execution<u32, u32, f64> = Execution::new("countdown");
        let mut stepper = Countdown::new(5);
        stepper.fail_at = Some(1);

        execution.advance(&mut stepper).unwrap();
        execution.advance(&mut stepper).unwrap();
        match execution.advance(&mut stepper).unwrap() {
            AlgorithmEvent::Errored { message, path } => {
                assert!(message.contains("boom"));
                assert_eq!(path, vec!["root".to_string()]);
            }
            other => panic!("unexpected event: {other:?}"),
        }
        assert!(matches!(
            execution.advance(&mut stepper),
            Err(SearchError::Algorithm { .. })
        ));
    }

    #[test]
    fn suspend_and_resume() {
        let mut execution: Execution<u32, u32, f64> = Execution::new("countdown");
        let mut stepper = Countdown::new(2);
        execution.advance(&mut stepper).unwrap();

        execution.control().suspend();
        assert!(matches!(
            execution.advance(&mut stepper),
            Err(SearchError::Suspended)
        ));
        assert_eq!(execution.state(), ExecutionState::Inactive);
        assert!(matches!(
            execution.advance(&mut stepper),
            Err(SearchError::Suspended)
        ));
        assert_eq!(stepper.done, 0);

        execution.control().resume();
        assert_eq!(execution.advance(&mut stepper).unwrap().name(), "node_closed");
        assert_eq!(execution.state(), ExecutionState::Active);
    }

    #[test]
    fn listeners_see_every_event() {
        let mut execution: Execution<u32, u32, f64> = Execution::new("countdown");
        let collector: Arc<EventCollector<Event>> = Arc::new(EventCollector::new());
        execution.listeners().register(collector.clone());

        let mut stepper = Countdown::new(1);
        while execution.has_next() {
            execution.advance(&mut stepper).unwrap();
        }
        let names: Vec<_> = collector.events().iter().map(|e| e.name()).collect();
        assert_eq!(names, vec!["initialized", "node_closed", "finished"]);
    }

    #[test]
    fn empty_run_finishes_after_initialized() {
        let mut execution: Execution<u32, u32, f64> = Execution::new("countdown");
        let mut stepper = Countdown::new(0);
        assert_eq!(execution.advance(&mut stepper).unwrap().name(), "initialized");
        assert_eq!(execution.advance(&mut stepper).unwrap().name(), "finished");
    }
}
