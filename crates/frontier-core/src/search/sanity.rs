//! Graph sanity checking: depth-first walk looking for cycles and dead ends.

use crate::algorithm::{
    AlgorithmEvent, Execution, ExecutionControl, ExecutionState, ListenerRegistry, Progress,
    SearchAlgorithm, StepContext, Stepper,
};
use crate::error::{Result, SearchError};
use crate::graph::{GraphGenerator, NodeArena, NodeId, SearchPath, Successor};
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use tracing::{debug, info};

/// A path that returns to a state already on it.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleDetectedResult<N, A> {
    /// Root-to-duplicate path; the last state equals an earlier one.
    pub path: SearchPath<N, A, ()>,
    /// The repeated state.
    pub duplicate: N,
}

/// A non-goal state without successors.
#[derive(Debug, Clone, PartialEq)]
pub struct DeadEndDetectedResult<N, A> {
    /// Root-to-dead-end path.
    pub path: SearchPath<N, A, ()>,
    /// The dead-end state.
    pub dead_end: N,
}

/// Problem found by the sanity checker.
#[derive(Debug, Clone, PartialEq)]
pub enum Anomaly<N, A> {
    /// A cycle.
    CycleDetected(CycleDetectedResult<N, A>),
    /// A dead end.
    DeadEndDetected(DeadEndDetectedResult<N, A>),
}

/// Settings of a sanity check.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SanityCheckConfig {
    /// Stop after creating this many nodes.
    pub max_nodes: usize,
}

impl Default for SanityCheckConfig {
    fn default() -> Self {
        Self { max_nodes: 10_000 }
    }
}

struct Frame<N, A> {
    node: NodeId,
    successors: Vec<Successor<N, A>>,
    next: usize,
}

type Event<G> = AlgorithmEvent<<G as GraphGenerator>::State, <G as GraphGenerator>::Action, ()>;

struct Walker<G: GraphGenerator> {
    generator: G,
    config: SanityCheckConfig,
    arena: NodeArena<G::State, G::Action, ()>,
    roots: VecDeque<NodeId>,
    stack: Vec<Frame<G::State, G::Action>>,
    finished: HashSet<G::State>,
    anomaly: Option<Anomaly<G::State, G::Action>>,
}

impl<G: GraphGenerator> Walker<G> {
    fn added(&self, id: NodeId, out: &mut Vec<Event<G>>) {
        let node = &self.arena[id];
        out.push(AlgorithmEvent::NodeAdded {
            node: id,
            parent: node.parent(),
            state: node.state().clone(),
            is_goal: node.is_goal(),
        });
    }

    fn create_child(
        &mut self,
        parent: NodeId,
        successor: Successor<G::State, G::Action>,
        out: &mut Vec<Event<G>>,
    ) -> Result<NodeId> {
        let is_goal = self.generator.is_goal(&successor.state).map_err(|err| {
            let mut trail = self.arena.describe_path(parent);
            trail.push(format!("{:?}", successor.state));
            err.at_path(trail)
        })?;
        let id = self
            .arena
            .insert_child(parent, successor.action, successor.state, is_goal);
        self.added(id, out);
        Ok(id)
    }

    fn report(&mut self, anomaly: Anomaly<G::State, G::Action>, out: &mut Vec<Event<G>>) -> Progress {
        info!(anomaly = ?anomaly, "sanity check found an anomaly");
        out.push(AlgorithmEvent::AnomalyDetected(anomaly.clone()));
        self.anomaly = Some(anomaly);
        Progress::Exhausted
    }

    /// Expand `node` and push its frame, or report it as a dead end.
    fn open(&mut self, node: NodeId, out: &mut Vec<Event<G>>) -> Result<Progress> {
        if self.arena[node].is_goal() {
            self.finished.insert(self.arena[node].state().clone());
            return Ok(Progress::Continue);
        }
        let successors = self
            .generator
            .successors(self.arena[node].state())
            .map_err(|err| err.at_path(self.arena.describe_path(node)))?;
        out.push(AlgorithmEvent::NodeClosed { node });
        if successors.is_empty() {
            let path = self.arena.path(node);
            let dead_end = self.arena[node].state().clone();
            return Ok(self.report(
                Anomaly::DeadEndDetected(DeadEndDetectedResult { path, dead_end }),
                out,
            ));
        }
        self.stack.push(Frame {
            node,
            successors,
            next: 0,
        });
        Ok(Progress::Continue)
    }
}

impl<G: GraphGenerator> Stepper for Walker<G> {
    type State = G::State;
    type Action = G::Action;
    type Label = ();

    fn initialize(&mut self, _ctx: &StepContext, out: &mut Vec<Event<G>>) -> Result<Progress> {
        let roots = self.generator.roots().map_err(|err| err.at_path(Vec::new()))?;
        for state in roots {
            let is_goal = self
                .generator
                .is_goal(&state)
                .map_err(|err| err.at_path(vec![format!("{state:?}")]))?;
            let id = self.arena.insert_root(state, is_goal);
            self.added(id, out);
            self.roots.push_back(id);
        }
        Ok(if self.roots.is_empty() {
            Progress::Exhausted
        } else {
            Progress::Continue
        })
    }

    fn step(&mut self, _ctx: &StepContext, out: &mut Vec<Event<G>>) -> Result<Progress> {
        let Some(frame) = self.stack.last_mut() else {
            return match self.roots.pop_front() {
                Some(root) => self.open(root, out),
                None => Ok(Progress::Exhausted),
            };
        };

        if frame.next == frame.successors.len() {
            let node = frame.node;
            self.stack.pop();
            self.finished.insert(self.arena[node].state().clone());
            return Ok(self.idle_progress());
        }

        let parent = frame.node;
        let successor = frame.successors[frame.next].clone();
        frame.next += 1;

        if self.arena.is_on_path(parent, &successor.state) {
            let mut path = self.arena.path(parent);
            path.extend(successor.action, successor.state.clone());
            let anomaly = Anomaly::CycleDetected(CycleDetectedResult {
                path,
                duplicate: successor.state,
            });
            return Ok(self.report(anomaly, out));
        }
        if self.finished.contains(&successor.state) {
            return Ok(Progress::Continue);
        }
        if self.arena.len() >= self.config.max_nodes {
            debug!(nodes = self.arena.len(), "node budget exhausted");
            return Ok(Progress::Exhausted);
        }

        let child = self.create_child(parent, successor, out)?;
        self.open(child, out)
    }
}

impl<G: GraphGenerator> Walker<G> {
    fn idle_progress(&self) -> Progress {
        if self.stack.is_empty() && self.roots.is_empty() {
            Progress::Exhausted
        } else {
            Progress::Continue
        }
    }
}

/// Walks a graph depth-first and stops at the first cycle or dead end.
///
/// Goal states are not expanded. States whose subtree was fully walked are
/// not walked again, so joins in a DAG are not reported as cycles.
pub struct SanityChecker<G: GraphGenerator> {
    execution: Execution<G::State, G::Action, ()>,
    walker: Walker<G>,
}

impl<G: GraphGenerator> SanityChecker<G> {
    /// Create a checker.
    pub fn new(generator: G, config: SanityCheckConfig) -> Result<Self> {
        if config.max_nodes == 0 {
            return Err(SearchError::InvalidConfig("max_nodes must be positive".into()));
        }
        Ok(Self {
            execution: Execution::new("sanity-check"),
            walker: Walker {
                generator,
                config,
                arena: NodeArena::new(),
                roots: VecDeque::new(),
                stack: Vec::new(),
                finished: HashSet::new(),
                anomaly: None,
            },
        })
    }

    /// The anomaly found, if any.
    pub fn anomaly(&self) -> Option<&Anomaly<G::State, G::Action>> {
        self.walker.anomaly.as_ref()
    }

    /// Nodes created so far.
    pub fn arena(&self) -> &NodeArena<G::State, G::Action, ()> {
        &self.walker.arena
    }

    /// Run to the end and return the anomaly found, if any.
    pub fn find_anomaly(&mut self) -> Result<Option<Anomaly<G::State, G::Action>>> {
        self.call()?;
        Ok(self.walker.anomaly.clone())
    }
}

impl<G: GraphGenerator> SearchAlgorithm for SanityChecker<G> {
    type State = G::State;
    type Action = G::Action;
    type Label = ();

    fn id(&self) -> &str {
        self.execution.id()
    }

    fn next_event(&mut self) -> Result<Event<G>> {
        self.execution.advance(&mut self.walker)
    }

    fn execution_state(&self) -> ExecutionState {
        self.execution.state()
    }

    fn control(&self) -> &ExecutionControl {
        self.execution.control()
    }

    fn listeners(&self) -> &Arc<ListenerRegistry<Event<G>>> {
        self.execution.listeners()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    /// Adjacency-list graph over small integers rooted at 0.
    struct Adjacency {
        edges: HashMap<u8, Vec<u8>>,
        goals: Vec<u8>,
    }

    impl Adjacency {
        fn new(edges: Vec<(u8, Vec<u8>)>, goals: &[u8]) -> Self {
            Self {
                edges: edges.into_iter().collect(),
                goals: goals.to_vec(),
            }
        }
    }

    impl GraphGenerator for Adjacency {
        type State = u8;
        type Action = u8;

        fn roots(&self) -> Result<Vec<u8>> {
            Ok(vec![0])
        }

        fn successors(&self, state: &u8) -> Result<Vec<Successor<u8, u8>>> {
            Ok(self
                .edges
                .get(state)
                .map(|targets| targets.iter().map(|&t| Successor::new(t, t)).collect())
                .unwrap_or_default())
        }

        fn is_goal(&self, state: &u8) -> Result<bool> {
            Ok(self.goals.contains(state))
        }
    }

    #[test]
    fn detects_two_step_cycle_to_root() {
        let graph = Adjacency::new(vec![(0, vec![1]), (1, vec![0])], &[]);
        let mut checker = SanityChecker::new(graph, SanityCheckConfig::default()).unwrap();
        match checker.find_anomaly().unwrap() {
            Some(Anomaly::CycleDetected(result)) => {
                assert_eq!(result.path.states, vec![0, 1, 0]);
                assert_eq!(result.path.head(), Some(&result.duplicate));
                assert_eq!(result.duplicate, 0);
            }
            other => panic!("expected a cycle, got {other:?}"),
        }
    }

    #[test]
    fn detects_dead_end_leaf() {
        let graph = Adjacency::new(vec![(0, vec![1, 2]), (1, vec![3]), (2, vec![])], &[3]);
        let mut checker = SanityChecker::new(graph, SanityCheckConfig::default()).unwrap();
        match checker.find_anomaly().unwrap() {
            Some(Anomaly::DeadEndDetected(result)) => {
                assert_eq!(result.dead_end, 2);
                assert_eq!(result.path.states, vec![0, 2]);
            }
            other => panic!("expected a dead end, got {other:?}"),
        }
    }

    #[test]
    fn dag_joins_are_not_cycles() {
        let graph = Adjacency::new(vec![(0, vec![1, 2]), (1, vec![3]), (2, vec![3])], &[3]);
        let mut checker = SanityChecker::new(graph, SanityCheckConfig::default()).unwrap();
        assert!(checker.find_anomaly().unwrap().is_none());
        assert!(checker.anomaly().is_none());
    }

    #[test]
    fn anomaly_is_emitted_before_finished() {
        let graph = Adjacency::new(vec![(0, vec![])], &[]);
        let mut checker = SanityChecker::new(graph, SanityCheckConfig::default()).unwrap();
        let mut names = Vec::new();
        while checker.has_next() {
            names.push(checker.next_event().unwrap().name());
        }
        assert_eq!(
            names,
            vec![
                "initialized",
                "node_added",
                "node_closed",
                "anomaly_detected",
                "finished"
            ]
        );
    }

    #[test]
    fn node_budget_bounds_the_walk() {
        // 0 -> 1 -> 2 -> ... never ends
        struct Infinite;
        impl GraphGenerator for Infinite {
            type State = u64;
            type Action = ();
            fn roots(&self) -> Result<Vec<u64>> {
                Ok(vec![0])
            }
            fn successors(&self, state: &u64) -> Result<Vec<Successor<u64, ()>>> {
                Ok(vec![Successor::new((), state + 1)])
            }
            fn is_goal(&self, _state: &u64) -> Result<bool> {
                Ok(false)
            }
        }

        let mut checker = SanityChecker::new(Infinite, SanityCheckConfig { max_nodes: 50 }).unwrap();
        assert!(checker.find_anomaly().unwrap().is_none());
        assert_eq!(checker.arena().len(), 50);
    }

    #[test]
    fn zero_budget_is_rejected() {
        let graph = Adjacency::new(Vec::new(), &[]);
        assert!(matches!(
            SanityChecker::new(graph, SanityCheckConfig { max_nodes: 0 }),
            Err(SearchError::InvalidConfig(_))
        ));
    }
}
