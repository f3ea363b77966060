//! Best-first search.
//!
//! Each step pops the best node from the open list. Goal nodes are reported
//! as solution candidates; all other nodes are expanded: every successor
//! becomes a child node, is evaluated and queued, and the parent is closed.
//!
//! With parent discarding, a child whose state is already queued is kept
//! only if it improves on the queued label. A losing child is dropped before
//! it is announced; a beaten queued node is reported with `NodeRemoved`.
//!
//! # Example
//!
//! ```
//! use frontier_core::prelude::*;
//!
//! /// Walks 0 -> 1 -> ... -> 5.
//! struct Line;
//!
//! impl GraphGenerator for Line {
//!     type State = u32;
//!     type Action = ();
//!
//!     fn roots(&self) -> Result<Vec<u32>> {
//!         Ok(vec![0])
//!     }
//!
//!     fn successors(&self, state: &u32) -> Result<Vec<Successor<u32, ()>>> {
//!         Ok(if *state < 5 { vec![Successor::new((), state + 1)] } else { vec![] })
//!     }
//!
//!     fn is_goal(&self, state: &u32) -> Result<bool> {
//!         Ok(*state == 5)
//!     }
//! }
//!
//! let mut search = BestFirst::new(Line, DepthEvaluator, BestFirstConfig::default()).unwrap();
//! let solution = search.next_solution().unwrap().unwrap();
//! assert_eq!(solution.len(), 5);
//! ```

use super::evaluator::{NodeEvaluator, F_ERROR, F_TIME, F_UNCERTAINTY};
use super::open::{OpenEntry, OpenList, ParetoOpen, PriorityOpen, TieBreak};
use super::oversearch::{DiscreteDistance, TwoPhaseConfig, TwoPhaseOpen};
use crate::algorithm::{
    AlgorithmEvent, Execution, ExecutionControl, ExecutionState, ListenerRegistry, Progress,
    SearchAlgorithm, StepContext, Stepper,
};
use crate::error::{Result, SearchError};
use crate::graph::{GraphGenerator, NodeArena, NodeId, SearchPath};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, trace, warn};

/// Duplicate suppression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParentDiscarding {
    /// Every discovery becomes a node.
    #[default]
    None,
    /// A state already on OPEN keeps only its better-labelled node.
    Open,
    /// Like `Open`, and states already expanded are never added again.
    All,
}

/// Frontier discipline.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "mode")]
pub enum OversearchMode {
    /// Plain f-value order.
    #[default]
    None,
    /// Alternate exploitation and exploration phases.
    TwoPhase(TwoPhaseConfig),
    /// Expand Pareto-optimal nodes over (f-value, uncertainty) first.
    Pareto,
}

impl OversearchMode {
    /// Whether the discipline needs uncertainty estimates.
    pub fn requires_uncertainty(&self) -> bool {
        !matches!(self, Self::None)
    }
}

/// Settings of a best-first run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BestFirstConfig {
    /// Duplicate suppression.
    pub parent_discarding: ParentDiscarding,
    /// Tie-break among equal labels.
    pub tie_break: TieBreak,
    /// Frontier discipline.
    pub oversearch: OversearchMode,
    /// Stop after this many solution candidates.
    pub max_solutions: Option<usize>,
    /// Drop nodes whose expansion or evaluation fails unexpectedly instead
    /// of failing the run.
    pub skip_failed_nodes: bool,
}

impl Default for BestFirstConfig {
    fn default() -> Self {
        Self {
            parent_discarding: ParentDiscarding::None,
            tie_break: TieBreak::Fifo,
            oversearch: OversearchMode::None,
            max_solutions: None,
            skip_failed_nodes: false,
        }
    }
}

impl BestFirstConfig {
    /// Set duplicate suppression.
    pub fn with_parent_discarding(mut self, mode: ParentDiscarding) -> Self {
        self.parent_discarding = mode;
        self
    }

    /// Set the tie-break.
    pub fn with_tie_break(mut self, tie_break: TieBreak) -> Self {
        self.tie_break = tie_break;
        self
    }

    /// Set the frontier discipline.
    pub fn with_oversearch(mut self, mode: OversearchMode) -> Self {
        self.oversearch = mode;
        self
    }

    /// Stop after `limit` solutions.
    pub fn with_max_solutions(mut self, limit: usize) -> Self {
        self.max_solutions = Some(limit);
        self
    }

    /// Skip nodes that fail unexpectedly.
    pub fn with_skip_failed_nodes(mut self, skip: bool) -> Self {
        self.skip_failed_nodes = skip;
        self
    }
}

type Open<G, E> = Box<
    dyn OpenList<
        <G as GraphGenerator>::State,
        <G as GraphGenerator>::Action,
        <E as NodeEvaluator<<G as GraphGenerator>::State, <G as GraphGenerator>::Action>>::Label,
    >,
>;

type Event<G, E> = AlgorithmEvent<
    <G as GraphGenerator>::State,
    <G as GraphGenerator>::Action,
    <E as NodeEvaluator<<G as GraphGenerator>::State, <G as GraphGenerator>::Action>>::Label,
>;

type Path<G, E> = SearchPath<
    <G as GraphGenerator>::State,
    <G as GraphGenerator>::Action,
    <E as NodeEvaluator<<G as GraphGenerator>::State, <G as GraphGenerator>::Action>>::Label,
>;

struct Core<G, E>
where
    G: GraphGenerator,
    E: NodeEvaluator<G::State, G::Action>,
{
    generator: G,
    evaluator: E,
    config: BestFirstConfig,
    arena: NodeArena<G::State, G::Action, E::Label>,
    open: Open<G, E>,
    queued: HashSet<NodeId>,
    on_open: HashMap<G::State, NodeId>,
    closed: HashSet<G::State>,
    bootstrap: Vec<Path<G, E>>,
    seq: u64,
    solutions: usize,
    expansions: usize,
}

impl<G, E> Core<G, E>
where
    G: GraphGenerator,
    E: NodeEvaluator<G::State, G::Action>,
{
    fn discarding(&self) -> bool {
        self.config.parent_discarding != ParentDiscarding::None
    }

    /// Handle a failure tied to one node: absorb it or escalate it.
    fn node_failure(&mut self, id: NodeId, err: SearchError) -> Result<()> {
        if err.is_controlled() || self.config.skip_failed_nodes {
            warn!(node = %id, error = %err, "dropping node");
            if let Some(node) = self.arena.get_mut(id) {
                node.annotate(F_ERROR, err.to_string());
            }
            return Ok(());
        }
        Err(err.at_path(self.arena.describe_path(id)))
    }

    /// Evaluate a freshly inserted node and queue it. Returns whether it was
    /// queued.
    ///
    /// `id` must be the newest node of the arena: a duplicate that does not
    /// improve on the queued node for its state is retracted and never
    /// announced. Every other node is announced with `NodeAdded`.
    fn admit(&mut self, id: NodeId, out: &mut Vec<Event<G, E>>) -> Result<bool> {
        let started = Instant::now();
        let result = self.evaluator.evaluate(self.arena.node_ref(id));
        let micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
        if let Some(node) = self.arena.get_mut(id) {
            node.annotate(F_TIME, micros);
        }

        let evaluation = match result {
            Ok(Some(evaluation)) => evaluation,
            Ok(None) => {
                debug!(node = %id, "evaluator declined node");
                if let Some(node) = self.arena.get_mut(id) {
                    node.annotate(F_ERROR, "no label");
                }
                self.added(id, out);
                return Ok(false);
            }
            Err(err) => {
                self.added(id, out);
                return self.node_failure(id, err).map(|()| false);
            }
        };

        if self.open.requires_uncertainty() && evaluation.uncertainty.is_none() {
            return Err(SearchError::Algorithm {
                message: "evaluator declared uncertainty but returned none".into(),
                path: self.arena.describe_path(id),
            });
        }

        let state = self.arena[id].state().clone();
        let mut replaced = None;
        if self.discarding() {
            if let Some(&existing) = self.on_open.get(&state) {
                let improves = self.arena[existing]
                    .label()
                    .and_then(|old| evaluation.value.partial_cmp(old))
                    == Some(Ordering::Less);
                if !improves {
                    trace!(node = %id, kept = %existing, "duplicate on open discarded");
                    self.arena.retract(id);
                    return Ok(false);
                }
                trace!(node = %id, replaced = %existing, "duplicate on open replaced");
                self.queued.remove(&existing);
                self.open.remove(existing);
                replaced = Some(existing);
            }
        }

        if let Some(node) = self.arena.get_mut(id) {
            node.set_label(evaluation.value.clone());
            if let Some(uncertainty) = evaluation.uncertainty {
                node.set_uncertainty(uncertainty);
                node.annotate(F_UNCERTAINTY, uncertainty);
            }
            for (key, value) in evaluation.annotations {
                node.annotate(key, value);
            }
        }

        self.open.push(OpenEntry {
            node: id,
            label: evaluation.value,
            uncertainty: evaluation.uncertainty,
            seq: self.seq,
        });
        self.seq += 1;
        self.queued.insert(id);
        if self.discarding() {
            self.on_open.insert(state, id);
        }
        self.added(id, out);
        if let Some(existing) = replaced {
            out.push(AlgorithmEvent::NodeRemoved { node: existing });
        }
        Ok(true)
    }

    fn pop_live(&mut self) -> Option<OpenEntry<E::Label>> {
        while let Some(entry) = self.open.pop(&self.arena) {
            if self.queued.remove(&entry.node) {
                return Some(entry);
            }
        }
        None
    }

    fn close(&mut self, id: NodeId) {
        if !self.discarding() {
            return;
        }
        let state = self.arena[id].state().clone();
        if self.on_open.get(&state) == Some(&id) {
            self.on_open.remove(&state);
        }
        self.closed.insert(state);
    }

    fn skip_state(&self, state: &G::State) -> bool {
        self.config.parent_discarding == ParentDiscarding::All && self.closed.contains(state)
    }

    fn goal_test(&self, state: &G::State) -> Result<bool> {
        self.generator.is_goal(state)
    }

    fn added(&self, id: NodeId, out: &mut Vec<Event<G, E>>) {
        let node = &self.arena[id];
        out.push(AlgorithmEvent::NodeAdded {
            node: id,
            parent: node.parent(),
            state: node.state().clone(),
            is_goal: node.is_goal(),
        });
    }

    fn seed_roots(&mut self, out: &mut Vec<Event<G, E>>) -> Result<()> {
        let roots = self
            .generator
            .roots()
            .map_err(|err| err.at_path(Vec::new()))?;
        if roots.is_empty() {
            warn!("graph generator returned no roots");
        }
        for state in roots {
            let is_goal = self.goal_test(&state).map_err(|err| {
                err.at_path(vec![format!("{state:?}")])
            })?;
            let id = self.arena.insert_root(state, is_goal);
            self.admit(id, out)?;
        }
        Ok(())
    }

    fn seed_paths(&mut self, paths: Vec<Path<G, E>>, out: &mut Vec<Event<G, E>>) -> Result<()> {
        for path in paths {
            let depth = path.actions.len();
            let mut states = path.states.into_iter();
            let Some(root) = states.next() else { continue };
            let is_goal = depth == 0
                && self
                    .goal_test(&root)
                    .map_err(|err| err.at_path(vec![format!("{root:?}")]))?;
            let mut head = self.arena.insert_root(root, is_goal);

            for (index, (action, state)) in path.actions.into_iter().zip(states).enumerate() {
                self.added(head, out);
                if self.discarding() {
                    let expanded = self.arena[head].state().clone();
                    self.closed.insert(expanded);
                }
                let is_goal = index + 1 == depth
                    && self.goal_test(&state).map_err(|err| {
                        let mut trail = self.arena.describe_path(head);
                        trail.push(format!("{state:?}"));
                        err.at_path(trail)
                    })?;
                head = self.arena.insert_child(head, action, state, is_goal);
            }
            self.admit(head, out)?;
        }
        Ok(())
    }

    fn progress(&self) -> Progress {
        if self.queued.is_empty() {
            Progress::Exhausted
        } else {
            Progress::Continue
        }
    }
}

impl<G, E> Stepper for Core<G, E>
where
    G: GraphGenerator,
    E: NodeEvaluator<G::State, G::Action>,
{
    type State = G::State;
    type Action = G::Action;
    type Label = E::Label;

    fn initialize(&mut self, _ctx: &StepContext, out: &mut Vec<Event<G, E>>) -> Result<Progress> {
        let bootstrap = std::mem::take(&mut self.bootstrap);
        if bootstrap.is_empty() {
            self.seed_roots(out)?;
        } else {
            debug!(paths = bootstrap.len(), "bootstrapping from frontier paths");
            self.seed_paths(bootstrap, out)?;
        }
        Ok(self.progress())
    }

    fn step(&mut self, ctx: &StepContext, out: &mut Vec<Event<G, E>>) -> Result<Progress> {
        let started = Instant::now();
        let Some(entry) = self.pop_live() else {
            return Ok(Progress::Exhausted);
        };
        let id = entry.node;
        self.close(id);

        if self.arena[id].is_goal() {
            debug!(node = %id, label = ?entry.label, "solution candidate");
            out.push(AlgorithmEvent::SolutionCandidateFound(self.arena.path(id)));
            self.solutions += 1;
            if self.config.max_solutions.is_some_and(|limit| self.solutions >= limit) {
                debug!(solutions = self.solutions, "solution limit reached");
                return Ok(Progress::Exhausted);
            }
            return Ok(self.progress());
        }

        let successors = match self.generator.successors(self.arena[id].state()) {
            Ok(successors) => successors,
            Err(err) => {
                self.node_failure(id, err)?;
                out.push(AlgorithmEvent::NodeClosed { node: id });
                return Ok(self.progress());
            }
        };
        debug!(
            node = %id,
            depth = self.arena[id].depth(),
            label = ?entry.label,
            successors = successors.len(),
            "expanding"
        );

        for successor in successors {
            if self.skip_state(&successor.state) {
                trace!(parent = %id, state = ?successor.state, "already expanded");
                continue;
            }
            let is_goal = match self.goal_test(&successor.state) {
                Ok(is_goal) => is_goal,
                Err(err) => {
                    let child = self.arena.insert_child(id, successor.action, successor.state, false);
                    self.added(child, out);
                    self.node_failure(child, err)?;
                    continue;
                }
            };
            let child = self
                .arena
                .insert_child(id, successor.action, successor.state, is_goal);
            trace!(parent = %id, node = %child, is_goal, "node created");
            self.admit(child, out)?;
        }

        out.push(AlgorithmEvent::NodeClosed { node: id });
        self.expansions += 1;
        self.open.observe_step(started.elapsed(), ctx.remaining());
        Ok(self.progress())
    }
}

/// Best-first search over a graph generator.
pub struct BestFirst<G, E>
where
    G: GraphGenerator,
    E: NodeEvaluator<G::State, G::Action>,
{
    execution: Execution<G::State, G::Action, E::Label>,
    core: Core<G, E>,
}

impl<G, E> BestFirst<G, E>
where
    G: GraphGenerator,
    G::State: Send + 'static,
    E: NodeEvaluator<G::State, G::Action>,
    E::Label: Send + 'static,
{
    /// Create a search with the open list implied by `config`.
    ///
    /// Two-phase exploration uses [`DiscreteDistance`]; use
    /// [`BestFirst::with_open_list`] to supply another metric.
    pub fn new(generator: G, evaluator: E, config: BestFirstConfig) -> Result<Self> {
        let open: Open<G, E> = match &config.oversearch {
            OversearchMode::None => Box::new(PriorityOpen::new(config.tie_break)),
            OversearchMode::Pareto => Box::new(ParetoOpen::new()),
            OversearchMode::TwoPhase(two_phase) => Box::new(TwoPhaseOpen::from_config(
                two_phase,
                Box::new(DiscreteDistance),
            )),
        };
        Self::with_open_list(generator, evaluator, config, open)
    }
}

impl<G, E> BestFirst<G, E>
where
    G: GraphGenerator,
    E: NodeEvaluator<G::State, G::Action>,
{
    /// Create a search with a custom open list.
    ///
    /// Fails if the open list needs uncertainty estimates the evaluator
    /// does not provide.
    pub fn with_open_list(
        generator: G,
        evaluator: E,
        config: BestFirstConfig,
        open: Open<G, E>,
    ) -> Result<Self> {
        if open.requires_uncertainty() && !evaluator.annotates_uncertainty() {
            return Err(SearchError::InvalidConfig(
                "open list orders by uncertainty but the evaluator does not annotate it".into(),
            ));
        }
        if config.max_solutions == Some(0) {
            return Err(SearchError::InvalidConfig("max_solutions must be positive".into()));
        }
        Ok(Self {
            execution: Execution::new("best-first"),
            core: Core {
                generator,
                evaluator,
                config,
                arena: NodeArena::new(),
                open,
                queued: HashSet::new(),
                on_open: HashMap::new(),
                closed: HashSet::new(),
                bootstrap: Vec::new(),
                seq: 0,
                solutions: 0,
                expansions: 0,
            },
        })
    }

    /// Start from existing root-to-frontier paths instead of the roots.
    ///
    /// Inner states of the paths count as expanded; the heads are evaluated
    /// and queued.
    pub fn with_bootstrap(mut self, paths: Vec<Path<G, E>>) -> Result<Self> {
        if self.execution.state() != ExecutionState::Created {
            return Err(SearchError::InvalidState(
                "bootstrap paths must be set before the first step".into(),
            ));
        }
        if paths.iter().any(|path| path.states.len() != path.actions.len() + 1) {
            return Err(SearchError::InvalidConfig(
                "bootstrap path needs exactly one more state than actions".into(),
            ));
        }
        self.core.bootstrap = paths;
        Ok(self)
    }

    /// Settings of this run.
    pub fn config(&self) -> &BestFirstConfig {
        &self.core.config
    }

    /// The graph generator.
    pub fn generator(&self) -> &G {
        &self.core.generator
    }

    /// All nodes created so far.
    pub fn arena(&self) -> &NodeArena<G::State, G::Action, E::Label> {
        &self.core.arena
    }

    /// Number of expanded nodes.
    pub fn expansions(&self) -> usize {
        self.core.expansions
    }

    /// Number of solution candidates reported.
    pub fn solutions_found(&self) -> usize {
        self.core.solutions
    }

    /// Number of nodes waiting for expansion.
    pub fn frontier_len(&self) -> usize {
        self.core.queued.len()
    }

    /// Root-to-node paths of the nodes waiting for expansion, oldest first.
    pub fn frontier(&self) -> Vec<Path<G, E>> {
        let mut ids: Vec<NodeId> = self.core.queued.iter().copied().collect();
        ids.sort_unstable();
        ids.into_iter().map(|id| self.core.arena.path(id)).collect()
    }
}

impl<G, E> SearchAlgorithm for BestFirst<G, E>
where
    G: GraphGenerator,
    E: NodeEvaluator<G::State, G::Action>,
{
    type State = G::State;
    type Action = G::Action;
    type Label = E::Label;

    fn id(&self) -> &str {
        self.execution.id()
    }

    fn next_event(&mut self) -> Result<Event<G, E>> {
        self.execution.advance(&mut self.core)
    }

    fn execution_state(&self) -> ExecutionState {
        self.execution.state()
    }

    fn control(&self) -> &ExecutionControl {
        self.execution.control()
    }

    fn listeners(&self) -> &Arc<ListenerRegistry<Event<G, E>>> {
        self.execution.listeners()
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use crate::graph::Successor;
    use crate::search::evaluator::DepthEvaluator;
    use proptest::prelude::*;

    /// A random DAG: edges only go from lower to higher ids.
    #[derive(Debug, Clone)]
    struct Dag {
        edges: Vec<Vec<u8>>,
    }

    impl GraphGenerator for Dag {
        type State = u8;
        type Action = u8;

        fn roots(&self) -> Result<Vec<u8>> {
            Ok(vec![0])
        }

        fn successors(&self, state: &u8) -> Result<Vec<Successor<u8, u8>>> {
            Ok(self.edges[*state as usize]
                .iter()
                .map(|&next| Successor::new(next, next))
                .collect())
        }

        fn is_goal(&self, _state: &u8) -> Result<bool> {
            Ok(false)
        }
    }

    prop_compose! {
        fn arb_dag(max_nodes: u8)(size in 2..max_nodes)(
            edges in proptest::collection::vec(proptest::collection::vec(any::<u8>(), 0..4), size as usize),
            size in Just(size),
        ) -> Dag {
            let edges = edges
                .into_iter()
                .enumerate()
                .map(|(from, targets)| {
                    targets
                        .into_iter()
                        .map(|t| from as u8 + 1 + t % size)
                        .filter(|&to| to < size)
                        .collect()
                })
                .collect();
            Dag { edges }
        }
    }

    proptest! {
        #[test]
        fn all_discarding_expands_each_state_at_most_once(dag in arb_dag(24)) {
            let config = BestFirstConfig::default().with_parent_discarding(ParentDiscarding::All);
            let mut search = BestFirst::new(dag, DepthEvaluator, config).unwrap();
            let mut expanded = Vec::new();
            while search.has_next() {
                if let AlgorithmEvent::NodeClosed { node } = search.next_event().unwrap() {
                    expanded.push(*search.arena()[node].state());
                }
            }
            let mut unique = expanded.clone();
            unique.sort_unstable();
            unique.dedup();
            prop_assert_eq!(unique.len(), expanded.len());
        }

        #[test]
        fn expansion_labels_never_decrease(dag in arb_dag(16)) {
            let mut search = BestFirst::new(dag, DepthEvaluator, BestFirstConfig::default()).unwrap();
            let mut labels = Vec::new();
            while search.has_next() {
                if let AlgorithmEvent::NodeClosed { node } = search.next_event().unwrap() {
                    labels.push(search.arena()[node].label().copied().unwrap_or_default());
                }
            }
            prop_assert!(labels.windows(2).all(|w| w[0] <= w[1]));
        }
    }
}
