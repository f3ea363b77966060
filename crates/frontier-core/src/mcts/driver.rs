//! The iterate-descend-rollout-learn loop.

use super::policy::{DefaultPolicy, RewardFunction, TreePolicy, UniformRandomPolicy};
use super::MctsConfig;
use crate::algorithm::{
    AlgorithmEvent, Execution, ExecutionControl, ExecutionState, ListenerRegistry, Progress,
    SearchAlgorithm, StepContext, Stepper,
};
use crate::error::{Result, SearchError};
use crate::graph::{GraphGenerator, NodeArena, NodeId, SearchPath};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::collections::{HashMap, HashSet};
use std::fmt::Debug;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// One finished playout.
#[derive(Debug, Clone, PartialEq)]
pub struct Rollout<N, A> {
    /// 1-based iteration number.
    pub iteration: usize,
    /// Visited states, starting at the root.
    pub states: Vec<N>,
    /// Actions taken; one fewer than `states`.
    pub actions: Vec<A>,
    /// Index of each action in its state's successor list.
    pub choices: Vec<usize>,
    /// Reward of each transition.
    pub rewards: Vec<f64>,
    /// Discounted return from each position to the end of the playout.
    pub returns: Vec<f64>,
    /// Discounted return of the whole playout.
    pub score: f64,
    /// Whether the playout ended in a goal state.
    pub reached_goal: bool,
    /// Number of steps chosen by the tree policy.
    pub tree_steps: usize,
}

impl<N, A> Rollout<N, A> {
    /// Number of transitions.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True if the playout made no move.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

impl<N: Clone, A: Clone> Rollout<N, A> {
    /// The playout as a path labelled with its score.
    pub fn path(&self) -> SearchPath<N, A, f64> {
        SearchPath {
            states: self.states.clone(),
            actions: self.actions.clone(),
            label: Some(self.score),
        }
    }
}

/// Discounted returns from every position, back to front.
fn discounted_returns(rewards: &[f64], gamma: f64) -> Vec<f64> {
    let mut returns = vec![0.0; rewards.len()];
    let mut acc = 0.0;
    for (index, reward) in rewards.iter().enumerate().rev() {
        acc = reward + gamma * acc;
        returns[index] = acc;
    }
    returns
}

fn describe<N: Debug>(states: &[N]) -> Vec<String> {
    states.iter().map(|state| format!("{state:?}")).collect()
}

type Event<G> = AlgorithmEvent<<G as GraphGenerator>::State, <G as GraphGenerator>::Action, f64>;

struct Core<G: GraphGenerator, R, T, D> {
    generator: G,
    reward: R,
    tree_policy: T,
    default_policy: D,
    config: MctsConfig,
    horizon: usize,
    rng: StdRng,
    arena: NodeArena<G::State, G::Action, f64>,
    tree: HashMap<G::State, NodeId>,
    exhausted: HashMap<G::State, HashSet<usize>>,
    root: Option<NodeId>,
    root_actions: Vec<G::Action>,
    iterations: usize,
    best_score: Option<f64>,
}

impl<G, R, T, D> Core<G, R, T, D>
where
    G: GraphGenerator,
    R: RewardFunction<G::State, G::Action>,
    T: TreePolicy<G::State, G::Action>,
    D: DefaultPolicy<G::State, G::Action>,
{
    fn added(&self, id: NodeId, out: &mut Vec<Event<G>>) {
        let node = &self.arena[id];
        out.push(AlgorithmEvent::NodeAdded {
            node: id,
            parent: node.parent(),
            state: node.state().clone(),
            is_goal: node.is_goal(),
        });
    }

    /// Successor indices of `state` that still lead to unexplored states.
    fn open_choices(&self, state: &G::State, count: usize) -> Vec<usize> {
        match self.exhausted.get(state) {
            Some(closed) if self.config.prune_exhausted => {
                (0..count).filter(|index| !closed.contains(index)).collect()
            }
            _ => (0..count).collect(),
        }
    }

    /// Mark the last transition of a tree-only playout as fully explored.
    fn exhaust_last(&mut self, states: &[G::State], choices: &[usize]) {
        if let (Some(&choice), Some(parent)) = (choices.last(), states.len().checked_sub(2)) {
            trace!(depth = parent, choice, "action exhausted");
            self.exhausted
                .entry(states[parent].clone())
                .or_default()
                .insert(choice);
        }
    }

    /// One playout from `root`, or `None` once every root action is
    /// exhausted.
    fn playout(&mut self, root: NodeId, out: &mut Vec<Event<G>>) -> Result<Option<Rollout<G::State, G::Action>>> {
        let mut state = self.arena[root].state().clone();
        let mut node = Some(root);
        let mut states = vec![state.clone()];
        let mut actions = Vec::new();
        let mut choices = Vec::new();
        let mut rewards = Vec::new();
        let mut tree_steps = 0;
        let mut reached_goal = false;
        let mut terminal = false;

        while actions.len() < self.horizon {
            let successors = self
                .generator
                .successors(&state)
                .map_err(|err| err.at_path(describe(&states)))?;
            if successors.is_empty() {
                terminal = true;
                break;
            }
            let options: Vec<G::Action> = successors.iter().map(|s| s.action.clone()).collect();
            let choice = if node.is_some() {
                let allowed = self.open_choices(&state, options.len());
                if allowed.is_empty() {
                    if actions.is_empty() {
                        return Ok(None);
                    }
                    self.exhaust_last(&states, &choices);
                    break;
                }
                tree_steps += 1;
                self.tree_policy.choose(&state, &options, &allowed, &mut self.rng)?
            } else {
                self.default_policy.choose(&state, &options, &mut self.rng)?
            };
            let Some(successor) = successors.into_iter().nth(choice) else {
                return Err(SearchError::Algorithm {
                    message: format!("policy chose action {choice} of {}", options.len()),
                    path: describe(&states),
                });
            };

            let reward = self
                .reward
                .reward(&state, &successor.action, &successor.state)
                .map_err(|err| err.at_path(describe(&states)))?;
            let is_goal = self.generator.is_goal(&successor.state).map_err(|err| {
                let mut trail = describe(&states);
                trail.push(format!("{:?}", successor.state));
                err.at_path(trail)
            })?;

            if let Some(parent) = node {
                node = match self.tree.get(&successor.state) {
                    Some(&known) => Some(known),
                    None => {
                        let id = self.arena.insert_child(
                            parent,
                            successor.action.clone(),
                            successor.state.clone(),
                            is_goal,
                        );
                        self.tree.insert(successor.state.clone(), id);
                        self.added(id, out);
                        None
                    }
                };
            }

            states.push(successor.state.clone());
            actions.push(successor.action);
            choices.push(choice);
            rewards.push(reward);
            state = successor.state;
            if is_goal {
                reached_goal = true;
                terminal = true;
                break;
            }
        }

        if terminal && node.is_some() && self.config.prune_exhausted {
            self.exhaust_last(&states, &choices);
        }

        let returns = discounted_returns(&rewards, self.config.gamma);
        Ok(Some(Rollout {
            iteration: self.iterations + 1,
            score: returns.first().copied().unwrap_or(0.0),
            states,
            actions,
            choices,
            rewards,
            returns,
            reached_goal,
            tree_steps,
        }))
    }
}

impl<G, R, T, D> Stepper for Core<G, R, T, D>
where
    G: GraphGenerator,
    R: RewardFunction<G::State, G::Action>,
    T: TreePolicy<G::State, G::Action>,
    D: DefaultPolicy<G::State, G::Action>,
{
    type State = G::State;
    type Action = G::Action;
    type Label = f64;

    fn initialize(&mut self, _ctx: &StepContext, out: &mut Vec<Event<G>>) -> Result<Progress> {
        let mut roots = self
            .generator
            .roots()
            .map_err(|err| err.at_path(Vec::new()))?
            .into_iter();
        let Some(state) = roots.next() else {
            warn!("graph generator returned no roots");
            return Ok(Progress::Exhausted);
        };
        if roots.next().is_some() {
            warn!("MCTS plays out from the first root only");
        }

        let trail = vec![format!("{state:?}")];
        let is_goal = self
            .generator
            .is_goal(&state)
            .map_err(|err| err.at_path(trail.clone()))?;
        let id = self.arena.insert_root(state.clone(), is_goal);
        self.tree.insert(state.clone(), id);
        self.root = Some(id);
        self.added(id, out);

        if is_goal {
            let mut path = SearchPath::point(state);
            path.label = Some(0.0);
            out.push(AlgorithmEvent::SolutionCandidateFound(path));
            return Ok(Progress::Exhausted);
        }
        let successors = self
            .generator
            .successors(&state)
            .map_err(|err| err.at_path(trail))?;
        if successors.is_empty() {
            debug!("root has no actions");
            return Ok(Progress::Exhausted);
        }
        self.root_actions = successors.into_iter().map(|s| s.action).collect();
        debug!(actions = self.root_actions.len(), horizon = self.horizon, "root expanded");
        Ok(Progress::Continue)
    }

    fn step(&mut self, _ctx: &StepContext, out: &mut Vec<Event<G>>) -> Result<Progress> {
        let Some(root) = self.root else {
            return Ok(Progress::Exhausted);
        };
        let Some(rollout) = self.playout(root, out)? else {
            info!(iterations = self.iterations, tree = self.arena.len(), "search space exhausted");
            return Ok(Progress::Exhausted);
        };
        self.tree_policy.update_path(&rollout)?;
        self.iterations = rollout.iteration;
        if self.best_score.map_or(true, |best| rollout.score > best) {
            self.best_score = Some(rollout.score);
        }
        debug!(
            iteration = rollout.iteration,
            length = rollout.len(),
            tree_steps = rollout.tree_steps,
            score = rollout.score,
            goal = rollout.reached_goal,
            "rollout"
        );

        let solution = rollout.reached_goal.then(|| rollout.path());
        out.push(AlgorithmEvent::RolloutPerformed(rollout));
        if let Some(path) = solution {
            out.push(AlgorithmEvent::SolutionCandidateFound(path));
        }

        if self.iterations >= self.config.max_iterations {
            info!(iterations = self.iterations, tree = self.arena.len(), "iteration budget spent");
            return Ok(Progress::Exhausted);
        }
        Ok(Progress::Continue)
    }
}

/// Monte Carlo tree search with pluggable tree and default policies.
///
/// One step is one playout. Labels of reported solutions are playout
/// scores, so larger is better.
pub struct Mcts<G, R, T, D = UniformRandomPolicy>
where
    G: GraphGenerator,
{
    execution: Execution<G::State, G::Action, f64>,
    core: Core<G, R, T, D>,
}

impl<G, R, T> Mcts<G, R, T>
where
    G: GraphGenerator,
    R: RewardFunction<G::State, G::Action>,
    T: TreePolicy<G::State, G::Action>,
{
    /// Create a search that plays out uniformly at random outside the tree.
    pub fn new(generator: G, reward: R, tree_policy: T, config: MctsConfig) -> Result<Self> {
        Self::with_default_policy(generator, reward, tree_policy, UniformRandomPolicy, config)
    }
}

impl<G, R, T, D> Mcts<G, R, T, D>
where
    G: GraphGenerator,
    R: RewardFunction<G::State, G::Action>,
    T: TreePolicy<G::State, G::Action>,
    D: DefaultPolicy<G::State, G::Action>,
{
    /// Create a search with a custom default policy.
    pub fn with_default_policy(
        generator: G,
        reward: R,
        tree_policy: T,
        default_policy: D,
        config: MctsConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            execution: Execution::new("mcts"),
            core: Core {
                generator,
                reward,
                tree_policy,
                default_policy,
                horizon: config.horizon(),
                rng: StdRng::seed_from_u64(config.seed),
                config,
                arena: NodeArena::new(),
                tree: HashMap::new(),
                exhausted: HashMap::new(),
                root: None,
                root_actions: Vec::new(),
                iterations: 0,
                best_score: None,
            },
        })
    }

    /// Settings of this run.
    pub fn config(&self) -> &MctsConfig {
        &self.core.config
    }

    /// Playout length bound.
    pub fn horizon(&self) -> usize {
        self.core.horizon
    }

    /// Number of finished playouts.
    pub fn iterations(&self) -> usize {
        self.core.iterations
    }

    /// Best playout score so far.
    pub fn best_score(&self) -> Option<f64> {
        self.core.best_score
    }

    /// Tree nodes created so far.
    pub fn arena(&self) -> &NodeArena<G::State, G::Action, f64> {
        &self.core.arena
    }

    /// The tree policy and its statistics.
    pub fn tree_policy(&self) -> &T {
        &self.core.tree_policy
    }

    /// The root action the tree policy currently recommends.
    pub fn recommended_action(&self) -> Option<G::Action> {
        let root = self.core.root?;
        let state = self.core.arena[root].state();
        let index = self.core.tree_policy.recommend(state, &self.core.root_actions)?;
        self.core.root_actions.get(index).cloned()
    }
}

impl<G, R, T, D> SearchAlgorithm for Mcts<G, R, T, D>
where
    G: GraphGenerator,
    R: RewardFunction<G::State, G::Action>,
    T: TreePolicy<G::State, G::Action>,
    D: DefaultPolicy<G::State, G::Action>,
{
    type State = G::State;
    type Action = G::Action;
    type Label = f64;

    fn id(&self) -> &str {
        self.execution.id()
    }

    fn next_event(&mut self) -> Result<Event<G>> {
        self.execution.advance(&mut self.core)
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
