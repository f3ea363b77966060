//! Configuration-driven construction and async driving of searches.

use anyhow::{Context, Result};
use frontier_core::algorithm::{ExecutionConfig, ExecutionControl, SearchAlgorithm, SearchOutcome};
use frontier_core::graph::GraphGenerator;
use frontier_core::mcts::{
    BrueConfig, BruePolicy, Mcts, MctsConfig, RewardFunction, TreePolicy, UucbConfig, UucbPolicy,
};
use frontier_core::search::{BestFirst, BestFirstConfig, NodeEvaluator, SanityCheckConfig, SanityChecker};
use serde::{Deserialize, Serialize};
use std::hash::Hash;
use std::path::Path;
use tokio::task::JoinHandle;
use tracing::info;

/// Tree policy selectable from configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "policy")]
pub enum TreePolicyConfig {
    /// Utility-based UCB.
    Uucb(UucbConfig),
    /// Simple-regret BRUE.
    Brue(BrueConfig),
}

impl Default for TreePolicyConfig {
    fn default() -> Self {
        Self::Uucb(UucbConfig::default())
    }
}

/// Every knob of the engine in one value, loadable from JSON.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Timeout applied to every algorithm built by the engine.
    pub execution: ExecutionConfig,
    /// Best-first settings.
    pub best_first: BestFirstConfig,
    /// Sanity-check settings.
    pub sanity: SanityCheckConfig,
    /// MCTS settings.
    pub mcts: MctsConfig,
    /// MCTS tree policy.
    pub tree_policy: TreePolicyConfig,
}

impl EngineConfig {
    /// Parse a JSON document.
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("invalid engine configuration")
    }

    /// Load a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        Self::from_json(&text).with_context(|| format!("parsing {}", path.display()))
    }

    /// Serialize as pretty JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// A graph plus the evaluator that scores its nodes.
#[derive(Debug, Clone)]
pub struct GraphSearchProblem<G, E> {
    /// The graph.
    pub generator: G,
    /// Node evaluator.
    pub evaluator: E,
}

/// A graph plus the reward of its transitions.
#[derive(Debug, Clone)]
pub struct RewardProblem<G, R> {
    /// The graph.
    pub generator: G,
    /// Transition reward.
    pub reward: R,
}

/// Tree policy chosen at runtime.
pub type DynTreePolicy<N, A> = Box<dyn TreePolicy<N, A> + Send>;

/// Builder for creating an [`Engine`].
#[derive(Debug, Default)]
pub struct EngineBuilder {
    config: EngineConfig,
}

impl EngineBuilder {
    /// Start from the defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole configuration.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the timeout of every algorithm.
    pub fn timeout(mut self, timeout: std::time::Duration) -> Self {
        self.config.execution = ExecutionConfig::with_timeout(timeout);
        self
    }

    /// Set the best-first settings.
    pub fn best_first(mut self, config: BestFirstConfig) -> Self {
        self.config.best_first = config;
        self
    }

    /// Set the sanity-check settings.
    pub fn sanity(mut self, config: SanityCheckConfig) -> Self {
        self.config.sanity = config;
        self
    }

    /// Set the MCTS settings.
    pub fn mcts(mut self, config: MctsConfig) -> Self {
        self.config.mcts = config;
        self
    }

    /// Set the MCTS tree policy.
    pub fn tree_policy(mut self, policy: TreePolicyConfig) -> Self {
        self.config.tree_policy = policy;
        self
    }

    /// Validate and build.
    pub fn build(self) -> Result<Engine> {
        self.config.mcts.validate().context("invalid MCTS settings")?;
        Ok(Engine {
            config: self.config,
        })
    }
}

/// Factory for configured search algorithms.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EngineConfig,
}

impl Engine {
    /// Create a new engine builder.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::new()
    }

    /// Engine with the settings of a JSON file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        EngineBuilder::new().config(EngineConfig::from_file(path)?).build()
    }

    /// Get engine configuration.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Best-first search over `problem`.
    pub fn best_first<G, E>(&self, problem: GraphSearchProblem<G, E>) -> Result<BestFirst<G, E>>
    where
        G: GraphGenerator,
        G::State: Send + 'static,
        E: NodeEvaluator<G::State, G::Action>,
        E::Label: Send + 'static,
    {
        let search = BestFirst::new(
            problem.generator,
            problem.evaluator,
            self.config.best_first.clone(),
        )?;
        self.config.execution.apply(search.control());
        Ok(search)
    }

    /// Cycle and dead-end check of `generator`.
    pub fn sanity_checker<G: GraphGenerator>(&self, generator: G) -> Result<SanityChecker<G>> {
        let checker = SanityChecker::new(generator, self.config.sanity.clone())?;
        self.config.execution.apply(checker.control());
        Ok(checker)
    }

    /// A fresh tree policy as configured.
    pub fn tree_policy<N, A>(&self) -> Result<DynTreePolicy<N, A>>
    where
        N: Clone + Eq + Hash + Send + 'static,
        A: 'static,
    {
        let policy: DynTreePolicy<N, A> = match &self.config.tree_policy {
            TreePolicyConfig::Uucb(config) => Box::new(UucbPolicy::new(config.clone())?),
            TreePolicyConfig::Brue(config) => Box::new(BruePolicy::new(config.clone())?),
        };
        Ok(policy)
    }

    /// MCTS over `problem` with the configured tree policy.
    #[allow(clippy::type_complexity)]
    pub fn mcts<G, R>(
        &self,
        problem: RewardProblem<G, R>,
    ) -> Result<Mcts<G, R, DynTreePolicy<G::State, G::Action>>>
    where
        G: GraphGenerator,
        G::State: Send + 'static,
        G::Action: 'static,
        R: RewardFunction<G::State, G::Action>,
    {
        let policy = self.tree_policy()?;
        let search = Mcts::new(problem.generator, problem.reward, policy, self.config.mcts.clone())?;
        self.config.execution.apply(search.control());
        Ok(search)
    }
}

/// Outcome type of an algorithm.
pub type OutcomeOf<S> = SearchOutcome<
    <S as SearchAlgorithm>::State,
    <S as SearchAlgorithm>::Action,
    <S as SearchAlgorithm>::Label,
>;

/// A run on tokio's blocking pool.
pub struct RunHandle<S: SearchAlgorithm> {
    control: ExecutionControl,
    join: JoinHandle<(S, frontier_core::Result<OutcomeOf<S>>)>,
}

impl<S> RunHandle<S>
where
    S: SearchAlgorithm + Send + 'static,
{
    /// Control handle of the running algorithm.
    pub fn control(&self) -> &ExecutionControl {
        &self.control
    }

    /// Ask the run to stop at its next step.
    pub fn cancel(&self) {
        self.control.cancel();
    }

    /// Wait for the run and take back the algorithm with its outcome.
    pub async fn join(self) -> Result<(S, OutcomeOf<S>)> {
        let (algorithm, outcome) = self.join.await.context("search task panicked")?;
        let outcome = outcome?;
        Ok((algorithm, outcome))
    }
}

/// Run `algorithm` to completion on the blocking pool.
///
/// Must be called from within a tokio runtime.
pub fn spawn<S>(mut algorithm: S) -> RunHandle<S>
where
    S: SearchAlgorithm + Send + 'static,
    S::State: Send + 'static,
    S::Action: Send + 'static,
    S::Label: Send + 'static,
{
    let control = algorithm.control().clone();
    let join = tokio::task::spawn_blocking(move || {
        info!(algorithm = algorithm.id(), "run started");
        let outcome = algorithm.call();
        (algorithm, outcome)
    });
    RunHandle { control, join }
}

/// Run `algorithm` to completion without blocking the async runtime.
pub async fn run<S>(algorithm: S) -> Result<(S, OutcomeOf<S>)>
where
    S: SearchAlgorithm + Send + 'static,
    S::State: Send + 'static,
    S::Action: Send + 'static,
    S::Label: Send + 'static,
{
    spawn(algorithm).join().await
}
