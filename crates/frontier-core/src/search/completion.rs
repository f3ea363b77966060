//! Node evaluation by random completion.
//!
//! A node is scored by walking from its state to goals with uniformly
//! random actions and scoring the completed root-to-goal paths. The label
//! is the best completion score and the uncertainty is the spread of all
//! scores, so the evaluator can drive oversearch avoidance. Goal nodes are
//! scored directly and carry no uncertainty.

use super::evaluator::{Evaluation, NodeEvaluator};
use crate::error::{Result, SearchError};
use crate::graph::{GraphGenerator, NodeRef, SearchPath};
use crate::mcts::{DefaultPolicy, UniformRandomPolicy};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use tracing::{debug, trace};

/// Annotation key: number of completions that were scored.
pub const F_SAMPLES: &str = "f_samples";

/// Settings of [`RandomCompletionEvaluator`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RandomCompletionConfig {
    /// Scored completions wanted per node.
    pub samples: usize,
    /// Completions drawn at most per node, scored or not.
    pub max_attempts: usize,
    /// Longest completion walk before it is given up.
    pub max_depth: usize,
    /// Seed of the completion sampler.
    pub seed: u64,
}

impl Default for RandomCompletionConfig {
    fn default() -> Self {
        Self {
            samples: 3,
            max_attempts: 10,
            max_depth: 100,
            seed: 42,
        }
    }
}

impl RandomCompletionConfig {
    /// Set the number of scored completions per node.
    pub fn with_samples(mut self, samples: usize) -> Self {
        self.samples = samples;
        self
    }

    /// Set the attempt bound per node.
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set the completion length bound.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Reject settings no run can use.
    pub fn validate(&self) -> Result<()> {
        if self.samples == 0 {
            return Err(SearchError::InvalidConfig("samples must be positive".into()));
        }
        if self.max_attempts < self.samples {
            return Err(SearchError::InvalidConfig(format!(
                "max_attempts ({}) must be at least samples ({})",
                self.max_attempts, self.samples
            )));
        }
        Ok(())
    }
}

/// Scores nodes by the best of several random completions.
///
/// `scorer` rates a complete root-to-goal path; smaller is better. Scorer
/// errors that only concern one path ([`SearchError::EvaluationFailed`])
/// use up an attempt, other errors end the evaluation. A node none of
/// whose completions reaches a goal is dropped.
pub struct RandomCompletionEvaluator<G, S> {
    generator: G,
    scorer: S,
    config: RandomCompletionConfig,
    rng: Mutex<StdRng>,
}

impl<G, S> RandomCompletionEvaluator<G, S>
where
    G: GraphGenerator,
    S: Fn(&SearchPath<G::State, G::Action, f64>) -> Result<f64>,
{
    /// Create an evaluator drawing completions from `generator`.
    pub fn new(generator: G, scorer: S, config: RandomCompletionConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            generator,
            scorer,
            rng: Mutex::new(StdRng::seed_from_u64(config.seed)),
            config,
        })
    }

    /// Settings of this evaluator.
    pub fn config(&self) -> &RandomCompletionConfig {
        &self.config
    }

    /// Extend `path` with random actions until it ends in a goal.
    ///
    /// Returns `None` on a dead end or when `max_depth` is reached first.
    fn complete(
        &self,
        mut path: SearchPath<G::State, G::Action, f64>,
        rng: &mut StdRng,
    ) -> Result<Option<SearchPath<G::State, G::Action, f64>>> {
        let mut policy = UniformRandomPolicy;
        for _ in 0..self.config.max_depth {
            let Some(head) = path.head() else {
                return Ok(None);
            };
            let mut successors = self.generator.successors(head)?;
            if successors.is_empty() {
                return Ok(None);
            }
            let actions: Vec<&G::Action> = successors.iter().map(|s| &s.action).collect();
            let choice = policy.choose(head, &actions, rng)?;
            let next = successors.swap_remove(choice);
            let is_goal = self.generator.is_goal(&next.state)?;
            path.extend(next.action, next.state);
            if is_goal {
                return Ok(Some(path));
            }
        }
        Ok(None)
    }
}

impl<G, S> NodeEvaluator<G::State, G::Action> for RandomCompletionEvaluator<G, S>
where
    G: GraphGenerator,
    S: Fn(&SearchPath<G::State, G::Action, f64>) -> Result<f64>,
{
    type Label = f64;

    fn evaluate(&self, node: NodeRef<'_, G::State, G::Action, f64>) -> Result<Option<Evaluation<f64>>> {
        let path = node.path();
        if node.is_goal() {
            let score = (self.scorer)(&path)?;
            return Ok(Some(
                Evaluation::new(score)
                    .with_uncertainty(0.0)
                    .with_annotation(F_SAMPLES, 1),
            ));
        }

        let mut rng = self.rng.lock();
        let mut scores = Vec::with_capacity(self.config.samples);
        let mut failures = 0usize;
        let mut attempts = 0usize;
        while scores.len() < self.config.samples && attempts < self.config.max_attempts {
            attempts += 1;
            let Some(completed) = self.complete(path.clone(), &mut rng)? else {
                trace!(node = %node.id(), attempts, "completion ran into a dead end");
                continue;
            };
            match (self.scorer)(&completed) {
                Ok(score) => scores.push(score),
                Err(err) if err.is_controlled() => {
                    trace!(node = %node.id(), error = %err, "completion could not be scored");
                    failures += 1;
                }
                Err(err) => return Err(err),
            }
        }
        drop(rng);

        debug!(node = %node.id(), attempts, scored = scores.len(), failures, "random completions drawn");
        if scores.is_empty() {
            if failures > 0 {
                return Err(SearchError::evaluation(format!(
                    "none of {failures} completions could be scored"
                )));
            }
            return Ok(None);
        }
        let best = scores.iter().copied().fold(f64::INFINITY, f64::min);
        Ok(Some(
            Evaluation::new(best)
                .with_uncertainty(spread(&scores))
                .with_annotation(F_SAMPLES, scores.len()),
        ))
    }

    fn annotates_uncertainty(&self) -> bool {
        true
    }
}

/// Population standard deviation; zero for fewer than two scores.
fn spread(scores: &[f64]) -> f64 {
    if scores.len() < 2 {
        return 0.0;
    }
    let n = scores.len() as f64;
    let mean = scores.iter().sum::<f64>() / n;
    let variance = scores.iter().map(|score| (score - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

impl<G, S> Debug for RandomCompletionEvaluator<G, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RandomCompletionEvaluator")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::algorithm::SearchAlgorithm;
    use crate::graph::{NodeArena, Successor};
    use crate::search::{BestFirst, BestFirstConfig, OversearchMode, TwoPhaseConfig};

    /// Counts from a start value towards 10 in steps of 1 or 2; 10 is the
    /// only goal and anything past it is a dead end.
    struct Counter;

    impl GraphGenerator for Counter {
        type State = u32;
        type Action = u32;

        fn roots(&self) -> Result<Vec<u32>> {
            Ok(vec![0])
        }

        fn successors(&self, state: &u32) -> Result<Vec<Successor<u32, u32>>> {
            Ok(if *state >= 10 {
                Vec::new()
            } else {
                vec![Successor::new(1, state + 1), Successor::new(2, state + 2)]
            })
        }

        fn is_goal(&self, state: &u32) -> Result<bool> {
            Ok(*state == 10)
        }
    }

    fn path_length(path: &SearchPath<u32, u32, f64>) -> Result<f64> {
        Ok(path.len() as f64)
    }

    fn evaluator(
        config: RandomCompletionConfig,
    ) -> RandomCompletionEvaluator<Counter, fn(&SearchPath<u32, u32, f64>) -> Result<f64>> {
        RandomCompletionEvaluator::new(Counter, path_length as fn(&SearchPath<u32, u32, f64>) -> Result<f64>, config)
            .unwrap()
    }

    #[test]
    fn best_completion_becomes_the_label() {
        let evaluator = evaluator(RandomCompletionConfig::default().with_samples(8).with_max_attempts(40));
        let mut arena: NodeArena<u32, u32, f64> = NodeArena::new();
        let root = arena.insert_root(0, false);
        let node = arena.insert_child(root, 2, 8, false);

        let eval = evaluator.evaluate(arena.node_ref(node)).unwrap().unwrap();
        // From 8, a single step of 2 is the shortest completion.
        assert!(eval.value >= 2.0 && eval.value <= 3.0);
        assert!(eval.uncertainty.unwrap() >= 0.0);
        let scored = eval.annotations[F_SAMPLES].as_u64().unwrap();
        assert!(scored >= 1 && scored <= 8);
        assert!(evaluator.annotates_uncertainty());
    }

    #[test]
    fn goal_nodes_are_scored_directly() {
        let evaluator = evaluator(RandomCompletionConfig::default());
        let mut arena: NodeArena<u32, u32, f64> = NodeArena::new();
        let root = arena.insert_root(0, false);
        let mid = arena.insert_child(root, 2, 8, false);
        let goal = arena.insert_child(mid, 2, 10, true);

        let eval = evaluator.evaluate(arena.node_ref(goal)).unwrap().unwrap();
        assert_eq!(eval.value, 2.0);
        assert_eq!(eval.uncertainty, Some(0.0));
    }

    #[test]
    fn dead_ends_drop_the_node() {
        let evaluator = evaluator(RandomCompletionConfig::default());
        let mut arena: NodeArena<u32, u32, f64> = NodeArena::new();
        let root = arena.insert_root(0, false);
        let past = arena.insert_child(root, 2, 11, false);
        assert_eq!(evaluator.evaluate(arena.node_ref(past)).unwrap(), None);
    }

    #[test]
    fn unscorable_completions_fail_the_node() {
        let scorer = |_: &SearchPath<u32, u32, f64>| -> Result<f64> { Err(SearchError::evaluation("no model")) };
        let evaluator = RandomCompletionEvaluator::new(Counter, scorer, RandomCompletionConfig::default()).unwrap();
        let mut arena: NodeArena<u32, u32, f64> = NodeArena::new();
        let root = arena.insert_root(0, false);
        let err = evaluator.evaluate(arena.node_ref(root)).unwrap_err();
        assert!(err.is_controlled());

        let fatal = |_: &SearchPath<u32, u32, f64>| -> Result<f64> { Err(SearchError::generator("gone")) };
        let evaluator = RandomCompletionEvaluator::new(Counter, fatal, RandomCompletionConfig::default()).unwrap();
        assert!(!evaluator.evaluate(arena.node_ref(root)).unwrap_err().is_controlled());
    }

    #[test]
    fn same_seed_same_scores() {
        let run = || {
            let evaluator = evaluator(RandomCompletionConfig::default().with_seed(5));
            let mut arena: NodeArena<u32, u32, f64> = NodeArena::new();
            let root = arena.insert_root(0, false);
            evaluator.evaluate(arena.node_ref(root)).unwrap().unwrap()
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn invalid_config_is_rejected() {
        assert!(RandomCompletionConfig::default().with_samples(0).validate().is_err());
        assert!(RandomCompletionConfig::default()
            .with_samples(5)
            .with_max_attempts(2)
            .validate()
            .is_err());
    }

    #[test]
    fn spread_is_population_deviation() {
        assert_eq!(spread(&[3.0]), 0.0);
        assert_eq!(spread(&[1.0, 3.0]), 1.0);
    }

    #[test]
    fn drives_two_phase_search() {
        let evaluator = evaluator(RandomCompletionConfig::default().with_seed(11));
        let config = BestFirstConfig::default().with_oversearch(OversearchMode::TwoPhase(TwoPhaseConfig::default()));
        let mut search = BestFirst::new(Counter, evaluator, config).unwrap();
        let solution = search.next_solution().unwrap().unwrap();
        assert_eq!(solution.head(), Some(&10));
        assert!(search
            .arena()
            .iter()
            .filter(|node| node.label().is_some())
            .all(|node| node.uncertainty().is_some()));
    }
}
