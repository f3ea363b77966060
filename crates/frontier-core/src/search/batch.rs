//! Coworker batch exploration.
//!
//! A coworker receives frontier paths, searches locally for a wall-clock
//! budget and reports what it can still reach plus the solutions it found.
//! Nothing is shared between coworkers; each call builds its own search.

use super::best_first::{BestFirst, BestFirstConfig};
use super::evaluator::NodeEvaluator;
use crate::algorithm::{Completion, SearchAlgorithm};
use crate::error::{Result, SearchError};
use crate::graph::{GraphGenerator, SearchPath};
use std::time::Duration;
use tracing::info;

/// Result of one batch.
#[derive(Debug, Clone)]
pub struct BatchReport<N, A, V> {
    /// Root-to-node paths still waiting for expansion.
    pub frontier: Vec<SearchPath<N, A, V>>,
    /// Solution candidates found during the batch.
    pub solutions: Vec<SearchPath<N, A, V>>,
    /// Number of expansions performed.
    pub expansions: usize,
    /// How the batch ended.
    pub completion: Completion,
}

impl<N, A, V> BatchReport<N, A, V> {
    /// Whether the batch exhausted its part of the graph.
    pub fn is_exhausted(&self) -> bool {
        self.completion == Completion::Finished && self.frontier.is_empty()
    }
}

/// Explore from `frontier` for at most `budget`.
///
/// An empty `frontier` yields an empty report without searching.
pub fn explore_batch<G, E>(
    generator: G,
    evaluator: E,
    config: BestFirstConfig,
    frontier: Vec<SearchPath<G::State, G::Action, E::Label>>,
    budget: Duration,
) -> Result<BatchReport<G::State, G::Action, E::Label>>
where
    G: GraphGenerator,
    G::State: Send + 'static,
    E: NodeEvaluator<G::State, G::Action>,
    E::Label: Send + 'static,
{
    if frontier.is_empty() {
        return Ok(BatchReport {
            frontier: Vec::new(),
            solutions: Vec::new(),
            expansions: 0,
            completion: Completion::Finished,
        });
    }
    if budget.is_zero() {
        return Err(SearchError::InvalidConfig("batch budget must be positive".into()));
    }

    let received = frontier.len();
    let mut search = BestFirst::new(generator, evaluator, config)?.with_bootstrap(frontier)?;
    search.set_timeout(budget);
    let outcome = search.call()?;
    let report = BatchReport {
        frontier: search.frontier(),
        solutions: outcome.solutions,
        expansions: search.expansions(),
        completion: outcome.completion,
    };
    info!(
        id = search.id(),
        received,
        returned = report.frontier.len(),
        solutions = report.solutions.len(),
        expansions = report.expansions,
        completion = ?report.completion,
        "batch done"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Successor;
    use crate::search::evaluator::DepthEvaluator;

    /// Unbounded counter: every number has successors n+1 and n+2.
    struct Counter {
        goal: u64,
    }

    impl GraphGenerator for Counter {
        type State = u64;
        type Action = u8;

        fn roots(&self) -> Result<Vec<u64>> {
            Ok(vec![0])
        }

        fn successors(&self, state: &u64) -> Result<Vec<Successor<u64, u8>>> {
            Ok(vec![Successor::new(1, state + 1), Successor::new(2, state + 2)])
        }

        fn is_goal(&self, state: &u64) -> Result<bool> {
            Ok(*state == self.goal)
        }
    }

    fn seed(states: &[u64]) -> SearchPath<u64, u8, f64> {
        let mut path = SearchPath::point(states[0]);
        for pair in states.windows(2) {
            path.extend((pair[1] - pair[0]) as u8, pair[1]);
        }
        path
    }

    #[test]
    fn empty_frontier_is_trivially_done() {
        let report = explore_batch(
            Counter { goal: 3 },
            DepthEvaluator,
            BestFirstConfig::default(),
            Vec::new(),
            Duration::from_millis(10),
        )
        .unwrap();
        assert!(report.is_exhausted());
        assert_eq!(report.expansions, 0);
    }

    #[test]
    fn solutions_extend_received_paths() {
        let config = BestFirstConfig::default().with_max_solutions(1);
        let report = explore_batch(
            Counter { goal: 4 },
            DepthEvaluator,
            config,
            vec![seed(&[0, 2])],
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(report.completion, Completion::Finished);
        let solution = &report.solutions[0];
        assert_eq!(solution.root(), Some(&0));
        assert_eq!(solution.states[1], 2);
        assert_eq!(solution.head(), Some(&4));
        // The remaining open nodes are handed back.
        assert!(!report.frontier.is_empty());
        assert!(report.frontier.iter().all(|path| path.root() == Some(&0)));
    }

    #[test]
    fn budget_bounds_an_infinite_graph() {
        let report = explore_batch(
            Counter { goal: u64::MAX },
            DepthEvaluator,
            BestFirstConfig::default(),
            vec![seed(&[0])],
            Duration::from_millis(20),
        )
        .unwrap();
        assert_eq!(report.completion, Completion::TimedOut);
        assert!(report.solutions.is_empty());
        assert!(!report.frontier.is_empty());
    }

    #[test]
    fn zero_budget_is_rejected() {
        let result = explore_batch(
            Counter { goal: 1 },
            DepthEvaluator,
            BestFirstConfig::default(),
            vec![seed(&[0])],
            Duration::ZERO,
        );
        assert!(matches!(result, Err(SearchError::InvalidConfig(_))));
    }
}
