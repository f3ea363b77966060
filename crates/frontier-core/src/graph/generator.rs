//! Graph generator contract.

use crate::error::Result;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

/// One outgoing edge of a state: the action taken and the state reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Successor<N, A> {
    /// Action labelling the edge.
    pub action: A,
    /// State reached by the action.
    pub state: N,
}

impl<N, A> Successor<N, A> {
    /// Create a successor description.
    pub fn new(action: A, state: N) -> Self {
        Self { action, state }
    }
}

/// Client-supplied description of an implicit state graph.
///
/// `successors` must be a pure function of the state: the engine may ask
/// for the successors of the same state more than once (MCTS rollouts,
/// sanity checks) and expects the same answer.
pub trait GraphGenerator {
    /// State type. Equality and hashing drive duplicate detection.
    type State: Clone + Eq + Hash + Debug;
    /// Action (edge label) type.
    type Action: Clone + Debug;

    /// The root states of the graph. At least one is expected.
    fn roots(&self) -> Result<Vec<Self::State>>;

    /// All outgoing edges of `state`.
    fn successors(&self, state: &Self::State) -> Result<Vec<Successor<Self::State, Self::Action>>>;

    /// Whether `state` is a goal. Evaluated once per created node.
    fn is_goal(&self, state: &Self::State) -> Result<bool>;

    /// Whether a state fully encodes its context. When `false` the caller
    /// threads additional context through the path itself.
    fn is_self_contained(&self) -> bool {
        true
    }
}

impl<G: GraphGenerator + ?Sized> GraphGenerator for &G {
    type State = G::State;
    type Action = G::Action;

    fn roots(&self) -> Result<Vec<Self::State>> {
        (**self).roots()
    }

    fn successors(&self, state: &Self::State) -> Result<Vec<Successor<Self::State, Self::Action>>> {
        (**self).successors(state)
    }

    fn is_goal(&self, state: &Self::State) -> Result<bool> {
        (**self).is_goal(state)
    }

    fn is_self_contained(&self) -> bool {
        (**self).is_self_contained()
    }
}

impl<G: GraphGenerator + ?Sized> GraphGenerator for Arc<G> {
    type State = G::State;
    type Action = G::Action;

    fn roots(&self) -> Result<Vec<Self::State>> {
        (**self).roots()
    }

    fn successors(&self, state: &Self::State) -> Result<Vec<Successor<Self::State, Self::Action>>> {
        (**self).successors(state)
    }

    fn is_goal(&self, state: &Self::State) -> Result<bool> {
        (**self).is_goal(state)
    }

    fn is_self_contained(&self) -> bool {
        (**self).is_self_contained()
    }
}
