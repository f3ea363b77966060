//! # Frontier Core
//!
//! Engine for exploring large or implicitly infinite state spaces.
//!
//! This crate provides:
//! - **Graph generators** describing a state graph by roots, successors and
//!   a goal test, plus an index arena of discovered nodes
//! - **A step-wise execution contract**: every algorithm is driven one event
//!   at a time, can be cancelled or timed out from another thread and
//!   reports each event to its listeners
//! - **Best-first search** with duplicate suppression, two-phase and Pareto
//!   oversearch avoidance and a bounded batch mode for coworkers
//! - **Sanity checking** for cycles and dead ends
//! - **Monte Carlo tree search** with UUCB and BRUE tree policies

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod algorithm;
pub mod error;
pub mod graph;
pub mod mcts;
pub mod search;

pub use error::{Result, SearchError};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::algorithm::{
        AlgorithmEvent, Completion, EventCollector, ExecutionConfig, ExecutionControl,
        ExecutionState, Listener, ReducingAlgorithm, Reduction, SearchAlgorithm, SearchOutcome,
    };
    pub use crate::error::{Result, SearchError};
    pub use crate::graph::{GraphGenerator, NodeArena, NodeId, NodeRef, SearchPath, Successor};
    pub use crate::mcts::{
        BrueConfig, BruePolicy, Mcts, MctsConfig, RewardFunction, Rollout, TreePolicy,
        UucbConfig, UucbPolicy,
    };
    pub use crate::search::{
        explore_batch, Anomaly, BatchReport, BestFirst, BestFirstConfig, DepthEvaluator,
        Evaluation, FnEvaluator, NodeEvaluator, OversearchMode, ParentDiscarding,
        RandomCompletionConfig, RandomCompletionEvaluator, SanityCheckConfig, SanityChecker,
        TwoPhaseConfig,
    };
}
