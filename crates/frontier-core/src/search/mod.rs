//! Heuristic graph search.
//!
//! | Component | Purpose |
//! |-----------|---------|
//! | [`BestFirst`] | open-list driven expansion with duplicate suppression |
//! | [`NodeEvaluator`] | f-values, uncertainty and annotations for new nodes |
//! | [`RandomCompletionEvaluator`] | f-values from random completions to goals |
//! | [`OpenList`] | frontier ordering: priority, comparator, Pareto, two-phase |
//! | [`SanityChecker`] | depth-first walk reporting the first cycle or dead end |
//! | [`explore_batch`] | bounded local search from received frontier paths |
//!
//! Oversearch avoidance is selected through [`OversearchMode`] and requires
//! an evaluator that annotates uncertainty; the combination is validated
//! when the search is built.

mod batch;
mod best_first;
mod completion;
mod evaluator;
mod open;
mod oversearch;
mod sanity;

pub use batch::{explore_batch, BatchReport};
pub use best_first::{BestFirst, BestFirstConfig, OversearchMode, ParentDiscarding};
pub use completion::{RandomCompletionConfig, RandomCompletionEvaluator, F_SAMPLES};
pub use evaluator::{
    DepthEvaluator, Evaluation, FnEvaluator, NodeEvaluator, F_ERROR, F_TIME, F_UNCERTAINTY,
};
pub use open::{ComparatorOpen, EntryComparator, OpenEntry, OpenList, ParetoOpen, PriorityOpen, TieBreak};
pub use oversearch::{
    DiscreteDistance, FixedPhaseLengths, Phase, PhaseLengthAdjuster, PhaseLengths,
    SolutionDistance, TwoPhaseConfig, TwoPhaseOpen, WallClockPhaseLengths,
};
pub use sanity::{
    Anomaly, CycleDetectedResult, DeadEndDetectedResult, SanityCheckConfig, SanityChecker,
};
