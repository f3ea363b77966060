//! # Frontier
//!
//! Step-wise state-space search: best-first search with oversearch
//! avoidance, graph sanity checks and Monte Carlo tree search, all driven
//! one event at a time and observable through listeners.
//!
//! This crate re-exports [`frontier_core`] and adds:
//! - **[`EngineConfig`]**: every setting in one JSON-loadable value
//! - **[`Engine`]**: factories building configured algorithms from problem
//!   values
//! - **[`run`] / [`spawn`]**: driving an algorithm on tokio's blocking pool
//!   from async code, with cancellation from the async side
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use frontier::prelude::*;
//!
//! struct Countdown;
//!
//! impl GraphGenerator for Countdown {
//!     type State = u32;
//!     type Action = ();
//!
//!     fn roots(&self) -> frontier::Result<Vec<u32>> {
//!         Ok(vec![10])
//!     }
//!
//!     fn successors(&self, state: &u32) -> frontier::Result<Vec<Successor<u32, ()>>> {
//!         Ok(state.checked_sub(1).map(|next| Successor::new((), next)).into_iter().collect())
//!     }
//!
//!     fn is_goal(&self, state: &u32) -> frontier::Result<bool> {
//!         Ok(*state == 0)
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let engine = Engine::from_file("frontier.json")?;
//!     let search = engine.best_first(GraphSearchProblem {
//!         generator: Countdown,
//!         evaluator: DepthEvaluator,
//!     })?;
//!     let (_, outcome) = frontier::run(search).await?;
//!     println!("{:?}", outcome.first());
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

// Re-export core crate
pub use frontier_core::*;

mod engine;

pub use engine::{
    run, spawn, DynTreePolicy, Engine, EngineBuilder, EngineConfig, GraphSearchProblem,
    OutcomeOf, RewardProblem, RunHandle, TreePolicyConfig,
};

/// Commonly used types.
pub mod prelude {
    pub use crate::engine::{
        Engine, EngineBuilder, EngineConfig, GraphSearchProblem, RewardProblem, RunHandle,
        TreePolicyConfig,
    };
    pub use frontier_core::prelude::*;

    // Re-export useful external types
    pub use anyhow;
    pub use tokio;
    pub use tracing;
}
