//! Monte Carlo tree search over a graph generator.
//!
//! Each iteration descends from the root with a [`TreePolicy`] while the
//! visited states are known to the tree, adds the first unknown state to the
//! tree, continues with a [`DefaultPolicy`] until a goal, a dead end or the
//! depth bound, and hands the finished [`Rollout`] back to the tree policy.
//!
//! | Policy | Statistics per (state, action) | Selection |
//! |--------|--------------------------------|-----------|
//! | [`UucbPolicy`] | sorted observed returns | `utility + Φ⁻¹(α·ln t / n)` |
//! | [`BruePolicy`] | running mean and count | best mean; one credited position per rollout |
//! | [`UniformRandomPolicy`] | none | uniform |
//!
//! Actions are identified by their index in the successor list of a state,
//! which is stable because successor generation is a pure function.
//!
//! With [`MctsConfig::prune_exhausted`] set, an action is taken out of the
//! tree policy's choice once everything below it has been played out
//! inside the tree: a playout that ends in a goal or dead end without
//! leaving the tree closes its last action, and a state whose actions are
//! all closed closes the action leading to it. The run finishes early once
//! the root has no open action left.

mod brue;
mod driver;
mod policy;
mod uucb;

pub use brue::{switching_point, BrueConfig, BruePolicy};
pub use driver::{Mcts, Rollout};
pub use policy::{DefaultPolicy, RewardFunction, TreePolicy, UniformRandomPolicy};
pub use uucb::{phi_inverse, CvarUtility, MeanUtility, UtilityFunction, UtilityKind, UtilityShape, UucbConfig, UucbPolicy};

use crate::error::{Result, SearchError};
use serde::{Deserialize, Serialize};

/// Settings of an MCTS run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MctsConfig {
    /// Number of playouts.
    pub max_iterations: usize,
    /// Discount factor in (0, 1].
    pub gamma: f64,
    /// Remaining discount mass below which a playout stops, for gamma < 1.
    pub epsilon: f64,
    /// Hard bound on the playout length.
    pub max_depth: usize,
    /// Seed of the random source shared by both policies.
    pub seed: u64,
    /// Stop choosing actions whose subtree is fully explored.
    pub prune_exhausted: bool,
}

impl Default for MctsConfig {
    fn default() -> Self {
        Self {
            max_iterations: 1000,
            gamma: 1.0,
            epsilon: 0.001,
            max_depth: 50,
            seed: 42,
            prune_exhausted: false,
        }
    }
}

impl MctsConfig {
    /// Set the number of playouts.
    pub fn with_max_iterations(mut self, iterations: usize) -> Self {
        self.max_iterations = iterations;
        self
    }

    /// Set the discount factor.
    pub fn with_gamma(mut self, gamma: f64) -> Self {
        self.gamma = gamma;
        self
    }

    /// Set the discount mass threshold.
    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    /// Set the playout length bound.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = depth;
        self
    }

    /// Set the random seed.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }

    /// Enable or disable pruning of exhausted subtrees.
    pub fn with_prune_exhausted(mut self, prune: bool) -> Self {
        self.prune_exhausted = prune;
        self
    }

    /// Reject settings no run can use.
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(SearchError::InvalidConfig("max_iterations must be positive".into()));
        }
        if self.max_depth == 0 {
            return Err(SearchError::InvalidConfig("max_depth must be positive".into()));
        }
        if !(self.gamma > 0.0 && self.gamma <= 1.0) {
            return Err(SearchError::InvalidConfig(format!(
                "gamma must lie in (0, 1], got {}",
                self.gamma
            )));
        }
        if self.gamma < 1.0 && !(self.epsilon > 0.0 && self.epsilon < 1.0) {
            return Err(SearchError::InvalidConfig(format!(
                "epsilon must lie in (0, 1), got {}",
                self.epsilon
            )));
        }
        Ok(())
    }

    /// Playout length bound implied by these settings.
    pub fn horizon(&self) -> usize {
        horizon(self.gamma, self.epsilon, self.max_depth)
    }
}

/// Number of steps after which the discount `gamma^k` drops below
/// `epsilon`, capped by `max_depth`.
///
/// Undiscounted runs (`gamma >= 1`) are bounded by `max_depth` alone.
pub fn horizon(gamma: f64, epsilon: f64, max_depth: usize) -> usize {
    if gamma >= 1.0 || gamma <= 0.0 || epsilon <= 0.0 || epsilon >= 1.0 {
        return max_depth;
    }
    let steps = (epsilon.ln() / gamma.ln()).ceil();
    if steps >= max_depth as f64 {
        max_depth
    } else {
        (steps as usize).max(1)
    }
}
