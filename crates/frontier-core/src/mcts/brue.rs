//! BRUE: a tree policy for simple regret.
//!
//! Selection is greedy on the running mean `Q̂` of every (state, action)
//! pair. Learning credits exactly one position of each rollout, chosen by
//! the switching-point schedule `σ(n) = H − ((n − 1) mod H)`: the pair at
//! step `σ(n)` gets the discounted return observed from there on. Rollouts
//! shorter than `σ(n)` teach nothing.
//!
//! An action without an estimate in a state has never been credited there.
//! Such actions are chosen first, uniformly at random among themselves, so
//! the greedy rule only ever compares actions that all have a mean.

use super::driver::Rollout;
use super::policy::{argmax, pick, TreePolicy};
use crate::error::{Result, SearchError};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;
use tracing::trace;

/// Settings of [`BruePolicy`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrueConfig {
    /// Time horizon H of the switching-point schedule.
    pub horizon: usize,
}

impl Default for BrueConfig {
    fn default() -> Self {
        Self { horizon: 10 }
    }
}

impl BrueConfig {
    /// Set the horizon.
    pub fn with_horizon(mut self, horizon: usize) -> Self {
        self.horizon = horizon;
        self
    }
}

/// Step (1-based) credited in the `n`-th rollout (1-based) for horizon `h`.
pub fn switching_point(n: u64, h: usize) -> usize {
    let h = h.max(1) as u64;
    (h - (n.saturating_sub(1) % h)) as usize
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct Estimate {
    mean: f64,
    count: u64,
}

/// Greedy tree policy with single-position credit assignment.
pub struct BruePolicy<N> {
    horizon: usize,
    estimates: HashMap<N, HashMap<usize, Estimate>>,
    iterations: u64,
}

impl<N: Eq + Hash> BruePolicy<N> {
    /// Create a policy from configuration.
    pub fn new(config: BrueConfig) -> Result<Self> {
        if config.horizon == 0 {
            return Err(SearchError::InvalidConfig("BRUE horizon must be positive".into()));
        }
        Ok(Self {
            horizon: config.horizon,
            estimates: HashMap::new(),
            iterations: 0,
        })
    }

    /// `(Q̂, visits)` of `action` in `state`.
    pub fn estimate(&self, state: &N, action: usize) -> Option<(f64, u64)> {
        self.estimates
            .get(state)
            .and_then(|actions| actions.get(&action))
            .map(|estimate| (estimate.mean, estimate.count))
    }

    /// Number of rollouts learned from.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Time horizon H.
    pub fn horizon(&self) -> usize {
        self.horizon
    }
}

impl<N, A> TreePolicy<N, A> for BruePolicy<N>
where
    N: Clone + Eq + Hash,
{
    fn choose(&mut self, state: &N, _actions: &[A], allowed: &[usize], rng: &mut StdRng) -> Result<usize> {
        let known = self.estimates.get(state);
        let mut unvisited = Vec::new();
        let mut means = Vec::new();
        for &index in allowed {
            match known.and_then(|actions| actions.get(&index)) {
                Some(estimate) => means.push((index, estimate.mean)),
                None => unvisited.push(index),
            }
        }
        if !unvisited.is_empty() {
            return Ok(pick(&unvisited, rng));
        }
        argmax(&means, rng).ok_or_else(|| SearchError::InvalidState("no action to choose from".into()))
    }

    fn update_path(&mut self, rollout: &Rollout<N, A>) -> Result<()> {
        self.iterations += 1;
        let step = switching_point(self.iterations, self.horizon);
        let position = step - 1;
        let Some(&choice) = rollout.choices.get(position) else {
            trace!(iteration = self.iterations, step, "switching point beyond rollout");
            return Ok(());
        };
        let value = rollout.returns[position];
        let estimate = self
            .estimates
            .entry(rollout.states[position].clone())
            .or_default()
            .entry(choice)
            .or_default();
        estimate.count += 1;
        estimate.mean += (value - estimate.mean) / estimate.count as f64;
        Ok(())
    }

    fn recommend(&self, state: &N, actions: &[A]) -> Option<usize> {
        let known = self.estimates.get(state)?;
        (0..actions.len())
            .filter_map(|index| known.get(&index).map(|estimate| (index, estimate.mean)))
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then(b.0.cmp(&a.0)))
            .map(|(index, _)| index)
    }
}
