//! Utility-based upper confidence bounds.
//!
//! Every (state, action) pair keeps the sorted list of returns observed
//! after taking the action. An action's score is its utility plus the
//! confidence term `Φ⁻¹(α·ln t / n)`, where `t` counts finished rollouts and
//! `n` the observations of the pair:
//!
//! ```text
//! Φ⁻¹(x) = max(2b·sqrt(x/a), 2b·(x/a)^(q/2))
//! ```
//!
//! The shape `(a, b, q)` comes from the utility function. Actions without
//! observations are tried first, uniformly at random.

use super::driver::Rollout;
use super::policy::{argmax, pick, TreePolicy};
use crate::error::{Result, SearchError};
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::hash::Hash;

/// Concentration shape of a utility function.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UtilityShape {
    /// Scale of the sample count.
    pub a: f64,
    /// Scale of the bound.
    pub b: f64,
    /// Tail exponent.
    pub q: f64,
}

/// `Φ⁻¹` of the given shape. Non-positive inputs map to 0.
pub fn phi_inverse(x: f64, shape: UtilityShape) -> f64 {
    if x.is_nan() || x <= 0.0 {
        return 0.0;
    }
    let ratio = x / shape.a;
    let sub_gaussian = 2.0 * shape.b * ratio.sqrt();
    let heavy_tail = 2.0 * shape.b * ratio.powf(shape.q / 2.0);
    sub_gaussian.max(heavy_tail)
}

/// Utility of a sample of returns.
pub trait UtilityFunction {
    /// Utility of `sorted`, which is non-empty and ascending.
    fn utility(&self, sorted: &[f64]) -> f64;

    /// Parameters of the confidence term.
    fn shape(&self) -> UtilityShape;
}

/// Sample mean.
#[derive(Debug, Clone, Copy, Default)]
pub struct MeanUtility;

impl UtilityFunction for MeanUtility {
    fn utility(&self, sorted: &[f64]) -> f64 {
        sorted.iter().sum::<f64>() / sorted.len() as f64
    }

    fn shape(&self) -> UtilityShape {
        UtilityShape {
            a: 1.0,
            b: 1.0,
            q: 2.0,
        }
    }
}

/// Conditional value at risk: mean of the worst `level` fraction of the
/// returns.
#[derive(Debug, Clone, Copy)]
pub struct CvarUtility {
    level: f64,
}

impl CvarUtility {
    /// Create a CVaR utility; `level` is clamped to (0, 1].
    pub fn new(level: f64) -> Self {
        Self {
            level: level.clamp(f64::MIN_POSITIVE, 1.0),
        }
    }
}

impl UtilityFunction for CvarUtility {
    fn utility(&self, sorted: &[f64]) -> f64 {
        let tail = ((self.level * sorted.len() as f64).ceil() as usize).clamp(1, sorted.len());
        sorted[..tail].iter().sum::<f64>() / tail as f64
    }

    fn shape(&self) -> UtilityShape {
        UtilityShape {
            a: self.level,
            b: 1.0,
            q: 2.0,
        }
    }
}

/// Utility selectable from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum UtilityKind {
    /// [`MeanUtility`].
    #[default]
    Mean,
    /// [`CvarUtility`] at the given level.
    Cvar {
        /// Fraction of worst returns averaged.
        level: f64,
    },
}

impl UtilityFunction for UtilityKind {
    fn utility(&self, sorted: &[f64]) -> f64 {
        match *self {
            Self::Mean => MeanUtility.utility(sorted),
            Self::Cvar { level } => CvarUtility::new(level).utility(sorted),
        }
    }

    fn shape(&self) -> UtilityShape {
        match *self {
            Self::Mean => MeanUtility.shape(),
            Self::Cvar { level } => CvarUtility::new(level).shape(),
        }
    }
}

/// Settings of [`UucbPolicy`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UucbConfig {
    /// Exploration weight α.
    pub alpha: f64,
    /// Utility of the observed returns.
    pub utility: UtilityKind,
}

impl Default for UucbConfig {
    fn default() -> Self {
        Self {
            alpha: 2.0,
            utility: UtilityKind::Mean,
        }
    }
}

impl UucbConfig {
    /// Set α.
    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Set the utility.
    pub fn with_utility(mut self, utility: UtilityKind) -> Self {
        self.utility = utility;
        self
    }
}

/// Tree policy scoring actions by utility plus a confidence term.
pub struct UucbPolicy<N, U = UtilityKind> {
    alpha: f64,
    utility: U,
    returns: HashMap<N, HashMap<usize, Vec<f64>>>,
    iterations: u64,
}

impl<N: Eq + Hash> UucbPolicy<N> {
    /// Create a policy from configuration.
    pub fn new(config: UucbConfig) -> Result<Self> {
        Self::with_utility(config.alpha, config.utility)
    }
}

impl<N: Eq + Hash, U: UtilityFunction> UucbPolicy<N, U> {
    /// Create a policy with a custom utility function.
    pub fn with_utility(alpha: f64, utility: U) -> Result<Self> {
        if alpha.is_nan() || alpha < 0.0 {
            return Err(SearchError::InvalidConfig(format!("alpha must be non-negative, got {alpha}")));
        }
        Ok(Self {
            alpha,
            utility,
            returns: HashMap::new(),
            iterations: 0,
        })
    }

    /// Returns observed for `action` in `state`, ascending.
    pub fn observations(&self, state: &N, action: usize) -> Option<&[f64]> {
        self.returns
            .get(state)
            .and_then(|actions| actions.get(&action))
            .map(Vec::as_slice)
    }

    /// Number of rollouts learned from.
    pub fn iterations(&self) -> u64 {
        self.iterations
    }

    /// Score of an action with `sorted` observations.
    pub fn score(&self, sorted: &[f64]) -> f64 {
        let t = self.iterations.max(1) as f64;
        let x = self.alpha * t.ln() / sorted.len() as f64;
        self.utility.utility(sorted) + phi_inverse(x, self.utility.shape())
    }
}

impl<N, A, U> TreePolicy<N, A> for UucbPolicy<N, U>
where
    N: Clone + Eq + Hash,
    U: UtilityFunction,
{
    fn choose(&mut self, state: &N, _actions: &[A], allowed: &[usize], rng: &mut StdRng) -> Result<usize> {
        let mut unvisited = Vec::new();
        let mut scores = Vec::new();
        for &index in allowed {
            match self.observations(state, index) {
                Some(sorted) if !sorted.is_empty() => scores.push((index, self.score(sorted))),
                _ => unvisited.push(index),
            }
        }
        if !unvisited.is_empty() {
            return Ok(pick(&unvisited, rng));
        }
        argmax(&scores, rng).ok_or_else(|| SearchError::InvalidState("no action to choose from".into()))
    }

    fn update_path(&mut self, rollout: &Rollout<N, A>) -> Result<()> {
        for (position, &choice) in rollout.choices.iter().enumerate() {
            let value = rollout.returns[position];
            let sorted = self
                .returns
                .entry(rollout.states[position].clone())
                .or_default()
                .entry(choice)
                .or_default();
            let at = sorted.partition_point(|&seen| seen < value);
            sorted.insert(at, value);
        }
        self.iterations += 1;
        Ok(())
    }

    fn recommend(&self, state: &N, actions: &[A]) -> Option<usize> {
        (0..actions.len())
            .filter_map(|index| {
                self.observations(state, index)
                    .filter(|sorted| !sorted.is_empty())
                    .map(|sorted| (index, self.utility.utility(sorted)))
            })
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal).then(b.0.cmp(&a.0)))
            .map(|(index, _)| index)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn rollout(choice: usize, value: f64) -> Rollout<u8, char> {
        Rollout {
            iteration: 0,
            states: vec![0, 1],
            actions: vec!['x'],
            choices: vec![choice],
            rewards: vec![value],
            returns: vec![value],
            score: value,
            reached_goal: false,
            tree_steps: 1,
        }
    }

    #[test]
    fn phi_inverse_takes_larger_branch() {
        let shape = MeanUtility.shape();
        assert_eq!(phi_inverse(0.25, shape), 1.0);
        assert_eq!(phi_inverse(4.0, shape), 8.0);
        assert_eq!(phi_inverse(0.0, shape), 0.0);
    }

    #[test]
    fn cvar_averages_the_worst_tail() {
        let cvar = CvarUtility::new(0.5);
        assert_eq!(cvar.utility(&[1.0, 2.0, 3.0, 4.0]), 1.5);
        assert_eq!(cvar.utility(&[7.0]), 7.0);
        assert_eq!(MeanUtility.utility(&[1.0, 2.0, 3.0, 4.0]), 2.5);
    }

    #[test]
    fn uniform_without_observations() {
        let mut policy: UucbPolicy<u8> = UucbPolicy::new(UucbConfig::default()).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let mut counts = [0usize; 4];
        for _ in 0..400 {
            counts[policy.choose(&0, &['a', 'b', 'c', 'd'], &[0, 1, 2, 3], &mut rng).unwrap()] += 1;
        }
        assert!(counts.iter().all(|&count| count > 60), "{counts:?}");
    }

    #[test]
    fn prefers_higher_score_once_observed() {
        let mut policy: UucbPolicy<u8> = UucbPolicy::new(UucbConfig::default()).unwrap();
        for _ in 0..20 {
            policy.update_path(&rollout(0, 0.1)).unwrap();
            policy.update_path(&rollout(1, 0.9)).unwrap();
        }
        let mut rng = StdRng::seed_from_u64(5);
        for _ in 0..10 {
            assert_eq!(policy.choose(&0, &['a', 'b'], &[0, 1], &mut rng).unwrap(), 1);
        }
        assert_eq!(TreePolicy::<u8, char>::recommend(&policy, &0, &['a', 'b']), Some(1));
    }

    #[test]
    fn untried_actions_come_first() {
        let mut policy: UucbPolicy<u8> = UucbPolicy::new(UucbConfig::default()).unwrap();
        policy.update_path(&rollout(0, 5.0)).unwrap();
        let mut rng = StdRng::seed_from_u64(2);
        assert_eq!(policy.choose(&0, &['a', 'b'], &[0, 1], &mut rng).unwrap(), 1);
    }

    #[test]
    fn observations_stay_sorted() {
        let mut policy: UucbPolicy<u8> = UucbPolicy::new(UucbConfig::default()).unwrap();
        for value in [0.5, 0.1, 0.9, 0.3] {
            policy.update_path(&rollout(0, value)).unwrap();
        }
        assert_eq!(policy.observations(&0, 0), Some(&[0.1, 0.3, 0.5, 0.9][..]));
        assert_eq!(policy.iterations(), 4);
    }

    #[test]
    fn negative_alpha_is_rejected() {
        assert!(UucbPolicy::<u8>::new(UucbConfig::default().with_alpha(-1.0)).is_err());
    }
}
