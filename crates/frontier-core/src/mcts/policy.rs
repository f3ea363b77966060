//! Policy and reward seams of the MCTS loop.

use super::driver::Rollout;
use crate::error::{Result, SearchError};
use rand::rngs::StdRng;
use rand::Rng;
use std::cmp::Ordering;

/// Chooses actions inside the explored part of the tree and learns from
/// finished rollouts.
pub trait TreePolicy<N, A> {
    /// Index of the action to take in `state`, drawn from `allowed`.
    ///
    /// `allowed` holds indices into `actions` and is never empty. It is
    /// narrower than `actions` once parts of the tree are exhausted.
    fn choose(&mut self, state: &N, actions: &[A], allowed: &[usize], rng: &mut StdRng) -> Result<usize>;

    /// Learn from a finished rollout.
    fn update_path(&mut self, rollout: &Rollout<N, A>) -> Result<()>;

    /// Index of the action this policy would commit to in `state`, if it
    /// has any statistics for it.
    fn recommend(&self, state: &N, actions: &[A]) -> Option<usize>;
}

impl<N, A, T: TreePolicy<N, A> + ?Sized> TreePolicy<N, A> for Box<T> {
    fn choose(&mut self, state: &N, actions: &[A], allowed: &[usize], rng: &mut StdRng) -> Result<usize> {
        (**self).choose(state, actions, allowed, rng)
    }

    fn update_path(&mut self, rollout: &Rollout<N, A>) -> Result<()> {
        (**self).update_path(rollout)
    }

    fn recommend(&self, state: &N, actions: &[A]) -> Option<usize> {
        (**self).recommend(state, actions)
    }
}

/// Chooses actions outside the explored part of the tree.
pub trait DefaultPolicy<N, A> {
    /// Index of the action to take in `state`. `actions` is never empty.
    fn choose(&mut self, state: &N, actions: &[A], rng: &mut StdRng) -> Result<usize>;
}

impl<N, A, D: DefaultPolicy<N, A> + ?Sized> DefaultPolicy<N, A> for Box<D> {
    fn choose(&mut self, state: &N, actions: &[A], rng: &mut StdRng) -> Result<usize> {
        (**self).choose(state, actions, rng)
    }
}

/// Picks every action with equal probability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UniformRandomPolicy;

impl<N, A> DefaultPolicy<N, A> for UniformRandomPolicy {
    fn choose(&mut self, _state: &N, actions: &[A], rng: &mut StdRng) -> Result<usize> {
        if actions.is_empty() {
            return Err(SearchError::InvalidState("no action to choose from".into()));
        }
        Ok(rng.gen_range(0..actions.len()))
    }
}

/// Reward of a single transition.
pub trait RewardFunction<N, A> {
    /// Reward for moving from `from` to `to` via `action`. Larger is better.
    fn reward(&self, from: &N, action: &A, to: &N) -> Result<f64>;
}

impl<N, A, F> RewardFunction<N, A> for F
where
    F: Fn(&N, &A, &N) -> f64,
{
    fn reward(&self, from: &N, action: &A, to: &N) -> Result<f64> {
        Ok(self(from, action, to))
    }
}

/// Uniformly random element of `candidates`, which must not be empty.
pub(crate) fn pick(candidates: &[usize], rng: &mut StdRng) -> usize {
    candidates[rng.gen_range(0..candidates.len())]
}

/// Index of the largest score, ties broken uniformly at random.
pub(crate) fn argmax(scores: &[(usize, f64)], rng: &mut StdRng) -> Option<usize> {
    let best = scores
        .iter()
        .map(|&(_, score)| score)
        .max_by(|a, b| a.partial_cmp(b).unwrap_or(Ordering::Equal))?;
    let tied: Vec<usize> = scores
        .iter()
        .filter(|&&(_, score)| score == best)
        .map(|&(index, _)| index)
        .collect();
    if tied.is_empty() {
        // NaN scores compare unequal to themselves.
        return scores.first().map(|&(index, _)| index);
    }
    Some(pick(&tied, rng))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    #[test]
    fn uniform_policy_covers_all_actions() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut seen = [0usize; 3];
        for _ in 0..300 {
            let index = DefaultPolicy::<u8, char>::choose(
                &mut UniformRandomPolicy,
                &0,
                &['a', 'b', 'c'],
                &mut rng,
            )
            .unwrap();
            seen[index] += 1;
        }
        assert!(seen.iter().all(|&count| count > 50));
    }

    #[test]
    fn argmax_breaks_ties_randomly() {
        let mut rng = StdRng::seed_from_u64(3);
        let scores = [(0, 1.0), (1, 2.0), (2, 2.0)];
        let mut winners = std::collections::HashSet::new();
        for _ in 0..64 {
            winners.insert(argmax(&scores, &mut rng).unwrap());
        }
        assert_eq!(winners.len(), 2);
        assert!(!winners.contains(&0));
        assert_eq!(argmax(&[], &mut rng), None);
    }

    #[test]
    fn closures_are_reward_functions() {
        let reward = |from: &u8, _: &char, to: &u8| f64::from(*to) - f64::from(*from);
        assert_eq!(reward.reward(&1, &'x', &4).unwrap(), 3.0);
    }
}
