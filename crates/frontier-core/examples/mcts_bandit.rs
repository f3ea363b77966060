//! Monte Carlo tree search on a noisy three-armed bandit.
//!
//! Runs the same problem once with UUCB and once with BRUE and prints the
//! arm each policy recommends.

use frontier_core::prelude::*;
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Mean payout of each arm.
const MEANS: [f64; 3] = [0.5, 0.3, 0.7];
const NOISE: f64 = 0.2;

/// A lever with one terminal state per arm.
struct Bandit;

impl GraphGenerator for Bandit {
    type State = u8;
    type Action = usize;

    fn roots(&self) -> Result<Vec<u8>> {
        Ok(vec![0])
    }

    fn successors(&self, state: &u8) -> Result<Vec<Successor<u8, usize>>> {
        Ok(if *state == 0 {
            (0..MEANS.len()).map(|arm| Successor::new(arm, arm as u8 + 1)).collect()
        } else {
            Vec::new()
        })
    }

    fn is_goal(&self, _state: &u8) -> Result<bool> {
        Ok(false)
    }
}

fn noisy_payout(seed: u64) -> impl Fn(&u8, &usize, &u8) -> f64 {
    let rng = Mutex::new(StdRng::seed_from_u64(seed));
    move |_, arm, _| {
        let noise = (rng.lock().gen::<f64>() - 0.5) * 2.0 * NOISE;
        (MEANS[*arm] + noise).clamp(0.0, 1.0)
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("frontier_core=info")
        .init();

    let config = MctsConfig::default().with_max_iterations(500).with_seed(7);

    let uucb: UucbPolicy<u8> = UucbPolicy::new(UucbConfig::default())?;
    let mut search = Mcts::new(Bandit, noisy_payout(1), uucb, config.clone())?;
    let outcome = search.call()?;
    println!("UUCB after {} playouts", search.iterations());
    println!("  recommended arm: {:?}", search.recommended_action());
    println!("  best playout score: {:?}", search.best_score());
    println!("  completion: {:?}", outcome.completion);

    let brue: BruePolicy<u8> = BruePolicy::new(BrueConfig::default().with_horizon(1))?;
    let mut search = Mcts::new(Bandit, noisy_payout(2), brue, config)?;
    search.call()?;
    println!("BRUE after {} playouts", search.iterations());
    for arm in 0..MEANS.len() {
        if let Some((mean, count)) = search.tree_policy().estimate(&0, arm) {
            println!("  arm {arm}: mean {mean:.3} over {count} samples");
        }
    }
    println!("  recommended arm: {:?}", search.recommended_action());

    Ok(())
}
