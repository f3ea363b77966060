//! Building searches from a JSON configuration.
//!
//! Solves a coin-change problem twice: exactly with best-first search and
//! approximately with MCTS, both configured from one document.

use frontier::prelude::*;

const CONFIG: &str = r#"{
    "execution": { "timeout_ms": 2000 },
    "best_first": { "parent_discarding": "all", "max_solutions": 1 },
    "mcts": { "max_iterations": 400, "gamma": 1.0, "max_depth": 12, "seed": 11 },
    "tree_policy": { "policy": "brue", "horizon": 12 }
}"#;

const COINS: [u32; 4] = [1, 5, 9, 12];

/// States are amounts still owed; paying a coin moves towards zero.
#[derive(Clone)]
struct CoinChange {
    amount: u32,
}

impl GraphGenerator for CoinChange {
    type State = u32;
    type Action = u32;

    fn roots(&self) -> frontier::Result<Vec<u32>> {
        Ok(vec![self.amount])
    }

    fn successors(&self, owed: &u32) -> frontier::Result<Vec<Successor<u32, u32>>> {
        Ok(COINS
            .iter()
            .filter(|&&coin| coin <= *owed)
            .map(|&coin| Successor::new(coin, owed - coin))
            .collect())
    }

    fn is_goal(&self, owed: &u32) -> frontier::Result<bool> {
        Ok(*owed == 0)
    }
}

/// Every coin costs one point.
fn coin_cost(_: &u32, _: &u32, _: &u32) -> f64 {
    -1.0
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("frontier=info,frontier_core=info")
        .init();

    let engine = Engine::builder()
        .config(EngineConfig::from_json(CONFIG)?)
        .build()?;
    println!("effective configuration:\n{}", engine.config().to_json()?);

    let problem = CoinChange { amount: 30 };

    let search = engine.best_first(GraphSearchProblem {
        generator: problem.clone(),
        evaluator: DepthEvaluator,
    })?;
    let (search, outcome) = frontier::run(search).await?;
    match outcome.first() {
        Some(path) => println!(
            "best-first: {} coins {:?} after {} expansions",
            path.len(),
            path.actions,
            search.expansions()
        ),
        None => println!("best-first: no change possible"),
    }

    let search = engine.mcts(RewardProblem {
        generator: problem,
        reward: coin_cost,
    })?;
    let (search, outcome) = frontier::run(search).await?;
    let best = outcome.solutions.iter().max_by(|a, b| {
        a.label
            .partial_cmp(&b.label)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    match best {
        Some(path) => println!("mcts: {} coins {:?}", path.len(), path.actions),
        None => println!("mcts: no playout paid the full amount"),
    }
    println!(
        "mcts: {} playouts, first coin {:?}",
        search.iterations(),
        search.recommended_action()
    );

    Ok(())
}
