//! Driving searches from async code.
//!
//! Starts an unbounded search on the blocking pool, watches its events
//! through a listener, and cancels it from the async side once enough
//! nodes have been closed.

use frontier::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// The Collatz graph read backwards: `n` leads to `2n` and, where it
/// exists, to `(n - 1) / 3`.
struct ReverseCollatz;

impl GraphGenerator for ReverseCollatz {
    type State = u64;
    type Action = char;

    fn roots(&self) -> frontier::Result<Vec<u64>> {
        Ok(vec![1])
    }

    fn successors(&self, n: &u64) -> frontier::Result<Vec<Successor<u64, char>>> {
        let mut out = vec![Successor::new('d', n * 2)];
        if *n > 4 && n % 6 == 4 {
            out.push(Successor::new('t', (n - 1) / 3));
        }
        Ok(out)
    }

    fn is_goal(&self, _n: &u64) -> frontier::Result<bool> {
        Ok(false)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("frontier=info")
        .init();

    let engine = Engine::builder()
        .best_first(BestFirstConfig::default().with_parent_discarding(ParentDiscarding::All))
        .timeout(Duration::from_secs(10))
        .build()?;

    let search = engine.best_first(GraphSearchProblem {
        generator: ReverseCollatz,
        evaluator: DepthEvaluator,
    })?;

    let closed = Arc::new(AtomicUsize::new(0));
    let counter = closed.clone();
    search.register_listener(Arc::new(move |event: &AlgorithmEvent<u64, char, f64>| {
        if matches!(event, AlgorithmEvent::NodeClosed { .. }) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }));

    let handle = frontier::spawn(search);
    let mut ticker = tokio::time::interval(Duration::from_millis(5));
    for _ in 0..1_000 {
        if closed.load(Ordering::Relaxed) >= 5_000 {
            break;
        }
        ticker.tick().await;
    }
    handle.cancel();

    let (search, outcome) = handle.join().await?;
    println!(
        "stopped with {:?} after {} expansions, {} nodes in memory",
        outcome.completion,
        search.expansions(),
        search.arena().len()
    );
    Ok(())
}
