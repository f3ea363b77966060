//! Route finding on a walled grid.
//!
//! A* over four-neighbour moves, a listener counting closed nodes, and a
//! sanity check of a one-way variant of the same grid that exposes a dead
//! end.

use frontier_core::prelude::*;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

const MAZE: &[&str] = &[
    "S..#....",
    ".#.#.##.",
    ".#...#..",
    ".####.#.",
    "......#G",
];

type Cell = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    North,
    South,
    West,
    East,
}

struct Grid {
    rows: Vec<Vec<u8>>,
    /// Only allow moves south and east.
    one_way: bool,
}

impl Grid {
    fn parse(one_way: bool) -> Self {
        Self {
            rows: MAZE.iter().map(|row| row.as_bytes().to_vec()).collect(),
            one_way,
        }
    }

    fn find(&self, marker: u8) -> Option<Cell> {
        self.rows.iter().enumerate().find_map(|(row, cells)| {
            cells.iter().position(|&c| c == marker).map(|col| (row, col))
        })
    }

    fn open(&self, (row, col): Cell) -> bool {
        self.rows.get(row).and_then(|r| r.get(col)).map_or(false, |&c| c != b'#')
    }
}

impl GraphGenerator for Grid {
    type State = Cell;
    type Action = Step;

    fn roots(&self) -> Result<Vec<Cell>> {
        self.find(b'S')
            .map(|start| vec![start])
            .ok_or_else(|| SearchError::generator("maze has no start"))
    }

    fn successors(&self, &(row, col): &Cell) -> Result<Vec<Successor<Cell, Step>>> {
        let mut moves = vec![(Step::South, row + 1, col), (Step::East, row, col + 1)];
        if !self.one_way {
            if row > 0 {
                moves.push((Step::North, row - 1, col));
            }
            if col > 0 {
                moves.push((Step::West, row, col - 1));
            }
        }
        Ok(moves
            .into_iter()
            .filter(|&(_, r, c)| self.open((r, c)))
            .map(|(step, r, c)| Successor::new(step, (r, c)))
            .collect())
    }

    fn is_goal(&self, cell: &Cell) -> Result<bool> {
        Ok(self.rows[cell.0][cell.1] == b'G')
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter("frontier_core=debug")
        .init();

    let grid = Grid::parse(false);
    let goal = grid
        .find(b'G')
        .ok_or_else(|| SearchError::generator("maze has no goal"))?;
    let evaluator = FnEvaluator::new(move |node: NodeRef<'_, Cell, Step, usize>| {
        let (row, col) = *node.state();
        Ok(Some(Evaluation::new(
            node.depth() + row.abs_diff(goal.0) + col.abs_diff(goal.1),
        )))
    });
    let config = BestFirstConfig::default()
        .with_parent_discarding(ParentDiscarding::All)
        .with_max_solutions(1);
    let mut search = BestFirst::new(grid, evaluator, config)?;

    let closed = Arc::new(AtomicUsize::new(0));
    let counter = closed.clone();
    search.register_listener(Arc::new(move |event: &AlgorithmEvent<Cell, Step, usize>| {
        if matches!(event, AlgorithmEvent::NodeClosed { .. }) {
            counter.fetch_add(1, Ordering::Relaxed);
        }
        Ok(())
    }));

    match search.next_solution()? {
        Some(route) => {
            println!("route of {} steps: {:?}", route.len(), route.actions);
            println!("cells: {:?}", route.states);
        }
        None => println!("no route"),
    }
    println!("closed {} nodes", closed.load(Ordering::Relaxed));

    let mut checker = SanityChecker::new(Grid::parse(true), SanityCheckConfig::default())?;
    match checker.find_anomaly()? {
        Some(Anomaly::DeadEndDetected(found)) => {
            println!("one-way grid dead end at {:?} via {:?}", found.dead_end, found.path.actions)
        }
        Some(Anomaly::CycleDetected(found)) => println!("cycle through {:?}", found.duplicate),
        None => println!("one-way grid is sane"),
    }

    Ok(())
}
