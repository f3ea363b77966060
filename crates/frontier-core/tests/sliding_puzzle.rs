//! End-to-end best-first search on the 8-puzzle.

use frontier_core::prelude::*;
use frontier_core::search::{TieBreak, F_TIME};
use std::collections::HashSet;
use std::sync::Arc;

type Board = [u8; 9];

const SOLVED: Board = [1, 2, 3, 4, 5, 6, 7, 8, 0];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Move {
    Up,
    Down,
    Left,
    Right,
}

/// Blank-moving 8-puzzle rooted at one scrambled board.
struct EightPuzzle {
    start: Board,
}

impl GraphGenerator for EightPuzzle {
    type State = Board;
    type Action = Move;

    fn roots(&self) -> Result<Vec<Board>> {
        Ok(vec![self.start])
    }

    fn successors(&self, board: &Board) -> Result<Vec<Successor<Board, Move>>> {
        let blank = board
            .iter()
            .position(|&tile| tile == 0)
            .ok_or_else(|| SearchError::generator("board without blank"))?;
        let (row, col) = (blank / 3, blank % 3);
        let mut out = Vec::with_capacity(4);
        for (action, target) in [
            (Move::Up, (row > 0).then(|| blank - 3)),
            (Move::Down, (row < 2).then(|| blank + 3)),
            (Move::Left, (col > 0).then(|| blank - 1)),
            (Move::Right, (col < 2).then(|| blank + 1)),
        ] {
            if let Some(target) = target {
                let mut next = *board;
                next.swap(blank, target);
                out.push(Successor::new(action, next));
            }
        }
        Ok(out)
    }

    fn is_goal(&self, board: &Board) -> Result<bool> {
        Ok(*board == SOLVED)
    }
}

fn manhattan(board: &Board) -> u32 {
    board
        .iter()
        .enumerate()
        .filter(|&(_, &tile)| tile != 0)
        .map(|(index, &tile)| {
            let home = usize::from(tile - 1);
            ((index / 3).abs_diff(home / 3) + (index % 3).abs_diff(home % 3)) as u32
        })
        .sum()
}

fn apply(board: &Board, moves: &[Move]) -> Board {
    let puzzle = EightPuzzle { start: *board };
    moves.iter().fold(*board, |current, action| {
        puzzle
            .successors(&current)
            .unwrap()
            .into_iter()
            .find(|successor| successor.action == *action)
            .map(|successor| successor.state)
            .expect("illegal move in solution")
    })
}

fn a_star(start: Board, discarding: ParentDiscarding) -> BestFirst<EightPuzzle, impl NodeEvaluator<Board, Move, Label = u32>> {
    let evaluator = FnEvaluator::new(|node: NodeRef<'_, Board, Move, u32>| {
        Ok(Some(Evaluation::new(node.depth() as u32 + manhattan(node.state()))))
    });
    let config = BestFirstConfig::default()
        .with_parent_discarding(discarding)
        .with_max_solutions(1);
    BestFirst::new(EightPuzzle { start }, evaluator, config).unwrap()
}

#[test]
fn a_star_finds_optimal_twenty_move_solution() {
    let start = [7, 2, 4, 5, 0, 6, 8, 3, 1];
    let mut search = a_star(start, ParentDiscarding::All);
    let solution = search.next_solution().unwrap().expect("puzzle is solvable");

    assert_eq!(solution.len(), 20);
    assert_eq!(solution.label, Some(20));
    assert_eq!(solution.root(), Some(&start));
    assert_eq!(apply(&start, &solution.actions), SOLVED);
    assert!(search.arena().iter().all(|node| node.annotation(F_TIME).is_some()));
}

#[test]
fn open_discarding_is_also_optimal() {
    let start = [8, 1, 3, 4, 0, 2, 7, 6, 5];
    let mut search = a_star(start, ParentDiscarding::Open);
    let solution = search.next_solution().unwrap().unwrap();
    assert_eq!(solution.len(), 14);
    assert_eq!(apply(&start, &solution.actions), SOLVED);
}

#[test]
fn closed_set_keeps_states_unique() {
    let start = [8, 1, 3, 4, 0, 2, 7, 6, 5];
    let mut search = a_star(start, ParentDiscarding::All);
    let collector: Arc<EventCollector<AlgorithmEvent<Board, Move, u32>>> = Arc::new(EventCollector::new());
    search.register_listener(collector.clone());
    search.next_solution().unwrap().unwrap();

    let closed: Vec<Board> = collector
        .events()
        .into_iter()
        .filter_map(|event| match event {
            AlgorithmEvent::NodeClosed { node } => Some(*search.arena()[node].state()),
            _ => None,
        })
        .collect();
    let unique: HashSet<Board> = closed.iter().copied().collect();
    assert!(!closed.is_empty());
    assert_eq!(unique.len(), closed.len());
}

#[test]
fn uniform_cost_matches_optimal_depth() {
    let start = [4, 1, 3, 7, 2, 6, 0, 5, 8];
    let config = BestFirstConfig::default()
        .with_parent_discarding(ParentDiscarding::All)
        .with_tie_break(TieBreak::Fifo);
    let mut search = BestFirst::new(EightPuzzle { start }, DepthEvaluator, config).unwrap();
    let solution = search.next_solution().unwrap().unwrap();
    assert_eq!(solution.len(), 6);
    assert_eq!(apply(&start, &solution.actions), SOLVED);
}

#[test]
fn solved_board_is_its_own_solution() {
    let mut search = a_star(SOLVED, ParentDiscarding::None);
    let solution = search.next_solution().unwrap().unwrap();
    assert!(solution.is_empty());
    assert_eq!(search.expansions(), 0);
}

#[test]
fn sanity_check_reports_back_and_forth_cycle() {
    let start = [4, 1, 3, 7, 2, 6, 0, 5, 8];
    let mut checker = SanityChecker::new(EightPuzzle { start }, SanityCheckConfig::default()).unwrap();
    match checker.find_anomaly().unwrap() {
        Some(Anomaly::CycleDetected(cycle)) => {
            assert_eq!(cycle.path.head(), Some(&cycle.duplicate));
            assert!(cycle.path.states[..cycle.path.states.len() - 1].contains(&cycle.duplicate));
        }
        other => panic!("expected a cycle, got {other:?}"),
    }
}
