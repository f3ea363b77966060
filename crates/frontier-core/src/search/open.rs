//! Open lists: the frontier of known-but-unexpanded nodes.
//!
//! | List | Order |
//! |------|-------|
//! | [`PriorityOpen`] | label, then FIFO or LIFO |
//! | [`ComparatorOpen`] | injected comparator, then FIFO |
//! | [`ParetoOpen`] | oldest node on the (label, uncertainty) Pareto front |
//! | [`TwoPhaseOpen`](super::TwoPhaseOpen) | alternating exploitation and exploration |

use crate::graph::{NodeArena, NodeId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::Duration;

/// Tie-break among equally labelled nodes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TieBreak {
    /// Oldest first.
    #[default]
    Fifo,
    /// Newest first.
    Lifo,
}

/// A queued node.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenEntry<V> {
    /// The node.
    pub node: NodeId,
    /// Its f-value.
    pub label: V,
    /// Its uncertainty, if the evaluator reported one.
    pub uncertainty: Option<f64>,
    /// Insertion counter, unique per run.
    pub seq: u64,
}

/// Frontier ordering used by best-first search.
///
/// The search calls `remove` when a queued node is superseded. Lists that
/// cannot remove eagerly may still return the stale entry from `pop`; the
/// search skips it.
pub trait OpenList<N, A, V>: Send {
    /// Queue a node.
    fn push(&mut self, entry: OpenEntry<V>);

    /// Remove and return the next node to expand.
    fn pop(&mut self, arena: &NodeArena<N, A, V>) -> Option<OpenEntry<V>>;

    /// Number of queued entries.
    fn len(&self) -> usize;

    /// Drop the entry of `node`, if the list supports removal.
    fn remove(&mut self, _node: NodeId) {}

    /// True if nothing is queued.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether the list orders by uncertainty and so needs it on every entry.
    fn requires_uncertainty(&self) -> bool {
        false
    }

    /// Called after every expansion with its duration and the time left.
    fn observe_step(&mut self, _elapsed: Duration, _remaining: Option<Duration>) {}
}

pub(crate) fn compare_labels<V: PartialOrd>(a: &V, b: &V) -> Ordering {
    a.partial_cmp(b).unwrap_or(Ordering::Equal)
}

struct HeapItem<V> {
    entry: OpenEntry<V>,
    tie: TieBreak,
}

impl<V: PartialOrd> Ord for HeapItem<V> {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap: the smallest label must compare greatest.
        compare_labels(&other.entry.label, &self.entry.label).then_with(|| match self.tie {
            TieBreak::Fifo => other.entry.seq.cmp(&self.entry.seq),
            TieBreak::Lifo => self.entry.seq.cmp(&other.entry.seq),
        })
    }
}

impl<V: PartialOrd> PartialOrd for HeapItem<V> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<V: PartialOrd> PartialEq for HeapItem<V> {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl<V: PartialOrd> Eq for HeapItem<V> {}

/// Binary-heap open list ordered by label.
pub struct PriorityOpen<V> {
    heap: BinaryHeap<HeapItem<V>>,
    tie: TieBreak,
}

impl<V: PartialOrd> PriorityOpen<V> {
    /// Create an empty list.
    pub fn new(tie: TieBreak) -> Self {
        Self {
            heap: BinaryHeap::new(),
            tie,
        }
    }
}

impl<V: PartialOrd> Default for PriorityOpen<V> {
    fn default() -> Self {
        Self::new(TieBreak::Fifo)
    }
}

impl<N, A, V: PartialOrd + Send> OpenList<N, A, V> for PriorityOpen<V> {
    fn push(&mut self, entry: OpenEntry<V>) {
        self.heap.push(HeapItem {
            entry,
            tie: self.tie,
        });
    }

    fn pop(&mut self, _arena: &NodeArena<N, A, V>) -> Option<OpenEntry<V>> {
        self.heap.pop().map(|item| item.entry)
    }

    fn len(&self) -> usize {
        self.heap.len()
    }
}

/// Comparator over open entries.
pub type EntryComparator<V> = Box<dyn Fn(&OpenEntry<V>, &OpenEntry<V>) -> Ordering + Send>;

/// Open list ordered by an injected comparator; FIFO among equals.
pub struct ComparatorOpen<V> {
    entries: Vec<OpenEntry<V>>,
    comparator: EntryComparator<V>,
}

impl<V> ComparatorOpen<V> {
    /// Create an empty list.
    pub fn new(comparator: impl Fn(&OpenEntry<V>, &OpenEntry<V>) -> Ordering + Send + 'static) -> Self {
        Self {
            entries: Vec::new(),
            comparator: Box::new(comparator),
        }
    }
}

impl<N, A, V: Send> OpenList<N, A, V> for ComparatorOpen<V> {
    fn push(&mut self, entry: OpenEntry<V>) {
        self.entries.push(entry);
    }

    fn pop(&mut self, _arena: &NodeArena<N, A, V>) -> Option<OpenEntry<V>> {
        let mut best: Option<usize> = None;
        for (index, entry) in self.entries.iter().enumerate() {
            let better = match best {
                None => true,
                Some(current) => (self.comparator)(entry, &self.entries[current])
                    .then_with(|| entry.seq.cmp(&self.entries[current].seq))
                    == Ordering::Less,
            };
            if better {
                best = Some(index);
            }
        }
        best.map(|index| self.entries.swap_remove(index))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn remove(&mut self, node: NodeId) {
        self.entries.retain(|entry| entry.node != node);
    }
}

/// Open list expanding non-dominated nodes first.
///
/// A node dominates another if its label is no worse, its uncertainty is no
/// lower, and one of the two is strictly better. Among the non-dominated
/// nodes the oldest is expanded.
pub struct ParetoOpen<V> {
    entries: Vec<OpenEntry<V>>,
}

impl<V> Default for ParetoOpen<V> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<V: PartialOrd> ParetoOpen<V> {
    /// Create an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    fn uncertainty(&self, index: usize) -> f64 {
        self.entries[index].uncertainty.unwrap_or(0.0)
    }

    /// Indices of the non-dominated entries.
    pub fn front(&self) -> Vec<usize> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by(|&a, &b| {
            compare_labels(&self.entries[a].label, &self.entries[b].label)
                .then_with(|| compare_labels(&self.uncertainty(b), &self.uncertainty(a)))
        });

        let mut front = Vec::new();
        let mut best_before = f64::NEG_INFINITY;
        let mut start = 0;
        while start < order.len() {
            let mut end = start + 1;
            while end < order.len()
                && compare_labels(&self.entries[order[start]].label, &self.entries[order[end]].label)
                    == Ordering::Equal
            {
                end += 1;
            }
            let group_best = self.uncertainty(order[start]);
            for &index in &order[start..end] {
                let u = self.uncertainty(index);
                if u >= group_best && u > best_before {
                    front.push(index);
                }
            }
            best_before = best_before.max(group_best);
            start = end;
        }
        front
    }
}

impl<N, A, V: PartialOrd + Send> OpenList<N, A, V> for ParetoOpen<V> {
    fn push(&mut self, entry: OpenEntry<V>) {
        self.entries.push(entry);
    }

    fn pop(&mut self, _arena: &NodeArena<N, A, V>) -> Option<OpenEntry<V>> {
        let chosen = self
            .front()
            .into_iter()
            .min_by_key(|&index| self.entries[index].seq)?;
        Some(self.entries.swap_remove(chosen))
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn remove(&mut self, node: NodeId) {
        self.entries.retain(|entry| entry.node != node);
    }

    fn requires_uncertainty(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(node: usize, label: f64, uncertainty: f64, seq: u64) -> OpenEntry<f64> {
        OpenEntry {
            node: NodeId(node),
            label,
            uncertainty: Some(uncertainty),
            seq,
        }
    }

    fn drain<L: OpenList<u32, u32, f64>>(list: &mut L) -> Vec<usize> {
        let arena = NodeArena::new();
        std::iter::from_fn(|| list.pop(&arena).map(|e| e.node.index())).collect()
    }

    #[test]
    fn priority_open_fifo_ties() {
        let mut open = PriorityOpen::new(TieBreak::Fifo);
        OpenList::<u32, u32, f64>::push(&mut open, entry(0, 2.0, 0.0, 0));
        OpenList::<u32, u32, f64>::push(&mut open, entry(1, 1.0, 0.0, 1));
        OpenList::<u32, u32, f64>::push(&mut open, entry(2, 1.0, 0.0, 2));
        assert_eq!(drain(&mut open), vec![1, 2, 0]);
    }

    #[test]
    fn priority_open_lifo_ties() {
        let mut open = PriorityOpen::new(TieBreak::Lifo);
        for (i, label) in [1.0, 1.0, 0.5].into_iter().enumerate() {
            OpenList::<u32, u32, f64>::push(&mut open, entry(i, label, 0.0, i as u64));
        }
        assert_eq!(drain(&mut open), vec![2, 1, 0]);
    }

    #[test]
    fn comparator_open_uses_injected_order() {
        // Largest label first.
        let mut open = ComparatorOpen::new(|a: &OpenEntry<f64>, b: &OpenEntry<f64>| {
            compare_labels(&b.label, &a.label)
        });
        for (i, label) in [1.0, 3.0, 2.0, 3.0].into_iter().enumerate() {
            OpenList::<u32, u32, f64>::push(&mut open, entry(i, label, 0.0, i as u64));
        }
        assert_eq!(drain(&mut open), vec![1, 3, 2, 0]);
    }

    #[test]
    fn pareto_front_excludes_dominated() {
        let mut open = ParetoOpen::new();
        open.entries.push(entry(0, 1.0, 0.1, 0));
        open.entries.push(entry(1, 2.0, 0.5, 1));
        open.entries.push(entry(2, 3.0, 0.2, 2));
        open.entries.push(entry(3, 1.0, 0.05, 3));

        let mut front: Vec<usize> = open.front().into_iter().map(|i| open.entries[i].node.index()).collect();
        front.sort_unstable();
        assert_eq!(front, vec![0, 1]);
    }

    #[test]
    fn pareto_pops_oldest_non_dominated() {
        let mut open = ParetoOpen::new();
        OpenList::<u32, u32, f64>::push(&mut open, entry(0, 3.0, 0.2, 0));
        OpenList::<u32, u32, f64>::push(&mut open, entry(1, 2.0, 0.5, 1));
        OpenList::<u32, u32, f64>::push(&mut open, entry(2, 1.0, 0.1, 2));
        assert!(OpenList::<u32, u32, f64>::requires_uncertainty(&open));
        // Node 0 is dominated by node 1 until node 1 is gone.
        assert_eq!(drain(&mut open), vec![1, 0, 2]);
    }

    #[test]
    fn removed_entry_no_longer_dominates() {
        let mut open = ParetoOpen::new();
        OpenList::<u32, u32, f64>::push(&mut open, entry(0, 3.0, 0.2, 0));
        OpenList::<u32, u32, f64>::push(&mut open, entry(1, 2.0, 0.5, 1));
        OpenList::<u32, u32, f64>::remove(&mut open, NodeId(1));
        assert_eq!(drain(&mut open), vec![0]);
    }

    #[test]
    fn pareto_keeps_equal_points() {
        let mut open = ParetoOpen::new();
        open.entries.push(entry(0, 1.0, 0.3, 0));
        open.entries.push(entry(1, 1.0, 0.3, 1));
        assert_eq!(open.front().len(), 2);
    }
}
