//! Two-phase oversearch avoidance.
//!
//! Exploitation phases expand by f-value. Exploration phases expand the
//! node with the highest uncertainty whose state is at least
//! `min_distance` away from every node expanded in earlier exploration
//! phases, so the search does not keep digging one promising branch. If no
//! node is far enough away, the most uncertain node is taken.

use super::open::{compare_labels, OpenEntry, OpenList};
use crate::graph::{NodeArena, NodeId};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::time::Duration;
use tracing::debug;

/// Distance between two states, used to diversify exploration.
pub trait SolutionDistance<N>: Send {
    /// Non-negative distance.
    fn distance(&self, a: &N, b: &N) -> f64;
}

impl<N, F> SolutionDistance<N> for F
where
    F: Fn(&N, &N) -> f64 + Send,
{
    fn distance(&self, a: &N, b: &N) -> f64 {
        self(a, b)
    }
}

/// 0 for equal states, 1 otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct DiscreteDistance;

impl<N: PartialEq> SolutionDistance<N> for DiscreteDistance {
    fn distance(&self, a: &N, b: &N) -> f64 {
        if a == b {
            0.0
        } else {
            1.0
        }
    }
}

/// Number of expansions per phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PhaseLengths {
    /// Expansions ordered by f-value.
    pub exploitation: usize,
    /// Expansions ordered by uncertainty.
    pub exploration: usize,
}

impl Default for PhaseLengths {
    fn default() -> Self {
        Self {
            exploitation: 10,
            exploration: 2,
        }
    }
}

/// Decides how long the next pair of phases lasts.
pub trait PhaseLengthAdjuster: Send {
    /// Record one expansion.
    fn observe(&mut self, _elapsed: Duration, _remaining: Option<Duration>) {}

    /// Lengths for the next exploitation/exploration cycle.
    fn next_lengths(&mut self) -> PhaseLengths;
}

/// Constant phase lengths.
#[derive(Debug, Clone, Copy, Default)]
pub struct FixedPhaseLengths(pub PhaseLengths);

impl PhaseLengthAdjuster for FixedPhaseLengths {
    fn next_lengths(&mut self) -> PhaseLengths {
        self.0
    }
}

/// Re-estimates phase lengths from the measured expansion time and the
/// remaining time budget.
///
/// The remaining budget is split into `cycles` exploitation/exploration
/// cycles, of which `exploration_share` goes to exploration. Until both the
/// mean expansion time and a deadline are known the fallback lengths apply.
#[derive(Debug, Clone)]
pub struct WallClockPhaseLengths {
    exploration_share: f64,
    cycles: usize,
    fallback: PhaseLengths,
    steps: u32,
    total: Duration,
    remaining: Option<Duration>,
}

impl WallClockPhaseLengths {
    /// Create an adjuster.
    pub fn new(exploration_share: f64, cycles: usize, fallback: PhaseLengths) -> Self {
        Self {
            exploration_share: exploration_share.clamp(0.0, 1.0),
            cycles: cycles.max(1),
            fallback,
            steps: 0,
            total: Duration::ZERO,
            remaining: None,
        }
    }

    /// Mean duration of an expansion so far.
    pub fn mean_step(&self) -> Option<Duration> {
        (self.steps > 0).then(|| self.total / self.steps)
    }
}

impl PhaseLengthAdjuster for WallClockPhaseLengths {
    fn observe(&mut self, elapsed: Duration, remaining: Option<Duration>) {
        self.steps = self.steps.saturating_add(1);
        self.total += elapsed;
        self.remaining = remaining;
    }

    fn next_lengths(&mut self) -> PhaseLengths {
        let (Some(mean), Some(remaining)) = (self.mean_step(), self.remaining) else {
            return self.fallback;
        };
        let mean = mean.as_secs_f64().max(1e-9);
        let per_cycle = (remaining.as_secs_f64() / mean / self.cycles as f64).floor() as usize;
        let exploration = ((per_cycle as f64 * self.exploration_share).round() as usize).max(1);
        let exploitation = per_cycle.saturating_sub(exploration).max(1);
        PhaseLengths {
            exploitation,
            exploration,
        }
    }
}

/// Serializable settings of the two-phase discipline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TwoPhaseConfig {
    /// Initial (or fixed) phase lengths.
    pub phases: PhaseLengths,
    /// Minimum distance between exploration picks.
    pub min_distance: f64,
    /// Re-estimate phase lengths from the remaining time budget.
    pub adjust_to_timeout: bool,
    /// Share of each cycle spent exploring when adjusting.
    pub exploration_share: f64,
    /// Number of cycles the remaining budget is divided into when adjusting.
    pub cycles: usize,
}

impl Default for TwoPhaseConfig {
    fn default() -> Self {
        Self {
            phases: PhaseLengths::default(),
            min_distance: 1.0,
            adjust_to_timeout: false,
            exploration_share: 0.2,
            cycles: 4,
        }
    }
}

impl TwoPhaseConfig {
    /// Build the matching adjuster.
    pub fn adjuster(&self) -> Box<dyn PhaseLengthAdjuster> {
        if self.adjust_to_timeout {
            Box::new(WallClockPhaseLengths::new(
                self.exploration_share,
                self.cycles,
                self.phases,
            ))
        } else {
            Box::new(FixedPhaseLengths(self.phases))
        }
    }
}

/// The current phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Expanding by f-value.
    Exploitation,
    /// Expanding by uncertainty.
    Exploration,
}

/// Open list alternating exploitation and exploration phases.
pub struct TwoPhaseOpen<N, V> {
    entries: Vec<OpenEntry<V>>,
    explored: Vec<N>,
    distance: Box<dyn SolutionDistance<N>>,
    adjuster: Box<dyn PhaseLengthAdjuster>,
    min_distance: f64,
    phase: Phase,
    lengths: PhaseLengths,
    left_in_phase: usize,
}

impl<N, V> TwoPhaseOpen<N, V> {
    /// Create an empty list.
    pub fn new(
        min_distance: f64,
        distance: Box<dyn SolutionDistance<N>>,
        mut adjuster: Box<dyn PhaseLengthAdjuster>,
    ) -> Self {
        let lengths = adjuster.next_lengths();
        Self {
            entries: Vec::new(),
            explored: Vec::new(),
            distance,
            adjuster,
            min_distance,
            phase: Phase::Exploitation,
            lengths,
            left_in_phase: lengths.exploitation,
        }
    }

    /// Build from serialized settings.
    pub fn from_config(config: &TwoPhaseConfig, distance: Box<dyn SolutionDistance<N>>) -> Self {
        Self::new(config.min_distance, distance, config.adjuster())
    }

    /// The phase the next pop belongs to.
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// States picked during exploration so far.
    pub fn explored(&self) -> &[N] {
        &self.explored
    }

    fn advance_phase(&mut self) {
        while self.left_in_phase == 0 {
            self.phase = match self.phase {
                Phase::Exploitation => Phase::Exploration,
                Phase::Exploration => {
                    self.lengths = self.adjuster.next_lengths();
                    Phase::Exploitation
                }
            };
            self.left_in_phase = match self.phase {
                Phase::Exploitation => self.lengths.exploitation,
                Phase::Exploration => self.lengths.exploration,
            };
            debug!(phase = ?self.phase, steps = self.left_in_phase, "switching phase");
            if self.lengths.exploitation == 0 && self.lengths.exploration == 0 {
                self.phase = Phase::Exploitation;
                self.left_in_phase = 1;
            }
        }
    }
}

impl<N, V: PartialOrd> TwoPhaseOpen<N, V> {
    fn best_label(&self) -> Option<usize> {
        (0..self.entries.len()).min_by(|&a, &b| {
            compare_labels(&self.entries[a].label, &self.entries[b].label)
                .then_with(|| self.entries[a].seq.cmp(&self.entries[b].seq))
        })
    }

    fn most_uncertain<A>(&self, arena: &NodeArena<N, A, V>) -> Option<usize> {
        let mut order: Vec<usize> = (0..self.entries.len()).collect();
        order.sort_by(|&a, &b| {
            let ua = self.entries[a].uncertainty.unwrap_or(0.0);
            let ub = self.entries[b].uncertainty.unwrap_or(0.0);
            ub.partial_cmp(&ua)
                .unwrap_or(Ordering::Equal)
                .then_with(|| self.entries[a].seq.cmp(&self.entries[b].seq))
        });
        let diverse = order.iter().copied().find(|&index| {
            let state = arena[self.entries[index].node].state();
            self.explored
                .iter()
                .all(|seen| self.distance.distance(state, seen) >= self.min_distance)
        });
        diverse.or_else(|| order.first().copied())
    }
}

impl<N, A, V> OpenList<N, A, V> for TwoPhaseOpen<N, V>
where
    N: Clone + Send,
    V: PartialOrd + Send,
{
    fn push(&mut self, entry: OpenEntry<V>) {
        self.entries.push(entry);
    }

    fn pop(&mut self, arena: &NodeArena<N, A, V>) -> Option<OpenEntry<V>> {
        if self.entries.is_empty() {
            return None;
        }
        self.advance_phase();
        let index = match self.phase {
            Phase::Exploitation => self.best_label()?,
            Phase::Exploration => {
                let index = self.most_uncertain(arena)?;
                self.explored.push(arena[self.entries[index].node].state().clone());
                index
            }
        };
        self.left_in_phase -= 1;
        Some(self.entries.swap_remove(index))
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

    fn observe_step(&mut self, elapsed: Duration, remaining: Option<Duration>) {
        self.adjuster.observe(elapsed, remaining);
    }
}
