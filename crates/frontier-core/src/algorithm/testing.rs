//! Scripted algorithm for exercising the driver and adapters.

use super::*;
use crate::graph::NodeId;

/// Emits one scripted event per step: a solution ending in `n` for
/// `Some(n)`, a closed node for `None`.
pub(crate) struct Script {
    steps: Vec<Option<u32>>,
    cursor: usize,
}

impl Stepper for Script {
    type State = u32;
    type Action = u32;
    type Label = f64;

    fn initialize(
        &mut self,
        _ctx: &StepContext,
        _out: &mut Vec<AlgorithmEvent<u32, u32, f64>>,
    ) -> Result<Progress> {
        Ok(if self.steps.is_empty() {
            Progress::Exhausted
        } else {
            Progress::Continue
        })
    }

    fn step(
        &mut self,
        _ctx: &StepContext,
        out: &mut Vec<AlgorithmEvent<u32, u32, f64>>,
    ) -> Result<Progress> {
        match self.steps[self.cursor] {
            Some(head) => {
                let mut path = SearchPath::point(0);
                path.extend(head, head);
                path.label = Some(f64::from(head));
                out.push(AlgorithmEvent::SolutionCandidateFound(path));
            }
            None => out.push(AlgorithmEvent::NodeClosed {
                node: NodeId(self.cursor),
            }),
        }
        self.cursor += 1;
        Ok(if self.cursor == self.steps.len() {
            Progress::Exhausted
        } else {
            Progress::Continue
        })
    }
}

pub(crate) struct Scripted {
    execution: Execution<u32, u32, f64>,
    script: Script,
}

impl Scripted {
    pub(crate) fn new(steps: Vec<Option<u32>>) -> Self {
        Self {
            execution: Execution::new("scripted"),
            script: Script { steps, cursor: 0 },
        }
    }
}

impl SearchAlgorithm for Scripted {
    type State = u32;
    type Action = u32;
    type Label = f64;

    fn id(&self) -> &str {
        self.execution.id()
    }

    fn next_event(&mut self) -> Result<AlgorithmEvent<u32, u32, f64>> {
        self.execution.advance(&mut self.script)
    }

    fn execution_state(&self) -> ExecutionState {
        self.execution.state()
    }

    fn control(&self) -> &ExecutionControl {
        self.execution.control()
    }

    fn listeners(&self) -> &Arc<ListenerRegistry<AlgorithmEvent<u32, u32, f64>>> {
        self.execution.listeners()
    }
}
