//! Node evaluation.

use crate::error::Result;
use crate::graph::NodeRef;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;

/// Annotation key: evaluation time in microseconds.
pub const F_TIME: &str = "f_time_us";
/// Annotation key: reason a node could not be evaluated.
pub const F_ERROR: &str = "f_error";
/// Annotation key: uncertainty of the label.
pub const F_UNCERTAINTY: &str = "f_uncertainty";

/// Result of evaluating one node.
#[derive(Debug, Clone, PartialEq)]
pub struct Evaluation<V> {
    /// The f-value. Smaller is better.
    pub value: V,
    /// Uncertainty of `value`, for oversearch avoidance.
    pub uncertainty: Option<f64>,
    /// Extra annotations stored on the node.
    pub annotations: BTreeMap<String, Value>,
}

impl<V> Evaluation<V> {
    /// A plain f-value.
    pub fn new(value: V) -> Self {
        Self {
            value,
            uncertainty: None,
            annotations: BTreeMap::new(),
        }
    }

    /// Attach an uncertainty estimate.
    pub fn with_uncertainty(mut self, uncertainty: f64) -> Self {
        self.uncertainty = Some(uncertainty);
        self
    }

    /// Attach an annotation.
    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }
}

impl<V> From<V> for Evaluation<V> {
    fn from(value: V) -> Self {
        Self::new(value)
    }
}

/// Scores nodes for best-first search.
///
/// Returning `Ok(None)` or [`SearchError::EvaluationFailed`] drops the node;
/// any other error is an algorithm failure.
///
/// [`SearchError::EvaluationFailed`]: crate::error::SearchError::EvaluationFailed
pub trait NodeEvaluator<N, A> {
    /// Label type; smaller labels are expanded first.
    type Label: PartialOrd + Clone + Debug;

    /// Evaluate a freshly created node.
    fn evaluate(&self, node: NodeRef<'_, N, A, Self::Label>) -> Result<Option<Evaluation<Self::Label>>>;

    /// Whether every evaluation carries an uncertainty estimate.
    fn annotates_uncertainty(&self) -> bool {
        false
    }
}

impl<N, A, E: NodeEvaluator<N, A> + ?Sized> NodeEvaluator<N, A> for &E {
    type Label = E::Label;

    fn evaluate(&self, node: NodeRef<'_, N, A, Self::Label>) -> Result<Option<Evaluation<Self::Label>>> {
        (**self).evaluate(node)
    }

    fn annotates_uncertainty(&self) -> bool {
        (**self).annotates_uncertainty()
    }
}

impl<N, A, E: NodeEvaluator<N, A> + ?Sized> NodeEvaluator<N, A> for Arc<E> {
    type Label = E::Label;

    fn evaluate(&self, node: NodeRef<'_, N, A, Self::Label>) -> Result<Option<Evaluation<Self::Label>>> {
        (**self).evaluate(node)
    }

    fn annotates_uncertainty(&self) -> bool {
        (**self).annotates_uncertainty()
    }
}

/// Evaluator backed by a closure.
pub struct FnEvaluator<F, V> {
    f: F,
    uncertainty: bool,
    _label: PhantomData<fn() -> V>,
}

impl<F, V> FnEvaluator<F, V> {
    /// Wrap a closure that does not report uncertainty.
    pub fn new(f: F) -> Self {
        Self {
            f,
            uncertainty: false,
            _label: PhantomData,
        }
    }

    /// Wrap a closure that reports uncertainty for every node.
    pub fn with_uncertainty(f: F) -> Self {
        Self {
            f,
            uncertainty: true,
            _label: PhantomData,
        }
    }
}

impl<N, A, V, F> NodeEvaluator<N, A> for FnEvaluator<F, V>
where
    V: PartialOrd + Clone + Debug,
    F: Fn(NodeRef<'_, N, A, V>) -> Result<Option<Evaluation<V>>>,
{
    type Label = V;

    fn evaluate(&self, node: NodeRef<'_, N, A, V>) -> Result<Option<Evaluation<V>>> {
        (self.f)(node)
    }

    fn annotates_uncertainty(&self) -> bool {
        self.uncertainty
    }
}

/// Uniform-cost evaluator: the depth of the node.
#[derive(Debug, Clone, Copy, Default)]
pub struct DepthEvaluator;

impl<N, A> NodeEvaluator<N, A> for DepthEvaluator {
    type Label = f64;

    fn evaluate(&self, node: NodeRef<'_, N, A, f64>) -> Result<Option<Evaluation<f64>>> {
        Ok(Some(Evaluation::new(node.depth() as f64)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SearchError;
    use crate::graph::NodeArena;

    #[test]
    fn closure_evaluator() {
        let mut arena: NodeArena<u32, u32, f64> = NodeArena::new();
        let root = arena.insert_root(4, false);
        let child = arena.insert_child(root, 1, 5, false);

        let evaluator = FnEvaluator::new(|node: NodeRef<'_, u32, u32, f64>| {
            if *node.state() == 4 {
                return Err(SearchError::evaluation("root"));
            }
            Ok(Some(Evaluation::new(f64::from(*node.state()))))
        });
        assert!(!evaluator.annotates_uncertainty());
        assert!(evaluator.evaluate(arena.node_ref(root)).is_err());
        let eval = evaluator.evaluate(arena.node_ref(child)).unwrap().unwrap();
        assert_eq!(eval.value, 5.0);
    }

    #[test]
    fn evaluation_builder() {
        let eval = Evaluation::new(1.5)
            .with_uncertainty(0.25)
            .with_annotation("source", "test");
        assert_eq!(eval.uncertainty, Some(0.25));
        assert_eq!(eval.annotations.get("source"), Some(&Value::from("test")));
    }

    #[test]
    fn depth_evaluator_counts_edges() {
        let mut arena: NodeArena<u32, u32, f64> = NodeArena::new();
        let root = arena.insert_root(0, false);
        let child = arena.insert_child(root, 1, 1, false);
        let eval = DepthEvaluator.evaluate(arena.node_ref(child)).unwrap().unwrap();
        assert_eq!(eval.value, 1.0);
    }
}
