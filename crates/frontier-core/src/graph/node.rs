//! Search node representation.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt::Debug;
use std::ops::Index;

/// Index of a node inside a [`NodeArena`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub usize);

impl NodeId {
    /// Position of the node in its arena.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A discovered state together with its provenance.
///
/// Created once when the state is first reached through a successor
/// description. Only the label, uncertainty and annotations change after
/// creation.
#[derive(Debug, Clone)]
pub struct Node<N, A, V> {
    id: NodeId,
    state: N,
    parent: Option<NodeId>,
    action: Option<A>,
    depth: usize,
    label: Option<V>,
    uncertainty: Option<f64>,
    annotations: BTreeMap<String, Value>,
    is_goal: bool,
}

impl<N, A, V> Node<N, A, V> {
    /// Node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The state this node stands for.
    pub fn state(&self) -> &N {
        &self.state
    }

    /// Parent node (None for roots).
    pub fn parent(&self) -> Option<NodeId> {
        self.parent
    }

    /// Action on the edge from the parent.
    pub fn action(&self) -> Option<&A> {
        self.action.as_ref()
    }

    /// Number of edges from the root.
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Evaluation label, once computed.
    pub fn label(&self) -> Option<&V> {
        self.label.as_ref()
    }

    /// Set the evaluation label.
    pub fn set_label(&mut self, label: V) {
        self.label = Some(label);
    }

    /// Uncertainty reported alongside the label.
    pub fn uncertainty(&self) -> Option<f64> {
        self.uncertainty
    }

    /// Set the uncertainty estimate.
    pub fn set_uncertainty(&mut self, uncertainty: f64) {
        self.uncertainty = Some(uncertainty);
    }

    /// Cached goal test result.
    pub fn is_goal(&self) -> bool {
        self.is_goal
    }

    /// Whether this node is a root.
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Annotation stored under `key`.
    pub fn annotation(&self, key: &str) -> Option<&Value> {
        self.annotations.get(key)
    }

    /// All annotations.
    pub fn annotations(&self) -> &BTreeMap<String, Value> {
        &self.annotations
    }

    /// Store an annotation, replacing an earlier value.
    pub fn annotate(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.annotations.insert(key.into(), value.into());
    }
}

/// A root-to-node path: states, the actions between them and the label of
/// the last node.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchPath<N, A, V> {
    /// States from the root to the head (at least one).
    pub states: Vec<N>,
    /// Actions; `actions.len() == states.len() - 1`.
    pub actions: Vec<A>,
    /// Label of the head node.
    pub label: Option<V>,
}

impl<N, A, V> SearchPath<N, A, V> {
    /// A path consisting of a single state.
    pub fn point(state: N) -> Self {
        Self {
            states: vec![state],
            actions: Vec::new(),
            label: None,
        }
    }

    /// First state.
    pub fn root(&self) -> Option<&N> {
        self.states.first()
    }

    /// Last state.
    pub fn head(&self) -> Option<&N> {
        self.states.last()
    }

    /// Number of edges on the path.
    pub fn len(&self) -> usize {
        self.actions.len()
    }

    /// True if the path has no edges.
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Append an edge.
    pub fn extend(&mut self, action: A, state: N) {
        self.actions.push(action);
        self.states.push(state);
    }
}

/// Arena owning every node of one search run.
#[derive(Debug, Clone)]
pub struct NodeArena<N, A, V> {
    nodes: Vec<Node<N, A, V>>,
}

impl<N, A, V> Default for NodeArena<N, A, V> {
    fn default() -> Self {
        Self { nodes: Vec::new() }
    }
}

impl<N, A, V> NodeArena<N, A, V> {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a root node.
    pub fn insert_root(&mut self, state: N, is_goal: bool) -> NodeId {
        self.push(state, None, None, 0, is_goal)
    }

    /// Add a child of `parent` reached via `action`.
    pub fn insert_child(&mut self, parent: NodeId, action: A, state: N, is_goal: bool) -> NodeId {
        let depth = self.nodes[parent.0].depth + 1;
        self.push(state, Some(parent), Some(action), depth, is_goal)
    }

    fn push(
        &mut self,
        state: N,
        parent: Option<NodeId>,
        action: Option<A>,
        depth: usize,
        is_goal: bool,
    ) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node {
            id,
            state,
            parent,
            action,
            depth,
            label: None,
            uncertainty: None,
            annotations: BTreeMap::new(),
            is_goal,
        });
        id
    }

    /// Remove `id` if it is the most recently created node.
    ///
    /// Ids handed out earlier stay valid; `id` itself is reused by the next
    /// insertion.
    pub fn retract(&mut self, id: NodeId) -> Option<Node<N, A, V>> {
        if id.0 + 1 == self.nodes.len() {
            self.nodes.pop()
        } else {
            None
        }
    }

    /// Get a node by id.
    pub fn get(&self, id: NodeId) -> Option<&Node<N, A, V>> {
        self.nodes.get(id.0)
    }

    /// Get a mutable node by id.
    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<N, A, V>> {
        self.nodes.get_mut(id.0)
    }

    /// Borrow a node together with the arena for path queries.
    pub fn node_ref(&self, id: NodeId) -> NodeRef<'_, N, A, V> {
        NodeRef { arena: self, id }
    }

    /// Number of nodes created.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// True if no node was created yet.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Iterate over all nodes in creation order.
    pub fn iter(&self) -> impl Iterator<Item = &Node<N, A, V>> {
        self.nodes.iter()
    }

    /// Ids from the root down to `id`.
    pub fn path_ids(&self, id: NodeId) -> Vec<NodeId> {
        let mut ids = Vec::with_capacity(self.nodes[id.0].depth + 1);
        let mut current = Some(id);
        while let Some(node_id) = current {
            ids.push(node_id);
            current = self.nodes[node_id.0].parent;
        }
        ids.reverse();
        ids
    }

    /// Whether `state` occurs on the path from the root to `id` (inclusive).
    pub fn is_on_path(&self, id: NodeId, state: &N) -> bool
    where
        N: PartialEq,
    {
        let mut current = Some(id);
        while let Some(node_id) = current {
            let node = &self.nodes[node_id.0];
            if node.state == *state {
                return true;
            }
            current = node.parent;
        }
        false
    }
}

impl<N: Clone, A: Clone, V: Clone> NodeArena<N, A, V> {
    /// Reconstruct the root-to-node path of `id`.
    pub fn path(&self, id: NodeId) -> SearchPath<N, A, V> {
        let ids = self.path_ids(id);
        let mut states = Vec::with_capacity(ids.len());
        let mut actions = Vec::with_capacity(ids.len().saturating_sub(1));
        for node_id in ids {
            let node = &self.nodes[node_id.0];
            states.push(node.state.clone());
            if let Some(action) = &node.action {
                actions.push(action.clone());
            }
        }
        SearchPath {
            states,
            actions,
            label: self.nodes[id.0].label.clone(),
        }
    }
}

impl<N: Debug, A, V> NodeArena<N, A, V> {
    /// Debug rendering of the root-to-node states, used in error reports.
    pub fn describe_path(&self, id: NodeId) -> Vec<String> {
        self.path_ids(id)
            .into_iter()
            .map(|node_id| format!("{:?}", self.nodes[node_id.0].state))
            .collect()
    }
}

impl<N, A, V> Index<NodeId> for NodeArena<N, A, V> {
    type Output = Node<N, A, V>;

    fn index(&self, id: NodeId) -> &Self::Output {
        &self.nodes[id.0]
    }
}

/// Read-only view of a node that can walk towards the root.
pub struct NodeRef<'a, N, A, V> {
    arena: &'a NodeArena<N, A, V>,
    id: NodeId,
}

impl<N, A, V> Clone for NodeRef<'_, N, A, V> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<N, A, V> Copy for NodeRef<'_, N, A, V> {}

impl<'a, N, A, V> NodeRef<'a, N, A, V> {
    /// Node id.
    pub fn id(&self) -> NodeId {
        self.id
    }

    /// The underlying node.
    pub fn node(&self) -> &'a Node<N, A, V> {
        &self.arena[self.id]
    }

    /// The node's state.
    pub fn state(&self) -> &'a N {
        self.node().state()
    }

    /// Action on the edge from the parent.
    pub fn action(&self) -> Option<&'a A> {
        self.node().action()
    }

    /// Depth of the node.
    pub fn depth(&self) -> usize {
        self.node().depth()
    }

    /// Cached goal flag.
    pub fn is_goal(&self) -> bool {
        self.node().is_goal()
    }

    /// The parent, if any.
    pub fn parent(&self) -> Option<NodeRef<'a, N, A, V>> {
        self.node().parent().map(|id| NodeRef {
            arena: self.arena,
            id,
        })
    }

    /// States from the root to this node.
    pub fn states(&self) -> Vec<&'a N> {
        self.arena
            .path_ids(self.id)
            .into_iter()
            .map(|id| self.arena[id].state())
            .collect()
    }
}

impl<N: Clone, A: Clone, V: Clone> NodeRef<'_, N, A, V> {
    /// Owned root-to-node path.
    pub fn path(&self) -> SearchPath<N, A, V> {
        self.arena.path(self.id)
    }
}
