//! Implicit state graphs and the nodes discovered in them.
//!
//! A client describes the graph through a [`GraphGenerator`]: the roots, the
//! successors of a state and whether a state is a goal. Search algorithms
//! materialise the part of the graph they visit as [`Node`]s in a
//! [`NodeArena`]. Each node stores its parent as a [`NodeId`], so provenance
//! is tree-shaped even if the underlying graph is not, and path
//! reconstruction is a walk over indices.
//!
//! # Example
//!
//! ```
//! use frontier_core::graph::{GraphGenerator, NodeArena, Successor};
//! use frontier_core::Result;
//!
//! struct Counter;
//!
//! impl GraphGenerator for Counter {
//!     type State = u32;
//!     type Action = &'static str;
//!
//!     fn roots(&self) -> Result<Vec<u32>> {
//!         Ok(vec![0])
//!     }
//!
//!     fn successors(&self, state: &u32) -> Result<Vec<Successor<u32, &'static str>>> {
//!         Ok(vec![Successor::new("inc", state + 1)])
//!     }
//!
//!     fn is_goal(&self, state: &u32) -> Result<bool> {
//!         Ok(*state == 3)
//!     }
//! }
//!
//! let mut arena: NodeArena<u32, &'static str, f64> = NodeArena::new();
//! let root = arena.insert_root(0, false);
//! let child = arena.insert_child(root, "inc", 1, false);
//! assert_eq!(arena.path(child).states, vec![0, 1]);
//! ```

mod generator;
mod node;

pub use generator::{GraphGenerator, Successor};
pub use node::{Node, NodeArena, NodeId, NodeRef, SearchPath};
