//! Host-side collaborators for Rosyn (Layer 1).
//!
//! Rosyn never owns the tree it manages components for. This crate defines the
//! two interfaces the engine consumes and the small amount of shared plumbing
//! they need:
//!
//! - [`Tree`] - node identity, parent/ancestor queries and change events
//! - [`TagService`] - string labels attached to nodes, with add/remove events
//! - [`Signal`] / [`Connection`] - synchronous listener lists with RAII disconnects
//! - [`AncestryIndex`] - incremental ancestor → descendant index over tracked nodes
//!
//! It also ships [`MemoryTree`] and [`MemoryTags`], complete in-process hosts
//! used by tests, demos and embedders without a tree of their own.
//!
//! # Example
//!
//! ```
//! use rosyn_tree::{MemoryTags, MemoryTree, TagService, Tree};
//!
//! let tree = MemoryTree::new();
//! let workspace = tree.create("Workspace", tree.root()).unwrap();
//! let zombie = tree.create("Zombie", workspace).unwrap();
//!
//! let tags = MemoryTags::new();
//! tags.add_tag(zombie, "Damageable");
//!
//! assert!(tree.is_ancestor_of(workspace, zombie));
//! assert_eq!(tags.tagged("Damageable"), vec![zombie]);
//! ```

mod ancestry;
mod memory;
mod node;
mod signal;
mod tags;
mod tree;

pub use ancestry::AncestryIndex;
pub use memory::{MemoryTags, MemoryTree};
pub use node::NodeId;
pub use signal::{Connection, Listener, Signal};
pub use tags::TagService;
pub use tree::{Tree, TreeError, TreeEvent};
