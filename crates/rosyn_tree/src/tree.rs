//! The tree collaborator interface.

use crate::node::NodeId;
use crate::signal::{Connection, Listener};

/// A structural change reported by a [`Tree`].
///
/// Events are delivered synchronously, after the tree has applied the change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TreeEvent {
    /// `node` (and its whole subtree) moved under `new_parent`.
    Reparented {
        /// The node that moved.
        node: NodeId,
        /// The parent it had before the move.
        old_parent: Option<NodeId>,
        /// The parent it has now.
        new_parent: NodeId,
    },
    /// `node` and all of its descendants left the tree for good.
    ///
    /// Emitted once, for the root of the removed subtree.
    Removed {
        /// The root of the removed subtree.
        node: NodeId,
        /// The parent it had before removal.
        parent: Option<NodeId>,
    },
}

impl TreeEvent {
    /// Returns the node the event is about.
    #[must_use]
    pub fn node(&self) -> NodeId {
        match self {
            TreeEvent::Reparented { node, .. } | TreeEvent::Removed { node, .. } => *node,
        }
    }
}

/// Errors produced by tree mutations on a host tree.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TreeError {
    /// The node was never part of this tree.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// The node has been removed from the tree.
    #[error("node is no longer in the tree: {0}")]
    Detached(NodeId),

    /// The move would parent a node under itself or one of its descendants.
    #[error("cannot parent {node} under its own descendant {parent}")]
    Cycle {
        /// The node being moved.
        node: NodeId,
        /// The requested parent.
        parent: NodeId,
    },

    /// The tree root cannot be moved or removed.
    #[error("the tree root cannot be moved or removed")]
    RootImmovable,
}

/// A live hierarchical tree of nodes.
///
/// Rosyn only needs identity, ancestry and change notifications. Nodes that
/// were removed must keep answering [`parent`](Tree::parent) for the links
/// inside their removed subtree, so that consumers can still relate the
/// nodes of a subtree after it left the tree.
pub trait Tree: Send + Sync + 'static {
    /// Returns true while `node` is attached to the tree.
    fn contains(&self, node: NodeId) -> bool;

    /// Returns the parent of `node`, if any.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Returns the ancestors of `node`, nearest first.
    fn ancestors(&self, node: NodeId) -> Vec<NodeId> {
        let mut ancestors = Vec::new();
        let mut cursor = self.parent(node);
        while let Some(current) = cursor {
            ancestors.push(current);
            cursor = self.parent(current);
        }
        ancestors
    }

    /// Returns the children of `node`, in order.
    fn children(&self, node: NodeId) -> Vec<NodeId>;

    /// Returns every strict descendant of `node`, parents before children.
    fn descendants(&self, node: NodeId) -> Vec<NodeId> {
        let mut found = Vec::new();
        let mut stack = self.children(node);
        stack.reverse();
        while let Some(current) = stack.pop() {
            found.push(current);
            let mut children = self.children(current);
            children.reverse();
            stack.extend(children);
        }
        found
    }

    /// Returns true if `ancestor` is a strict ancestor of `node`.
    fn is_ancestor_of(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cursor = self.parent(node);
        while let Some(current) = cursor {
            if current == ancestor {
                return true;
            }
            cursor = self.parent(current);
        }
        false
    }

    /// Subscribes to structural changes.
    fn on_changed(&self, listener: Listener<TreeEvent>) -> Connection;
}
