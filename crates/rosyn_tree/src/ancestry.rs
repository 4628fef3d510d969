//! Incremental ancestry index over a set of tracked nodes.
//!
//! Answering "which of the nodes I care about live under X" by walking the
//! tree on every removal does not scale with tree size. [`AncestryIndex`]
//! records, for every tracked node, the ancestor path it had when it was
//! tracked (or last refreshed) and keeps the inverse map from each ancestor
//! to the tracked nodes beneath it. Subtree queries then cost only the size of
//! the answer.
//!
//! Paths go stale when a subtree moves; callers must call
//! [`refresh`](AncestryIndex::refresh) for every
//! [`TreeEvent::Reparented`](crate::TreeEvent::Reparented) they observe.
//! Removed subtrees need no refresh: the recorded paths are exactly what is
//! needed to find the tracked nodes that went with them.

use hashbrown::{HashMap, HashSet};

use crate::node::NodeId;
use crate::tree::Tree;

#[derive(Debug)]
struct Tracked {
    /// Ancestors at the time of the last (re)computation, nearest first.
    path: Vec<NodeId>,
    /// Number of outstanding `track` calls.
    refs: usize,
}

/// Reference-counted index of tracked nodes and their ancestors.
#[derive(Debug, Default)]
pub struct AncestryIndex {
    nodes: HashMap<NodeId, Tracked>,
    below: HashMap<NodeId, HashSet<NodeId>>,
}

impl AncestryIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts tracking `node`, or adds a reference if it is already tracked.
    pub fn track(&mut self, tree: &dyn Tree, node: NodeId) {
        if let Some(tracked) = self.nodes.get_mut(&node) {
            tracked.refs += 1;
            return;
        }

        let path = tree.ancestors(node);
        self.link(node, &path);
        self.nodes.insert(node, Tracked { path, refs: 1 });
    }

    /// Drops one reference to `node`.
    ///
    /// Returns true when the last reference was dropped and the node left the
    /// index.
    pub fn untrack(&mut self, node: NodeId) -> bool {
        let Some(tracked) = self.nodes.get_mut(&node) else {
            return false;
        };

        tracked.refs -= 1;
        if tracked.refs > 0 {
            return false;
        }

        if let Some(tracked) = self.nodes.remove(&node) {
            self.unlink(node, &tracked.path);
        }
        true
    }

    /// Returns true if `node` is tracked.
    #[must_use]
    pub fn is_tracked(&self, node: NodeId) -> bool {
        self.nodes.contains_key(&node)
    }

    /// Returns the number of outstanding references to `node`.
    #[must_use]
    pub fn refs(&self, node: NodeId) -> usize {
        self.nodes.get(&node).map_or(0, |tracked| tracked.refs)
    }

    /// Returns the number of tracked nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns true if no node is tracked.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Returns the recorded depth of a tracked node (number of ancestors).
    #[must_use]
    pub fn depth(&self, node: NodeId) -> Option<usize> {
        self.nodes.get(&node).map(|tracked| tracked.path.len())
    }

    /// Returns true if the recorded path of `node` contains `ancestor`.
    #[must_use]
    pub fn is_below(&self, node: NodeId, ancestor: NodeId) -> bool {
        self.below
            .get(&ancestor)
            .is_some_and(|nodes| nodes.contains(&node))
    }

    /// Returns the tracked nodes at or below `node`, deepest first.
    #[must_use]
    pub fn subtree(&self, node: NodeId) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self
            .below
            .get(&node)
            .map(|below| below.iter().copied().collect())
            .unwrap_or_default();

        if self.nodes.contains_key(&node) {
            nodes.push(node);
        }

        self.sort_deepest_first(&mut nodes);
        nodes
    }

    /// Orders `nodes` so that descendants come before their ancestors.
    ///
    /// Ties are broken by node id so the order is deterministic. Untracked
    /// nodes sort last.
    pub fn sort_deepest_first(&self, nodes: &mut [NodeId]) {
        nodes.sort_by(|a, b| {
            self.depth(*b)
                .cmp(&self.depth(*a))
                .then_with(|| a.cmp(b))
        });
    }

    /// Recomputes the paths of every tracked node at or below `moved`.
    ///
    /// Returns the refreshed nodes, deepest first.
    pub fn refresh(&mut self, tree: &dyn Tree, moved: NodeId) -> Vec<NodeId> {
        let mut affected = self.subtree(moved);

        for node in &affected {
            let path = tree.ancestors(*node);
            let old = match self.nodes.get_mut(node) {
                Some(tracked) => core::mem::replace(&mut tracked.path, path.clone()),
                None => continue,
            };
            self.unlink(*node, &old);
            self.link(*node, &path);
        }

        self.sort_deepest_first(&mut affected);
        affected
    }

    fn link(&mut self, node: NodeId, path: &[NodeId]) {
        for ancestor in path {
            self.below.entry(*ancestor).or_default().insert(node);
        }
    }

    fn unlink(&mut self, node: NodeId, path: &[NodeId]) {
        for ancestor in path {
            if let Some(below) = self.below.get_mut(ancestor) {
                below.remove(&node);
                if below.is_empty() {
                    self.below.remove(ancestor);
                }
            }
        }
    }
}
