//! In-memory host implementations of [`Tree`] and [`TagService`].
//!
//! These are complete, thread-safe hosts. Mutations apply under a lock and
//! the resulting events are fired after the lock is released, so listeners
//! may query (or mutate) the host re-entrantly.

use hashbrown::{HashMap, HashSet};
use parking_lot::RwLock;

use crate::node::NodeId;
use crate::signal::{Connection, Listener, Signal};
use crate::tags::TagService;
use crate::tree::{Tree, TreeError, TreeEvent};

// ─────────────────────────────────────────────────────────────────────────────
// MemoryTree
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug)]
struct NodeData {
    name: String,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    attached: bool,
}

/// An in-memory tree with a fixed root.
///
/// Removed subtrees are detached permanently: their nodes keep their internal
/// parent links (so ancestry inside the removed subtree still resolves) but
/// can no longer be moved, removed again or given children.
///
/// ```
/// use rosyn_tree::{MemoryTree, Tree};
///
/// let tree = MemoryTree::new();
/// let folder = tree.create("Folder", tree.root()).unwrap();
/// let part = tree.create("Part", folder).unwrap();
///
/// tree.remove(folder).unwrap();
/// assert!(!tree.contains(part));
/// assert_eq!(tree.parent(part), Some(folder));
/// ```
#[derive(Debug)]
pub struct MemoryTree {
    root: NodeId,
    nodes: RwLock<HashMap<NodeId, NodeData>>,
    changed: Signal<TreeEvent>,
}

impl Default for MemoryTree {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTree {
    /// Creates a tree containing only its root.
    #[must_use]
    pub fn new() -> Self {
        let root = NodeId::fresh();
        let mut nodes = HashMap::new();
        nodes.insert(
            root,
            NodeData {
                name: "root".to_string(),
                parent: None,
                children: Vec::new(),
                attached: true,
            },
        );

        Self {
            root,
            nodes: RwLock::new(nodes),
            changed: Signal::new(),
        }
    }

    /// Returns the root node.
    #[must_use]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Creates a node under `parent`.
    ///
    /// # Errors
    ///
    /// Fails if `parent` is unknown or no longer in the tree.
    pub fn create(&self, name: impl Into<String>, parent: NodeId) -> Result<NodeId, TreeError> {
        let mut nodes = self.nodes.write();
        let parent_data = nodes
            .get_mut(&parent)
            .ok_or(TreeError::UnknownNode(parent))?;
        if !parent_data.attached {
            return Err(TreeError::Detached(parent));
        }

        let node = NodeId::fresh();
        parent_data.children.push(node);
        nodes.insert(
            node,
            NodeData {
                name: name.into(),
                parent: Some(parent),
                children: Vec::new(),
                attached: true,
            },
        );

        tracing::trace!(%node, %parent, "node created");
        Ok(node)
    }

    /// Moves `node` (with its subtree) under `new_parent`.
    ///
    /// Moving a node to its current parent is a silent no-op.
    ///
    /// # Errors
    ///
    /// Fails for the root, unknown or detached nodes, and moves that would
    /// create a cycle.
    pub fn reparent(&self, node: NodeId, new_parent: NodeId) -> Result<(), TreeError> {
        let event = {
            let mut nodes = self.nodes.write();
            if node == self.root {
                return Err(TreeError::RootImmovable);
            }

            let data = nodes.get(&node).ok_or(TreeError::UnknownNode(node))?;
            if !data.attached {
                return Err(TreeError::Detached(node));
            }
            let old_parent = data.parent;

            let target = nodes
                .get(&new_parent)
                .ok_or(TreeError::UnknownNode(new_parent))?;
            if !target.attached {
                return Err(TreeError::Detached(new_parent));
            }

            let mut cursor = Some(new_parent);
            while let Some(current) = cursor {
                if current == node {
                    return Err(TreeError::Cycle {
                        node,
                        parent: new_parent,
                    });
                }
                cursor = nodes.get(&current).and_then(|data| data.parent);
            }

            if old_parent == Some(new_parent) {
                return Ok(());
            }

            if let Some(old) = old_parent.and_then(|old| nodes.get_mut(&old)) {
                old.children.retain(|child| *child != node);
            }
            if let Some(target) = nodes.get_mut(&new_parent) {
                target.children.push(node);
            }
            if let Some(data) = nodes.get_mut(&node) {
                data.parent = Some(new_parent);
            }

            TreeEvent::Reparented {
                node,
                old_parent,
                new_parent,
            }
        };

        tracing::trace!(%node, %new_parent, "node reparented");
        self.changed.fire(&event);
        Ok(())
    }

    /// Removes `node` and its whole subtree from the tree.
    ///
    /// # Errors
    ///
    /// Fails for the root and for unknown or already removed nodes.
    pub fn remove(&self, node: NodeId) -> Result<(), TreeError> {
        let event = {
            let mut nodes = self.nodes.write();
            if node == self.root {
                return Err(TreeError::RootImmovable);
            }

            let data = nodes.get_mut(&node).ok_or(TreeError::UnknownNode(node))?;
            if !data.attached {
                return Err(TreeError::Detached(node));
            }
            let parent = data.parent.take();

            if let Some(parent) = parent.and_then(|parent| nodes.get_mut(&parent)) {
                parent.children.retain(|child| *child != node);
            }

            let mut stack = vec![node];
            while let Some(current) = stack.pop() {
                if let Some(data) = nodes.get_mut(&current) {
                    data.attached = false;
                    stack.extend(data.children.iter().copied());
                }
            }

            TreeEvent::Removed { node, parent }
        };

        tracing::trace!(%node, "node removed");
        self.changed.fire(&event);
        Ok(())
    }

    /// Returns the name given to `node` at creation.
    #[must_use]
    pub fn name(&self, node: NodeId) -> Option<String> {
        self.nodes.read().get(&node).map(|data| data.name.clone())
    }

    /// Returns the children of `node`, in insertion order.
    #[must_use]
    pub fn children(&self, node: NodeId) -> Vec<NodeId> {
        self.nodes
            .read()
            .get(&node)
            .map(|data| data.children.clone())
            .unwrap_or_default()
    }

    /// Returns the number of nodes still attached to the tree, root included.
    #[must_use]
    pub fn len(&self) -> usize {
        self.nodes.read().values().filter(|data| data.attached).count()
    }

    /// Always false: the root is never removed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }
}

impl Tree for MemoryTree {
    fn contains(&self, node: NodeId) -> bool {
        self.nodes.read().get(&node).is_some_and(|data| data.attached)
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.nodes.read().get(&node).and_then(|data| data.parent)
    }

    fn children(&self, node: NodeId) -> Vec<NodeId> {
        MemoryTree::children(self, node)
    }

    fn on_changed(&self, listener: Listener<TreeEvent>) -> Connection {
        self.changed.connect_arc(listener)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// MemoryTags
// ─────────────────────────────────────────────────────────────────────────────

type LabelSignals = RwLock<HashMap<String, Signal<NodeId>>>;

/// An in-memory tagging service.
///
/// Tags are independent of any tree: removing a node from a tree does not
/// strip its tags.
#[derive(Debug, Default)]
pub struct MemoryTags {
    labels: RwLock<HashMap<String, HashSet<NodeId>>>,
    added: LabelSignals,
    removed: LabelSignals,
}

impl MemoryTags {
    /// Creates an empty tag service.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attaches `label` to `node`.
    ///
    /// Returns false (and fires nothing) if the node already carried it.
    pub fn add_tag(&self, node: NodeId, label: &str) -> bool {
        let inserted = self
            .labels
            .write()
            .entry(label.to_string())
            .or_default()
            .insert(node);

        if inserted {
            tracing::trace!(%node, label, "tag added");
            Self::fire(&self.added, label, node);
        }
        inserted
    }

    /// Detaches `label` from `node`.
    ///
    /// Returns false (and fires nothing) if the node did not carry it.
    pub fn remove_tag(&self, node: NodeId, label: &str) -> bool {
        let removed = {
            let mut labels = self.labels.write();
            match labels.get_mut(label) {
                Some(nodes) => {
                    let removed = nodes.remove(&node);
                    if nodes.is_empty() {
                        labels.remove(label);
                    }
                    removed
                }
                None => false,
            }
        };

        if removed {
            tracing::trace!(%node, label, "tag removed");
            Self::fire(&self.removed, label, node);
        }
        removed
    }

    /// Returns every label attached to `node`, sorted.
    #[must_use]
    pub fn tags_of(&self, node: NodeId) -> Vec<String> {
        let mut labels: Vec<String> = self
            .labels
            .read()
            .iter()
            .filter(|(_, nodes)| nodes.contains(&node))
            .map(|(label, _)| label.clone())
            .collect();
        labels.sort();
        labels
    }

    fn fire(signals: &LabelSignals, label: &str, node: NodeId) {
        let signal = signals.read().get(label).cloned();
        if let Some(signal) = signal {
            signal.fire(&node);
        }
    }

    fn connect(signals: &LabelSignals, label: &str, listener: Listener<NodeId>) -> Connection {
        let signal = signals
            .write()
            .entry(label.to_string())
            .or_default()
            .clone();
        signal.connect_arc(listener)
    }
}

impl TagService for MemoryTags {
    fn tagged(&self, label: &str) -> Vec<NodeId> {
        let mut nodes: Vec<NodeId> = self
            .labels
            .read()
            .get(label)
            .map(|nodes| nodes.iter().copied().collect())
            .unwrap_or_default();
        nodes.sort();
        nodes
    }

    fn has_tag(&self, node: NodeId, label: &str) -> bool {
        self.labels
            .read()
            .get(label)
            .is_some_and(|nodes| nodes.contains(&node))
    }

    fn on_tag_added(&self, label: &str, listener: Listener<NodeId>) -> Connection {
        Self::connect(&self.added, label, listener)
    }

    fn on_tag_removed(&self, label: &str, listener: Listener<NodeId>) -> Connection {
        Self::connect(&self.removed, label, listener)
    }
}
