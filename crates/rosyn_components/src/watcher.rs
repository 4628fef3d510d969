//! Live view of the nodes carrying one label under one root.

use hashbrown::HashSet;
use rosyn_tree::{Connection, NodeId, TagService, Tree};

/// A membership transition reported by a [`TagWatcher`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WatchEvent {
    Added(NodeId),
    Removed(NodeId),
}

/// Tracks the strict descendants of `root` that carry `label`.
///
/// The watcher never reports a node as added twice without an intervening
/// removal. It does not subscribe on its own: the owner connects to the tag
/// service and hands the [`Connection`]s over so they live exactly as long as
/// the watcher.
pub(crate) struct TagWatcher {
    label: String,
    root: NodeId,
    members: HashSet<NodeId>,
    connections: Vec<Connection>,
}

impl TagWatcher {
    pub(crate) fn new(label: impl Into<String>, root: NodeId, connections: Vec<Connection>) -> Self {
        Self {
            label: label.into(),
            root,
            members: HashSet::new(),
            connections,
        }
    }

    pub(crate) fn label(&self) -> &str {
        &self.label
    }

    pub(crate) fn root(&self) -> NodeId {
        self.root
    }

    #[cfg(test)]
    pub(crate) fn members(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.members.iter().copied()
    }

    #[cfg(test)]
    pub(crate) fn is_member(&self, node: NodeId) -> bool {
        self.members.contains(&node)
    }

    fn in_scope(&self, tree: &dyn Tree, node: NodeId) -> bool {
        node != self.root && tree.contains(node) && tree.is_ancestor_of(self.root, node)
    }

    /// Initial full scan. Returns every in-scope tagged node not yet a member.
    pub(crate) fn scan(&mut self, tree: &dyn Tree, tags: &dyn TagService) -> Vec<NodeId> {
        let candidates: Vec<NodeId> = tags
            .tagged(&self.label)
            .into_iter()
            .filter(|node| self.in_scope(tree, *node))
            .collect();

        candidates
            .into_iter()
            .filter(|node| self.members.insert(*node))
            .collect()
    }

    pub(crate) fn tag_added(&mut self, tree: &dyn Tree, node: NodeId) -> Option<WatchEvent> {
        (self.in_scope(tree, node) && self.members.insert(node)).then_some(WatchEvent::Added(node))
    }

    pub(crate) fn tag_removed(&mut self, node: NodeId) -> Option<WatchEvent> {
        self.members
            .remove(&node)
            .then_some(WatchEvent::Removed(node))
    }

    /// Re-evaluates membership after `moved` changed parent.
    ///
    /// `refreshed` holds the tracked nodes at or below `moved`; members are
    /// always tracked, so leavers are found there. Newcomers can only exist
    /// when `moved` now lies in scope, and are found by walking its subtree.
    pub(crate) fn reparented(
        &mut self,
        tree: &dyn Tree,
        tags: &dyn TagService,
        moved: NodeId,
        refreshed: &[NodeId],
    ) -> Vec<WatchEvent> {
        let left: Vec<NodeId> = refreshed
            .iter()
            .copied()
            .filter(|node| self.members.contains(node) && !self.in_scope(tree, *node))
            .collect();
        for node in &left {
            self.members.remove(node);
        }
        let mut events: Vec<WatchEvent> = left.into_iter().map(WatchEvent::Removed).collect();

        if !self.in_scope(tree, moved) {
            return events;
        }
        for node in core::iter::once(moved).chain(tree.descendants(moved)) {
            if tags.has_tag(node, &self.label) && self.members.insert(node) {
                events.push(WatchEvent::Added(node));
            }
        }
        events
    }

    /// Drops the members among `affected`, the tracked nodes of a subtree
    /// that left the tree.
    pub(crate) fn removed(&mut self, affected: &[NodeId]) -> Vec<NodeId> {
        affected
            .iter()
            .copied()
            .filter(|node| self.members.remove(node))
            .collect()
    }

    /// Empties the member set, returning the former members.
    pub(crate) fn clear(&mut self) -> Vec<NodeId> {
        self.members.drain().collect()
    }

    /// Detaches the tag service subscriptions so they can be dropped outside
    /// of any lock.
    pub(crate) fn take_connections(&mut self) -> Vec<Connection> {
        core::mem::take(&mut self.connections)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rosyn_tree::{AncestryIndex, MemoryTags, MemoryTree};

    struct Fixture {
        tree: MemoryTree,
        tags: MemoryTags,
        root: NodeId,
        outside: NodeId,
    }

    fn fixture() -> Fixture {
        let tree = MemoryTree::new();
        let root = tree.create("Workspace", tree.root()).unwrap();
        let outside = tree.create("Storage", tree.root()).unwrap();
        Fixture {
            tree,
            tags: MemoryTags::new(),
            root,
            outside,
        }
    }

    #[test]
    fn scan_reports_only_strict_descendants() {
        let f = fixture();
        let inside = f.tree.create("Zombie", f.root).unwrap();
        let elsewhere = f.tree.create("Crate", f.outside).unwrap();
        for node in [inside, elsewhere, f.root] {
            f.tags.add_tag(node, "Damageable");
        }

        let mut watcher = TagWatcher::new("Damageable", f.root, Vec::new());
        assert_eq!(watcher.scan(&f.tree, &f.tags), vec![inside]);
        assert!(watcher.scan(&f.tree, &f.tags).is_empty());
    }

    #[test]
    fn added_is_never_reported_twice() {
        let f = fixture();
        let node = f.tree.create("Zombie", f.root).unwrap();
        let mut watcher = TagWatcher::new("Damageable", f.root, Vec::new());

        assert_eq!(
            watcher.tag_added(&f.tree, node),
            Some(WatchEvent::Added(node))
        );
        assert_eq!(watcher.tag_added(&f.tree, node), None);
        assert_eq!(watcher.tag_removed(node), Some(WatchEvent::Removed(node)));
        assert_eq!(watcher.tag_removed(node), None);
        assert_eq!(
            watcher.tag_added(&f.tree, node),
            Some(WatchEvent::Added(node))
        );
    }

    #[test]
    fn reparent_moves_members_in_and_out() {
        let f = fixture();
        let folder = f.tree.create("Folder", f.root).unwrap();
        let inside = f.tree.create("Zombie", folder).unwrap();
        let stranger = f.tree.create("Crate", f.outside).unwrap();
        f.tags.add_tag(inside, "Damageable");
        f.tags.add_tag(stranger, "Damageable");

        let mut watcher = TagWatcher::new("Damageable", f.root, Vec::new());
        let mut index = AncestryIndex::new();
        for node in watcher.scan(&f.tree, &f.tags) {
            index.track(&f.tree, node);
        }

        f.tree.reparent(folder, f.outside).unwrap();
        let refreshed = index.refresh(&f.tree, folder);
        assert_eq!(
            watcher.reparented(&f.tree, &f.tags, folder, &refreshed),
            vec![WatchEvent::Removed(inside)]
        );

        f.tree.reparent(stranger, f.root).unwrap();
        let refreshed = index.refresh(&f.tree, stranger);
        assert_eq!(
            watcher.reparented(&f.tree, &f.tags, stranger, &refreshed),
            vec![WatchEvent::Added(stranger)]
        );
        assert!(watcher.is_member(stranger));
        assert!(!watcher.is_member(inside));
    }

    #[test]
    fn removal_drops_the_whole_subtree() {
        let f = fixture();
        let folder = f.tree.create("Folder", f.root).unwrap();
        let a = f.tree.create("A", folder).unwrap();
        let b = f.tree.create("B", a).unwrap();
        let keep = f.tree.create("Keep", f.root).unwrap();
        for node in [a, b, keep] {
            f.tags.add_tag(node, "Damageable");
        }

        let mut watcher = TagWatcher::new("Damageable", f.root, Vec::new());
        let mut index = AncestryIndex::new();
        for node in watcher.scan(&f.tree, &f.tags) {
            index.track(&f.tree, node);
        }
        f.tree.remove(folder).unwrap();

        let mut gone = watcher.removed(&index.subtree(folder));
        gone.sort();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(gone, expected);
        assert_eq!(watcher.members().collect::<Vec<_>>(), vec![keep]);
    }
}
