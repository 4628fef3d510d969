//! The tagging collaborator interface.

use crate::node::NodeId;
use crate::signal::{Connection, Listener};

/// A service attaching string labels to tree nodes.
///
/// Tag events are delivered synchronously after the tag set changed, and only
/// for actual changes: adding a label a node already carries is silent.
pub trait TagService: Send + Sync + 'static {
    /// Returns every node currently carrying `label`.
    fn tagged(&self, label: &str) -> Vec<NodeId>;

    /// Returns true if `node` carries `label`.
    fn has_tag(&self, node: NodeId, label: &str) -> bool;

    /// Subscribes to `label` being attached to a node.
    fn on_tag_added(&self, label: &str, listener: Listener<NodeId>) -> Connection;

    /// Subscribes to `label` being detached from a node.
    fn on_tag_removed(&self, label: &str, listener: Listener<NodeId>) -> Connection;
}
