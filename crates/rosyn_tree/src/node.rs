//! Node handles.

use core::fmt;
use core::sync::atomic::{AtomicU64, Ordering};

/// Process-wide allocator for [`NodeId::fresh`].
static NEXT_NODE: AtomicU64 = AtomicU64::new(1);

/// Opaque handle to a node of a host tree.
///
/// A `NodeId` is only an identifier. Holding one never keeps the node alive,
/// and it stays usable as a map key after the node has left the tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u64);

impl NodeId {
    /// Wraps a raw id assigned by a host tree.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Allocates an id that is unique across every tree in the process.
    #[must_use]
    pub fn fresh() -> Self {
        Self(NEXT_NODE.fetch_add(1, Ordering::Relaxed))
    }

    /// Returns the raw id value.
    #[must_use]
    pub const fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_ids_are_unique() {
        let a = NodeId::fresh();
        let b = NodeId::fresh();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
    }

    #[test]
    fn display_includes_raw_value() {
        assert_eq!(NodeId::new(42).to_string(), "node#42");
    }
}
