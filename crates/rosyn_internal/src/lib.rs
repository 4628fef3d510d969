//! # Rosyn Internal Library
//!
//! Re-exports the Rosyn crates for convenience.

/// Layer 1: host tree and tag collaborators.
pub use rosyn_tree;

/// Layer 1: plugin host.
pub use rosyn_app;

/// Layer 1: infrastructure plugins.
pub use rosyn_core_plugins;

/// Layer 2: component lifecycle engine.
pub use rosyn_components;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use rosyn_app::prelude::*;
    pub use rosyn_components::prelude::*;
    pub use rosyn_core_plugins::{TracingFormat, TracingPlugin};
    pub use rosyn_tree::{MemoryTags, MemoryTree, NodeId, TagService, Tree};
}
