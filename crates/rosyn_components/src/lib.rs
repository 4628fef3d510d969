//! Tag-driven component lifecycle engine for Rosyn (Layer 2).
//!
//! Game code registers component types against a tag label and a root node.
//! Whenever a node below that root carries the label, the engine constructs
//! each registered component for it, runs its asynchronous `initial` hook,
//! and tears it down again (`destroy`) once the node loses the tag, leaves
//! the subtree or is removed.
//!
//! - [`Component`] / [`ComponentType`] - behavior and its runtime identity
//! - [`ComponentInstance`] / [`LifecycleState`] - one live materialization
//! - [`Rosyn`] - the coordinator context: registration, lookups and waits
//! - [`RosynConfig`] - timeouts, diagnostics and the runtime for `initial`
//! - [`ComponentsPlugin`] - publishes a [`Rosyn`] on a `rosyn_app` [`App`](rosyn_app::app::App)
//!
//! # Lifecycle
//!
//! ```text
//! Constructed ──► Initializing ──► Ready
//!      │               │             │
//!      └───────────────┴─────────────┴──► Destroying ──► Destroyed
//! ```
//!
//! At most one instance exists per (node, type) at any time. Teardowns caused
//! by one tree change run deepest-first, so a descendant's `destroy` finishes
//! before its ancestor's starts. Hook failures never propagate to unrelated
//! callers; they are handed to the configured [`DiagnosticSink`].
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicU32, Ordering};
//! use std::time::Duration;
//! use rosyn_components::prelude::*;
//! use rosyn_tree::{MemoryTags, MemoryTree, NodeId};
//!
//! struct Health {
//!     points: AtomicU32,
//! }
//!
//! #[async_trait::async_trait]
//! impl Component for Health {
//!     const NAME: &'static str = "Health";
//!
//!     fn construct(_node: NodeId) -> Self {
//!         Self { points: AtomicU32::new(100) }
//!     }
//!
//!     async fn initial(&self) -> Result<(), HookError> {
//!         self.points.store(150, Ordering::SeqCst);
//!         Ok(())
//!     }
//! }
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let tree = Arc::new(MemoryTree::new());
//! let tags = Arc::new(MemoryTags::new());
//! let workspace = tree.create("Workspace", tree.root()).unwrap();
//! let zombie = tree.create("Zombie", workspace).unwrap();
//!
//! let rosyn = Rosyn::new(tree.clone(), tags.clone()).unwrap();
//! rosyn.register("Damageable", &[ComponentType::of::<Health>()], workspace).unwrap();
//!
//! tags.add_tag(zombie, "Damageable");
//! rosyn
//!     .await_component_init(zombie, &ComponentType::of::<Health>(), Some(Duration::from_secs(1)))
//!     .await
//!     .unwrap();
//!
//! let health = rosyn.get::<Health>(zombie).unwrap();
//! assert_eq!(health.points.load(Ordering::SeqCst), 150);
//! # }
//! ```

mod broker;
mod component;
mod config;
mod context;
mod coordinator;
mod diagnostics;
mod error;
mod plugin;
mod registry;
mod table;
mod watcher;

pub use component::{
    Component, ComponentInstance, ComponentType, ErasedComponent, HookError, InstanceId,
    LifecycleState,
};
pub use config::{DEFAULT_YIELD_WARNING, RosynConfig};
pub use context::Rosyn;
pub use diagnostics::{DiagnosticSink, MemorySink, TracingSink};
pub use error::{ComponentError, LifecycleError, WaitError};
pub use plugin::ComponentsPlugin;
pub use registry::get_component_name;

/// Re-export the types most programs need.
pub mod prelude {
    pub use crate::{
        Component, ComponentError, ComponentInstance, ComponentType, ComponentsPlugin, HookError,
        LifecycleState, Rosyn, RosynConfig, WaitError,
    };
}
