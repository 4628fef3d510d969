//! Error types for the components engine.

use core::time::Duration;

use rosyn_tree::NodeId;

use crate::component::HookError;

/// Errors surfaced synchronously by registration and lookups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ComponentError {
    /// The value is neither a component type nor a component instance.
    #[error("value is neither a component type nor a component instance")]
    InvalidComponentReference,

    /// A component with the same canonical name is already registered for
    /// the label under the root.
    #[error("component `{name}` is already registered for label `{label}` under {root}")]
    DuplicateComponentType {
        /// Canonical name of the duplicated component.
        name: &'static str,
        /// The registration label.
        label: String,
        /// The registration root.
        root: NodeId,
    },

    /// The registration root is not attached to the tree.
    #[error("registration root {0} is not in the tree")]
    RootDetached(NodeId),

    /// No tokio runtime is configured or current.
    #[error(
        "no tokio runtime available: create the coordinator inside a runtime \
         or configure one with `RosynConfig::with_runtime`"
    )]
    NoRuntime,

    /// The coordinator has shut down.
    #[error("the component coordinator has shut down")]
    Shutdown,
}

/// Errors surfaced to the caller of a wait.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WaitError {
    /// The deadline elapsed first.
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The node (or one of its ancestors) was removed from the tree.
    #[error("{0} was removed from the tree")]
    TargetDeparented(NodeId),

    /// The awaited instance began teardown before it became ready.
    #[error("component `{name}` on {node} was torn down before it became ready")]
    InitAborted {
        /// Canonical component name.
        name: &'static str,
        /// The node the instance lived on.
        node: NodeId,
    },

    /// The coordinator shut down while the wait was pending.
    #[error("the component coordinator shut down")]
    Shutdown,
}

/// A lifecycle hook failure, isolated to one instance.
///
/// These never reach unrelated callers; they are handed to the configured
/// [`DiagnosticSink`](crate::diagnostics::DiagnosticSink).
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The constructor panicked or `initial` failed or panicked.
    #[error("component `{component}` failed to initialize on {node}: {source}")]
    InitializationFailure {
        /// Canonical component name.
        component: &'static str,
        /// The owning node.
        node: NodeId,
        /// What the hook raised.
        source: HookError,
    },

    /// `destroy` failed or panicked. The instance was removed regardless.
    #[error("component `{component}` failed to destroy on {node}: {source}")]
    DestructionFailure {
        /// Canonical component name.
        component: &'static str,
        /// The owning node.
        node: NodeId,
        /// What the hook raised.
        source: HookError,
    },
}

impl LifecycleError {
    /// Returns the canonical name of the failing component.
    #[must_use]
    pub fn component(&self) -> &'static str {
        match self {
            LifecycleError::InitializationFailure { component, .. }
            | LifecycleError::DestructionFailure { component, .. } => component,
        }
    }

    /// Returns the node of the failing instance.
    #[must_use]
    pub fn node(&self) -> NodeId {
        match self {
            LifecycleError::InitializationFailure { node, .. }
            | LifecycleError::DestructionFailure { node, .. } => *node,
        }
    }

    /// Returns true for [`LifecycleError::InitializationFailure`].
    #[must_use]
    pub fn is_initialization(&self) -> bool {
        matches!(self, LifecycleError::InitializationFailure { .. })
    }
}
