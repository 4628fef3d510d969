//! Component behavior, type identity and live instances.
//!
//! A [`Component`] is the behavior attached to a tagged node. Its type is
//! identified at runtime by a [`ComponentType`], and every materialization on
//! a node is a [`ComponentInstance`] with its own [`LifecycleState`].

use core::any::TypeId;
use core::fmt;
use core::hash::{Hash, Hasher};
use std::sync::Arc;

use async_trait::async_trait;
use downcast_rs::{DowncastSync, impl_downcast};
use rosyn_tree::NodeId;
use tokio::sync::watch;

/// Error returned by a failing lifecycle hook.
pub type HookError = Box<dyn std::error::Error + Send + Sync>;

// ─────────────────────────────────────────────────────────────────────────────
// Component Trait
// ─────────────────────────────────────────────────────────────────────────────

/// Behavior bound to a tagged node.
///
/// The coordinator constructs the component synchronously when the node
/// enters the watched set, then runs [`initial`](Component::initial) as a
/// task. [`destroy`](Component::destroy) runs exactly once when the instance
/// is torn down, including after a failed `initial`.
///
/// # Example
///
/// ```
/// use rosyn_components::{Component, HookError};
/// use rosyn_tree::NodeId;
///
/// struct Health {
///     node: NodeId,
/// }
///
/// #[async_trait::async_trait]
/// impl Component for Health {
///     const NAME: &'static str = "Health";
///
///     fn construct(node: NodeId) -> Self {
///         Self { node }
///     }
///
///     async fn initial(&self) -> Result<(), HookError> {
///         tracing::info!(node = %self.node, "health online");
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Component: Sized + Send + Sync + 'static {
    /// Canonical name, unique per (label, root) registration.
    const NAME: &'static str;

    /// Builds the component for `node`.
    fn construct(node: NodeId) -> Self;

    /// Asynchronous initialization. The instance becomes `Ready` when this
    /// returns `Ok`.
    async fn initial(&self) -> Result<(), HookError> {
        Ok(())
    }

    /// Synchronous teardown.
    fn destroy(&self) -> Result<(), HookError> {
        Ok(())
    }
}

/// Object-safe view of a [`Component`], used for storage and downcasting.
#[async_trait]
pub trait ErasedComponent: DowncastSync {
    /// Returns [`Component::NAME`].
    fn component_name(&self) -> &'static str;

    /// Runs [`Component::initial`].
    async fn run_initial(&self) -> Result<(), HookError>;

    /// Runs [`Component::destroy`].
    fn run_destroy(&self) -> Result<(), HookError>;
}

impl_downcast!(sync ErasedComponent);

#[async_trait]
impl<C: Component> ErasedComponent for C {
    fn component_name(&self) -> &'static str {
        C::NAME
    }

    async fn run_initial(&self) -> Result<(), HookError> {
        Component::initial(self).await
    }

    fn run_destroy(&self) -> Result<(), HookError> {
        Component::destroy(self)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ComponentType
// ─────────────────────────────────────────────────────────────────────────────

/// Runtime identity of a component kind.
///
/// Equality and hashing use the Rust [`TypeId`], so every
/// `ComponentType::of::<C>()` for the same `C` is the same key.
#[derive(Clone, Copy)]
pub struct ComponentType {
    type_id: TypeId,
    name: &'static str,
    construct: fn(NodeId) -> Arc<dyn ErasedComponent>,
}

impl ComponentType {
    /// Returns the identity of component type `C`.
    #[must_use]
    pub fn of<C: Component>() -> Self {
        Self {
            type_id: TypeId::of::<C>(),
            name: C::NAME,
            construct: construct_erased::<C>,
        }
    }

    /// Returns the canonical name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the underlying `TypeId`.
    #[must_use]
    pub fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Returns true if this is the identity of `C`.
    #[must_use]
    pub fn is<C: Component>(&self) -> bool {
        self.type_id == TypeId::of::<C>()
    }

    pub(crate) fn construct(&self, node: NodeId) -> Arc<dyn ErasedComponent> {
        (self.construct)(node)
    }
}

fn construct_erased<C: Component>(node: NodeId) -> Arc<dyn ErasedComponent> {
    Arc::new(C::construct(node))
}

impl PartialEq for ComponentType {
    fn eq(&self, other: &Self) -> bool {
        self.type_id == other.type_id
    }
}

impl Eq for ComponentType {}

impl Hash for ComponentType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ComponentType").field(&self.name).finish()
    }
}

impl fmt::Display for ComponentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// LifecycleState
// ─────────────────────────────────────────────────────────────────────────────

/// Lifecycle of a [`ComponentInstance`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleState {
    /// The constructor returned.
    Constructed,
    /// `initial` is running.
    Initializing,
    /// `initial` completed successfully.
    Ready,
    /// Teardown began; `destroy` is about to run or running.
    Destroying,
    /// `destroy` returned and the instance left the table.
    Destroyed,
}

impl LifecycleState {
    /// Returns true if `self → next` is a legal transition.
    #[must_use]
    pub fn can_transition_to(self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        matches!(
            (self, next),
            (Constructed, Initializing)
                | (Constructed, Destroying)
                | (Initializing, Ready)
                | (Initializing, Destroying)
                | (Ready, Destroying)
                | (Destroying, Destroyed)
        )
    }

    /// Returns true for the states visible through queries.
    #[must_use]
    pub fn is_live(self) -> bool {
        matches!(
            self,
            LifecycleState::Constructed | LifecycleState::Initializing | LifecycleState::Ready
        )
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LifecycleState::Constructed => "constructed",
            LifecycleState::Initializing => "initializing",
            LifecycleState::Ready => "ready",
            LifecycleState::Destroying => "destroying",
            LifecycleState::Destroyed => "destroyed",
        };
        f.write_str(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// ComponentInstance
// ─────────────────────────────────────────────────────────────────────────────

/// Monotonic instance generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub(crate) u64);

impl fmt::Display for InstanceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "instance#{}", self.0)
    }
}

/// A live component on a node.
pub struct ComponentInstance {
    id: InstanceId,
    node: NodeId,
    component_type: ComponentType,
    value: Arc<dyn ErasedComponent>,
    state: watch::Sender<LifecycleState>,
}

impl ComponentInstance {
    pub(crate) fn new(
        id: InstanceId,
        node: NodeId,
        component_type: ComponentType,
        value: Arc<dyn ErasedComponent>,
    ) -> Self {
        let (state, _) = watch::channel(LifecycleState::Constructed);
        Self {
            id,
            node,
            component_type,
            value,
            state,
        }
    }

    /// Returns the instance generation.
    #[must_use]
    pub fn id(&self) -> InstanceId {
        self.id
    }

    /// Returns the owning node.
    #[must_use]
    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Returns the component type.
    #[must_use]
    pub fn component_type(&self) -> ComponentType {
        self.component_type
    }

    /// Returns the canonical component name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.component_type.name()
    }

    /// Returns the current lifecycle state.
    #[must_use]
    pub fn state(&self) -> LifecycleState {
        *self.state.borrow()
    }

    /// Subscribes to lifecycle state changes.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<LifecycleState> {
        self.state.subscribe()
    }

    /// Returns the erased component value.
    #[must_use]
    pub fn value(&self) -> &Arc<dyn ErasedComponent> {
        &self.value
    }

    /// Returns the component as `C`, if it is one.
    #[must_use]
    pub fn downcast<C: Component>(&self) -> Option<&C> {
        self.value.downcast_ref::<C>()
    }

    /// Returns a shared handle to the component as `C`, if it is one.
    #[must_use]
    pub fn downcast_arc<C: Component>(&self) -> Option<Arc<C>> {
        Arc::clone(&self.value).downcast_arc::<C>().ok()
    }

    pub(crate) fn set_state(&self, next: LifecycleState) {
        self.state.send_replace(next);
    }
}

impl fmt::Debug for ComponentInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ComponentInstance")
            .field("id", &self.id)
            .field("node", &self.node)
            .field("component", &self.component_type.name())
            .field("state", &self.state())
            .finish()
    }
}
