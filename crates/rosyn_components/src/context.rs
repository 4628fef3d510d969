//! The coordinator context handed to game code.
//!
//! [`Rosyn`] is a cheap, cloneable handle. Every clone talks to the same
//! coordinator; independent `Rosyn` values over independent trees share
//! nothing.

use core::any::Any;
use core::fmt;
use core::time::Duration;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use rosyn_app::api::API;
use rosyn_tree::{NodeId, TagService, Tree};
use tokio::sync::oneshot;

use crate::broker::{WaitFor, WaitResult, WaiterId};
use crate::component::{Component, ComponentInstance, ComponentType};
use crate::config::RosynConfig;
use crate::coordinator::{Coordinator, WaitStart};
use crate::error::{ComponentError, WaitError};

/// Handle to a component lifecycle coordinator.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use rosyn_components::{Component, ComponentType, Rosyn};
/// use rosyn_tree::{MemoryTags, MemoryTree, NodeId};
///
/// struct Health;
///
/// impl Component for Health {
///     const NAME: &'static str = "Health";
///
///     fn construct(_node: NodeId) -> Self {
///         Health
///     }
/// }
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let tree = Arc::new(MemoryTree::new());
/// let tags = Arc::new(MemoryTags::new());
/// let workspace = tree.create("Workspace", tree.root()).unwrap();
/// let zombie = tree.create("Zombie", workspace).unwrap();
///
/// let rosyn = Rosyn::new(tree.clone(), tags.clone()).unwrap();
/// let health = ComponentType::of::<Health>();
/// rosyn.register("Damageable", &[health], workspace).unwrap();
///
/// tags.add_tag(zombie, "Damageable");
/// let instance = rosyn
///     .await_component_init(zombie, &health, Some(Duration::from_secs(1)))
///     .await
///     .unwrap();
///
/// assert_eq!(instance.node(), zombie);
/// rosyn.shutdown();
/// # }
/// ```
#[derive(Clone)]
pub struct Rosyn {
    inner: Arc<Coordinator>,
}

impl API for Rosyn {}

impl Rosyn {
    /// Creates a coordinator over `tree` and `tags` with the default
    /// configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::NoRuntime`] outside a tokio runtime.
    pub fn new(tree: Arc<dyn Tree>, tags: Arc<dyn TagService>) -> Result<Self, ComponentError> {
        Self::with_config(tree, tags, RosynConfig::default())
    }

    /// Creates a coordinator with an explicit configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::NoRuntime`] if the configuration names no
    /// runtime and none is current.
    pub fn with_config(
        tree: Arc<dyn Tree>,
        tags: Arc<dyn TagService>,
        config: RosynConfig,
    ) -> Result<Self, ComponentError> {
        let inner = Coordinator::new(tree, tags, config)?;
        tracing::debug!("component coordinator created");
        Ok(Self { inner })
    }

    /// Returns the configuration the coordinator was created with.
    #[must_use]
    pub fn config(&self) -> &RosynConfig {
        self.inner.config()
    }

    /// Returns the tree the coordinator watches.
    #[must_use]
    pub fn tree(&self) -> &Arc<dyn Tree> {
        self.inner.tree()
    }

    /// Returns the tag service the coordinator watches.
    #[must_use]
    pub fn tags(&self) -> &Arc<dyn TagService> {
        self.inner.tags()
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    /// Attaches `types` to every node tagged `label` strictly below `root`.
    ///
    /// Nodes that already carry the tag get their components immediately;
    /// later taggings are picked up as they happen. Registering the same
    /// (label, root) again adds to the existing registrations.
    ///
    /// # Errors
    ///
    /// - [`ComponentError::DuplicateComponentType`] if a type name is already
    ///   registered for (label, root) or repeated in `types`
    /// - [`ComponentError::RootDetached`] if `root` is not in the tree
    /// - [`ComponentError::Shutdown`] after [`shutdown`](Self::shutdown)
    pub fn register(
        &self,
        label: &str,
        types: &[ComponentType],
        root: NodeId,
    ) -> Result<(), ComponentError> {
        self.inner.register(label, types, root)
    }

    /// Removes every registration for (label, root), tearing down the
    /// instances no other registration claims.
    ///
    /// Returns false if there was nothing to remove.
    pub fn unregister(&self, label: &str, root: NodeId) -> bool {
        self.inner.unregister(label, root)
    }

    /// Resolves a [`ComponentType`] or [`ComponentInstance`] to its name.
    ///
    /// # Errors
    ///
    /// Returns [`ComponentError::InvalidComponentReference`] for any other
    /// value.
    pub fn get_component_name(&self, reference: &dyn Any) -> Result<&'static str, ComponentError> {
        crate::registry::get_component_name(reference)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Lookups
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the live instance of `ty` on `node`.
    #[must_use]
    pub fn get_component(&self, node: NodeId, ty: &ComponentType) -> Option<Arc<ComponentInstance>> {
        self.inner.read(|state| state.table.get(node, *ty))
    }

    /// Returns the live `C` on `node`.
    #[must_use]
    pub fn get<C: Component>(&self, node: NodeId) -> Option<Arc<C>> {
        self.get_component(node, &ComponentType::of::<C>())?
            .downcast_arc::<C>()
    }

    /// Returns the live instance of `ty` on `node` or its nearest ancestor
    /// that has one.
    #[must_use]
    pub fn get_component_from_descendant(
        &self,
        node: NodeId,
        ty: &ComponentType,
    ) -> Option<Arc<ComponentInstance>> {
        let lineage: Vec<NodeId> = core::iter::once(node)
            .chain(self.tree().ancestors(node))
            .collect();
        self.inner.read(|state| {
            lineage
                .into_iter()
                .find_map(|candidate| state.table.get(candidate, *ty))
        })
    }

    /// Returns the nodes holding a live instance of `ty`.
    #[must_use]
    pub fn get_instances_of_class(&self, ty: &ComponentType) -> HashSet<NodeId> {
        self.inner.read(|state| state.table.nodes_of(*ty))
    }

    /// Returns every live instance of `ty`.
    #[must_use]
    pub fn get_components_of_class(&self, ty: &ComponentType) -> Vec<Arc<ComponentInstance>> {
        self.inner.read(|state| state.table.instances_of(*ty))
    }

    /// Returns every live instance on `node`, keyed by type.
    #[must_use]
    pub fn get_components_from_instance(
        &self,
        node: NodeId,
    ) -> HashMap<ComponentType, Arc<ComponentInstance>> {
        self.inner.read(|state| state.table.on_node(node))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Waits
    // ─────────────────────────────────────────────────────────────────────────

    /// Waits for an instance of `ty` on `node` to exist.
    ///
    /// Resolves immediately if one is `Constructed`, `Initializing` or
    /// `Ready`. A `timeout` of `None` falls back to the configured default,
    /// or waits indefinitely if there is none.
    ///
    /// # Errors
    ///
    /// - [`WaitError::Timeout`] once the deadline passes
    /// - [`WaitError::TargetDeparented`] if `node` is or becomes detached
    /// - [`WaitError::Shutdown`] if the coordinator shuts down first
    pub async fn await_component(
        &self,
        node: NodeId,
        ty: &ComponentType,
        timeout: Option<Duration>,
    ) -> Result<Arc<ComponentInstance>, WaitError> {
        self.wait(node, *ty, WaitFor::Constructed, timeout).await
    }

    /// Waits for an instance of `ty` on `node` to become `Ready`.
    ///
    /// # Errors
    ///
    /// Same as [`await_component`](Self::await_component), plus
    /// [`WaitError::InitAborted`] if the instance is torn down before its
    /// `initial` completes.
    pub async fn await_component_init(
        &self,
        node: NodeId,
        ty: &ComponentType,
        timeout: Option<Duration>,
    ) -> Result<Arc<ComponentInstance>, WaitError> {
        self.wait(node, *ty, WaitFor::Ready, timeout).await
    }

    async fn wait(
        &self,
        node: NodeId,
        ty: ComponentType,
        wait_for: WaitFor,
        timeout: Option<Duration>,
    ) -> WaitResult {
        let (id, mut receiver) = match self.inner.begin_wait(node, ty, wait_for)? {
            WaitStart::Resolved(instance) => return Ok(instance),
            WaitStart::Pending { id, receiver } => (id, receiver),
        };
        let _pending = PendingWait {
            coordinator: &self.inner,
            node,
            ty,
            id,
        };

        match timeout.or(self.config().default_timeout()) {
            Some(limit) => match tokio::time::timeout(limit, &mut receiver).await {
                Ok(received) => received.unwrap_or(Err(WaitError::Shutdown)),
                Err(_) => Err(WaitError::Timeout(limit)),
            },
            None => self.wait_indefinitely(node, ty, receiver).await,
        }
    }

    async fn wait_indefinitely(
        &self,
        node: NodeId,
        ty: ComponentType,
        mut receiver: oneshot::Receiver<WaitResult>,
    ) -> WaitResult {
        if let Some(after) = self.config().yield_warning() {
            match tokio::time::timeout(after, &mut receiver).await {
                Ok(received) => return received.unwrap_or(Err(WaitError::Shutdown)),
                Err(_) => tracing::warn!(
                    component = ty.name(),
                    %node,
                    waited = ?after,
                    "infinite yield possible while waiting for component"
                ),
            }
        }
        receiver.await.unwrap_or(Err(WaitError::Shutdown))
    }

    /// Returns the number of waits currently suspended.
    #[must_use]
    pub fn pending_waiters(&self) -> usize {
        self.inner.read(|state| state.broker.len())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shutdown
    // ─────────────────────────────────────────────────────────────────────────

    /// Tears down every instance deepest-first, drops every subscription and
    /// fails every pending wait with [`WaitError::Shutdown`].
    ///
    /// Idempotent. Affects every clone of this handle.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }

    /// Returns true once [`shutdown`](Self::shutdown) has run.
    #[must_use]
    pub fn is_shut_down(&self) -> bool {
        self.inner.is_shut_down()
    }
}

impl fmt::Debug for Rosyn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (registrations, instances, waiters) = self.inner.read(|state| {
            (state.registry.len(), state.table.len(), state.broker.len())
        });
        f.debug_struct("Rosyn")
            .field("registrations", &registrations)
            .field("instances", &instances)
            .field("waiters", &waiters)
            .field("shut_down", &self.is_shut_down())
            .finish()
    }
}

/// Removes its waiter when the wait ends, however it ends.
struct PendingWait<'a> {
    coordinator: &'a Coordinator,
    node: NodeId,
    ty: ComponentType,
    id: WaiterId,
}

impl Drop for PendingWait<'_> {
    fn drop(&mut self) {
        self.coordinator.cancel_wait(self.node, self.ty, self.id);
    }
}
