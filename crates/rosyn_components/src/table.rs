//! The authoritative store of component instances.
//!
//! Every (node, type) pair has at most one [`Slot`]. A slot is either
//! *reserved* (the constructor is running outside the lock) or holds an
//! instance. Slots are only created by [`claim`](InstanceTable::claim) and
//! only removed by [`finish_teardown`](InstanceTable::finish_teardown) or a
//! failed construction, so a second instance for a pair can never be built
//! while a previous one is still alive.
//!
//! Tearing down a reserved slot cannot happen right away. The caller that
//! requested it gets [`Teardown::Pending`] and owns the teardown of whatever
//! the constructor installs; it collects the instance through
//! [`take_pending`](InstanceTable::take_pending).

use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use rosyn_tree::NodeId;
use tokio::task::AbortHandle;

use crate::component::{
    ComponentInstance, ComponentType, ErasedComponent, InstanceId, LifecycleState,
};
use crate::registry::RegistrationId;

type Key = (NodeId, ComponentType);

/// Outcome of [`InstanceTable::claim`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Claim {
    /// A slot was reserved; the caller must construct the component.
    Construct,
    /// A live instance (or one being constructed) now carries the claim.
    Existing,
    /// The current instance is being torn down; the claim re-creates the
    /// component once it is destroyed.
    Queued,
}

/// Outcome of [`InstanceTable::finish_teardown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Finished {
    /// The instance is not the one in the slot; nothing changed.
    Stale,
    /// The slot is gone.
    Removed,
    /// A fresh slot was reserved for queued claims.
    Recreate,
}

/// A teardown started by [`InstanceTable::release`] or
/// [`InstanceTable::force_teardown`].
pub(crate) enum Teardown {
    /// The instance entered `Destroying`.
    Started(Arc<ComponentInstance>),
    /// The constructor is still running.
    Pending,
}

/// Outcome of [`InstanceTable::take_pending`].
pub(crate) enum Pending {
    /// The constructor has not returned yet.
    Constructing,
    /// The constructor returned and its instance is `Destroying`.
    Doomed(Arc<ComponentInstance>),
    /// There is nothing left to tear down.
    Gone,
}

/// Outcome of [`InstanceTable::install`].
pub(crate) enum Installed {
    /// The instance is `Constructed` and should start initializing.
    Live(Arc<ComponentInstance>),
    /// Teardown was requested while the constructor ran; the instance is
    /// already `Destroying` and belongs to whoever requested it.
    Doomed(Arc<ComponentInstance>),
}

struct Slot {
    /// `None` while reserved for construction.
    instance: Option<Arc<ComponentInstance>>,
    claims: HashSet<RegistrationId>,
    /// Claims that arrived after teardown began.
    queued: HashSet<RegistrationId>,
    /// Set when the last claim went away while reserved.
    teardown_requested: bool,
    /// A doomed instance nobody has taken through `take_pending` yet.
    unclaimed: bool,
    init_task: Option<AbortHandle>,
}

impl Slot {
    fn reserved(claims: HashSet<RegistrationId>) -> Self {
        Self {
            instance: None,
            claims,
            queued: HashSet::new(),
            teardown_requested: false,
            unclaimed: false,
            init_task: None,
        }
    }

    fn tearing_down(&self) -> bool {
        match &self.instance {
            Some(instance) => !instance.state().is_live(),
            None => self.teardown_requested,
        }
    }

    fn live(&self) -> Option<&Arc<ComponentInstance>> {
        self.instance
            .as_ref()
            .filter(|instance| instance.state().is_live())
    }
}

#[derive(Default)]
pub(crate) struct InstanceTable {
    next_instance: u64,
    slots: HashMap<Key, Slot>,
    by_type: HashMap<ComponentType, HashSet<NodeId>>,
    by_node: HashMap<NodeId, HashSet<ComponentType>>,
}

impl InstanceTable {
    // ─────────────────────────────────────────────────────────────────────────
    // Mutations
    // ─────────────────────────────────────────────────────────────────────────

    /// Records `registration`'s claim on (node, ty).
    pub(crate) fn claim(
        &mut self,
        node: NodeId,
        ty: ComponentType,
        registration: RegistrationId,
    ) -> Claim {
        match self.slots.get_mut(&(node, ty)) {
            Some(slot) if slot.tearing_down() => {
                slot.queued.insert(registration);
                Claim::Queued
            }
            Some(slot) => {
                slot.claims.insert(registration);
                Claim::Existing
            }
            None => {
                self.reserve(node, ty, HashSet::from_iter([registration]));
                Claim::Construct
            }
        }
    }

    /// Drops `registration`'s claim on (node, ty).
    ///
    /// Returns the teardown if this was the last claim.
    pub(crate) fn release(
        &mut self,
        node: NodeId,
        ty: ComponentType,
        registration: RegistrationId,
    ) -> Option<Teardown> {
        let slot = self.slots.get_mut(&(node, ty))?;
        if slot.queued.remove(&registration) || !slot.claims.remove(&registration) {
            return None;
        }
        if !slot.claims.is_empty() {
            return None;
        }
        Self::begin_teardown(slot)
    }

    /// Drops every claim on (node, ty) and starts its teardown.
    ///
    /// Returns `None` if the instance was already being torn down.
    pub(crate) fn force_teardown(
        &mut self,
        node: NodeId,
        ty: ComponentType,
    ) -> Option<Teardown> {
        let slot = self.slots.get_mut(&(node, ty))?;
        slot.claims.clear();
        slot.queued.clear();
        Self::begin_teardown(slot)
    }

    fn begin_teardown(slot: &mut Slot) -> Option<Teardown> {
        // Every requester waits on the constructor; the first to collect
        // the instance tears it down.
        let Some(instance) = slot.instance.as_ref() else {
            slot.teardown_requested = true;
            return Some(Teardown::Pending);
        };
        if !instance.state().can_transition_to(LifecycleState::Destroying) {
            return None;
        }

        if let Some(task) = slot.init_task.take() {
            task.abort();
        }
        instance.set_state(LifecycleState::Destroying);
        Some(Teardown::Started(Arc::clone(instance)))
    }

    /// Hands the instance of a [`Teardown::Pending`] to its owner, once.
    pub(crate) fn take_pending(&mut self, node: NodeId, ty: ComponentType) -> Pending {
        let Some(slot) = self.slots.get_mut(&(node, ty)) else {
            return Pending::Gone;
        };
        match &slot.instance {
            None if slot.teardown_requested => Pending::Constructing,
            Some(instance) if slot.unclaimed => {
                slot.unclaimed = false;
                Pending::Doomed(Arc::clone(instance))
            }
            _ => Pending::Gone,
        }
    }

    /// Stores the value built for a reserved slot.
    pub(crate) fn install(
        &mut self,
        node: NodeId,
        ty: ComponentType,
        value: Arc<dyn ErasedComponent>,
    ) -> Option<Installed> {
        let slot = self.slots.get_mut(&(node, ty))?;
        if slot.instance.is_some() {
            return None;
        }

        self.next_instance += 1;
        let instance = Arc::new(ComponentInstance::new(
            InstanceId(self.next_instance),
            node,
            ty,
            value,
        ));
        slot.instance = Some(Arc::clone(&instance));

        if slot.teardown_requested {
            instance.set_state(LifecycleState::Destroying);
            slot.unclaimed = true;
            Some(Installed::Doomed(instance))
        } else {
            Some(Installed::Live(instance))
        }
    }

    /// Removes a reserved slot whose constructor failed.
    ///
    /// The claims go with it and nothing retries the constructor. The pair
    /// is built again only when a registration claims it anew, i.e. when the
    /// node is re-tagged or re-enters a watched subtree.
    ///
    /// Returns true if the slot was removed.
    pub(crate) fn abandon(&mut self, node: NodeId, ty: ComponentType) -> bool {
        let reserved = self
            .slots
            .get(&(node, ty))
            .is_some_and(|slot| slot.instance.is_none());
        if reserved {
            self.remove_slot(node, ty);
        }
        reserved
    }

    /// Moves the instance `id` of (node, ty) to `next` if that is a legal step.
    pub(crate) fn transition(
        &mut self,
        node: NodeId,
        ty: ComponentType,
        id: InstanceId,
        next: LifecycleState,
    ) -> Option<Arc<ComponentInstance>> {
        let slot = self.slots.get_mut(&(node, ty))?;
        let instance = slot.instance.as_ref().filter(|instance| instance.id() == id)?;
        if !instance.state().can_transition_to(next) {
            return None;
        }

        if next != LifecycleState::Initializing {
            slot.init_task = None;
        }
        instance.set_state(next);
        Some(Arc::clone(instance))
    }

    /// Remembers the task running `initial` for instance `id`.
    pub(crate) fn set_init_task(
        &mut self,
        node: NodeId,
        ty: ComponentType,
        id: InstanceId,
        task: AbortHandle,
    ) {
        match self.slots.get_mut(&(node, ty)) {
            Some(slot)
                if slot.instance.as_ref().is_some_and(|instance| {
                    instance.id() == id && instance.state() == LifecycleState::Initializing
                }) =>
            {
                slot.init_task = Some(task);
            }
            _ => task.abort(),
        }
    }

    /// Marks instance `id` destroyed and removes its slot.
    ///
    /// If claims were queued during teardown, a fresh slot is reserved for
    /// them and the caller must construct again.
    pub(crate) fn finish_teardown(
        &mut self,
        node: NodeId,
        ty: ComponentType,
        id: InstanceId,
    ) -> Finished {
        let matches = self
            .slots
            .get(&(node, ty))
            .and_then(|slot| slot.instance.as_ref())
            .is_some_and(|instance| instance.id() == id);
        if !matches {
            return Finished::Stale;
        }

        let Some(slot) = self.remove_slot(node, ty) else {
            return Finished::Stale;
        };
        if let Some(instance) = &slot.instance {
            instance.set_state(LifecycleState::Destroyed);
        }

        if slot.queued.is_empty() {
            return Finished::Removed;
        }
        self.reserve(node, ty, slot.queued);
        Finished::Recreate
    }

    fn reserve(&mut self, node: NodeId, ty: ComponentType, claims: HashSet<RegistrationId>) {
        self.slots.insert((node, ty), Slot::reserved(claims));
        self.by_type.entry(ty).or_default().insert(node);
        self.by_node.entry(node).or_default().insert(ty);
    }

    fn remove_slot(&mut self, node: NodeId, ty: ComponentType) -> Option<Slot> {
        let slot = self.slots.remove(&(node, ty))?;

        if let Some(nodes) = self.by_type.get_mut(&ty) {
            nodes.remove(&node);
            if nodes.is_empty() {
                self.by_type.remove(&ty);
            }
        }
        if let Some(types) = self.by_node.get_mut(&node) {
            types.remove(&ty);
            if types.is_empty() {
                self.by_node.remove(&node);
            }
        }
        Some(slot)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Queries
    // ─────────────────────────────────────────────────────────────────────────

    /// Returns the live instance for (node, ty).
    pub(crate) fn get(&self, node: NodeId, ty: ComponentType) -> Option<Arc<ComponentInstance>> {
        self.slots.get(&(node, ty)).and_then(Slot::live).cloned()
    }

    /// Returns the nodes holding a live instance of `ty`.
    pub(crate) fn nodes_of(&self, ty: ComponentType) -> HashSet<NodeId> {
        self.by_type
            .get(&ty)
            .into_iter()
            .flatten()
            .copied()
            .filter(|node| self.get(*node, ty).is_some())
            .collect()
    }

    /// Returns every live instance of `ty`.
    pub(crate) fn instances_of(&self, ty: ComponentType) -> Vec<Arc<ComponentInstance>> {
        self.by_type
            .get(&ty)
            .into_iter()
            .flatten()
            .filter_map(|node| self.get(*node, ty))
            .collect()
    }

    /// Returns every live instance on `node`, by type.
    pub(crate) fn on_node(&self, node: NodeId) -> HashMap<ComponentType, Arc<ComponentInstance>> {
        self.types_at(node)
            .into_iter()
            .filter_map(|ty| self.get(node, ty).map(|instance| (ty, instance)))
            .collect()
    }

    /// Returns the types with a slot on `node`, live or not.
    pub(crate) fn types_at(&self, node: NodeId) -> Vec<ComponentType> {
        self.by_node
            .get(&node)
            .map(|types| types.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns every node with at least one slot.
    pub(crate) fn nodes(&self) -> Vec<NodeId> {
        self.by_node.keys().copied().collect()
    }

    /// Returns the number of slots.
    pub(crate) fn len(&self) -> usize {
        self.slots.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;
    use crate::registry::Registry;

    struct Health;

    impl Component for Health {
        const NAME: &'static str = "Health";

        fn construct(_node: NodeId) -> Self {
            Health
        }
    }

    fn health() -> ComponentType {
        ComponentType::of::<Health>()
    }

    fn installed(table: &mut InstanceTable, node: NodeId) -> Arc<ComponentInstance> {
        match table.install(node, health(), health().construct(node)) {
            Some(Installed::Live(instance)) => instance,
            _ => panic!("expected a live instance"),
        }
    }

    #[test]
    fn claims_are_exactly_once_per_pair() {
        let mut registry = Registry::default();
        let (a, b) = (registry.allocate_id(), registry.allocate_id());
        let node = NodeId::fresh();
        let mut table = InstanceTable::default();

        assert_eq!(table.claim(node, health(), a), Claim::Construct);
        assert_eq!(table.claim(node, health(), b), Claim::Existing);
        assert!(table.get(node, health()).is_none());

        let instance = installed(&mut table, node);
        assert_eq!(table.get(node, health()).map(|i| i.id()), Some(instance.id()));
        assert_eq!(table.nodes_of(health()), HashSet::from_iter([node]));

        assert!(table.release(node, health(), a).is_none());
        let Some(Teardown::Started(doomed)) = table.release(node, health(), b) else {
            panic!("expected the teardown to start");
        };
        assert_eq!(doomed.state(), LifecycleState::Destroying);
        assert!(table.get(node, health()).is_none());
        assert_eq!(table.types_at(node), vec![health()]);

        assert_eq!(table.finish_teardown(node, health(), doomed.id()), Finished::Removed);
        assert_eq!(doomed.state(), LifecycleState::Destroyed);
        assert_eq!(table.len(), 0);
        assert!(table.types_at(node).is_empty());
    }

    #[test]
    fn release_while_reserved_dooms_the_install() {
        let mut registry = Registry::default();
        let a = registry.allocate_id();
        let node = NodeId::fresh();
        let mut table = InstanceTable::default();

        table.claim(node, health(), a);
        assert!(matches!(table.release(node, health(), a), Some(Teardown::Pending)));
        assert!(matches!(table.force_teardown(node, health()), Some(Teardown::Pending)));
        assert!(matches!(table.take_pending(node, health()), Pending::Constructing));

        let Some(Installed::Doomed(installed)) =
            table.install(node, health(), health().construct(node))
        else {
            panic!("expected a doomed instance");
        };
        assert_eq!(installed.state(), LifecycleState::Destroying);

        match table.take_pending(node, health()) {
            Pending::Doomed(instance) => assert_eq!(instance.id(), installed.id()),
            _ => panic!("expected the doomed instance"),
        }
        assert!(matches!(table.take_pending(node, health()), Pending::Gone));
    }

    #[test]
    fn claims_during_teardown_are_queued_and_recreate() {
        let mut registry = Registry::default();
        let a = registry.allocate_id();
        let node = NodeId::fresh();
        let mut table = InstanceTable::default();

        table.claim(node, health(), a);
        let first = installed(&mut table, node);
        assert!(table.release(node, health(), a).is_some());

        assert_eq!(table.claim(node, health(), a), Claim::Queued);
        assert_eq!(table.finish_teardown(node, health(), first.id()), Finished::Recreate);

        let second = installed(&mut table, node);
        assert_ne!(first.id(), second.id());
        assert_eq!(first.state(), LifecycleState::Destroyed);
    }

    #[test]
    fn stale_transitions_are_ignored() {
        let mut registry = Registry::default();
        let a = registry.allocate_id();
        let node = NodeId::fresh();
        let mut table = InstanceTable::default();

        table.claim(node, health(), a);
        let instance = installed(&mut table, node);

        assert!(
            table
                .transition(node, health(), instance.id(), LifecycleState::Ready)
                .is_none()
        );
        assert!(
            table
                .transition(node, health(), instance.id(), LifecycleState::Initializing)
                .is_some()
        );
        assert!(matches!(
            table.force_teardown(node, health()),
            Some(Teardown::Started(_))
        ));
        assert!(
            table
                .transition(node, health(), instance.id(), LifecycleState::Ready)
                .is_none()
        );
        assert!(
            table
                .transition(node, health(), InstanceId(999), LifecycleState::Destroyed)
                .is_none()
        );
    }
}
