//! Registrations of component types against (label, root) pairs.

use core::any::Any;
use core::fmt;
use std::sync::Arc;

use hashbrown::{HashMap, HashSet};
use rosyn_tree::NodeId;

use crate::component::{ComponentInstance, ComponentType};
use crate::error::ComponentError;
use crate::watcher::TagWatcher;

/// Identifies one `register` call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct RegistrationId(u64);

impl fmt::Display for RegistrationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "registration#{}", self.0)
    }
}

/// One `register` call: its component types and the watcher feeding them.
pub(crate) struct Registration {
    pub(crate) id: RegistrationId,
    pub(crate) types: Vec<ComponentType>,
    pub(crate) watcher: TagWatcher,
}

impl Registration {
    pub(crate) fn label(&self) -> &str {
        self.watcher.label()
    }

    pub(crate) fn root(&self) -> NodeId {
        self.watcher.root()
    }
}

/// Every live registration of a coordinator.
///
/// Registrations for the same (label, root) accumulate; each keeps its own
/// watcher so that its claims can be released independently.
#[derive(Default)]
pub(crate) struct Registry {
    next_id: u64,
    registrations: HashMap<RegistrationId, Registration>,
    by_key: HashMap<(String, NodeId), Vec<RegistrationId>>,
}

impl Registry {
    pub(crate) fn allocate_id(&mut self) -> RegistrationId {
        self.next_id += 1;
        RegistrationId(self.next_id)
    }

    /// Rejects component types whose canonical name is already taken for the
    /// (label, root) pair, or repeated within `types`.
    pub(crate) fn check_duplicates(
        &self,
        label: &str,
        root: NodeId,
        types: &[ComponentType],
    ) -> Result<(), ComponentError> {
        let mut names: HashSet<&'static str> = self
            .registrations_for(label, root)
            .flat_map(|registration| registration.types.iter().map(ComponentType::name))
            .collect();

        for ty in types {
            if !names.insert(ty.name()) {
                return Err(ComponentError::DuplicateComponentType {
                    name: ty.name(),
                    label: label.to_string(),
                    root,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn insert(&mut self, registration: Registration) {
        let key = (registration.label().to_string(), registration.root());
        self.by_key.entry(key).or_default().push(registration.id);
        self.registrations.insert(registration.id, registration);
    }

    pub(crate) fn get_mut(&mut self, id: RegistrationId) -> Option<&mut Registration> {
        self.registrations.get_mut(&id)
    }

    pub(crate) fn ids(&self) -> Vec<RegistrationId> {
        let mut ids: Vec<RegistrationId> = self.registrations.keys().copied().collect();
        ids.sort();
        ids
    }

    pub(crate) fn registrations_for<'a>(
        &'a self,
        label: &str,
        root: NodeId,
    ) -> impl Iterator<Item = &'a Registration> + use<'a> {
        self.by_key
            .get(&(label.to_string(), root))
            .into_iter()
            .flatten()
            .filter_map(|id| self.registrations.get(id))
    }

    /// Removes every registration for (label, root).
    pub(crate) fn remove_key(&mut self, label: &str, root: NodeId) -> Vec<Registration> {
        self.by_key
            .remove(&(label.to_string(), root))
            .unwrap_or_default()
            .into_iter()
            .filter_map(|id| self.registrations.remove(&id))
            .collect()
    }

    /// Removes every registration rooted at one of `roots`.
    pub(crate) fn remove_roots(&mut self, roots: &HashSet<NodeId>) -> Vec<Registration> {
        let ids: Vec<RegistrationId> = self
            .registrations
            .values()
            .filter(|registration| roots.contains(&registration.root()))
            .map(|registration| registration.id)
            .collect();
        ids.into_iter().filter_map(|id| self.remove(id)).collect()
    }

    pub(crate) fn drain(&mut self) -> Vec<Registration> {
        self.by_key.clear();
        self.registrations.drain().map(|(_, registration)| registration).collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.registrations.len()
    }

    fn remove(&mut self, id: RegistrationId) -> Option<Registration> {
        let registration = self.registrations.remove(&id)?;
        let key = (registration.label().to_string(), registration.root());
        if let Some(ids) = self.by_key.get_mut(&key) {
            ids.retain(|other| *other != id);
            if ids.is_empty() {
                self.by_key.remove(&key);
            }
        }
        Some(registration)
    }
}

/// Resolves a component type or instance to its canonical name.
///
/// Accepts a [`ComponentType`], a [`ComponentInstance`] or an
/// `Arc<ComponentInstance>`.
///
/// # Errors
///
/// Returns [`ComponentError::InvalidComponentReference`] for anything else.
///
/// # Example
///
/// ```
/// use rosyn_components::{Component, ComponentError, ComponentType, get_component_name};
/// use rosyn_tree::NodeId;
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
/// assert_eq!(get_component_name(&ComponentType::of::<Health>()), Ok("Health"));
/// assert_eq!(
///     get_component_name(&"Health"),
///     Err(ComponentError::InvalidComponentReference)
/// );
/// ```
pub fn get_component_name(reference: &dyn Any) -> Result<&'static str, ComponentError> {
    if let Some(ty) = reference.downcast_ref::<ComponentType>() {
        return Ok(ty.name());
    }
    if let Some(instance) = reference.downcast_ref::<ComponentInstance>() {
        return Ok(instance.name());
    }
    if let Some(instance) = reference.downcast_ref::<Arc<ComponentInstance>>() {
        return Ok(instance.name());
    }
    Err(ComponentError::InvalidComponentReference)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::Component;

    struct Health;

    impl Component for Health {
        const NAME: &'static str = "Health";

        fn construct(_node: NodeId) -> Self {
            Health
        }
    }

    mod shadow {
        use super::*;

        /// A distinct Rust type reusing the `Health` name.
        pub(super) struct Health;

        impl Component for Health {
            const NAME: &'static str = "Health";

            fn construct(_node: NodeId) -> Self {
                Health
            }
        }
    }

    struct Armor;

    impl Component for Armor {
        const NAME: &'static str = "Armor";

        fn construct(_node: NodeId) -> Self {
            Armor
        }
    }

    fn registration(registry: &mut Registry, label: &str, root: NodeId, types: Vec<ComponentType>) {
        let id = registry.allocate_id();
        registry.insert(Registration {
            id,
            types,
            watcher: TagWatcher::new(label, root, Vec::new()),
        });
    }

    #[test]
    fn duplicate_names_are_rejected_within_and_across_calls() {
        let root = NodeId::fresh();
        let mut registry = Registry::default();

        let within = registry.check_duplicates(
            "Damageable",
            root,
            &[ComponentType::of::<Health>(), ComponentType::of::<shadow::Health>()],
        );
        assert!(matches!(
            within,
            Err(ComponentError::DuplicateComponentType { name: "Health", .. })
        ));

        registration(&mut registry, "Damageable", root, vec![ComponentType::of::<Health>()]);
        assert!(
            registry
                .check_duplicates("Damageable", root, &[ComponentType::of::<shadow::Health>()])
                .is_err()
        );
        assert!(
            registry
                .check_duplicates("Damageable", root, &[ComponentType::of::<Armor>()])
                .is_ok()
        );
        assert!(
            registry
                .check_duplicates("Flammable", root, &[ComponentType::of::<Health>()])
                .is_ok()
        );
        assert!(
            registry
                .check_duplicates("Damageable", NodeId::fresh(), &[ComponentType::of::<Health>()])
                .is_ok()
        );
    }

    #[test]
    fn registrations_accumulate_and_are_removed_by_key() {
        let root = NodeId::fresh();
        let mut registry = Registry::default();
        registration(&mut registry, "Damageable", root, vec![ComponentType::of::<Health>()]);
        registration(&mut registry, "Damageable", root, vec![ComponentType::of::<Armor>()]);
        registration(&mut registry, "Flammable", root, vec![ComponentType::of::<Armor>()]);

        assert_eq!(registry.registrations_for("Damageable", root).count(), 2);
        assert_eq!(registry.remove_key("Damageable", root).len(), 2);
        assert_eq!(registry.len(), 1);
        assert!(registry.remove_key("Damageable", root).is_empty());
    }

    #[test]
    fn removing_roots_drops_their_registrations() {
        let root = NodeId::fresh();
        let other = NodeId::fresh();
        let mut registry = Registry::default();
        registration(&mut registry, "Damageable", root, vec![ComponentType::of::<Health>()]);
        registration(&mut registry, "Damageable", other, vec![ComponentType::of::<Health>()]);

        let removed = registry.remove_roots(&HashSet::from_iter([root]));

        assert_eq!(removed.len(), 1);
        assert_eq!(registry.ids().len(), 1);
        assert_eq!(registry.registrations_for("Damageable", root).count(), 0);
    }

    #[test]
    fn component_names_resolve_from_types_and_instances() {
        let node = NodeId::fresh();
        let ty = ComponentType::of::<Health>();
        let instance = Arc::new(ComponentInstance::new(
            crate::component::InstanceId(7),
            node,
            ty,
            ty.construct(node),
        ));

        assert_eq!(get_component_name(&ty), Ok("Health"));
        assert_eq!(get_component_name(&instance), Ok("Health"));
        assert_eq!(get_component_name(&*instance), Ok("Health"));
        assert_eq!(
            get_component_name(&42_u32),
            Err(ComponentError::InvalidComponentReference)
        );
    }
}
