//! Pending waits on (node, type) pairs.
//!
//! The broker only stores completion channels. Deadlines live with the
//! awaiting future, which removes its waiter when it times out or is
//! dropped, so nothing here ever polls.

use std::sync::Arc;

use hashbrown::HashMap;
use rosyn_tree::NodeId;
use tokio::sync::oneshot;

use crate::component::{ComponentInstance, ComponentType};
use crate::error::WaitError;

pub(crate) type WaitResult = Result<Arc<ComponentInstance>, WaitError>;

/// The condition a waiter is suspended on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum WaitFor {
    /// Any live instance.
    Constructed,
    /// A `Ready` instance.
    Ready,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) struct WaiterId(u64);

struct Waiter {
    id: WaiterId,
    wait_for: WaitFor,
    sender: oneshot::Sender<WaitResult>,
}

impl Waiter {
    fn complete(self, result: WaitResult) {
        // The receiver may already be gone if the wait was dropped.
        let _ = self.sender.send(result);
    }
}

#[derive(Default)]
pub(crate) struct WaitBroker {
    next_id: u64,
    waiters: HashMap<NodeId, HashMap<ComponentType, Vec<Waiter>>>,
}

impl WaitBroker {
    /// Registers a waiter.
    ///
    /// The returned flag is true when this is the first waiter on `node`.
    pub(crate) fn register(
        &mut self,
        node: NodeId,
        ty: ComponentType,
        wait_for: WaitFor,
    ) -> (WaiterId, oneshot::Receiver<WaitResult>, bool) {
        self.next_id += 1;
        let id = WaiterId(self.next_id);
        let (sender, receiver) = oneshot::channel();

        let first = !self.waiters.contains_key(&node);
        self.waiters
            .entry(node)
            .or_default()
            .entry(ty)
            .or_default()
            .push(Waiter {
                id,
                wait_for,
                sender,
            });
        (id, receiver, first)
    }

    /// Removes a waiter that timed out or was dropped.
    ///
    /// Returns true when `node` has no waiters left.
    pub(crate) fn cancel(&mut self, node: NodeId, ty: ComponentType, id: WaiterId) -> bool {
        let Some(by_type) = self.waiters.get_mut(&node) else {
            return false;
        };
        let Some(waiters) = by_type.get_mut(&ty) else {
            return false;
        };
        let before = waiters.len();
        waiters.retain(|waiter| waiter.id != id);
        if waiters.len() == before {
            return false;
        }
        self.prune(node, ty)
    }

    /// Resolves the `Constructed` waiters of the instance's pair.
    pub(crate) fn constructed(&mut self, instance: &Arc<ComponentInstance>) -> bool {
        self.resolve(instance, |wait_for| wait_for == WaitFor::Constructed, || {
            Ok(Arc::clone(instance))
        })
    }

    /// Resolves every waiter of the instance's pair.
    pub(crate) fn ready(&mut self, instance: &Arc<ComponentInstance>) -> bool {
        self.resolve(instance, |_| true, || Ok(Arc::clone(instance)))
    }

    /// Fails the `Ready` waiters of an instance that started teardown.
    pub(crate) fn destroying(&mut self, instance: &Arc<ComponentInstance>) -> bool {
        self.resolve(instance, |wait_for| wait_for == WaitFor::Ready, || {
            Err(WaitError::InitAborted {
                name: instance.name(),
                node: instance.node(),
            })
        })
    }

    /// Fails every waiter on `node` with `TargetDeparented`.
    ///
    /// Returns true if the node had waiters.
    pub(crate) fn departed(&mut self, node: NodeId) -> bool {
        let Some(by_type) = self.waiters.remove(&node) else {
            return false;
        };
        for waiter in by_type.into_values().flatten() {
            waiter.complete(Err(WaitError::TargetDeparented(node)));
        }
        true
    }

    /// Fails every waiter with `Shutdown`. Returns the nodes that had waiters.
    pub(crate) fn shutdown(&mut self) -> Vec<NodeId> {
        let mut nodes = Vec::with_capacity(self.waiters.len());
        for (node, by_type) in self.waiters.drain() {
            nodes.push(node);
            for waiter in by_type.into_values().flatten() {
                waiter.complete(Err(WaitError::Shutdown));
            }
        }
        nodes
    }

    /// Returns the number of pending waiters.
    pub(crate) fn len(&self) -> usize {
        self.waiters
            .values()
            .flat_map(HashMap::values)
            .map(Vec::len)
            .sum()
    }

    fn resolve(
        &mut self,
        instance: &Arc<ComponentInstance>,
        matches: impl Fn(WaitFor) -> bool,
        result: impl Fn() -> WaitResult,
    ) -> bool {
        let (node, ty) = (instance.node(), instance.component_type());
        let Some(waiters) = self
            .waiters
            .get_mut(&node)
            .and_then(|by_type| by_type.get_mut(&ty))
        else {
            return false;
        };

        let (hit, kept): (Vec<Waiter>, Vec<Waiter>) = core::mem::take(waiters)
            .into_iter()
            .partition(|waiter| matches(waiter.wait_for));
        *waiters = kept;

        for waiter in hit {
            waiter.complete(result());
        }
        self.prune(node, ty)
    }

    /// Drops empty maps. Returns true when `node` has no waiters left.
    fn prune(&mut self, node: NodeId, ty: ComponentType) -> bool {
        let Some(by_type) = self.waiters.get_mut(&node) else {
            return false;
        };
        if by_type.get(&ty).is_some_and(Vec::is_empty) {
            by_type.remove(&ty);
        }
        if by_type.is_empty() {
            self.waiters.remove(&node);
            return true;
        }
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::{Component, InstanceId};

    struct Health;

    impl Component for Health {
        const NAME: &'static str = "Health";

        fn construct(_node: NodeId) -> Self {
            Health
        }
    }

    fn instance(node: NodeId) -> Arc<ComponentInstance> {
        let ty = ComponentType::of::<Health>();
        Arc::new(ComponentInstance::new(InstanceId(1), node, ty, ty.construct(node)))
    }

    #[test]
    fn constructed_resolves_only_constructed_waiters() {
        let node = NodeId::fresh();
        let ty = ComponentType::of::<Health>();
        let mut broker = WaitBroker::default();

        let (_, mut any, first) = broker.register(node, ty, WaitFor::Constructed);
        let (_, mut ready, second) = broker.register(node, ty, WaitFor::Ready);
        assert!(first);
        assert!(!second);

        let live = instance(node);
        assert!(!broker.constructed(&live));
        assert!(Arc::ptr_eq(&any.try_recv().unwrap().unwrap(), &live));
        assert!(ready.try_recv().is_err());
        assert_eq!(broker.len(), 1);

        assert!(broker.ready(&live));
        assert!(ready.try_recv().unwrap().is_ok());
        assert_eq!(broker.len(), 0);
    }

    #[test]
    fn destroying_aborts_ready_waiters() {
        let node = NodeId::fresh();
        let ty = ComponentType::of::<Health>();
        let mut broker = WaitBroker::default();
        let (_, mut ready, _) = broker.register(node, ty, WaitFor::Ready);
        let (_, mut any, _) = broker.register(node, ty, WaitFor::Constructed);

        broker.destroying(&instance(node));

        assert_eq!(
            ready.try_recv().unwrap().unwrap_err(),
            WaitError::InitAborted {
                name: "Health",
                node
            }
        );
        assert!(any.try_recv().is_err());
        assert_eq!(broker.len(), 1);
    }

    #[test]
    fn cancel_and_departure_clean_up() {
        let node = NodeId::fresh();
        let ty = ComponentType::of::<Health>();
        let mut broker = WaitBroker::default();
        let (id, _rx, _) = broker.register(node, ty, WaitFor::Ready);
        let (_, mut other, _) = broker.register(node, ty, WaitFor::Ready);

        assert!(!broker.cancel(node, ty, id));
        assert!(!broker.cancel(node, ty, id));
        assert!(broker.departed(node));
        assert_eq!(
            other.try_recv().unwrap().unwrap_err(),
            WaitError::TargetDeparented(node)
        );
        assert!(!broker.departed(node));
        assert_eq!(broker.len(), 0);
    }

    #[test]
    fn shutdown_fails_everything() {
        let mut broker = WaitBroker::default();
        let ty = ComponentType::of::<Health>();
        let (a, b) = (NodeId::fresh(), NodeId::fresh());
        let (_, mut ra, _) = broker.register(a, ty, WaitFor::Constructed);
        let (_, mut rb, _) = broker.register(b, ty, WaitFor::Ready);

        let mut nodes = broker.shutdown();
        nodes.sort();

        assert_eq!(nodes, vec![a, b]);
        assert_eq!(ra.try_recv().unwrap().unwrap_err(), WaitError::Shutdown);
        assert_eq!(rb.try_recv().unwrap().unwrap_err(), WaitError::Shutdown);
    }
}
