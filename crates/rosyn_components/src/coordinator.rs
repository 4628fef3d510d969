//! The lifecycle coordinator.
//!
//! All bookkeeping lives in one [`State`] behind a mutex. Event handlers
//! update it and collect [`Work`] under the lock, then run the work (which
//! calls user hooks) after releasing it. Hooks may therefore tag, untag or
//! mutate the tree re-entrantly.
//!
//! Teardowns collected from one event are sorted deepest-first using the
//! shared [`AncestryIndex`], so a descendant's `destroy` always completes
//! before its ancestor's begins. When a descendant's constructor is still
//! running on another thread, the rest of the batch is parked on its slot and
//! that thread resumes it once the constructor returns.

use core::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Weak};

use futures::FutureExt;
use hashbrown::{HashMap, HashSet};
use parking_lot::Mutex;
use rosyn_tree::{AncestryIndex, Connection, Listener, NodeId, TagService, Tree, TreeEvent};
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::AbortHandle;
use tracing::Instrument;

use crate::broker::{WaitBroker, WaitFor, WaitResult, WaiterId};
use crate::component::{ComponentInstance, ComponentType, HookError, LifecycleState};
use crate::config::RosynConfig;
use crate::error::{ComponentError, LifecycleError, WaitError};
use crate::registry::{Registration, RegistrationId, Registry};
use crate::table::{Claim, Finished, InstanceTable, Installed, Pending, Teardown};
use crate::watcher::{TagWatcher, WatchEvent};

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

/// Everything guarded by the coordinator lock.
#[derive(Default)]
pub(crate) struct State {
    pub(crate) registry: Registry,
    pub(crate) table: InstanceTable,
    pub(crate) broker: WaitBroker,
    /// Tracks instance nodes, waiter nodes, watched members and
    /// registration roots.
    pub(crate) ancestry: AncestryIndex,
    /// Teardown batches waiting for a constructor to return.
    parked: HashMap<(NodeId, ComponentType), Vec<VecDeque<Work>>>,
    pub(crate) shut_down: bool,
}

impl State {
    /// Claims (node, ty) for every type of a registration.
    fn claim_all(
        &mut self,
        tree: &dyn Tree,
        registration: RegistrationId,
        node: NodeId,
        types: &[ComponentType],
    ) -> Vec<Work> {
        let mut work = Vec::new();
        for ty in types {
            match self.table.claim(node, *ty, registration) {
                Claim::Construct => {
                    self.ancestry.track(tree, node);
                    work.push(Work::Construct { node, ty: *ty });
                }
                Claim::Existing => {
                    tracing::trace!(component = ty.name(), %node, %registration, "claim joined live instance");
                }
                Claim::Queued => {
                    tracing::debug!(component = ty.name(), %node, "re-creation queued behind teardown");
                }
            }
        }
        work
    }

    /// Releases a registration's claims on `node`, returning the teardowns
    /// that started.
    fn release_all(
        &mut self,
        registration: RegistrationId,
        node: NodeId,
        types: &[ComponentType],
    ) -> Vec<Work> {
        let mut doomed = Vec::new();
        for ty in types {
            let teardown = self.table.release(node, *ty, registration);
            self.doom(node, *ty, teardown, &mut doomed);
        }
        doomed
    }

    fn doom(
        &mut self,
        node: NodeId,
        ty: ComponentType,
        teardown: Option<Teardown>,
        doomed: &mut Vec<Work>,
    ) {
        match teardown {
            Some(Teardown::Started(instance)) => {
                self.instance_doomed(&instance);
                doomed.push(Work::Teardown(instance));
            }
            Some(Teardown::Pending) => {
                tracing::debug!(component = ty.name(), %node, "teardown waits for its constructor");
                doomed.push(Work::AwaitConstruct { node, ty });
            }
            None => {}
        }
    }

    /// Queues every batch parked on (node, ty).
    fn resume_parked(&mut self, node: NodeId, ty: ComponentType, queue: &mut VecDeque<Work>) {
        for batch in self.parked.remove(&(node, ty)).into_iter().flatten() {
            queue.extend(batch);
        }
    }

    /// Bookkeeping for an instance that just entered `Destroying`.
    fn instance_doomed(&mut self, instance: &Arc<ComponentInstance>) {
        tracing::debug!(
            component = instance.name(),
            node = %instance.node(),
            instance = %instance.id(),
            "component teardown started"
        );
        if self.broker.destroying(instance) {
            self.ancestry.untrack(instance.node());
        }
    }

    fn sort_deepest_first(&self, work: &mut [Work]) {
        work.sort_by(|a, b| {
            self.ancestry
                .depth(b.node())
                .cmp(&self.ancestry.depth(a.node()))
                .then_with(|| a.node().cmp(&b.node()))
        });
    }

    /// Drops a registration's subscriptions and untracks its root. Members
    /// must already have been cleared.
    fn retire(&mut self, registration: &mut Registration) -> Vec<Connection> {
        self.ancestry.untrack(registration.root());
        tracing::debug!(
            label = registration.label(),
            root = %registration.root(),
            "registration retired"
        );
        registration.watcher.take_connections()
    }
}

/// Hook calls collected under the lock and run after it is released.
enum Work {
    Construct { node: NodeId, ty: ComponentType },
    Teardown(Arc<ComponentInstance>),
    /// Tear down whatever a constructor running elsewhere installs.
    AwaitConstruct { node: NodeId, ty: ComponentType },
}

impl Work {
    fn node(&self) -> NodeId {
        match self {
            Work::Construct { node, .. } | Work::AwaitConstruct { node, .. } => *node,
            Work::Teardown(instance) => instance.node(),
        }
    }
}

/// How a wait starts.
pub(crate) enum WaitStart {
    Resolved(Arc<ComponentInstance>),
    Pending {
        id: WaiterId,
        receiver: oneshot::Receiver<WaitResult>,
    },
}

// ─────────────────────────────────────────────────────────────────────────────
// Coordinator
// ─────────────────────────────────────────────────────────────────────────────

pub(crate) struct Coordinator {
    tree: Arc<dyn Tree>,
    tags: Arc<dyn TagService>,
    config: RosynConfig,
    runtime: Handle,
    state: Mutex<State>,
    tree_connection: Mutex<Option<Connection>>,
}

impl Coordinator {
    pub(crate) fn new(
        tree: Arc<dyn Tree>,
        tags: Arc<dyn TagService>,
        config: RosynConfig,
    ) -> Result<Arc<Self>, ComponentError> {
        let runtime = match config.runtime() {
            Some(handle) => handle.clone(),
            None => Handle::try_current().map_err(|_| ComponentError::NoRuntime)?,
        };

        let coordinator = Arc::new(Self {
            tree,
            tags,
            config,
            runtime,
            state: Mutex::new(State::default()),
            tree_connection: Mutex::new(None),
        });

        let weak = Arc::downgrade(&coordinator);
        let connection = coordinator.tree.on_changed(Arc::new(move |event: &TreeEvent| {
            if let Some(coordinator) = weak.upgrade() {
                coordinator.tree_changed(*event);
            }
        }));
        *coordinator.tree_connection.lock() = Some(connection);

        Ok(coordinator)
    }

    pub(crate) fn tree(&self) -> &Arc<dyn Tree> {
        &self.tree
    }

    pub(crate) fn tags(&self) -> &Arc<dyn TagService> {
        &self.tags
    }

    pub(crate) fn config(&self) -> &RosynConfig {
        &self.config
    }

    /// Runs `query` against the current state.
    pub(crate) fn read<R>(&self, query: impl FnOnce(&State) -> R) -> R {
        query(&self.state.lock())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Registration
    // ─────────────────────────────────────────────────────────────────────────

    fn check_registration(
        &self,
        state: &State,
        label: &str,
        types: &[ComponentType],
        root: NodeId,
    ) -> Result<(), ComponentError> {
        if state.shut_down {
            return Err(ComponentError::Shutdown);
        }
        if !self.tree.contains(root) {
            return Err(ComponentError::RootDetached(root));
        }
        state.registry.check_duplicates(label, root, types)
    }

    pub(crate) fn register(
        self: &Arc<Self>,
        label: &str,
        types: &[ComponentType],
        root: NodeId,
    ) -> Result<(), ComponentError> {
        let id = {
            let mut state = self.state.lock();
            self.check_registration(&state, label, types, root)?;
            state.registry.allocate_id()
        };

        // Subscribe before scanning so no tag change can fall between the two.
        let connections = vec![
            self.tags.on_tag_added(label, self.tag_listener(id, true)),
            self.tags.on_tag_removed(label, self.tag_listener(id, false)),
        ];

        let work = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if let Err(error) = self.check_registration(state, label, types, root) {
                drop(guard);
                drop(connections);
                return Err(error);
            }

            let mut watcher = TagWatcher::new(label, root, connections);
            let matched = watcher.scan(&*self.tree, &*self.tags);
            state.ancestry.track(&*self.tree, root);
            state.registry.insert(Registration {
                id,
                types: types.to_vec(),
                watcher,
            });

            tracing::debug!(
                label,
                %root,
                registration = %id,
                components = ?types,
                matched = matched.len(),
                "components registered"
            );

            let mut work = Vec::new();
            for node in matched {
                state.ancestry.track(&*self.tree, node);
                work.extend(state.claim_all(&*self.tree, id, node, types));
            }
            work
        };

        self.run(work);
        Ok(())
    }

    pub(crate) fn unregister(self: &Arc<Self>, label: &str, root: NodeId) -> bool {
        let (work, connections) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let mut removed = state.registry.remove_key(label, root);
            if removed.is_empty() {
                return false;
            }

            let mut doomed = Vec::new();
            let mut connections = Vec::new();
            for registration in &mut removed {
                for node in registration.watcher.clear() {
                    doomed.extend(state.release_all(registration.id, node, &registration.types));
                    state.ancestry.untrack(node);
                }
                connections.extend(state.retire(registration));
            }
            state.sort_deepest_first(&mut doomed);
            (doomed, connections)
        };

        drop(connections);
        self.run(work);
        true
    }

    fn tag_listener(self: &Arc<Self>, registration: RegistrationId, added: bool) -> Listener<NodeId> {
        let weak = Arc::downgrade(self);
        Arc::new(move |node: &NodeId| {
            let Some(coordinator) = weak.upgrade() else {
                return;
            };
            if added {
                coordinator.tag_added(registration, *node);
            } else {
                coordinator.tag_removed(registration, *node);
            }
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Event Handlers
    // ─────────────────────────────────────────────────────────────────────────

    fn tag_added(self: &Arc<Self>, registration: RegistrationId, node: NodeId) {
        let work = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.shut_down {
                return;
            }
            let Some(entry) = state.registry.get_mut(registration) else {
                return;
            };
            let Some(WatchEvent::Added(node)) = entry.watcher.tag_added(&*self.tree, node) else {
                return;
            };
            tracing::debug!(label = entry.label(), %node, "node entered watched set");

            let types = entry.types.clone();
            state.ancestry.track(&*self.tree, node);
            state.claim_all(&*self.tree, registration, node, &types)
        };
        self.run(work);
    }

    fn tag_removed(self: &Arc<Self>, registration: RegistrationId, node: NodeId) {
        let work = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.shut_down {
                return;
            }
            let Some(entry) = state.registry.get_mut(registration) else {
                return;
            };
            let Some(WatchEvent::Removed(node)) = entry.watcher.tag_removed(node) else {
                return;
            };
            tracing::debug!(label = entry.label(), %node, "node left watched set");

            let types = entry.types.clone();
            let doomed = state.release_all(registration, node, &types);
            state.ancestry.untrack(node);
            doomed
        };
        self.run(work);
    }

    fn tree_changed(self: &Arc<Self>, event: TreeEvent) {
        match event {
            TreeEvent::Removed { node, .. } => self.node_removed(node),
            TreeEvent::Reparented { node, .. } => self.node_reparented(node),
        }
    }

    fn node_removed(self: &Arc<Self>, removed: NodeId) {
        let (work, connections) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.shut_down {
                return;
            }

            let affected = state.ancestry.subtree(removed);
            let roots: HashSet<NodeId> = affected.iter().copied().collect();

            let mut connections = Vec::new();
            let mut gone = Vec::new();
            for mut registration in state.registry.remove_roots(&roots) {
                gone.extend(registration.watcher.clear());
                connections.extend(state.retire(&mut registration));
            }
            for id in state.registry.ids() {
                if let Some(registration) = state.registry.get_mut(id) {
                    gone.extend(registration.watcher.removed(&affected));
                }
            }
            for node in gone {
                state.ancestry.untrack(node);
            }

            // Waiters fail synchronously with the removal.
            for node in &affected {
                if state.broker.departed(*node) {
                    tracing::debug!(%node, "waiters failed: node left the tree");
                    state.ancestry.untrack(*node);
                }
            }

            // `affected` is already deepest-first.
            let mut doomed = Vec::new();
            for node in &affected {
                for ty in state.table.types_at(*node) {
                    let teardown = state.table.force_teardown(*node, ty);
                    state.doom(*node, ty, teardown, &mut doomed);
                }
            }

            tracing::debug!(node = %removed, instances = doomed.len(), "subtree removed");
            (doomed, connections)
        };

        drop(connections);
        self.run(work);
    }

    fn node_reparented(self: &Arc<Self>, moved: NodeId) {
        let work = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.shut_down {
                return;
            }
            let refreshed = state.ancestry.refresh(&*self.tree, moved);

            let mut transitions = Vec::new();
            for id in state.registry.ids() {
                if let Some(registration) = state.registry.get_mut(id) {
                    let events = registration.watcher.reparented(
                        &*self.tree,
                        &*self.tags,
                        moved,
                        &refreshed,
                    );
                    if !events.is_empty() {
                        transitions.push((id, registration.types.clone(), events));
                    }
                }
            }

            let mut doomed = Vec::new();
            let mut constructs = Vec::new();
            for (id, types, events) in transitions {
                for event in events {
                    match event {
                        WatchEvent::Removed(node) => {
                            doomed.extend(state.release_all(id, node, &types));
                            state.ancestry.untrack(node);
                        }
                        WatchEvent::Added(node) => {
                            state.ancestry.track(&*self.tree, node);
                            constructs.extend(state.claim_all(&*self.tree, id, node, &types));
                        }
                    }
                }
            }

            state.sort_deepest_first(&mut doomed);
            doomed.extend(constructs);
            doomed
        };
        self.run(work);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Hook Execution
    // ─────────────────────────────────────────────────────────────────────────

    fn run(self: &Arc<Self>, work: Vec<Work>) {
        let mut queue: VecDeque<Work> = work.into();
        while let Some(item) = queue.pop_front() {
            match item {
                Work::Construct { node, ty } => self.construct(node, ty, &mut queue),
                Work::Teardown(instance) => self.teardown(&instance, &mut queue),
                Work::AwaitConstruct { node, ty } => {
                    let pending = {
                        let mut guard = self.state.lock();
                        let state = &mut *guard;
                        let pending = state.table.take_pending(node, ty);
                        if matches!(pending, Pending::Constructing) {
                            let rest = core::mem::take(&mut queue);
                            state.parked.entry((node, ty)).or_default().push(rest);
                        }
                        pending
                    };
                    match pending {
                        Pending::Doomed(instance) => self.teardown(&instance, &mut queue),
                        Pending::Constructing => {
                            tracing::debug!(
                                component = ty.name(),
                                %node,
                                "teardown batch parked behind a running constructor"
                            );
                            return;
                        }
                        Pending::Gone => {}
                    }
                }
            }
        }
    }

    fn construct(self: &Arc<Self>, node: NodeId, ty: ComponentType, queue: &mut VecDeque<Work>) {
        let built = panic::catch_unwind(AssertUnwindSafe(|| ty.construct(node)));

        let value = match built {
            Ok(value) => value,
            Err(payload) => {
                {
                    let mut guard = self.state.lock();
                    let state = &mut *guard;
                    if state.table.abandon(node, ty) {
                        state.ancestry.untrack(node);
                    }
                    state.resume_parked(node, ty, queue);
                }
                self.report(LifecycleError::InitializationFailure {
                    component: ty.name(),
                    node,
                    source: panic_error(payload),
                });
                return;
            }
        };

        let initializing = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            match state.table.install(node, ty, value) {
                Some(Installed::Live(instance)) => {
                    tracing::debug!(
                        component = ty.name(),
                        %node,
                        instance = %instance.id(),
                        "component constructed"
                    );
                    if state.broker.constructed(&instance) {
                        state.ancestry.untrack(node);
                    }
                    state.resume_parked(node, ty, queue);
                    state
                        .table
                        .transition(node, ty, instance.id(), LifecycleState::Initializing)
                }
                Some(Installed::Doomed(instance)) => {
                    state.instance_doomed(&instance);
                    // Without a parked batch, the event that doomed the slot
                    // has not reached it yet and collects the instance itself.
                    if state.parked.contains_key(&(node, ty)) {
                        if let Pending::Doomed(instance) = state.table.take_pending(node, ty) {
                            queue.push_back(Work::Teardown(instance));
                        }
                        state.resume_parked(node, ty, queue);
                    }
                    None
                }
                None => None,
            }
        };

        // Spawned without the lock: a runtime that is gone drops the task at
        // once, which reports back through `initial_finished`.
        if let Some(instance) = initializing {
            let task = self.spawn_initial(&instance);
            self.state
                .lock()
                .table
                .set_init_task(node, ty, instance.id(), task);
        }
    }

    fn spawn_initial(self: &Arc<Self>, instance: &Arc<ComponentInstance>) -> AbortHandle {
        let span = tracing::debug_span!(
            "initial",
            component = instance.name(),
            node = %instance.node(),
            instance = %instance.id()
        );
        let run = InitialRun {
            coordinator: Arc::downgrade(self),
            instance: Some(Arc::clone(instance)),
        };
        let value = Arc::clone(instance.value());

        let task = async move {
            let outcome = AssertUnwindSafe(value.run_initial()).catch_unwind().await;
            run.finish(outcome.unwrap_or_else(|payload| Err(panic_error(payload))));
        };

        self.runtime.spawn(task.instrument(span)).abort_handle()
    }

    fn initial_finished(self: &Arc<Self>, instance: &Arc<ComponentInstance>, result: Result<(), HookError>) {
        let (node, ty, id) = (instance.node(), instance.component_type(), instance.id());

        let source = match result {
            Ok(()) => {
                let mut guard = self.state.lock();
                let state = &mut *guard;
                if state
                    .table
                    .transition(node, ty, id, LifecycleState::Ready)
                    .is_some()
                {
                    tracing::debug!(component = ty.name(), %node, instance = %id, "component ready");
                    if state.broker.ready(instance) {
                        state.ancestry.untrack(node);
                    }
                }
                return;
            }
            Err(source) => source,
        };

        let doomed = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let doomed = state
                .table
                .transition(node, ty, id, LifecycleState::Destroying);
            if let Some(instance) = &doomed {
                state.instance_doomed(instance);
            }
            doomed
        };

        // A teardown that raced the completion already owns the instance.
        let Some(doomed) = doomed else {
            return;
        };
        self.report(LifecycleError::InitializationFailure {
            component: ty.name(),
            node,
            source,
        });
        self.run(vec![Work::Teardown(doomed)]);
    }

    fn teardown(self: &Arc<Self>, instance: &Arc<ComponentInstance>, queue: &mut VecDeque<Work>) {
        let (node, ty, id) = (instance.node(), instance.component_type(), instance.id());
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| instance.value().run_destroy()));

        let finished = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            let finished = state.table.finish_teardown(node, ty, id);
            if finished == Finished::Removed {
                state.ancestry.untrack(node);
            }
            finished
        };

        let failure = match outcome {
            Ok(Ok(())) => None,
            Ok(Err(source)) => Some(source),
            Err(payload) => Some(panic_error(payload)),
        };
        if let Some(source) = failure {
            self.report(LifecycleError::DestructionFailure {
                component: ty.name(),
                node,
                source,
            });
        }

        tracing::debug!(component = ty.name(), %node, instance = %id, "component destroyed");
        if finished == Finished::Recreate {
            queue.push_back(Work::Construct { node, ty });
        }
    }

    fn report(&self, error: LifecycleError) {
        self.config.diagnostics().report(error);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Waits
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn begin_wait(
        &self,
        node: NodeId,
        ty: ComponentType,
        wait_for: WaitFor,
    ) -> Result<WaitStart, WaitError> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.shut_down {
            return Err(WaitError::Shutdown);
        }
        if !self.tree.contains(node) {
            return Err(WaitError::TargetDeparented(node));
        }

        if let Some(instance) = state.table.get(node, ty) {
            let satisfied = match wait_for {
                WaitFor::Constructed => true,
                WaitFor::Ready => instance.state() == LifecycleState::Ready,
            };
            if satisfied {
                return Ok(WaitStart::Resolved(instance));
            }
        }

        let (id, receiver, first) = state.broker.register(node, ty, wait_for);
        if first {
            state.ancestry.track(&*self.tree, node);
        }
        Ok(WaitStart::Pending { id, receiver })
    }

    pub(crate) fn cancel_wait(&self, node: NodeId, ty: ComponentType, id: WaiterId) {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        if state.broker.cancel(node, ty, id) {
            state.ancestry.untrack(node);
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Shutdown
    // ─────────────────────────────────────────────────────────────────────────

    pub(crate) fn shutdown(self: &Arc<Self>) {
        let (work, connections) = {
            let mut guard = self.state.lock();
            let state = &mut *guard;
            if state.shut_down {
                return;
            }
            state.shut_down = true;

            let mut connections = Vec::new();
            for mut registration in state.registry.drain() {
                for node in registration.watcher.clear() {
                    state.ancestry.untrack(node);
                }
                connections.extend(state.retire(&mut registration));
            }
            for node in state.broker.shutdown() {
                state.ancestry.untrack(node);
            }

            let mut doomed = Vec::new();
            for node in state.table.nodes() {
                for ty in state.table.types_at(node) {
                    let teardown = state.table.force_teardown(node, ty);
                    state.doom(node, ty, teardown, &mut doomed);
                }
            }
            state.sort_deepest_first(&mut doomed);

            tracing::debug!(instances = doomed.len(), "component coordinator shutting down");
            (doomed, connections)
        };

        let tree_connection = self.tree_connection.lock().take();
        drop(tree_connection);
        drop(connections);
        self.run(work);
    }

    pub(crate) fn is_shut_down(&self) -> bool {
        self.state.lock().shut_down
    }
}

/// Carries an `initial` run to `initial_finished` exactly once.
///
/// Dropping it unfinished (the runtime shut down, or the task was aborted)
/// reports a failure. After an abort from a teardown the instance is already
/// `Destroying`, so that report changes nothing.
struct InitialRun {
    coordinator: Weak<Coordinator>,
    instance: Option<Arc<ComponentInstance>>,
}

impl InitialRun {
    fn finish(mut self, result: Result<(), HookError>) {
        self.complete(result);
    }

    fn complete(&mut self, result: Result<(), HookError>) {
        let Some(instance) = self.instance.take() else {
            return;
        };
        if let Some(coordinator) = self.coordinator.upgrade() {
            coordinator.initial_finished(&instance, result);
        }
    }
}

impl Drop for InitialRun {
    fn drop(&mut self) {
        self.complete(Err("initial was dropped before it finished".into()));
    }
}

/// Turns a panic payload into a hook error.
fn panic_error(payload: Box<dyn Any + Send>) -> HookError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|message| (*message).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string());
    format!("hook panicked: {message}").into()
}
