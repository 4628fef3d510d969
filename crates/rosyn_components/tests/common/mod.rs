//! Shared fixtures for the integration tests.
//!
//! Components record their hooks into a process-wide log. Node ids are unique
//! across every tree, so each test reads back only the entries of its own
//! [`World`].

#![allow(
    dead_code,
    missing_docs,
    reason = "shared fixtures; each test binary uses a different subset"
)]

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Barrier, LazyLock};
use std::time::Duration;

use hashbrown::HashMap;
use parking_lot::Mutex;
use rosyn_components::{Component, HookError, MemorySink, Rosyn, RosynConfig};
use rosyn_tree::{MemoryTags, MemoryTree, NodeId};
use tokio::sync::Notify;

pub const DAMAGEABLE: &str = "Damageable";

// ─────────────────────────────────────────────────────────────────────────────
// Hook Log
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hook {
    Construct,
    Initial,
    Ready,
    Destroy,
}

#[derive(Debug, Clone, Copy)]
pub struct Entry {
    pub node: NodeId,
    pub component: &'static str,
    pub hook: Hook,
}

static LOG: LazyLock<Mutex<Vec<Entry>>> = LazyLock::new(Mutex::default);

/// Live values per node, with the highest count ever observed.
static ALIVE: LazyLock<Mutex<HashMap<NodeId, (usize, usize)>>> = LazyLock::new(Mutex::default);

static GATES: LazyLock<Mutex<HashMap<NodeId, Arc<Notify>>>> = LazyLock::new(Mutex::default);

static LATCHES: LazyLock<Mutex<HashMap<NodeId, Arc<Barrier>>>> = LazyLock::new(Mutex::default);

static REVIVE: LazyLock<Mutex<HashMap<NodeId, Arc<MemoryTags>>>> = LazyLock::new(Mutex::default);

pub fn record(node: NodeId, component: &'static str, hook: Hook) {
    LOG.lock().push(Entry {
        node,
        component,
        hook,
    });
}

fn gate(node: NodeId) -> Arc<Notify> {
    Arc::clone(GATES.lock().entry(node).or_default())
}

/// Lets the `initial` of the [`Gated`] component on `node` finish.
pub fn open_gate(node: NodeId) {
    gate(node).notify_one();
}

/// Makes the next [`Latched`] constructor on `node` meet the caller at the
/// returned barrier twice: once on entry and once before it returns.
pub fn arm_latch(node: NodeId) -> Arc<Barrier> {
    let latch = Arc::new(Barrier::new(2));
    LATCHES.lock().insert(node, Arc::clone(&latch));
    latch
}

/// Makes the next `Phoenix::destroy` on `node` put the tag back.
pub fn revive_on_destroy(node: NodeId, tags: Arc<MemoryTags>) {
    REVIVE.lock().insert(node, tags);
}

/// Returns (currently alive, most ever alive at once) for `node`.
pub fn alive(node: NodeId) -> (usize, usize) {
    ALIVE.lock().get(&node).copied().unwrap_or_default()
}

fn born(node: NodeId) {
    let mut alive = ALIVE.lock();
    let (now, peak) = alive.entry(node).or_default();
    *now += 1;
    *peak = (*peak).max(*now);
}

fn died(node: NodeId) {
    if let Some((now, _)) = ALIVE.lock().get_mut(&node) {
        *now -= 1;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Components
// ─────────────────────────────────────────────────────────────────────────────

/// Sets its points in `initial`.
pub struct Health {
    pub node: NodeId,
    pub points: AtomicI64,
}

#[async_trait::async_trait]
impl Component for Health {
    const NAME: &'static str = "Health";

    fn construct(node: NodeId) -> Self {
        record(node, Self::NAME, Hook::Construct);
        born(node);
        Self {
            node,
            points: AtomicI64::new(0),
        }
    }

    async fn initial(&self) -> Result<(), HookError> {
        record(self.node, Self::NAME, Hook::Initial);
        self.points.store(100, Ordering::SeqCst);
        record(self.node, Self::NAME, Hook::Ready);
        Ok(())
    }

    fn destroy(&self) -> Result<(), HookError> {
        died(self.node);
        record(self.node, Self::NAME, Hook::Destroy);
        Ok(())
    }
}

/// Sleeps 50ms in `initial`.
pub struct Slow {
    node: NodeId,
}

#[async_trait::async_trait]
impl Component for Slow {
    const NAME: &'static str = "Slow";

    fn construct(node: NodeId) -> Self {
        record(node, Self::NAME, Hook::Construct);
        Self { node }
    }

    async fn initial(&self) -> Result<(), HookError> {
        record(self.node, Self::NAME, Hook::Initial);
        tokio::time::sleep(Duration::from_millis(50)).await;
        record(self.node, Self::NAME, Hook::Ready);
        Ok(())
    }

    fn destroy(&self) -> Result<(), HookError> {
        record(self.node, Self::NAME, Hook::Destroy);
        Ok(())
    }
}

/// `initial` always fails.
pub struct Failing {
    node: NodeId,
}

#[async_trait::async_trait]
impl Component for Failing {
    const NAME: &'static str = "Failing";

    fn construct(node: NodeId) -> Self {
        record(node, Self::NAME, Hook::Construct);
        Self { node }
    }

    async fn initial(&self) -> Result<(), HookError> {
        record(self.node, Self::NAME, Hook::Initial);
        Err("armor rejected".into())
    }

    fn destroy(&self) -> Result<(), HookError> {
        record(self.node, Self::NAME, Hook::Destroy);
        Ok(())
    }
}

/// The constructor panics.
pub struct Exploding;

impl Component for Exploding {
    const NAME: &'static str = "Exploding";

    fn construct(node: NodeId) -> Self {
        record(node, Self::NAME, Hook::Construct);
        panic!("constructor exploded");
    }
}

/// `destroy` fails.
pub struct BrokenDestroy {
    node: NodeId,
}

impl Component for BrokenDestroy {
    const NAME: &'static str = "BrokenDestroy";

    fn construct(node: NodeId) -> Self {
        record(node, Self::NAME, Hook::Construct);
        Self { node }
    }

    fn destroy(&self) -> Result<(), HookError> {
        record(self.node, Self::NAME, Hook::Destroy);
        Err("cleanup failed".into())
    }
}

/// `initial` blocks until [`open_gate`] is called for its node.
pub struct Gated {
    node: NodeId,
}

#[async_trait::async_trait]
impl Component for Gated {
    const NAME: &'static str = "Gated";

    fn construct(node: NodeId) -> Self {
        record(node, Self::NAME, Hook::Construct);
        Self { node }
    }

    async fn initial(&self) -> Result<(), HookError> {
        record(self.node, Self::NAME, Hook::Initial);
        gate(self.node).notified().await;
        record(self.node, Self::NAME, Hook::Ready);
        Ok(())
    }

    fn destroy(&self) -> Result<(), HookError> {
        record(self.node, Self::NAME, Hook::Destroy);
        Ok(())
    }
}

/// The constructor parks on the latch armed by [`arm_latch`].
pub struct Latched {
    node: NodeId,
}

impl Component for Latched {
    const NAME: &'static str = "Latched";

    fn construct(node: NodeId) -> Self {
        let latch = LATCHES.lock().remove(&node);
        if let Some(latch) = latch {
            latch.wait();
            latch.wait();
        }
        record(node, Self::NAME, Hook::Construct);
        Self { node }
    }

    fn destroy(&self) -> Result<(), HookError> {
        record(self.node, Self::NAME, Hook::Destroy);
        Ok(())
    }
}

/// Re-tags its node from inside `destroy` when armed with
/// [`revive_on_destroy`].
pub struct Phoenix {
    node: NodeId,
}

impl Component for Phoenix {
    const NAME: &'static str = "Phoenix";

    fn construct(node: NodeId) -> Self {
        record(node, Self::NAME, Hook::Construct);
        born(node);
        Self { node }
    }

    fn destroy(&self) -> Result<(), HookError> {
        record(self.node, Self::NAME, Hook::Destroy);
        died(self.node);
        let revive = REVIVE.lock().remove(&self.node);
        if let Some(tags) = revive {
            tags.add_tag(self.node, DAMAGEABLE);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// World
// ─────────────────────────────────────────────────────────────────────────────

/// A tree, a tag service and a coordinator over them.
pub struct World {
    pub tree: Arc<MemoryTree>,
    pub tags: Arc<MemoryTags>,
    pub workspace: NodeId,
    pub storage: NodeId,
    pub sink: Arc<MemorySink>,
    pub rosyn: Rosyn,
}

impl World {
    /// Must be called inside a tokio runtime.
    pub fn new() -> Self {
        Self::with_config(RosynConfig::default())
    }

    pub fn with_config(config: RosynConfig) -> Self {
        let tree = Arc::new(MemoryTree::new());
        let tags = Arc::new(MemoryTags::new());
        let sink = Arc::new(MemorySink::new());
        let workspace = tree.create("Workspace", tree.root()).unwrap();
        let storage = tree.create("Storage", tree.root()).unwrap();

        let rosyn = Rosyn::with_config(
            tree.clone(),
            tags.clone(),
            config.with_diagnostics(sink.clone()),
        )
        .unwrap();

        Self {
            tree,
            tags,
            workspace,
            storage,
            sink,
            rosyn,
        }
    }

    pub fn spawn(&self, name: &str, parent: NodeId) -> NodeId {
        self.tree.create(name, parent).unwrap()
    }

    pub fn tag(&self, node: NodeId) {
        assert!(self.tags.add_tag(node, DAMAGEABLE));
    }

    pub fn untag(&self, node: NodeId) {
        assert!(self.tags.remove_tag(node, DAMAGEABLE));
    }

    /// Hook log entries for this world's nodes, oldest first.
    pub fn entries(&self) -> Vec<Entry> {
        LOG.lock()
            .iter()
            .filter(|entry| self.tree.name(entry.node).is_some())
            .copied()
            .collect()
    }

    /// Nodes whose `component` ran `hook`, by node name, oldest first.
    pub fn names(&self, component: &str, hook: Hook) -> Vec<String> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.component == component && entry.hook == hook)
            .filter_map(|entry| self.tree.name(entry.node))
            .collect()
    }

    pub fn count(&self, node: NodeId, component: &str, hook: Hook) -> usize {
        self.entries()
            .into_iter()
            .filter(|entry| entry.node == node && entry.component == component && entry.hook == hook)
            .count()
    }

    /// Hooks run on `node`, oldest first.
    pub fn hooks(&self, node: NodeId, component: &str) -> Vec<Hook> {
        self.entries()
            .into_iter()
            .filter(|entry| entry.node == node && entry.component == component)
            .map(|entry| entry.hook)
            .collect()
    }
}

/// Lets spawned `initial` tasks run on a current-thread runtime.
pub async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}
