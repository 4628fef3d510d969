//! Damageable zombies, built with Rosyn.
//!
//! Every node tagged `Damageable` below the workspace gets a [`Health`]
//! component. Hits land on body parts; the component is found by walking up
//! from the part with `get_component_from_descendant`.
//!
//! ```text
//! Workspace
//! ├── Zombie1   [Damageable] ── Health
//! │   └── Arm
//! └── Zombie2   [Damageable] ── Health
//!     └── Arm
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use rosyn_components::{Component, HookError};
use rosyn_tree::{MemoryTags, MemoryTree, NodeId, TreeError};

/// Tag carried by everything that can take damage.
pub const DAMAGEABLE: &str = "Damageable";

/// Health a zombie spawns with.
pub const MAX_HEALTH: i64 = 100;

/// Hit points of a damageable node.
pub struct Health {
    node: NodeId,
    points: AtomicI64,
}

impl Health {
    /// Returns the remaining points.
    #[must_use]
    pub fn points(&self) -> i64 {
        self.points.load(Ordering::SeqCst)
    }

    /// Subtracts `amount`, never going below zero. Returns what is left.
    pub fn damage(&self, amount: i64) -> i64 {
        let before = self
            .points
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |points| {
                Some((points - amount).max(0))
            })
            .unwrap_or_else(|points| points);
        let left = (before - amount).max(0);
        tracing::info!(node = %self.node, amount, left, "zombie hit");
        left
    }
}

#[async_trait::async_trait]
impl Component for Health {
    const NAME: &'static str = "Health";

    fn construct(node: NodeId) -> Self {
        Self {
            node,
            points: AtomicI64::new(0),
        }
    }

    async fn initial(&self) -> Result<(), HookError> {
        // Stand-in for loading the zombie's stats.
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.points.store(MAX_HEALTH, Ordering::SeqCst);
        tracing::info!(node = %self.node, points = MAX_HEALTH, "zombie spawned");
        Ok(())
    }

    fn destroy(&self) -> Result<(), HookError> {
        tracing::info!(node = %self.node, points = self.points(), "zombie despawned");
        Ok(())
    }
}

/// A zombie: the tagged body and an untagged arm below it.
#[derive(Debug, Clone, Copy)]
pub struct Zombie {
    /// The tagged body node.
    pub body: NodeId,
    /// A child part hits can land on.
    pub arm: NodeId,
}

/// The demo world: a tree with a workspace and a tag service.
pub struct Scene {
    /// The tree.
    pub tree: Arc<MemoryTree>,
    /// The tag service.
    pub tags: Arc<MemoryTags>,
    /// Root of everything damageable.
    pub workspace: NodeId,
}

impl Scene {
    /// Creates an empty workspace.
    ///
    /// # Errors
    ///
    /// Propagates tree errors.
    pub fn new() -> Result<Self, TreeError> {
        let tree = Arc::new(MemoryTree::new());
        let workspace = tree.create("Workspace", tree.root())?;
        Ok(Self {
            tree,
            tags: Arc::new(MemoryTags::new()),
            workspace,
        })
    }

    /// Adds a tagged zombie with an arm to the workspace.
    ///
    /// # Errors
    ///
    /// Propagates tree errors.
    pub fn spawn_zombie(&self, name: &str) -> Result<Zombie, TreeError> {
        let body = self.tree.create(name, self.workspace)?;
        let arm = self.tree.create("Arm", body)?;
        self.tags.add_tag(body, DAMAGEABLE);
        Ok(Zombie { body, arm })
    }
}
