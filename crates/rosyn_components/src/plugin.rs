//! Plugin wiring the coordinator into an [`App`].

use core::time::Duration;
use std::sync::Arc;

use rosyn_app::app::App;
use rosyn_app::plugin::Plugin;
use rosyn_tree::{TagService, Tree};
use tokio::runtime::Handle;

use crate::config::RosynConfig;
use crate::context::Rosyn;
use crate::diagnostics::DiagnosticSink;

/// Creates a [`Rosyn`] coordinator and publishes it as an API.
///
/// The coordinator shuts down in [`Plugin::cleanup`].
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use rosyn_app::app::App;
/// use rosyn_components::{ComponentsPlugin, Rosyn};
/// use rosyn_tree::{MemoryTags, MemoryTree};
///
/// # #[tokio::main(flavor = "current_thread")]
/// # async fn main() {
/// let plugin = ComponentsPlugin::new(Arc::new(MemoryTree::new()), Arc::new(MemoryTags::new()))
///     .with_default_timeout(Duration::from_secs(30));
///
/// let mut app = App::new();
/// app.add_plugins(plugin).run();
///
/// let rosyn = app.api::<Rosyn>().unwrap().clone();
/// assert!(!rosyn.is_shut_down());
///
/// app.cleanup();
/// assert!(rosyn.is_shut_down());
/// # }
/// ```
pub struct ComponentsPlugin {
    tree: Arc<dyn Tree>,
    tags: Arc<dyn TagService>,
    config: RosynConfig,
}

impl ComponentsPlugin {
    /// Creates the plugin for a tree and tag service.
    #[must_use]
    pub fn new(tree: Arc<dyn Tree>, tags: Arc<dyn TagService>) -> Self {
        Self {
            tree,
            tags,
            config: RosynConfig::default(),
        }
    }

    /// Replaces the whole configuration.
    #[must_use]
    pub fn with_config(mut self, config: RosynConfig) -> Self {
        self.config = config;
        self
    }

    /// See [`RosynConfig::with_default_timeout`].
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_default_timeout(timeout);
        self
    }

    /// See [`RosynConfig::with_yield_warning`].
    #[must_use]
    pub fn with_yield_warning(mut self, after: Duration) -> Self {
        self.config = self.config.with_yield_warning(after);
        self
    }

    /// See [`RosynConfig::with_diagnostics`].
    #[must_use]
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.config = self.config.with_diagnostics(sink);
        self
    }

    /// See [`RosynConfig::with_runtime`].
    #[must_use]
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.config = self.config.with_runtime(handle);
        self
    }
}

impl Plugin for ComponentsPlugin {
    /// # Panics
    ///
    /// Panics if no tokio runtime is configured or current.
    fn build(&self, app: &mut App) {
        let rosyn = match Rosyn::with_config(
            Arc::clone(&self.tree),
            Arc::clone(&self.tags),
            self.config.clone(),
        ) {
            Ok(rosyn) => rosyn,
            Err(err) => panic!("ComponentsPlugin could not start the coordinator: {err}"),
        };
        app.insert_api(rosyn);
    }

    fn cleanup(&self, app: &mut App) {
        if let Some(rosyn) = app.api::<Rosyn>() {
            rosyn.shutdown();
        }
    }
}
