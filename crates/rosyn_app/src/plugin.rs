//! Plugins: the only way to put behavior into an [`App`].
//!
//! The tracing subscriber and the components engine are both plugins;
//! embedding programs add their own next to them.
//!
//! # Example
//!
//! ```
//! use rosyn_app::app::App;
//! use rosyn_app::plugin::{Plugin, PluginId};
//!
//! struct LoggingPlugin;
//!
//! impl Plugin for LoggingPlugin {
//!     fn build(&self, _app: &mut App) {}
//! }
//!
//! struct GamePlugin;
//!
//! impl Plugin for GamePlugin {
//!     fn build(&self, _app: &mut App) {}
//!
//!     fn dependencies(&self) -> Vec<PluginId> {
//!         vec![PluginId::of::<LoggingPlugin>()]
//!     }
//! }
//!
//! // GamePlugin is built second even though it was added first.
//! App::new()
//!     .add_plugins(GamePlugin)
//!     .add_plugins(LoggingPlugin)
//!     .run();
//! ```

use core::any::TypeId;
use core::fmt;

use crate::app::App;

/// Identifies a plugin type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PluginId {
    type_id: TypeId,
    type_name: &'static str,
}

impl PluginId {
    /// Returns the id of plugin type `P`.
    #[must_use]
    pub fn of<P: Plugin>() -> Self {
        Self {
            type_id: TypeId::of::<P>(),
            type_name: core::any::type_name::<P>(),
        }
    }

    /// Returns the Rust type name of the plugin.
    #[must_use]
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }
}

impl fmt::Display for PluginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.type_name)
    }
}

/// Behavior added to an [`App`].
///
/// `build` and `ready` run dependencies first; `cleanup` runs in the opposite
/// order.
pub trait Plugin: Send + Sync + 'static {
    /// Publishes globals and APIs. Plugins added from here are built at once.
    fn build(&self, app: &mut App);

    /// Runs once every plugin is built.
    fn ready(&self, _app: &mut App) {}

    /// Runs when the app is torn down.
    fn cleanup(&self, _app: &mut App) {}

    /// Name used in logs and panics.
    fn name(&self) -> &str {
        core::any::type_name::<Self>()
    }

    /// Plugins that must be built first. A missing one makes
    /// [`App::finish`] panic.
    fn dependencies(&self) -> Vec<PluginId> {
        Vec::new()
    }

    /// Whether adding the type a second time panics. Defaults to `true`.
    fn is_unique(&self) -> bool {
        true
    }
}
