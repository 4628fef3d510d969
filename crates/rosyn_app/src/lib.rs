//! The plugin host for Rosyn (Layer 1).
//!
//! `rosyn_app` is a small plugin orchestrator:
//!
//! - [`api`] - the [`API`](api::API) marker for build-time capability registries
//! - [`plugin`] - the [`Plugin`](plugin::Plugin) trait and [`PluginId`](plugin::PluginId)
//! - [`app`] - the [`App`](app::App) that orders, builds and cleans up plugins
//!
//! # Example
//!
//! ```
//! use rosyn_app::app::App;
//! use rosyn_app::plugin::Plugin;
//!
//! struct Greeting(&'static str);
//!
//! struct GreetingPlugin;
//!
//! impl Plugin for GreetingPlugin {
//!     fn build(&self, app: &mut App) {
//!         app.insert_global(Greeting("hello"));
//!     }
//! }
//!
//! let mut app = App::new();
//! app.add_plugins(GreetingPlugin).run();
//!
//! assert_eq!(app.get_global::<Greeting>().map(|g| g.0), Some("hello"));
//! ```

/// API trait for capability registration.
pub mod api;

/// Plugin trait for extensible functionality.
pub mod plugin;

/// App runtime for plugin orchestration.
pub mod app;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use crate::api::*;
    pub use crate::app::*;
    pub use crate::plugin::*;
}
