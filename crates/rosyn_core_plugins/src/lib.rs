//! Infrastructure plugins for Rosyn applications.
//!
//! - [`TracingPlugin`] - installs a `tracing_subscriber` registry and
//!   publishes [`TracingConfig`]
//!
//! # Example
//!
//! ```
//! use rosyn_app::app::App;
//! use rosyn_core_plugins::TracingPlugin;
//! use tracing::Level;
//!
//! App::new()
//!     .add_plugins(TracingPlugin::default().with_level(Level::DEBUG))
//!     .run();
//! ```

mod tracing_plugin;

pub use tracing_plugin::{TracingConfig, TracingFormat, TracingPlugin};
