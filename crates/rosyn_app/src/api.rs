//! API trait for capability registration.
//!
//! APIs are values that plugins publish on the [`App`](crate::app::App) so
//! that other plugins, and the embedding program, can reach them after the
//! build phase. The components engine publishes its
//! coordinator context this way.
//!
//! APIs that need registration after insertion use interior mutability, so a
//! shared `&A` obtained from [`App::api`](crate::app::App::api) is enough:
//!
//! ```
//! use std::sync::Mutex;
//! use rosyn_app::api::API;
//! use rosyn_app::app::App;
//!
//! #[derive(Default)]
//! struct LabelAPI {
//!     labels: Mutex<Vec<String>>,
//! }
//!
//! impl API for LabelAPI {}
//!
//! let mut app = App::new();
//! app.insert_api(LabelAPI::default());
//!
//! let api = app.api::<LabelAPI>().unwrap();
//! api.labels.lock().unwrap().push("Damageable".into());
//! ```

/// Marker trait for capability APIs.
pub trait API: Send + Sync + 'static {}
