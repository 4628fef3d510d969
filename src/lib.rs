//! Tag-driven component lifecycles for scene trees.
//!

pub use rosyn_internal::*;

/// Re-export all common types for easy access.
pub mod prelude {
    pub use rosyn_internal::prelude::*;
}
