//! Coordinator configuration.

use core::fmt;
use core::time::Duration;
use std::sync::Arc;

use tokio::runtime::Handle;

use crate::diagnostics::{DiagnosticSink, TracingSink};

/// Default interval after which an indefinite wait logs a warning.
pub const DEFAULT_YIELD_WARNING: Duration = Duration::from_secs(5);

/// Configuration for a [`Rosyn`](crate::Rosyn) coordinator.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use rosyn_components::{MemorySink, RosynConfig};
///
/// let config = RosynConfig::default()
///     .with_default_timeout(Duration::from_secs(10))
///     .with_yield_warning(Duration::from_secs(2))
///     .with_diagnostics(Arc::new(MemorySink::new()));
///
/// assert_eq!(config.default_timeout(), Some(Duration::from_secs(10)));
/// ```
#[derive(Clone)]
pub struct RosynConfig {
    default_timeout: Option<Duration>,
    yield_warning: Option<Duration>,
    diagnostics: Arc<dyn DiagnosticSink>,
    runtime: Option<Handle>,
}

impl Default for RosynConfig {
    fn default() -> Self {
        Self {
            default_timeout: None,
            yield_warning: Some(DEFAULT_YIELD_WARNING),
            diagnostics: Arc::new(TracingSink),
            runtime: None,
        }
    }
}

impl RosynConfig {
    /// Sets the timeout applied when a wait passes `None`.
    ///
    /// Without one, such waits are indefinite.
    #[must_use]
    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Sets how long an indefinite wait runs before logging a warning.
    #[must_use]
    pub fn with_yield_warning(mut self, after: Duration) -> Self {
        self.yield_warning = Some(after);
        self
    }

    /// Disables the indefinite-wait warning.
    #[must_use]
    pub fn without_yield_warning(mut self) -> Self {
        self.yield_warning = None;
        self
    }

    /// Sets the sink receiving lifecycle hook failures.
    #[must_use]
    pub fn with_diagnostics(mut self, sink: Arc<dyn DiagnosticSink>) -> Self {
        self.diagnostics = sink;
        self
    }

    /// Sets the runtime `initial` hooks are spawned on.
    ///
    /// Defaults to the runtime current when the coordinator is created.
    #[must_use]
    pub fn with_runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    /// Returns the default wait timeout.
    #[must_use]
    pub fn default_timeout(&self) -> Option<Duration> {
        self.default_timeout
    }

    /// Returns the indefinite-wait warning interval.
    #[must_use]
    pub fn yield_warning(&self) -> Option<Duration> {
        self.yield_warning
    }

    /// Returns the diagnostic sink.
    #[must_use]
    pub fn diagnostics(&self) -> &Arc<dyn DiagnosticSink> {
        &self.diagnostics
    }

    /// Returns the configured runtime, if any.
    #[must_use]
    pub fn runtime(&self) -> Option<&Handle> {
        self.runtime.as_ref()
    }
}

impl fmt::Debug for RosynConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RosynConfig")
            .field("default_timeout", &self.default_timeout)
            .field("yield_warning", &self.yield_warning)
            .field("runtime", &self.runtime.is_some())
            .finish_non_exhaustive()
    }
}
