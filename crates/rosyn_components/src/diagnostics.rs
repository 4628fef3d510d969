//! Where lifecycle hook failures go.

use parking_lot::Mutex;

use crate::error::LifecycleError;

/// Receives lifecycle failures from every instance of a coordinator.
///
/// Reports are delivered synchronously from whichever thread observed the
/// failure, outside the coordinator's lock.
pub trait DiagnosticSink: Send + Sync + 'static {
    /// Handles one failure.
    fn report(&self, error: LifecycleError);
}

/// Logs failures with `tracing::error!`. The default sink.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn report(&self, error: LifecycleError) {
        tracing::error!(
            component = error.component(),
            node = %error.node(),
            error = %error,
            "component lifecycle hook failed"
        );
    }
}

/// Collects failures in memory.
#[derive(Debug, Default)]
pub struct MemorySink {
    errors: Mutex<Vec<LifecycleError>>,
}

impl MemorySink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Removes and returns every collected failure.
    pub fn take(&self) -> Vec<LifecycleError> {
        core::mem::take(&mut *self.errors.lock())
    }

    /// Returns the number of collected failures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.errors.lock().len()
    }

    /// Returns true if nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.errors.lock().is_empty()
    }
}

impl DiagnosticSink for MemorySink {
    fn report(&self, error: LifecycleError) {
        self.errors.lock().push(error);
    }
}
