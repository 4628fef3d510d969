//! Synchronous signals with RAII connections.
//!
//! A [`Signal`] is an ordered list of listeners. [`Signal::fire`] snapshots the
//! list before invoking it, so listeners may connect or disconnect (including
//! themselves) while an event is being delivered.
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use rosyn_tree::Signal;
//!
//! let signal = Signal::<u32>::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//!
//! let counter = Arc::clone(&seen);
//! let connection = signal.connect(move |value| {
//!     counter.fetch_add(*value as usize, Ordering::SeqCst);
//! });
//!
//! signal.fire(&2);
//! drop(connection);
//! signal.fire(&5);
//!
//! assert_eq!(seen.load(Ordering::SeqCst), 2);
//! ```

use core::fmt;
use std::sync::{Arc, Weak};

use parking_lot::RwLock;

/// Shared listener callback.
pub type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Slots<E> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

/// An ordered, thread-safe list of listeners for events of type `E`.
///
/// Cloning a `Signal` yields another handle to the same listener list.
pub struct Signal<E> {
    slots: Arc<RwLock<Slots<E>>>,
}

impl<E: 'static> Signal<E> {
    /// Creates a signal with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            slots: Arc::new(RwLock::new(Slots {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Connects a listener. It stays connected until the returned
    /// [`Connection`] is dropped or disconnected.
    pub fn connect(&self, listener: impl Fn(&E) + Send + Sync + 'static) -> Connection {
        self.connect_arc(Arc::new(listener))
    }

    /// Connects an already shared listener.
    pub fn connect_arc(&self, listener: Listener<E>) -> Connection {
        let id = {
            let mut slots = self.slots.write();
            let id = slots.next_id;
            slots.next_id += 1;
            slots.listeners.push((id, listener));
            id
        };

        let slots: Weak<RwLock<Slots<E>>> = Arc::downgrade(&self.slots);
        Connection::new(move || {
            if let Some(slots) = slots.upgrade() {
                slots.write().listeners.retain(|(slot, _)| *slot != id);
            }
        })
    }

    /// Invokes every listener connected at the time of the call, in
    /// connection order.
    pub fn fire(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self
            .slots
            .read()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    /// Returns the number of connected listeners.
    #[must_use]
    pub fn listener_count(&self) -> usize {
        self.slots.read().listeners.len()
    }
}

impl<E: 'static> Default for Signal<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> Clone for Signal<E> {
    fn clone(&self) -> Self {
        Self {
            slots: Arc::clone(&self.slots),
        }
    }
}

impl<E> fmt::Debug for Signal<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signal")
            .field("listeners", &self.slots.read().listeners.len())
            .finish()
    }
}

/// Keeps a listener connected to a [`Signal`].
///
/// Dropping the connection disconnects the listener.
#[must_use = "dropping a Connection disconnects its listener"]
pub struct Connection {
    release: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Connection {
    /// Creates a connection that runs `release` when disconnected.
    ///
    /// Host implementations of [`Tree`](crate::Tree) or
    /// [`TagService`](crate::TagService) that do not use [`Signal`] can wrap
    /// their own unsubscribe logic with this.
    pub fn new(release: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            release: Some(Box::new(release)),
        }
    }

    /// Disconnects the listener now.
    pub fn disconnect(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("connected", &self.release.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::sync::atomic::{AtomicUsize, Ordering};
    use parking_lot::Mutex;

    #[test]
    fn listeners_run_in_connection_order() {
        let signal = Signal::<&'static str>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let first = Arc::clone(&log);
        let _a = signal.connect(move |event| first.lock().push(format!("a:{event}")));
        let second = Arc::clone(&log);
        let _b = signal.connect(move |event| second.lock().push(format!("b:{event}")));

        signal.fire(&"ping");

        assert_eq!(*log.lock(), vec!["a:ping".to_string(), "b:ping".to_string()]);
    }

    #[test]
    fn explicit_disconnect_stops_delivery() {
        let signal = Signal::<()>::new();
        let count = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&count);
        let connection = signal.connect(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        signal.fire(&());
        connection.disconnect();
        signal.fire(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(signal.listener_count(), 0);
    }

    #[test]
    fn listener_may_disconnect_itself_while_firing() {
        let signal = Signal::<()>::new();
        let slot: Arc<Mutex<Option<Connection>>> = Arc::new(Mutex::new(None));
        let count = Arc::new(AtomicUsize::new(0));

        let own = Arc::clone(&slot);
        let counter = Arc::clone(&count);
        let connection = signal.connect(move |()| {
            counter.fetch_add(1, Ordering::SeqCst);
            own.lock().take();
        });
        *slot.lock() = Some(connection);

        signal.fire(&());
        signal.fire(&());

        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn connection_outliving_signal_is_harmless() {
        let signal = Signal::<()>::new();
        let connection = signal.connect(|()| {});
        drop(signal);
        drop(connection);
    }

    #[test]
    fn clones_share_listeners() {
        let signal = Signal::<()>::new();
        let other = signal.clone();
        let _connection = other.connect(|()| {});
        assert_eq!(signal.listener_count(), 1);
    }
}
