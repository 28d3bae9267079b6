//! # Event Bus
//!
//! Synchronous publish/subscribe used by the components to surface events
//! (`online`, `queue_processed`, wallet status changes, provider notifications).
//!
//! Every registration returns a [`Listener`]. Cancelling it detaches the
//! callback; cancelling twice, or after the bus is gone, is a no-op.
//!
//! ```rust
//! use fabric::events::EventBus;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let bus = EventBus::<u32>::new();
//! let seen = Arc::new(AtomicUsize::new(0));
//! let counter = seen.clone();
//! let listener = bus.subscribe(move |n| {
//!     counter.fetch_add(*n as usize, Ordering::SeqCst);
//! });
//!
//! bus.emit(&2);
//! listener.cancel();
//! bus.emit(&3);
//! assert_eq!(seen.load(Ordering::SeqCst), 2);
//! ```

use parking_lot::RwLock;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

/// Something a [`Listener`] can detach itself from.
pub trait Detach: Send + Sync {
    fn detach(&self, id: u64);
}

/// Cancellation handle for one registration.
pub struct Listener {
    id: u64,
    target: Option<Weak<dyn Detach>>,
    cancelled: AtomicBool,
}

impl Listener {
    pub fn new(id: u64, target: Weak<dyn Detach>) -> Self {
        Self {
            id,
            target: Some(target),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Handle for a registration that needs no cleanup.
    pub fn noop() -> Self {
        Self {
            id: 0,
            target: None,
            cancelled: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// Detach the callback. Returns true only for the call that detached it.
    pub fn cancel(&self) -> bool {
        if self.cancelled.swap(true, Ordering::SeqCst) {
            return false;
        }
        match self.target.as_ref().and_then(Weak::upgrade) {
            Some(target) => {
                target.detach(self.id);
                true
            }
            None => false,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Listener {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Listener")
            .field("id", &self.id)
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

type Callback<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct Registry<E> {
    next_id: u64,
    callbacks: Vec<(u64, Callback<E>)>,
}

struct BusInner<E> {
    registry: RwLock<Registry<E>>,
}

impl<E: 'static> Detach for BusInner<E> {
    fn detach(&self, id: u64) {
        self.registry.write().callbacks.retain(|(cb_id, _)| *cb_id != id);
    }
}

/// Fan-out of events of type `E` to registered callbacks.
pub struct EventBus<E> {
    inner: Arc<BusInner<E>>,
}

impl<E> Clone for EventBus<E> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<E: 'static> Default for EventBus<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: 'static> EventBus<E> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(BusInner {
                registry: RwLock::new(Registry {
                    next_id: 1,
                    callbacks: Vec::new(),
                }),
            }),
        }
    }

    pub fn subscribe<F>(&self, callback: F) -> Listener
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut registry = self.inner.registry.write();
            let id = registry.next_id;
            registry.next_id += 1;
            registry.callbacks.push((id, Arc::new(callback)));
            id
        };
        let weak: Weak<BusInner<E>> = Arc::downgrade(&self.inner);
        let target: Weak<dyn Detach> = weak;
        Listener::new(id, target)
    }

    /// Invoke every callback in registration order.
    ///
    /// Callbacks run without the registry lock held, so they may subscribe,
    /// cancel or emit.
    pub fn emit(&self, event: &E) {
        let callbacks: Vec<Callback<E>> = self
            .inner
            .registry
            .read()
            .callbacks
            .iter()
            .map(|(_, cb)| cb.clone())
            .collect();
        for callback in callbacks {
            callback(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.inner.registry.read().callbacks.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_emit_in_registration_order() {
        let bus = EventBus::<&'static str>::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        let a = seen.clone();
        let _l1 = bus.subscribe(move |e| a.lock().push(format!("a:{}", e)));
        let b = seen.clone();
        let _l2 = bus.subscribe(move |e| b.lock().push(format!("b:{}", e)));

        bus.emit(&"x");
        assert_eq!(*seen.lock(), vec!["a:x", "b:x"]);
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let bus = EventBus::<()>::new();
        let listener = bus.subscribe(|_| {});
        assert_eq!(bus.listener_count(), 1);

        assert!(listener.cancel());
        assert!(!listener.cancel());
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_cancel_after_bus_dropped() {
        let bus = EventBus::<()>::new();
        let listener = bus.subscribe(|_| {});
        drop(bus);
        assert!(!listener.cancel());
    }

    #[test]
    fn test_callback_may_cancel_during_emit() {
        let bus = EventBus::<()>::new();
        let slot: Arc<Mutex<Option<Listener>>> = Arc::new(Mutex::new(None));
        let inner = slot.clone();
        let listener = bus.subscribe(move |_| {
            if let Some(l) = inner.lock().as_ref() {
                l.cancel();
            }
        });
        *slot.lock() = Some(listener);

        bus.emit(&());
        assert_eq!(bus.listener_count(), 0);
    }
}
