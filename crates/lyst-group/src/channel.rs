//! Observer registry and synchronous event fan-out.
//!
//! A [`NotificationChannel`] owns the ordered observer list of one event
//! source. Emission snapshots the list and delivers outside the lock, in
//! reverse registration order, so an observer may register or unregister
//! observers (including itself) from inside its handler without affecting the
//! in-flight delivery.

use std::sync::{Arc, Mutex};

use tracing::trace;

use lyst_types::{GroupError, GroupEvent, GroupObserver, GroupResult, SourceId};

/// Ordered registry of observers with reverse-order fan-out.
#[derive(Default)]
pub struct NotificationChannel {
    observers: Mutex<Vec<Arc<dyn GroupObserver>>>,
}

impl NotificationChannel {
    /// Create a channel with no observers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `observer` to the registry.
    ///
    /// Identity is the observer allocation, not its contents: registering the
    /// same `Arc` twice fails with [`GroupError::DuplicateObserver`].
    pub fn register(&self, observer: Arc<dyn GroupObserver>) -> GroupResult<()> {
        let mut observers = self.observers.lock().expect("observer list lock poisoned");
        if observers.iter().any(|o| Arc::ptr_eq(o, &observer)) {
            return Err(GroupError::DuplicateObserver);
        }
        observers.push(observer);
        Ok(())
    }

    /// Remove `observer` from the registry.
    pub fn unregister(&self, observer: &Arc<dyn GroupObserver>) -> GroupResult<()> {
        let mut observers = self.observers.lock().expect("observer list lock poisoned");
        let index = observers
            .iter()
            .position(|o| Arc::ptr_eq(o, observer))
            .ok_or(GroupError::ObserverNotFound)?;
        observers.remove(index);
        Ok(())
    }

    /// Returns `true` if `observer` is registered.
    pub fn is_registered(&self, observer: &Arc<dyn GroupObserver>) -> bool {
        self.observers
            .lock()
            .expect("observer list lock poisoned")
            .iter()
            .any(|o| Arc::ptr_eq(o, observer))
    }

    /// Number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.observers
            .lock()
            .expect("observer list lock poisoned")
            .len()
    }

    /// Deliver `event` to every observer registered at the time of the call,
    /// most recently registered first.
    pub fn emit(&self, source: SourceId, event: &GroupEvent) {
        let snapshot: Vec<Arc<dyn GroupObserver>> = self
            .observers
            .lock()
            .expect("observer list lock poisoned")
            .clone();
        trace!(source = %source, event = %event, observers = snapshot.len(), "fan-out");
        for observer in snapshot.iter().rev() {
            observer.on_event(source, event);
        }
    }
}

impl std::fmt::Debug for NotificationChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationChannel")
            .field("observers", &self.observer_count())
            .finish()
    }
}
