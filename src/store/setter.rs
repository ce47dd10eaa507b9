use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use super::store::{Store, WeakStore};

/// Revocable write capability handed to start hooks and derive functions.
///
/// A setter is bound to one activation of its store. When the store's last
/// subscriber leaves, every setter minted for that activation is disabled
/// and its `set`/`update` calls are ignored. Closures that outlive the
/// activation (a timer, a callback registered elsewhere) therefore cannot
/// write into a store that has already stopped.
pub struct Setter<T> {
    store: WeakStore<T>,
    enabled: Rc<Cell<bool>>,
}

impl<T: Clone + 'static> Setter<T> {
    pub(crate) fn new(store: &Store<T>, enabled: Rc<Cell<bool>>) -> Self {
        Self {
            store: store.downgrade(),
            enabled,
        }
    }

    /// Whether writes through this setter still reach the store.
    pub fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    /// Set the store's value. No-op once disabled.
    pub fn set(&self, value: T) {
        if !self.enabled.get() {
            return;
        }
        if let Some(store) = self.store.upgrade() {
            store.set(value);
        }
    }

    /// Replace the store's value with `f(current)`. No-op once disabled.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        if !self.enabled.get() {
            return;
        }
        if let Some(store) = self.store.upgrade() {
            store.update(f);
        }
    }
}

impl<T> Clone for Setter<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            enabled: Rc::clone(&self.enabled),
        }
    }
}

impl<T> fmt::Debug for Setter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Setter")
            .field("enabled", &self.enabled.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disabled_setter_is_inert() {
        let store = Store::new(1);
        let enabled = Rc::new(Cell::new(true));
        let setter = Setter::new(&store, Rc::clone(&enabled));

        setter.set(2);
        assert_eq!(store.peek(), 2);

        enabled.set(false);
        setter.set(3);
        setter.update(|n| n + 10);
        assert_eq!(store.peek(), 2);
        assert!(!setter.clone().is_enabled());
    }

    #[test]
    fn setter_does_not_keep_store_alive() {
        let store = Store::new(1);
        let setter = Setter::new(&store, Rc::new(Cell::new(true)));
        drop(store);

        // Nothing to write into, nothing happens.
        setter.set(5);
        assert!(setter.is_enabled());
    }
}
