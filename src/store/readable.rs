use std::fmt;

use super::store::Store;
use super::subscriber::Subscription;

pub(crate) mod sealed {
    use crate::store::Store;

    pub trait AsStore: Clone + 'static {
        type Value: Clone + 'static;

        fn as_store(&self) -> &Store<Self::Value>;
    }
}

/// Anything that can be read and subscribed to: [`Store`] and [`Readable`].
///
/// Sealed; foreign observables enter through
/// [`ForeignRegistry::adapt`](crate::ForeignRegistry::adapt).
pub trait Source: sealed::AsStore {}

impl<S: sealed::AsStore> Source for S {}

/// Read-only view of a store.
///
/// Derived stores and adapted foreign stores are handed out as `Readable`s.
/// Everything except `set`/`update` is delegated to the wrapped store.
pub struct Readable<T> {
    store: Store<T>,
}

impl<T: Clone + 'static> Readable<T> {
    pub(crate) fn new(store: Store<T>) -> Self {
        Self { store }
    }

    /// See [`Store::subscribe`].
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        self.store.subscribe(callback)
    }

    /// See [`Store::subscribe_paired`].
    pub fn subscribe_paired<V, I>(&self, on_value: V, invalidate: I) -> Subscription
    where
        V: Fn(&T, bool) + 'static,
        I: Fn() + 'static,
    {
        self.store.subscribe_paired(on_value, invalidate)
    }

    /// See [`Store::get`].
    pub fn get(&self) -> T {
        self.store.get()
    }

    /// See [`Store::peek`].
    pub fn peek(&self) -> T {
        self.store.peek()
    }
}

impl<T> Readable<T> {
    /// See [`Store::id`].
    pub fn id(&self) -> usize {
        self.store.id()
    }

    /// See [`Store::subscriber_count`].
    pub fn subscriber_count(&self) -> usize {
        self.store.subscriber_count()
    }

    /// See [`Store::is_active`].
    pub fn is_active(&self) -> bool {
        self.store.is_active()
    }
}

impl<T> Clone for Readable<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Readable<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Readable").field(&self.store).finish()
    }
}

impl<T: Clone + 'static> sealed::AsStore for Store<T> {
    type Value = T;

    fn as_store(&self) -> &Store<T> {
        self
    }
}

impl<T: Clone + 'static> sealed::AsStore for Readable<T> {
    type Value = T;

    fn as_store(&self) -> &Store<T> {
        &self.store
    }
}

/// Wrap any source in a read-only view.
pub fn create_readonly<S: Source>(source: &S) -> Readable<S::Value> {
    source.as_store().readonly()
}

/// Read the current value of a source.
///
/// By default this subscribes, captures the replayed value and unsubscribes,
/// which starts and stops an inactive store around the read. With
/// `allow_stale` the value slot of a native store is read directly instead.
///
/// ```
/// use tincan_stores::{create_derived, get_current_value, Store};
///
/// let base = Store::new(2);
/// let doubled = create_derived(base.clone(), |n: i32| n * 2).unwrap();
///
/// base.set(5);
/// assert_eq!(get_current_value(&doubled, false), 10);
/// // Never activated since the last read, so the slot is behind.
/// base.set(6);
/// assert_eq!(get_current_value(&doubled, true), 10);
/// ```
pub fn get_current_value<S: Source>(source: &S, allow_stale: bool) -> S::Value {
    let store = source.as_store();
    if allow_stale {
        store.peek()
    } else {
        store.get()
    }
}
