use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::atomic::{AtomicUsize, Ordering};

use tracing::trace;

use super::equality::{policy, Unequal, UnequalFn};
use super::readable::Readable;
use super::setter::Setter;
use super::subscriber::{Subscriber, Subscription};

/// Cleanup returned by start hooks and derive functions.
pub type Teardown = Box<dyn FnOnce()>;

type StartHook<T> = Box<dyn Fn(&Setter<T>) -> Option<Teardown>>;
type DerivedStart<T> = Box<dyn Fn(&Store<T>) -> Teardown>;

/// What runs when a store goes from zero subscribers to one.
pub(crate) enum Start<T> {
    /// User start hook; gets a setter minted for this activation.
    Hook(StartHook<T>),
    /// Derived engine; gets the store itself.
    Derived(DerivedStart<T>),
}

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

struct Entry<T> {
    key: u64,
    subscriber: Subscriber<T>,
    // Set once the initial replay ran, cleared on removal. Broadcast passes
    // only call live entries.
    live: Rc<Cell<bool>>,
}

struct Inner<T> {
    id: usize,
    value: RefCell<T>,
    subscribers: RefCell<Vec<Entry<T>>>,
    next_key: Cell<u64>,
    // Bumped by every notification pass that delivered a changed value.
    version: Cell<u64>,
    active: Cell<bool>,
    syncing: Cell<bool>,
    start: Option<Start<T>>,
    on_stop: RefCell<Option<Teardown>>,
    enabled: RefCell<Option<Rc<Cell<bool>>>>,
    unequal: UnequalFn<T>,
    foreign: bool,
}

/// An observable value container.
///
/// A store keeps its subscribers in subscription order and replays the
/// current value to each new subscriber before `subscribe` returns. The
/// optional start hook runs when the first subscriber arrives, and the
/// teardown it returns runs when the last one leaves.
///
/// Stores are single-threaded handles: cloning a `Store` yields another
/// handle to the same value.
///
/// # Examples
///
/// ```
/// use std::{cell::RefCell, rc::Rc};
/// use tincan_stores::Store;
///
/// let store = Store::new(0);
/// let seen = Rc::new(RefCell::new(Vec::new()));
///
/// let _sub = store.subscribe({
///     let seen = Rc::clone(&seen);
///     move |value| seen.borrow_mut().push(*value)
/// });
///
/// store.set(1);
/// store.set(1);
/// store.update(|n| n + 1);
///
/// assert_eq!(*seen.borrow(), vec![0, 1, 2]);
/// ```
pub struct Store<T> {
    inner: Rc<Inner<T>>,
}

impl<T: Clone + 'static> Store<T> {
    /// Create a store with the given initial value.
    pub fn new(initial: T) -> Self
    where
        T: Unequal,
    {
        Self::build(initial, policy::<T>(), None, false)
    }

    /// Create a store whose `start` hook runs on every activation.
    ///
    /// The hook receives a [`Setter`] that stays enabled until the store's
    /// subscriber count drops back to zero, and may return a teardown to
    /// run at that point.
    ///
    /// ```
    /// use tincan_stores::Store;
    ///
    /// let clock = Store::with_start(0u64, |set| {
    ///     set.set(42);
    ///     None
    /// });
    ///
    /// assert_eq!(clock.peek(), 0);
    /// assert_eq!(clock.get(), 42);
    /// ```
    pub fn with_start<F>(initial: T, start: F) -> Self
    where
        T: Unequal,
        F: Fn(&Setter<T>) -> Option<Teardown> + 'static,
    {
        Self::build(initial, policy::<T>(), Some(Start::Hook(Box::new(start))), false)
    }

    /// Create a store with a custom change predicate.
    ///
    /// `unequal(new, current)` returns `true` when `new` should count as a
    /// change.
    pub fn with_equality<F>(initial: T, unequal: F) -> Self
    where
        F: Fn(&T, &T) -> bool + 'static,
    {
        Self::build(initial, Box::new(unequal), None, false)
    }

    pub(crate) fn build(
        initial: T,
        unequal: UnequalFn<T>,
        start: Option<Start<T>>,
        foreign: bool,
    ) -> Self {
        Self {
            inner: Rc::new(Inner {
                id: NEXT_ID.fetch_add(1, Ordering::Relaxed),
                value: RefCell::new(initial),
                subscribers: RefCell::new(Vec::new()),
                next_key: Cell::new(0),
                version: Cell::new(0),
                active: Cell::new(false),
                syncing: Cell::new(false),
                start,
                on_stop: RefCell::new(None),
                enabled: RefCell::new(None),
                unequal,
                foreign,
            }),
        }
    }

    /// Set a new value.
    ///
    /// Paired subscribers are invalidated before the value is overwritten.
    /// Plain subscribers hear about the new value only if it changed.
    pub fn set(&self, value: T) {
        let changed = (self.inner.unequal)(&value, &*self.inner.value.borrow());
        let syncing = self.inner.syncing.get();

        if changed && !syncing {
            self.invalidate();
        }
        if changed {
            *self.inner.value.borrow_mut() = value;
        }
        if !syncing {
            self.broadcast(changed, changed);
        }
    }

    /// Replace the value with `f(current)`.
    pub fn update(&self, f: impl FnOnce(&T) -> T) {
        let current = self.snapshot();
        self.set(f(&current));
    }

    /// Subscribe to value changes.
    ///
    /// The callback runs once right away with the current value, then again
    /// after every change.
    pub fn subscribe<F>(&self, callback: F) -> Subscription
    where
        F: Fn(&T) + 'static,
    {
        self.subscribe_entry(Subscriber::Value(Rc::new(callback)))
    }

    /// Subscribe with a value callback and an invalidate callback.
    ///
    /// `invalidate` runs before every change, ahead of the value being
    /// overwritten. `on_value` runs after every notification pass with the
    /// value and whether it changed.
    pub fn subscribe_paired<V, I>(&self, on_value: V, invalidate: I) -> Subscription
    where
        V: Fn(&T, bool) + 'static,
        I: Fn() + 'static,
    {
        self.subscribe_entry(Subscriber::Paired {
            value: Rc::new(on_value),
            invalidate: Rc::new(invalidate),
        })
    }

    /// Read the current value through a short-lived subscription.
    ///
    /// An inactive store is started and stopped again around the read, so
    /// lazily computed values are fresh.
    pub fn get(&self) -> T {
        let captured = Rc::new(RefCell::new(None));
        let sub = self.subscribe({
            let captured = Rc::clone(&captured);
            move |value: &T| *captured.borrow_mut() = Some(value.clone())
        });
        sub.unsubscribe();

        let value = captured.borrow_mut().take();
        value.unwrap_or_else(|| self.snapshot())
    }

    /// Read the value slot without subscribing.
    ///
    /// Cheap, but stale for an inactive derived store. Adapted foreign
    /// stores have no meaningful slot while inactive, so this falls back
    /// to [`Store::get`] for them.
    pub fn peek(&self) -> T {
        if self.inner.foreign {
            self.get()
        } else {
            self.snapshot()
        }
    }

    /// A read-only view over this store.
    pub fn readonly(&self) -> Readable<T> {
        Readable::new(self.clone())
    }

    pub(crate) fn snapshot(&self) -> T {
        self.inner.value.borrow().clone()
    }

    pub(crate) fn differs_from(&self, old: &T) -> bool {
        (self.inner.unequal)(&*self.inner.value.borrow(), old)
    }

    /// Subscribe a derived store's round listener.
    pub(crate) fn subscribe_barrier<S, I>(&self, settle: S, invalidate: I) -> Subscription
    where
        S: Fn(bool) + 'static,
        I: Fn() + 'static,
    {
        self.subscribe_entry(Subscriber::Barrier {
            settle: Rc::new(settle),
            invalidate: Rc::new(invalidate),
        })
    }

    pub(crate) fn subscribe_entry(&self, subscriber: Subscriber<T>) -> Subscription {
        let key = self.inner.next_key.get();
        self.inner.next_key.set(key + 1);
        let live = Rc::new(Cell::new(false));

        // The entry goes in before the start hook runs, so a hook that
        // subscribes and unsubscribes on its own store cannot stop it. It
        // stays silent until its replay.
        self.inner.subscribers.borrow_mut().push(Entry {
            key,
            subscriber: subscriber.clone(),
            live: Rc::clone(&live),
        });
        if !self.inner.active.get() {
            self.activate();
        }

        live.set(true);
        subscriber.replay(&self.snapshot());

        let store = self.clone();
        Subscription::new(move || store.unsubscribe(key))
    }

    /// Tell paired subscribers that a new value is on its way.
    pub(crate) fn invalidate(&self) {
        let pass: Vec<_> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .filter_map(|entry| {
                let invalidate = entry.subscriber.invalidator()?;
                Some((Rc::clone(&entry.live), invalidate))
            })
            .collect();

        for (live, invalidate) in pass {
            if live.get() {
                invalidate();
            }
        }
    }

    /// Deliver the current value at the end of a round whose invalidation
    /// already went out.
    pub(crate) fn notify(&self, changed: bool) {
        self.broadcast(changed, true);
    }

    /// Deliver the current value to every subscriber.
    ///
    /// The pass works on a snapshot of the subscriber list: entries added
    /// mid-pass wait for the next one, entries removed mid-pass are skipped.
    /// If a subscriber sets a changed value reentrantly, the nested pass has
    /// already delivered the newer value, so plain subscribers left in this
    /// pass are skipped and paired ones receive the newer value. A pass no
    /// invalidation announced (an unchanged `set`) skips round listeners,
    /// which would otherwise close a round that is still waiting on it.
    fn broadcast(&self, changed: bool, announced: bool) {
        let pass: Vec<(Rc<Cell<bool>>, Subscriber<T>)> = self
            .inner
            .subscribers
            .borrow()
            .iter()
            .filter(|entry| announced || entry.subscriber.hears_unannounced())
            .map(|entry| (Rc::clone(&entry.live), entry.subscriber.clone()))
            .collect();

        if changed {
            self.inner.version.set(self.inner.version.get() + 1);
        }
        let version = self.inner.version.get();
        let mut value = self.snapshot();

        for (live, subscriber) in pass {
            if !live.get() {
                continue;
            }
            let superseded = self.inner.version.get() != version;
            match subscriber {
                Subscriber::Value(_) if superseded => continue,
                Subscriber::Paired { .. } if superseded => value = self.snapshot(),
                _ => {}
            }
            subscriber.notify(&value, changed);
        }
    }

    pub(crate) fn begin_sync(&self) -> SyncGuard<'_, T> {
        self.inner.syncing.set(true);
        SyncGuard { store: self }
    }

    fn activate(&self) {
        self.inner.active.set(true);
        trace!(store = self.inner.id, "store started");

        let stop = match &self.inner.start {
            None => None,
            Some(Start::Hook(hook)) => {
                let enabled = Rc::new(Cell::new(true));
                *self.inner.enabled.borrow_mut() = Some(Rc::clone(&enabled));
                hook(&Setter::new(self, enabled))
            }
            Some(Start::Derived(start)) => Some(start(self)),
        };
        *self.inner.on_stop.borrow_mut() = stop;
    }

    fn unsubscribe(&self, key: u64) {
        let (removed, now_empty) = {
            let mut subscribers = self.inner.subscribers.borrow_mut();
            let Some(position) = subscribers.iter().position(|entry| entry.key == key) else {
                return;
            };
            let removed = subscribers.remove(position);
            removed.live.set(false);
            (removed, subscribers.is_empty())
        };
        // Dropped outside the borrow: callbacks may own guards on this store.
        drop(removed);

        if now_empty && self.inner.active.get() {
            self.deactivate();
        }
    }

    fn deactivate(&self) {
        self.inner.active.set(false);

        let enabled = self.inner.enabled.borrow_mut().take();
        if let Some(enabled) = enabled {
            enabled.set(false);
        }
        let stop = self.inner.on_stop.borrow_mut().take();
        if let Some(stop) = stop {
            stop();
        }

        trace!(store = self.inner.id, "store stopped");
    }
}

impl<T> Store<T> {
    /// Unique id of this store, used in log events.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.inner.subscribers.borrow().len()
    }

    /// Whether the start hook has run and the stop hook has not.
    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub(crate) fn downgrade(&self) -> WeakStore<T> {
        WeakStore {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

impl<T> Clone for Store<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for Store<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("id", &self.inner.id)
            .field("value", &*self.inner.value.borrow())
            .field("subscribers", &self.inner.subscribers.borrow().len())
            .field("active", &self.inner.active.get())
            .finish()
    }
}

/// Non-owning handle, held by setters and derived engines.
pub(crate) struct WeakStore<T> {
    inner: Weak<Inner<T>>,
}

impl<T> WeakStore<T> {
    pub(crate) fn upgrade(&self) -> Option<Store<T>> {
        self.inner.upgrade().map(|inner| Store { inner })
    }

    pub(crate) fn is_alive(&self) -> bool {
        self.inner.strong_count() > 0
    }
}

impl<T> Clone for WeakStore<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Weak::clone(&self.inner),
        }
    }
}

/// Clears the syncing flag when a derive invocation ends, including by
/// unwinding.
pub(crate) struct SyncGuard<'a, T> {
    store: &'a Store<T>,
}

impl<T> Drop for SyncGuard<'_, T> {
    fn drop(&mut self) {
        self.store.inner.syncing.set(false);
    }
}
