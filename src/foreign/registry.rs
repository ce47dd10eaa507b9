use std::any::Any;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use tracing::debug;

use super::ForeignStore;
use crate::store::{policy, Readable, Setter, Start, Store, Teardown, WeakStore};

struct Entry {
    // `WeakStore<V>` for the foreign object's value type.
    wrapper: Box<dyn Any>,
    alive: Box<dyn Fn() -> bool>,
}

/// Identity-keyed cache of adapted foreign stores.
///
/// Adapting the same foreign object twice yields handles to the same
/// wrapper, so every derived store built on it shares one foreign
/// subscription. The registry holds wrappers weakly: once the last handle to
/// a wrapper is gone its entry is dead, and dead entries are pruned whenever
/// a new wrapper is registered (or on demand with [`ForeignRegistry::prune`]).
///
/// The registry is meant to be owned by the application's composition root
/// and passed to whatever builds the store graph.
#[derive(Default)]
pub struct ForeignRegistry {
    entries: RefCell<HashMap<usize, Entry>>,
}

impl ForeignRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wrap `foreign` as a native store, reusing a live wrapper for the
    /// same object.
    pub fn adapt<F: ForeignStore>(&self, foreign: &Rc<F>) -> Readable<F::Value> {
        let key = Rc::as_ptr(foreign) as *const () as usize;

        let existing = self
            .entries
            .borrow()
            .get(&key)
            .and_then(|entry| entry.wrapper.downcast_ref::<WeakStore<F::Value>>())
            .and_then(WeakStore::upgrade);
        if let Some(store) = existing {
            debug!(store = store.id(), "reusing foreign store adapter");
            return store.readonly();
        }

        self.prune();
        let store = wrap(Rc::clone(foreign));
        let weak = store.downgrade();
        let probe = weak.clone();
        self.entries.borrow_mut().insert(
            key,
            Entry {
                wrapper: Box::new(weak),
                alive: Box::new(move || probe.is_alive()),
            },
        );
        debug!(store = store.id(), "adapted foreign store");

        store.readonly()
    }

    /// Drop entries whose wrapper is gone. Returns how many were removed.
    pub fn prune(&self) -> usize {
        let mut entries = self.entries.borrow_mut();
        let before = entries.len();
        entries.retain(|_, entry| (entry.alive)());
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "pruned foreign store adapters");
        }
        removed
    }

    /// Number of registered entries, dead ones included until pruned.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl fmt::Debug for ForeignRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ForeignRegistry")
            .field("entries", &self.len())
            .finish()
    }
}

fn wrap<F: ForeignStore>(foreign: Rc<F>) -> Store<F::Value> {
    let start = move |set: &Setter<F::Value>| -> Option<Teardown> {
        let set = set.clone();
        let teardown = foreign.subscribe(Box::new(move |value| set.set(value)));
        Some(Box::new(move || teardown.run()))
    };
    Store::build(
        F::Value::default(),
        policy::<F::Value>(),
        Some(Start::Hook(Box::new(start))),
        true,
    )
}
