use std::cell::{Cell, RefCell};
use std::rc::Rc;

use tracing::trace;

use super::dependencies::list::{DependencyList, Listener};
use super::dependencies::Dependencies;
use crate::error::Result;
use crate::store::{policy, Readable, Setter, Start, Store, Teardown, Unequal, WeakStore};

enum Compute<V, T> {
    /// Return the new value.
    Map(Box<dyn Fn(V) -> T>),
    /// Write through a setter, optionally returning a cleanup.
    WithSetter(Box<dyn Fn(V, &Setter<T>) -> Option<Teardown>>),
}

/// Round barrier for one activation of a derived store.
///
/// Every dependency that is about to change opens (or extends) the round by
/// invalidating; every dependency that settled closes its share of it. The
/// derive function runs once, when the last share closes.
///
/// Shares are counted per dependency, so a value from one dependency can
/// only close invalidations that same dependency announced.
struct Engine<D: DependencyList, T> {
    store: WeakStore<T>,
    deps: Rc<D>,
    compute: Rc<Compute<D::Values, T>>,
    enabled: Rc<Cell<bool>>,
    started: Cell<bool>,
    pending: Cell<usize>,
    outstanding: RefCell<Vec<usize>>,
    invalid: Cell<bool>,
    cleanup: RefCell<Option<Teardown>>,
}

impl<D: DependencyList, T: Clone + 'static> Engine<D, T> {
    fn on_invalidate(&self, index: usize) {
        if !self.started.get() {
            return;
        }
        if self.pending.get() == 0 {
            self.open_round();
        }
        if let Some(count) = self.outstanding.borrow_mut().get_mut(index) {
            *count += 1;
        }
        self.pending.set(self.pending.get() + 1);
    }

    fn on_value(&self, index: usize, changed: bool) {
        if !self.started.get() {
            return;
        }
        if changed {
            self.invalid.set(true);
        }

        let settled = match self.outstanding.borrow_mut().get_mut(index) {
            Some(count) if *count > 0 => {
                *count -= 1;
                true
            }
            _ => false,
        };
        if !settled {
            // A change this engine never saw announced, e.g. a dependency
            // that settled while the engine was attaching. Run it as a round
            // of its own.
            if changed && self.pending.get() == 0 {
                self.open_round();
                self.close_round();
            }
            return;
        }

        let pending = self.pending.get() - 1;
        self.pending.set(pending);
        if pending == 0 {
            self.close_round();
        }
    }

    fn open_round(&self) {
        if let Some(store) = self.store.upgrade() {
            trace!(store = store.id(), "round opened");
            store.invalidate();
        }
    }

    fn close_round(&self) {
        let Some(store) = self.store.upgrade() else {
            return;
        };
        let old = store.snapshot();
        let recompute = self.invalid.replace(false);

        if recompute {
            self.run_cleanup();
            let _sync = store.begin_sync();
            self.compute(&store);
        }

        let changed = recompute && store.differs_from(&old);
        trace!(store = store.id(), recompute, changed, "round closed");
        store.notify(changed);
    }

    fn compute(&self, store: &Store<T>) {
        let values = self.deps.values();
        match &*self.compute {
            Compute::Map(f) => store.set(f(values)),
            Compute::WithSetter(f) => {
                let setter = Setter::new(store, Rc::clone(&self.enabled));
                let cleanup = f(values, &setter);
                *self.cleanup.borrow_mut() = cleanup;
            }
        }
    }

    fn run_cleanup(&self) {
        let cleanup = self.cleanup.borrow_mut().take();
        if let Some(cleanup) = cleanup {
            cleanup();
        }
    }

    fn stop(&self) {
        self.started.set(false);
        self.pending.set(0);
        self.outstanding.borrow_mut().fill(0);
        self.invalid.set(false);
        self.enabled.set(false);
        self.run_cleanup();
    }
}

fn derive<D, T>(deps: D, initial: T, compute: Compute<D::Values, T>) -> Result<Readable<T>>
where
    D: Dependencies,
    T: Clone + Unequal + 'static,
{
    deps.validate()?;

    let deps = Rc::new(deps);
    let compute = Rc::new(compute);
    let start = move |store: &Store<T>| -> Teardown {
        let engine = Rc::new(Engine {
            store: store.downgrade(),
            deps: Rc::clone(&deps),
            compute: Rc::clone(&compute),
            enabled: Rc::new(Cell::new(true)),
            started: Cell::new(false),
            pending: Cell::new(0),
            outstanding: RefCell::new(Vec::new()),
            invalid: Cell::new(false),
            cleanup: RefCell::new(None),
        });

        let listener = Listener {
            on_value: Rc::new({
                let engine = Rc::clone(&engine);
                move |index, changed| engine.on_value(index, changed)
            }),
            on_invalidate: Rc::new({
                let engine = Rc::clone(&engine);
                move |index| engine.on_invalidate(index)
            }),
        };

        // Replays during subscription are ignored until `started` is set;
        // the first value is computed once every dependency is attached.
        let subscriptions = engine.deps.subscribe_each(&listener);
        *engine.outstanding.borrow_mut() = vec![0; subscriptions.len()];
        engine.started.set(true);
        engine.compute(store);

        Box::new(move || {
            for subscription in &subscriptions {
                subscription.unsubscribe();
            }
            engine.stop();
        })
    };

    let store = Store::build(
        initial,
        policy::<T>(),
        Some(Start::Derived(Box::new(start))),
        false,
    );
    Ok(store.readonly())
}

/// Create a store derived from one or more dependencies.
///
/// `f` receives the current value of every dependency and returns the
/// derived value. It runs when the store is first subscribed and then once
/// per propagation round in which at least one dependency changed, however
/// many paths that change took to get here. Until the first activation the
/// store holds `T::default()`.
///
/// # Errors
///
/// Fails before subscribing to anything if the dependency list is empty or
/// has a missing entry.
///
/// # Examples
///
/// ```
/// use tincan_stores::{create_derived, Store};
///
/// let a = Store::new(1);
/// let b = Store::new(2);
/// let sum = create_derived((a.clone(), b.clone()), |(a, b): (i32, i32)| a + b).unwrap();
///
/// assert_eq!(sum.get(), 3);
/// a.set(4);
/// assert_eq!(sum.get(), 6);
/// ```
pub fn create_derived<D, T, F>(deps: D, f: F) -> Result<Readable<T>>
where
    D: Dependencies,
    T: Clone + Default + Unequal + 'static,
    F: Fn(D::Values) -> T + 'static,
{
    derive(deps, T::default(), Compute::Map(Box::new(f)))
}

/// Like [`create_derived`], with an explicit value for the inactive store.
pub fn create_derived_with_initial<D, T, F>(deps: D, initial: T, f: F) -> Result<Readable<T>>
where
    D: Dependencies,
    T: Clone + Unequal + 'static,
    F: Fn(D::Values) -> T + 'static,
{
    derive(deps, initial, Compute::Map(Box::new(f)))
}

/// Create a derived store whose function writes through a [`Setter`].
///
/// The function may set the value any number of times, or not at all, and
/// may keep the setter to write later. Writes made while it runs are folded
/// into a single notification. The returned teardown, if any, runs before
/// the next recomputation and when the store stops. Once the store has no
/// subscribers left, the setter is disabled.
///
/// ```
/// use tincan_stores::{create_derived_with_setter, Store};
///
/// let word = Store::new("ab".to_string());
/// let last_char = create_derived_with_setter(word.clone(), ' ', |w: String, set| {
///     for c in w.chars() {
///         set.set(c);
///     }
///     None
/// })
/// .unwrap();
///
/// assert_eq!(last_char.get(), 'b');
/// ```
pub fn create_derived_with_setter<D, T, F>(deps: D, initial: T, f: F) -> Result<Readable<T>>
where
    D: Dependencies,
    T: Clone + Unequal + 'static,
    F: Fn(D::Values, &Setter<T>) -> Option<Teardown> + 'static,
{
    derive(deps, initial, Compute::WithSetter(Box::new(f)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;

    fn counter() -> Rc<Cell<usize>> {
        Rc::new(Cell::new(0))
    }

    #[test]
    fn single_dependency() {
        let base = Store::new(3);
        let doubled = create_derived(base.clone(), |n: i32| n * 2).unwrap();

        let last = counter();
        let _sub = doubled.subscribe({
            let last = Rc::clone(&last);
            move |v: &i32| last.set(*v as usize)
        });
        assert_eq!(last.get(), 6);

        base.set(10);
        assert_eq!(last.get(), 20);
    }

    #[test]
    fn diamond_recomputes_once() {
        let root = Store::new(1);
        let left = create_derived(root.clone(), |n: i32| n + 1).unwrap();
        let right = create_derived(root.clone(), |n: i32| n * 10).unwrap();

        let runs = counter();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let joined = create_derived((left, right), {
            let runs = Rc::clone(&runs);
            let seen = Rc::clone(&seen);
            move |(l, r): (i32, i32)| {
                runs.set(runs.get() + 1);
                seen.borrow_mut().push((l, r));
                l + r
            }
        })
        .unwrap();

        let _sub = joined.subscribe(|_| {});
        assert_eq!(runs.get(), 1);

        root.set(2);
        assert_eq!(runs.get(), 2);
        assert_eq!(*seen.borrow(), vec![(2, 10), (3, 20)]);
        assert_eq!(joined.peek(), 23);
    }

    #[test]
    fn unchanged_upstream_does_not_rerun() {
        let root = Store::new(4);
        let parity = create_derived(root.clone(), |n: i32| n % 2 == 0).unwrap();

        let runs = counter();
        let label = create_derived(parity, {
            let runs = Rc::clone(&runs);
            move |even: bool| {
                runs.set(runs.get() + 1);
                if even { "even" } else { "odd" }
            }
        })
        .unwrap();

        let notified = counter();
        let _sub = label.subscribe({
            let notified = Rc::clone(&notified);
            move |_| notified.set(notified.get() + 1)
        });

        root.set(6);
        assert_eq!(runs.get(), 1);
        assert_eq!(notified.get(), 1);

        root.set(7);
        assert_eq!(runs.get(), 2);
        assert_eq!(notified.get(), 2);
    }

    #[test]
    fn setter_form_coalesces_writes() {
        let source = Store::new(vec![1, 2, 3]);
        let notified = counter();
        let last = create_derived_with_setter(source.clone(), 0, |items: Vec<i32>, set| {
            for item in items {
                set.set(item);
            }
            None
        })
        .unwrap();

        let _sub = last.subscribe({
            let notified = Rc::clone(&notified);
            move |_| notified.set(notified.get() + 1)
        });
        assert_eq!(last.peek(), 3);

        source.set(vec![4, 5]);
        assert_eq!(last.peek(), 5);
        assert_eq!(notified.get(), 2);
    }

    #[test]
    fn cleanup_runs_before_recompute_and_on_stop() {
        let source = Store::new(0);
        let cleanups = counter();
        let derived = create_derived_with_setter(source.clone(), 0, {
            let cleanups = Rc::clone(&cleanups);
            move |n: i32, set: &Setter<i32>| {
                set.set(n);
                let cleanups = Rc::clone(&cleanups);
                Some(Box::new(move || cleanups.set(cleanups.get() + 1)) as Teardown)
            }
        })
        .unwrap();

        let sub = derived.subscribe(|_| {});
        source.set(1);
        assert_eq!(cleanups.get(), 1);

        sub.unsubscribe();
        assert_eq!(cleanups.get(), 2);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn kept_setter_is_disabled_after_stop() {
        let source = Store::new(1);
        let kept: Rc<RefCell<Option<Setter<i32>>>> = Rc::new(RefCell::new(None));
        let derived = create_derived_with_setter(source.clone(), 0, {
            let kept = Rc::clone(&kept);
            move |n: i32, set: &Setter<i32>| {
                set.set(n);
                *kept.borrow_mut() = Some(set.clone());
                None
            }
        })
        .unwrap();

        let sub = derived.subscribe(|_| {});
        let setter = kept.borrow().clone().unwrap();
        setter.set(50);
        assert_eq!(derived.peek(), 50);

        sub.unsubscribe();
        setter.set(99);
        assert_eq!(derived.peek(), 50);
    }

    #[test]
    fn inactive_derived_is_lazy() {
        let source = Store::new(1);
        let runs = counter();
        let derived = create_derived(source.clone(), {
            let runs = Rc::clone(&runs);
            move |n: i32| {
                runs.set(runs.get() + 1);
                n
            }
        })
        .unwrap();

        source.set(2);
        source.set(3);
        assert_eq!(runs.get(), 0);
        assert_eq!(derived.peek(), 0);
        assert!(!source.is_active());

        assert_eq!(derived.get(), 3);
        assert_eq!(runs.get(), 1);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn construction_errors_subscribe_to_nothing() {
        let kept = Store::new(1);
        let result = create_derived(vec![Some(kept.clone()), None], |v: Vec<i32>| v.len());

        assert_eq!(
            result.unwrap_err(),
            StoreError::MissingDependency { index: 1 }
        );
        assert_eq!(kept.subscriber_count(), 0);
    }
}
