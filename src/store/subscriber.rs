use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

pub(crate) type ValueFn<T> = Rc<dyn Fn(&T)>;
pub(crate) type PairedValueFn<T> = Rc<dyn Fn(&T, bool)>;
pub(crate) type InvalidateFn = Rc<dyn Fn()>;
pub(crate) type SettleFn = Rc<dyn Fn(bool)>;

/// The two shapes a store subscriber can take.
pub(crate) enum Subscriber<T> {
    /// Receives the new value, and only when it actually changed.
    Value(ValueFn<T>),
    /// Receives an invalidation before every change and the value after it,
    /// together with whether it changed.
    Paired {
        value: PairedValueFn<T>,
        invalidate: InvalidateFn,
    },
    /// Round listener of a derived store. Like `Paired`, but it only hears
    /// value passes that settle an earlier invalidation.
    Barrier {
        settle: SettleFn,
        invalidate: InvalidateFn,
    },
}

impl<T> Subscriber<T> {
    /// Initial replay on subscribe. Every subscriber sees a value first.
    pub(crate) fn replay(&self, value: &T) {
        match self {
            Subscriber::Value(f) => f(value),
            Subscriber::Paired { value: f, .. } => f(value, true),
            Subscriber::Barrier { settle, .. } => settle(true),
        }
    }

    pub(crate) fn notify(&self, value: &T, changed: bool) {
        match self {
            Subscriber::Value(f) => {
                if changed {
                    f(value)
                }
            }
            Subscriber::Paired { value: f, .. } => f(value, changed),
            Subscriber::Barrier { settle, .. } => settle(changed),
        }
    }

    /// Whether this subscriber wants value passes no invalidation announced.
    pub(crate) fn hears_unannounced(&self) -> bool {
        !matches!(self, Subscriber::Barrier { .. })
    }

    pub(crate) fn invalidator(&self) -> Option<InvalidateFn> {
        match self {
            Subscriber::Value(_) => None,
            Subscriber::Paired { invalidate, .. } | Subscriber::Barrier { invalidate, .. } => {
                Some(Rc::clone(invalidate))
            }
        }
    }
}

impl<T> Clone for Subscriber<T> {
    fn clone(&self) -> Self {
        match self {
            Subscriber::Value(f) => Subscriber::Value(Rc::clone(f)),
            Subscriber::Paired { value, invalidate } => Subscriber::Paired {
                value: Rc::clone(value),
                invalidate: Rc::clone(invalidate),
            },
            Subscriber::Barrier { settle, invalidate } => Subscriber::Barrier {
                settle: Rc::clone(settle),
                invalidate: Rc::clone(invalidate),
            },
        }
    }
}

/// RAII guard for a live subscription.
///
/// Dropping the guard unsubscribes. [`Subscription::unsubscribe`] does the
/// same explicitly and may be called any number of times; only the first
/// call has an effect.
///
/// ```
/// use tincan_stores::Store;
///
/// let store = Store::new(1);
/// let sub = store.subscribe(|value| println!("value: {value}"));
/// assert_eq!(store.subscriber_count(), 1);
///
/// sub.unsubscribe();
/// sub.unsubscribe();
/// assert_eq!(store.subscriber_count(), 0);
/// ```
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    cancel: RefCell<Option<Box<dyn FnOnce()>>>,
}

impl Subscription {
    pub(crate) fn new(cancel: impl FnOnce() + 'static) -> Self {
        Self {
            cancel: RefCell::new(Some(Box::new(cancel))),
        }
    }

    /// Stop receiving notifications.
    pub fn unsubscribe(&self) {
        // Release the borrow before running the cancel closure, it may
        // re-enter through a stop hook.
        let cancel = self.cancel.borrow_mut().take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }

    /// Whether [`Subscription::unsubscribe`] has not run yet.
    pub fn is_active(&self) -> bool {
        self.cancel.borrow().is_some()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.is_active())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn value_subscriber_skips_unchanged() {
        let seen = Rc::new(Cell::new(0));
        let seen_clone = Rc::clone(&seen);
        let subscriber: Subscriber<i32> = Subscriber::Value(Rc::new(move |v| seen_clone.set(*v)));

        subscriber.notify(&4, false);
        assert_eq!(seen.get(), 0);

        subscriber.notify(&4, true);
        assert_eq!(seen.get(), 4);
    }

    #[test]
    fn paired_subscriber_always_hears_the_value() {
        let calls = Rc::new(RefCell::new(Vec::new()));
        let calls_clone = Rc::clone(&calls);
        let subscriber: Subscriber<i32> = Subscriber::Paired {
            value: Rc::new(move |v, changed| calls_clone.borrow_mut().push((*v, changed))),
            invalidate: Rc::new(|| {}),
        };

        subscriber.replay(&1);
        subscriber.notify(&1, false);
        subscriber.notify(&2, true);

        assert_eq!(*calls.borrow(), vec![(1, true), (1, false), (2, true)]);
        assert!(subscriber.invalidator().is_some());
    }

    #[test]
    fn barrier_subscriber_skips_unannounced_passes() {
        let settled = Rc::new(RefCell::new(Vec::new()));
        let settled_clone = Rc::clone(&settled);
        let subscriber: Subscriber<i32> = Subscriber::Barrier {
            settle: Rc::new(move |changed| settled_clone.borrow_mut().push(changed)),
            invalidate: Rc::new(|| {}),
        };

        subscriber.notify(&3, false);
        assert_eq!(*settled.borrow(), vec![false]);
        assert!(!subscriber.hears_unannounced());
        assert!(subscriber.invalidator().is_some());

        let plain: Subscriber<i32> = Subscriber::Value(Rc::new(|_| {}));
        assert!(plain.hears_unannounced());
    }

    #[test]
    fn cancel_runs_once() {
        let count = Rc::new(Cell::new(0));
        let count_clone = Rc::clone(&count);
        let sub = Subscription::new(move || count_clone.set(count_clone.get() + 1));

        assert!(sub.is_active());
        sub.unsubscribe();
        sub.unsubscribe();
        drop(sub);

        assert_eq!(count.get(), 1);
    }
}
