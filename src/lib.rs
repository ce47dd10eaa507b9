//! # Tincan Stores
//!
//! Observable value containers with glitch-free derived values.
//!
//! ## Stores
//!
//! - [`Store<T>`] - A value plus an ordered list of subscribers. Every
//!   subscriber sees the current value as soon as it subscribes, then every
//!   change after that.
//! - Start hooks run lazily when the first subscriber arrives and hand out a
//!   [`Setter`] that is revoked when the last subscriber leaves.
//! - [`Unequal`] decides what counts as a change: scalars compare by value
//!   (with NaN equal to itself), composites always count as changed.
//!
//! ## Derived stores
//!
//! - [`create_derived`] - Recompute a value from one or more stores.
//! - Each propagation round runs the derive function exactly once, even when
//!   several dependencies share an ancestor.
//! - Derived stores subscribe upstream only while they have subscribers.
//!
//! ## Foreign stores
//!
//! - [`ForeignRegistry`] - Adapt any subscribe-based observable into a
//!   native store, one shared wrapper per foreign object.
//!
//! Everything here is single-threaded and synchronous: a `set` returns only
//! after every downstream recomputation and notification has run.

pub mod derived;
pub mod error;
pub mod foreign;
pub mod store;

// Re-export main types for convenience
pub use derived::{
    create_derived, create_derived_with_initial, create_derived_with_setter, Dependencies,
};
pub use error::{Result, StoreError};
pub use foreign::{ForeignRegistry, ForeignStore, ForeignTeardown, Unsubscribe};
pub use store::{
    create_readonly, get_current_value, Readable, Setter, Source, Store, Subscription, Teardown,
    Unequal,
};

/// Create a store with the given initial value.
pub fn create_store<T: Clone + Unequal + 'static>(initial: T) -> Store<T> {
    Store::new(initial)
}

/// Create a store with a start hook, see [`Store::with_start`].
pub fn create_store_with_start<T, F>(initial: T, start: F) -> Store<T>
where
    T: Clone + Unequal + 'static,
    F: Fn(&Setter<T>) -> Option<Teardown> + 'static,
{
    Store::with_start(initial, start)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn it_works() {
        // Basic smoke test
        let store = create_store(0);
        assert_eq!(store.get(), 0);
        store.set(42);
        assert_eq!(store.get(), 42);

        let doubled = create_derived(store.clone(), |n: i32| n * 2).unwrap();
        assert_eq!(doubled.get(), 84);
    }
}
