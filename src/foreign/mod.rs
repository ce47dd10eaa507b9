//! Adapting observables from outside this crate.
//!
//! Any type with a subscribe-with-callback method can feed a derived store
//! once it implements [`ForeignStore`]. [`ForeignRegistry`] wraps it into a
//! native [`Readable`](crate::Readable), reusing one wrapper (and therefore
//! one foreign subscription) per foreign object.

mod registry;

pub use registry::ForeignRegistry;

/// A subscribe-based observable defined outside this crate.
///
/// `subscribe` is expected to call the callback synchronously with the
/// current value, then again on every change, until the returned teardown
/// runs.
pub trait ForeignStore: 'static {
    type Value: Clone + Default + crate::Unequal + 'static;

    fn subscribe(&self, callback: Box<dyn Fn(Self::Value)>) -> ForeignTeardown;
}

/// An object that cancels a foreign subscription.
pub trait Unsubscribe {
    fn unsubscribe(&mut self);
}

/// What a foreign `subscribe` hands back: a closure, or an object with an
/// `unsubscribe` method.
pub enum ForeignTeardown {
    Callback(Box<dyn FnOnce()>),
    Handle(Box<dyn Unsubscribe>),
}

impl ForeignTeardown {
    pub fn callback(f: impl FnOnce() + 'static) -> Self {
        ForeignTeardown::Callback(Box::new(f))
    }

    pub fn handle(handle: impl Unsubscribe + 'static) -> Self {
        ForeignTeardown::Handle(Box::new(handle))
    }

    pub(crate) fn run(self) {
        match self {
            ForeignTeardown::Callback(f) => f(),
            ForeignTeardown::Handle(mut handle) => handle.unsubscribe(),
        }
    }
}
