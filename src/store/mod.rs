//! Observable value containers.
//!
//! A [`Store`] holds a value, an ordered list of subscribers and an optional
//! start hook that runs lazily on the first subscription. [`Readable`] is
//! the read-only face handed out for derived and adapted stores.

mod equality;
mod readable;
mod setter;
mod store;
mod subscriber;

pub use equality::Unequal;
pub use readable::{create_readonly, get_current_value, Readable, Source};
pub use setter::Setter;
pub use store::{Store, Teardown};
pub use subscriber::Subscription;

pub(crate) use equality::policy;
pub(crate) use store::{Start, WeakStore};
