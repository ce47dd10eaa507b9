use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet, VecDeque};
use std::rc::Rc;
use std::sync::Arc;

/// Decides whether a new value counts as a change worth notifying.
///
/// The default body treats the type as a composite: a value is never equal
/// to itself, so every `set` notifies even when handed an identical value.
/// Scalar types override this with plain value comparison.
///
/// ```
/// use tincan_stores::Unequal;
///
/// #[derive(Clone)]
/// struct Settings {
///     volume: u8,
/// }
///
/// // Composite: every set is a change.
/// impl Unequal for Settings {}
///
/// let s = Settings { volume: 3 };
/// assert!(s.unequal(&s.clone()));
/// assert!(!f64::NAN.unequal(&f64::NAN));
/// assert!(!1u8.unequal(&1));
/// ```
pub trait Unequal {
    /// Returns `true` if replacing `other` with `self` is a change.
    fn unequal(&self, _other: &Self) -> bool {
        true
    }
}

macro_rules! scalar {
    ($($ty:ty),* $(,)?) => {
        $(
            impl Unequal for $ty {
                fn unequal(&self, other: &Self) -> bool {
                    self != other
                }
            }
        )*
    };
}

scalar!(
    i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize, bool, char, String, &'static str, (),
);

macro_rules! float {
    ($($ty:ty),*) => {
        $(
            impl Unequal for $ty {
                fn unequal(&self, other: &Self) -> bool {
                    if self.is_nan() {
                        !other.is_nan()
                    } else {
                        self != other
                    }
                }
            }
        )*
    };
}

float!(f32, f64);

// `None` plays the null role: nullable values are not composites.
impl<T: Unequal> Unequal for Option<T> {
    fn unequal(&self, other: &Self) -> bool {
        match (self, other) {
            (None, None) => false,
            (Some(a), Some(b)) => a.unequal(b),
            _ => true,
        }
    }
}

impl<T> Unequal for Vec<T> {}
impl<T> Unequal for VecDeque<T> {}
impl<T, const N: usize> Unequal for [T; N] {}
impl<T: ?Sized> Unequal for Box<T> {}
impl<T: ?Sized> Unequal for Rc<T> {}
impl<T: ?Sized> Unequal for Arc<T> {}
impl<K, V, S> Unequal for HashMap<K, V, S> {}
impl<T, S> Unequal for HashSet<T, S> {}
impl<K, V> Unequal for BTreeMap<K, V> {}
impl<T> Unequal for BTreeSet<T> {}

macro_rules! composite_tuple {
    ($($name:ident),+) => {
        impl<$($name),+> Unequal for ($($name,)+) {}
    };
}

composite_tuple!(A);
composite_tuple!(A, B);
composite_tuple!(A, B, C);
composite_tuple!(A, B, C, D);
composite_tuple!(A, B, C, D, E);
composite_tuple!(A, B, C, D, E, F);

/// Boxed form of the policy, as held by a store.
pub(crate) type UnequalFn<T> = Box<dyn Fn(&T, &T) -> bool>;

pub(crate) fn policy<T: Unequal + 'static>() -> UnequalFn<T> {
    Box::new(|a: &T, b: &T| a.unequal(b))
}
