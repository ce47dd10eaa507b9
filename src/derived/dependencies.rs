use std::rc::Rc;

use crate::error::{Result, StoreError};
use crate::store::{Readable, Source, Store, Subscription};

pub(crate) mod list {
    use std::rc::Rc;

    use crate::error::Result;
    use crate::store::Subscription;

    /// Round-barrier callbacks attached to each dependency. Both receive
    /// the dependency's position in the list.
    pub struct Listener {
        pub on_value: Rc<dyn Fn(usize, bool)>,
        pub on_invalidate: Rc<dyn Fn(usize)>,
    }

    pub trait DependencyList: 'static {
        type Values: 'static;

        fn validate(&self) -> Result<()>;

        /// Subscribe `listener` to every dependency, in declared order.
        fn subscribe_each(&self, listener: &Listener) -> Vec<Subscription>;

        /// Current value of every dependency, shaped like the list itself.
        fn values(&self) -> Self::Values;
    }
}

use list::{DependencyList, Listener};

/// Inputs a derived store can be built from.
///
/// Implemented for:
/// - a single [`Store`] or [`Readable`]: the derive function gets its value;
/// - tuples of up to six sources: it gets a tuple of values;
/// - `Vec<S>` and `[S; N]`: it gets a `Vec`/array of values;
/// - `Vec<Option<S>>`, for lists assembled at runtime: a `None` entry is
///   rejected when the derived store is built, and the derive function gets
///   a `Vec` of values.
pub trait Dependencies: DependencyList {}

impl<D: DependencyList> Dependencies for D {}

fn listen<S: Source>(source: &S, index: usize, listener: &Listener) -> Subscription {
    let on_value = Rc::clone(&listener.on_value);
    let on_invalidate = Rc::clone(&listener.on_invalidate);
    source.as_store().subscribe_barrier(
        move |changed| on_value(index, changed),
        move || on_invalidate(index),
    )
}

fn read<S: Source>(source: &S) -> S::Value {
    source.as_store().snapshot()
}

impl<T: Clone + 'static> DependencyList for Store<T> {
    type Values = T;

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn subscribe_each(&self, listener: &Listener) -> Vec<Subscription> {
        vec![listen(self, 0, listener)]
    }

    fn values(&self) -> T {
        read(self)
    }
}

impl<T: Clone + 'static> DependencyList for Readable<T> {
    type Values = T;

    fn validate(&self) -> Result<()> {
        Ok(())
    }

    fn subscribe_each(&self, listener: &Listener) -> Vec<Subscription> {
        vec![listen(self, 0, listener)]
    }

    fn values(&self) -> T {
        read(self)
    }
}

macro_rules! tuple_dependencies {
    ($($name:ident : $index:tt),+) => {
        impl<$($name: Source),+> DependencyList for ($($name,)+) {
            type Values = ($($name::Value,)+);

            fn validate(&self) -> Result<()> {
                Ok(())
            }

            fn subscribe_each(&self, listener: &Listener) -> Vec<Subscription> {
                vec![$(listen(&self.$index, $index, listener)),+]
            }

            fn values(&self) -> Self::Values {
                ($(read(&self.$index),)+)
            }
        }
    };
}

tuple_dependencies!(A: 0);
tuple_dependencies!(A: 0, B: 1);
tuple_dependencies!(A: 0, B: 1, C: 2);
tuple_dependencies!(A: 0, B: 1, C: 2, D: 3);
tuple_dependencies!(A: 0, B: 1, C: 2, D: 3, E: 4);
tuple_dependencies!(A: 0, B: 1, C: 2, D: 3, E: 4, F: 5);

impl<S: Source> DependencyList for Vec<S> {
    type Values = Vec<S::Value>;

    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(StoreError::NoDependencies);
        }
        Ok(())
    }

    fn subscribe_each(&self, listener: &Listener) -> Vec<Subscription> {
        self.iter()
            .enumerate()
            .map(|(index, source)| listen(source, index, listener))
            .collect()
    }

    fn values(&self) -> Self::Values {
        self.iter().map(read).collect()
    }
}

impl<S: Source, const N: usize> DependencyList for [S; N] {
    type Values = [S::Value; N];

    fn validate(&self) -> Result<()> {
        if N == 0 {
            return Err(StoreError::NoDependencies);
        }
        Ok(())
    }

    fn subscribe_each(&self, listener: &Listener) -> Vec<Subscription> {
        self.iter()
            .enumerate()
            .map(|(index, source)| listen(source, index, listener))
            .collect()
    }

    fn values(&self) -> Self::Values {
        self.each_ref().map(read)
    }
}

impl<S: Source> DependencyList for Vec<Option<S>> {
    type Values = Vec<S::Value>;

    fn validate(&self) -> Result<()> {
        if self.is_empty() {
            return Err(StoreError::NoDependencies);
        }
        match self.iter().position(Option::is_none) {
            Some(index) => Err(StoreError::MissingDependency { index }),
            None => Ok(()),
        }
    }

    fn subscribe_each(&self, listener: &Listener) -> Vec<Subscription> {
        self.iter()
            .flatten()
            .enumerate()
            .map(|(index, source)| listen(source, index, listener))
            .collect()
    }

    fn values(&self) -> Self::Values {
        self.iter().flatten().map(read).collect()
    }
}
