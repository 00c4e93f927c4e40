#![forbid(unsafe_code)]

//! Method-call syntax for every operator.
//!
//! ```
//! use statecast_core::{Observable, StateContainer};
//! use statecast_ops::ObservableExt;
//!
//! let source = StateContainer::new(1);
//! let doubled_evens = source.clone().filter(|v| v % 2 == 0).map(|v| v * 2);
//! let _sub = doubled_evens.observe(|v| println!("{v}")).unwrap();
//! source.publish(4);
//! ```

use std::time::Duration;

use statecast_core::{Observable, Result};

use crate::scheduler::Scheduler;
use crate::stage::Derived;
use crate::{combine, count, fold, transform, window};

/// Chaining adapters available on every [`Observable`].
///
/// Each adapter consumes the receiver; clone a container or `Derived` first
/// to keep using it.
pub trait ObservableExt: Observable + Sized + 'static
where
    Self::Item: 'static,
{
    /// See [`transform::filter`].
    fn filter<P>(self, predicate: P) -> Derived<Self::Item>
    where
        P: Fn(&Self::Item) -> bool + 'static,
    {
        transform::filter(self, predicate)
    }

    /// See [`transform::map`].
    fn map<U, F>(self, f: F) -> Derived<U>
    where
        U: 'static,
        F: Fn(&Self::Item) -> U + 'static,
    {
        transform::map(self, f)
    }

    /// See [`transform::tap`].
    fn tap<F>(self, effect: F) -> Derived<Self::Item>
    where
        F: Fn(&Self::Item) + 'static,
    {
        transform::tap(self, effect)
    }

    /// See [`transform::start_with`].
    fn start_with(self, seed: Self::Item) -> Derived<Self::Item> {
        transform::start_with(self, seed)
    }

    /// See [`count::skip`].
    fn skip(self, count: usize) -> Derived<Self::Item> {
        count::skip(self, count)
    }

    /// See [`count::take`].
    fn take(self, count: usize) -> Derived<Self::Item> {
        count::take(self, count)
    }

    /// See [`fold::distinct_until_changed`].
    fn distinct_until_changed(self) -> Derived<Self::Item>
    where
        Self::Item: PartialEq + Clone,
    {
        fold::distinct_until_changed(self)
    }

    /// See [`fold::scan`].
    fn scan<F>(self, f: F) -> Derived<Self::Item>
    where
        Self::Item: Clone,
        F: Fn(&Self::Item, &Self::Item) -> Self::Item + 'static,
    {
        fold::scan(self, f)
    }

    /// See [`window::buffer`].
    ///
    /// # Errors
    ///
    /// Fails if `size` is zero.
    fn buffer(self, size: usize) -> Result<Derived<Vec<Self::Item>>>
    where
        Self::Item: Clone,
    {
        window::buffer(self, size)
    }

    /// See [`window::sample`].
    ///
    /// # Errors
    ///
    /// Fails if `interval` is zero.
    fn sample<Sch>(self, interval: Duration, scheduler: Sch) -> Result<Derived<Self::Item>>
    where
        Self::Item: Clone,
        Sch: Scheduler + 'static,
    {
        window::sample(self, interval, scheduler)
    }

    /// See [`combine::combine_latest`].
    fn combine_latest<O, U, F>(self, other: O, f: F) -> Derived<U>
    where
        Self::Item: Clone,
        O: Observable + 'static,
        O::Item: Clone + 'static,
        U: 'static,
        F: Fn(&Self::Item, &O::Item) -> U + 'static,
    {
        combine::combine_latest(self, other, f)
    }

    /// See [`combine::merge`].
    fn merge<O>(self, other: O) -> Derived<Self::Item>
    where
        O: Observable<Item = Self::Item> + 'static,
    {
        combine::merge(self, other)
    }
}

impl<O> ObservableExt for O
where
    O: Observable + 'static,
    O::Item: 'static,
{
}
