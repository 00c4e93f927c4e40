#![forbid(unsafe_code)]

//! Operators that remember earlier values: `distinct_until_changed` and `scan`.

use std::cell::RefCell;
use std::rc::Rc;

use statecast_core::Observable;
use tracing::trace;

use crate::stage::Derived;

/// Forward a value only when it differs from the previously forwarded one.
///
/// The first value after connecting is always forwarded.
pub fn distinct_until_changed<S>(source: S) -> Derived<S::Item>
where
    S: Observable + 'static,
    S::Item: PartialEq + Clone + 'static,
{
    Derived::new("distinct_until_changed", move |emitter| {
        let emitter = emitter.clone();
        let last: RefCell<Option<S::Item>> = RefCell::new(None);
        source.observe(move |value| {
            {
                let mut last = last.borrow_mut();
                if last.as_ref() == Some(value) {
                    trace!("duplicate suppressed");
                    return;
                }
                *last = Some(value.clone());
            }
            emitter.emit(value);
        })
    })
}

/// Running fold where the first value seeds the accumulator.
///
/// Forwards the seed itself, then `f(accumulator, value)` for every later
/// value.
pub fn scan<S, F>(source: S, f: F) -> Derived<S::Item>
where
    S: Observable + 'static,
    S::Item: Clone + 'static,
    F: Fn(&S::Item, &S::Item) -> S::Item + 'static,
{
    let f = Rc::new(f);
    Derived::new("scan", move |emitter| {
        let emitter = emitter.clone();
        let f = Rc::clone(&f);
        let acc: RefCell<Option<S::Item>> = RefCell::new(None);
        source.observe(move |value| {
            let current = acc.borrow().clone();
            let next = match current {
                Some(current) => f(&current, value),
                None => value.clone(),
            };
            *acc.borrow_mut() = Some(next.clone());
            emitter.emit(&next);
        })
    })
}
