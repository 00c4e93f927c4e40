#![forbid(unsafe_code)]

//! Grouping and time-based operators: `buffer` and `sample`.

use std::cell::RefCell;
use std::mem;
use std::rc::Rc;
use std::time::Duration;

use statecast_core::{Error, Observable, Result, Subscription};
use tracing::trace;

use crate::scheduler::Scheduler;
use crate::stage::Derived;

/// Collect values into groups of exactly `size` and forward each full group.
///
/// A partially filled group is discarded when the stage disconnects; it is
/// never flushed.
///
/// # Errors
///
/// Returns [`Error::InvalidOperator`] if `size` is zero.
pub fn buffer<S>(source: S, size: usize) -> Result<Derived<Vec<S::Item>>>
where
    S: Observable + 'static,
    S::Item: Clone + 'static,
{
    if size == 0 {
        return Err(Error::invalid_operator("buffer", "size must be at least 1"));
    }
    Ok(Derived::new("buffer", move |emitter| {
        let emitter = emitter.clone();
        let pending: RefCell<Vec<S::Item>> = RefCell::new(Vec::with_capacity(size));
        source.observe(move |value| {
            let full = {
                let mut pending = pending.borrow_mut();
                pending.push(value.clone());
                if pending.len() < size {
                    return;
                }
                mem::replace(&mut *pending, Vec::with_capacity(size))
            };
            emitter.emit(&full);
        })
    }))
}

/// Remember the latest upstream value and forward it on every scheduler
/// tick.
///
/// Nothing is forwarded until upstream has produced a value. After that the
/// latest value is re-sent on each tick, even if it has not changed.
///
/// # Errors
///
/// Returns [`Error::InvalidOperator`] if `interval` is zero. Subscribing
/// fails with the scheduler's error if the tick source cannot start.
pub fn sample<S, Sch>(source: S, interval: Duration, scheduler: Sch) -> Result<Derived<S::Item>>
where
    S: Observable + 'static,
    S::Item: Clone + 'static,
    Sch: Scheduler + 'static,
{
    if interval.is_zero() {
        return Err(Error::invalid_operator(
            "sample",
            "interval must be greater than zero",
        ));
    }
    Ok(Derived::new("sample", move |emitter| {
        let latest: Rc<RefCell<Option<S::Item>>> = Rc::new(RefCell::new(None));
        let sink = Rc::clone(&latest);
        let upstream = source.observe(move |value| {
            *sink.borrow_mut() = Some(value.clone());
        })?;

        let emitter = emitter.clone();
        let timer = scheduler.schedule_periodic(
            interval,
            Box::new(move || {
                let value = latest.borrow().clone();
                match value {
                    Some(value) => emitter.emit(&value),
                    None => trace!("sample tick before first value"),
                }
            }),
        )?;
        Ok(Subscription::merge([upstream, timer]))
    }))
}
