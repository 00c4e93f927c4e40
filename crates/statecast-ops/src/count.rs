#![forbid(unsafe_code)]

//! Counting operators: `skip` and `take`.
//!
//! Counters are per connection; a stage that disconnects and reconnects
//! counts from zero again.

use std::cell::Cell;

use statecast_core::{Observable, Subscription};
use tracing::debug;

use crate::stage::Derived;

/// Drop the first `count` values, forward the rest.
pub fn skip<S>(source: S, count: usize) -> Derived<S::Item>
where
    S: Observable + 'static,
    S::Item: 'static,
{
    Derived::new("skip", move |emitter| {
        let emitter = emitter.clone();
        let skipped = Cell::new(0usize);
        source.observe(move |value| {
            if skipped.get() < count {
                skipped.set(skipped.get() + 1);
            } else {
                emitter.emit(value);
            }
        })
    })
}

/// Forward the first `count` values, then disconnect from upstream.
///
/// `take(0)` never forwards and completes as soon as it is subscribed.
pub fn take<S>(source: S, count: usize) -> Derived<S::Item>
where
    S: Observable + 'static,
    S::Item: 'static,
{
    Derived::new("take", move |emitter| {
        if count == 0 {
            emitter.complete();
            return Ok(Subscription::empty());
        }
        let emitter = emitter.clone();
        let taken = Cell::new(0usize);
        source.observe(move |value| {
            if taken.get() >= count {
                return;
            }
            taken.set(taken.get() + 1);
            emitter.emit(value);
            if taken.get() == count {
                debug!(count, "take limit reached");
                emitter.complete();
            }
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecast_core::StateContainer;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn record(derived: &Derived<i32>) -> (Rc<RefCell<Vec<i32>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = Rc::clone(&log);
        let sub = derived
            .observe(move |v| log_clone.borrow_mut().push(*v))
            .unwrap();
        (log, sub)
    }

    #[test]
    fn skip_drops_leading_values() {
        let source = StateContainer::new(0);
        let skipped = skip(source.clone(), 2);
        let (log, _sub) = record(&skipped);
        for v in 1..=4 {
            source.publish(v);
        }
        assert_eq!(*log.borrow(), vec![2, 3, 4]);
    }

    #[test]
    fn skip_zero_forwards_everything() {
        let source = StateContainer::new(0);
        let (log, _sub) = record(&skip(source.clone(), 0));
        source.publish(1);
        assert_eq!(*log.borrow(), vec![0, 1]);
    }

    #[test]
    fn take_stops_after_limit() {
        let source = StateContainer::new(0);
        let taken = take(source.clone(), 3);
        let (log, _sub) = record(&taken);
        for v in 1..=4 {
            source.publish(v);
        }
        assert_eq!(*log.borrow(), vec![0, 1, 2]);
        assert_eq!(source.subscriber_count(), 0);
        assert!(!taken.is_connected());
    }

    #[test]
    fn take_zero_never_connects_upstream() {
        let source = StateContainer::new(0);
        let taken = take(source.clone(), 0);
        let (log, _sub) = record(&taken);
        source.publish(1);

        assert!(log.borrow().is_empty());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn take_one_completes_on_replay() {
        let source = StateContainer::new(7);
        let taken = take(source.clone(), 1);
        let (log, _sub) = record(&taken);
        source.publish(8);

        assert_eq!(*log.borrow(), vec![7]);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn take_restarts_after_full_disconnect() {
        let source = StateContainer::new(0);
        let taken = take(source.clone(), 2);
        let (first, sub) = record(&taken);
        source.publish(1);
        source.publish(2);
        sub.dispose();

        let (second, _sub) = record(&taken);
        source.publish(3);
        source.publish(4);

        assert_eq!(*first.borrow(), vec![0, 1]);
        assert_eq!(*second.borrow(), vec![2, 3]);
    }
}
