#![forbid(unsafe_code)]

//! Two-source operators: `combine_latest` and `merge`.
//!
//! Both connect to their sources in argument order, so with replaying
//! sources the first source's current value arrives first.

use std::cell::RefCell;
use std::rc::Rc;

use statecast_core::{Observable, Subscription};

use crate::stage::Derived;

struct Latest<A, B> {
    left: Option<A>,
    right: Option<B>,
}

/// Forward `f(a, b)` from the latest value of each source once both have
/// produced one, then on every push from either side.
pub fn combine_latest<SA, SB, U, F>(left: SA, right: SB, f: F) -> Derived<U>
where
    SA: Observable + 'static,
    SB: Observable + 'static,
    SA::Item: Clone + 'static,
    SB::Item: Clone + 'static,
    U: 'static,
    F: Fn(&SA::Item, &SB::Item) -> U + 'static,
{
    let f = Rc::new(f);
    Derived::new("combine_latest", move |emitter| {
        let latest = Rc::new(RefCell::new(Latest {
            left: None,
            right: None,
        }));

        let left_latest = Rc::clone(&latest);
        let left_emitter = emitter.clone();
        let left_f = Rc::clone(&f);
        let left_sub = left.observe(move |a| {
            let other = {
                let mut latest = left_latest.borrow_mut();
                latest.left = Some(a.clone());
                latest.right.clone()
            };
            if let Some(b) = other {
                left_emitter.emit(&left_f(a, &b));
            }
        })?;

        let right_emitter = emitter.clone();
        let right_f = Rc::clone(&f);
        let right_sub = right.observe(move |b| {
            let other = {
                let mut latest = latest.borrow_mut();
                latest.right = Some(b.clone());
                latest.left.clone()
            };
            if let Some(a) = other {
                right_emitter.emit(&right_f(&a, b));
            }
        })?;

        Ok(Subscription::merge([left_sub, right_sub]))
    })
}

/// Forward every value from either source, in arrival order.
pub fn merge<SA, SB>(first: SA, second: SB) -> Derived<SA::Item>
where
    SA: Observable + 'static,
    SB: Observable<Item = SA::Item> + 'static,
    SA::Item: 'static,
{
    Derived::new("merge", move |emitter| {
        let first_emitter = emitter.clone();
        let first_sub = first.observe(move |value| first_emitter.emit(value))?;
        let second_emitter = emitter.clone();
        let second_sub = second.observe(move |value| second_emitter.emit(value))?;
        Ok(Subscription::merge([first_sub, second_sub]))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecast_core::{Error, StateContainer};

    fn record<T: Clone + 'static>(derived: &Derived<T>) -> (Rc<RefCell<Vec<T>>>, Subscription) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let log_clone = Rc::clone(&log);
        let sub = derived
            .observe(move |v: &T| log_clone.borrow_mut().push(v.clone()))
            .unwrap();
        (log, sub)
    }

    #[test]
    fn combine_latest_sums_both_sides() {
        let a = StateContainer::new(1);
        let b = StateContainer::new(10);
        let (log, _sub) = record(&combine_latest(a.clone(), b.clone(), |x, y| x + y));
        a.publish(2);
        b.publish(11);
        assert_eq!(*log.borrow(), vec![11, 12, 13]);
    }

    #[test]
    fn combine_latest_waits_for_both() {
        let a = StateContainer::new(1);
        let b = StateContainer::new("x".to_string());
        let gated = filter_never(b.clone());
        let (log, _sub) = record(&combine_latest(a.clone(), gated, |n: &i32, s: &String| {
            format!("{s}{n}")
        }));
        a.publish(2);
        assert!(log.borrow().is_empty());
    }

    fn filter_never(source: StateContainer<String>) -> Derived<String> {
        crate::transform::filter(source, |_| false)
    }

    #[test]
    fn combine_latest_releases_both_sources() {
        let a = StateContainer::new(1);
        let b = StateContainer::new(2);
        let (_, sub) = record(&combine_latest(a.clone(), b.clone(), |x, y| x * y));
        assert_eq!(a.subscriber_count(), 1);
        assert_eq!(b.subscriber_count(), 1);
        sub.dispose();
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);
    }

    #[test]
    fn combine_latest_fails_if_second_source_disposed() {
        let a = StateContainer::new(1);
        let b = StateContainer::new(2);
        b.dispose();
        let combined = combine_latest(a.clone(), b, |x, y| x + y);
        assert!(matches!(combined.observe(|_| {}), Err(Error::Disposed)));
        assert_eq!(a.subscriber_count(), 0);
    }

    #[test]
    fn merge_interleaves_in_arrival_order() {
        let a = StateContainer::new(0);
        let b = StateContainer::new(100);
        let (log, _sub) = record(&merge(a.clone(), b.clone()));
        a.publish(1);
        b.publish(101);
        a.publish(2);
        assert_eq!(*log.borrow(), vec![0, 100, 1, 101, 2]);
    }
}
