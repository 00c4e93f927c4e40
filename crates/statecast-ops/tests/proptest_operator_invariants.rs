//! Property-based invariant tests for operator stages.
//!
//! Each test drives a container with an arbitrary sequence (the first
//! element is the initial value, replayed on subscribe) and compares the
//! stage output against the equivalent iterator computation:
//!
//! 1. `filter` forwards exactly the matching values, in order.
//! 2. `map` forwards one value per input.
//! 3. `skip(k)` forwards `inputs[k..]`.
//! 4. `take(n)` forwards `inputs[..n]` and then releases the source.
//! 5. `buffer(n)` forwards only full chunks.
//! 6. `distinct_until_changed` equals `Vec::dedup`.
//! 7. `scan(+)` forwards running sums.
//! 8. `merge` forwards every push from both sources.
//! 9. `sample` on a virtual clock fires once per elapsed interval.
//! 10. Disposing the only subscription releases the source for any chain.

use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

use proptest::prelude::*;
use statecast_core::{Observable, StateContainer, Subscription};
use statecast_ops::{Derived, ManualScheduler, ObservableExt};

// ── Strategies ────────────────────────────────────────────────────────────

fn inputs_strategy(max_len: usize) -> impl Strategy<Value = Vec<i32>> {
    proptest::collection::vec(-50i32..=50, 1..=max_len)
}

// ── Helpers ───────────────────────────────────────────────────────────────

fn record<T: Clone + 'static>(derived: &Derived<T>) -> (Rc<RefCell<Vec<T>>>, Subscription) {
    let log = Rc::new(RefCell::new(Vec::new()));
    let log_clone = Rc::clone(&log);
    let sub = derived
        .observe(move |v: &T| log_clone.borrow_mut().push(v.clone()))
        .expect("subscribe to live stage");
    (log, sub)
}

fn drive<T: Clone + 'static>(
    inputs: &[i32],
    build: impl FnOnce(StateContainer<i32>) -> Derived<T>,
) -> (Vec<T>, StateContainer<i32>, Subscription) {
    let source = StateContainer::new(inputs[0]);
    let derived = build(source.clone());
    let (log, sub) = record(&derived);
    for &v in &inputs[1..] {
        source.publish(v);
    }
    let out = log.borrow().clone();
    (out, source, sub)
}

// ═════════════════════════════════════════════════════════════════════════
// Per-value operators
// ═════════════════════════════════════════════════════════════════════════

// 1. filter

proptest! {
    #[test]
    fn filter_matches_iterator(inputs in inputs_strategy(64), modulus in 1i32..=5) {
        let (out, _source, _sub) = drive(&inputs, |s| s.filter(move |v| v.rem_euclid(modulus) == 0));
        let expected: Vec<i32> = inputs.iter().copied().filter(|v| v.rem_euclid(modulus) == 0).collect();
        prop_assert_eq!(out, expected);
    }
}

// 2. map

proptest! {
    #[test]
    fn map_is_one_to_one(inputs in inputs_strategy(64)) {
        let (out, _source, _sub) = drive(&inputs, |s| s.map(|v| i64::from(*v) * 3));
        prop_assert_eq!(out.len(), inputs.len());
        for (o, i) in out.iter().zip(&inputs) {
            prop_assert_eq!(*o, i64::from(*i) * 3);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Counting operators
// ═════════════════════════════════════════════════════════════════════════

// 3. skip

proptest! {
    #[test]
    fn skip_drops_prefix(inputs in inputs_strategy(64), k in 0usize..=80) {
        let (out, _source, _sub) = drive(&inputs, |s| s.skip(k));
        let expected: Vec<i32> = inputs.iter().copied().skip(k).collect();
        prop_assert_eq!(out, expected);
    }
}

// 4. take

proptest! {
    #[test]
    fn take_keeps_prefix_and_releases(inputs in inputs_strategy(64), n in 0usize..=80) {
        let (out, source, _sub) = drive(&inputs, |s| s.take(n));
        let expected: Vec<i32> = inputs.iter().copied().take(n).collect();
        prop_assert_eq!(out, expected);
        if n <= inputs.len() {
            prop_assert_eq!(source.subscriber_count(), 0, "take should release its source");
        }
    }
}

// 5. buffer

proptest! {
    #[test]
    fn buffer_forwards_full_chunks_only(inputs in inputs_strategy(64), size in 1usize..=8) {
        let (out, _source, _sub) = drive(&inputs, |s| s.buffer(size).expect("non-zero size"));
        let expected: Vec<Vec<i32>> = inputs.chunks_exact(size).map(<[i32]>::to_vec).collect();
        prop_assert_eq!(out, expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Stateful operators
// ═════════════════════════════════════════════════════════════════════════

// 6. distinct_until_changed

proptest! {
    #[test]
    fn distinct_equals_dedup(inputs in proptest::collection::vec(0i32..=3, 1..=64)) {
        let (out, _source, _sub) = drive(&inputs, |s| s.distinct_until_changed());
        let mut expected = inputs.clone();
        expected.dedup();
        prop_assert_eq!(out, expected);
    }
}

// 7. scan

proptest! {
    #[test]
    fn scan_forwards_running_sums(inputs in inputs_strategy(64)) {
        let (out, _source, _sub) = drive(&inputs, |s| s.scan(|acc, v| acc + v));
        let expected: Vec<i32> = inputs
            .iter()
            .scan(0, |acc, v| {
                *acc += v;
                Some(*acc)
            })
            .collect();
        prop_assert_eq!(out, expected);
    }
}

// 8. merge

proptest! {
    #[test]
    fn merge_forwards_everything(
        left in inputs_strategy(32),
        right in inputs_strategy(32),
    ) {
        let a = StateContainer::new(left[0]);
        let b = StateContainer::new(right[0]);
        let (log, _sub) = record(&a.clone().merge(b.clone()));
        for &v in &left[1..] {
            a.publish(v);
        }
        for &v in &right[1..] {
            b.publish(v);
        }

        let mut expected = vec![left[0], right[0]];
        expected.extend_from_slice(&left[1..]);
        expected.extend_from_slice(&right[1..]);
        prop_assert_eq!(log.borrow().clone(), expected);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Time and lifecycle
// ═════════════════════════════════════════════════════════════════════════

// 9. sample

proptest! {
    #[test]
    fn sample_fires_per_interval(
        interval_ms in 1u64..=20,
        steps in proptest::collection::vec(0u64..=50, 1..=20),
    ) {
        let scheduler = ManualScheduler::new();
        let source = StateContainer::new(7);
        let sampled = source
            .clone()
            .sample(Duration::from_millis(interval_ms), scheduler.clone())
            .expect("non-zero interval");
        let (log, _sub) = record(&sampled);

        let mut total = 0;
        for step in &steps {
            scheduler.advance(Duration::from_millis(*step));
            total += step;
        }
        let expected = usize::try_from(total / interval_ms).expect("tick count fits");
        prop_assert_eq!(log.borrow().len(), expected);
        prop_assert!(log.borrow().iter().all(|v| *v == 7));
    }
}

// 10. Disposal releases the chain

proptest! {
    #[test]
    fn dispose_releases_any_chain(
        inputs in inputs_strategy(16),
        ops in proptest::collection::vec(0u8..=4, 1..=6),
    ) {
        let source = StateContainer::new(inputs[0]);
        let mut chain: Derived<i32> = source.clone().map(|v| *v);
        for op in ops {
            chain = match op {
                0 => chain.filter(|v| v % 2 == 0),
                1 => chain.map(|v| v.wrapping_add(1)),
                2 => chain.skip(1),
                3 => chain.distinct_until_changed(),
                _ => chain.scan(|a, b| a.wrapping_add(*b)),
            };
        }
        let sub = chain.observe(|_| {}).expect("subscribe");
        for &v in &inputs[1..] {
            source.publish(v);
        }
        prop_assert_eq!(source.subscriber_count(), 1);
        sub.dispose();
        prop_assert_eq!(source.subscriber_count(), 0);
    }
}
