#![forbid(unsafe_code)]

//! Stateless per-value operators: `filter`, `map`, `tap`, `start_with`.

use std::rc::Rc;

use statecast_core::Observable;

use crate::stage::Derived;

/// Forward values for which `predicate` returns `true`.
pub fn filter<S, P>(source: S, predicate: P) -> Derived<S::Item>
where
    S: Observable + 'static,
    S::Item: 'static,
    P: Fn(&S::Item) -> bool + 'static,
{
    let predicate = Rc::new(predicate);
    Derived::new("filter", move |emitter| {
        let emitter = emitter.clone();
        let predicate = Rc::clone(&predicate);
        source.observe(move |value| {
            if predicate(value) {
                emitter.emit(value);
            }
        })
    })
}

/// Forward `f(value)` for every value.
pub fn map<S, U, F>(source: S, f: F) -> Derived<U>
where
    S: Observable + 'static,
    S::Item: 'static,
    U: 'static,
    F: Fn(&S::Item) -> U + 'static,
{
    let f = Rc::new(f);
    Derived::new("map", move |emitter| {
        let emitter = emitter.clone();
        let f = Rc::clone(&f);
        source.observe(move |value| emitter.emit(&f(value)))
    })
}

/// Run `effect` on every value, then forward it unchanged.
pub fn tap<S, F>(source: S, effect: F) -> Derived<S::Item>
where
    S: Observable + 'static,
    S::Item: 'static,
    F: Fn(&S::Item) + 'static,
{
    let effect = Rc::new(effect);
    Derived::new("tap", move |emitter| {
        let emitter = emitter.clone();
        let effect = Rc::clone(&effect);
        source.observe(move |value| {
            effect(value);
            emitter.emit(value);
        })
    })
}

/// Send `seed` to each new observer before anything from upstream.
///
/// Past upstream values are not replayed beyond what the upstream itself
/// replays on connect.
pub fn start_with<S>(source: S, seed: S::Item) -> Derived<S::Item>
where
    S: Observable + 'static,
    S::Item: 'static,
{
    Derived::with_greeting(
        "start_with",
        move |emitter| {
            let emitter = emitter.clone();
            source.observe(move |value| emitter.emit(value))
        },
        move |observer| observer.notify(&seed),
    )
}
