#![forbid(unsafe_code)]

//! Event-driven store over a [`StateContainer`].
//!
//! A [`Store<S, E>`] pairs a container with an optional reducer. `dispatch`
//! runs the reducer against the current state and publishes the result;
//! direct mutation (`set` / `update`) publishes without a reducer. Both paths
//! follow the container's notification contract.
//!
//! Domain-specific mutation methods belong on a wrapper type that holds the
//! store:
//!
//! ```
//! use statecast_core::Store;
//!
//! struct Counter(Store<i32, ()>);
//!
//! impl Counter {
//!     fn increment(&self) {
//!         self.0.update(|n| *n += 1);
//!     }
//! }
//!
//! let counter = Counter(Store::without_reducer(0));
//! counter.increment();
//! assert_eq!(counter.0.state(), 1);
//! assert!(counter.0.dispatch(()).is_err());
//! ```
//!
//! # Failure Modes
//!
//! | Failure | Behavior |
//! |---------|----------|
//! | No reducer configured | `dispatch` returns [`Error::NoReducer`] every time |
//! | Fallible reducer returns `Err` | [`Error::Reducer`] with the source, nothing published |
//! | Reducer panics | Panic unwinds out of `dispatch`, nothing published |
//! | Store disposed | `subscribe` and `dispatch` fail; `set` is ignored |

use std::fmt;
use std::rc::Rc;

use tracing::{debug_span, trace};

use crate::container::StateContainer;
use crate::error::{Error, ReducerError, Result};
use crate::observable::{Observable, Observer};
use crate::subscription::Subscription;

type TotalFn<S, E> = Rc<dyn Fn(&S, &E) -> S>;
type FallibleFn<S, E> = Rc<dyn Fn(&S, &E) -> std::result::Result<S, ReducerError>>;

enum Reducer<S, E> {
    Total(TotalFn<S, E>),
    Fallible(FallibleFn<S, E>),
}

impl<S, E> Clone for Reducer<S, E> {
    fn clone(&self) -> Self {
        match self {
            Self::Total(f) => Self::Total(Rc::clone(f)),
            Self::Fallible(f) => Self::Fallible(Rc::clone(f)),
        }
    }
}

/// State container plus an optional `(state, event) -> state` reducer.
///
/// Cloning a `Store` shares the container and the reducer.
pub struct Store<S, E> {
    container: StateContainer<S>,
    reducer: Option<Reducer<S, E>>,
}

impl<S, E> Clone for Store<S, E> {
    fn clone(&self) -> Self {
        Self {
            container: self.container.clone(),
            reducer: self.reducer.clone(),
        }
    }
}

impl<S: fmt::Debug, E> fmt::Debug for Store<S, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reducer = match self.reducer {
            Some(Reducer::Total(_)) => "total",
            Some(Reducer::Fallible(_)) => "fallible",
            None => "none",
        };
        f.debug_struct("Store")
            .field("container", &self.container)
            .field("reducer", &reducer)
            .finish()
    }
}

impl<S: Clone + 'static, E> Store<S, E> {
    /// Create a store driven by a total reducer.
    #[must_use]
    pub fn new(reducer: impl Fn(&S, &E) -> S + 'static, initial: S) -> Self {
        Self {
            container: StateContainer::new(initial),
            reducer: Some(Reducer::Total(Rc::new(reducer))),
        }
    }

    /// Create a store whose reducer may reject events.
    #[must_use]
    pub fn with_fallible_reducer(
        reducer: impl Fn(&S, &E) -> std::result::Result<S, ReducerError> + 'static,
        initial: S,
    ) -> Self {
        Self {
            container: StateContainer::new(initial),
            reducer: Some(Reducer::Fallible(Rc::new(reducer))),
        }
    }

    /// Create a direct-mutation store. `dispatch` always fails on it.
    #[must_use]
    pub fn without_reducer(initial: S) -> Self {
        Self {
            container: StateContainer::new(initial),
            reducer: None,
        }
    }

    /// Wrap an existing container.
    #[must_use]
    pub fn from_container(container: StateContainer<S>) -> Self {
        Self {
            container,
            reducer: None,
        }
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> S {
        self.container.get()
    }

    /// Borrow the current state without cloning.
    pub fn with_state<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        self.container.with(f)
    }

    /// Whether a reducer is configured.
    #[must_use]
    pub fn has_reducer(&self) -> bool {
        self.reducer.is_some()
    }

    /// Run the reducer on `event` and publish the next state.
    ///
    /// Publishes even when the next state equals the current one. Returns the
    /// event so call sites can chain or log it.
    ///
    /// # Errors
    ///
    /// - [`Error::NoReducer`] when the store has no reducer.
    /// - [`Error::Reducer`] when a fallible reducer rejects the event; the
    ///   state is left unchanged.
    /// - [`Error::Disposed`] when the store has been disposed; the reducer
    ///   does not run.
    pub fn dispatch(&self, event: E) -> Result<E> {
        let reducer = self.reducer.as_ref().ok_or(Error::NoReducer)?;
        if self.container.is_disposed() {
            trace!("dispatch rejected: store disposed");
            return Err(Error::Disposed);
        }

        let current = self.container.get();
        let next = {
            let _span = debug_span!("dispatch", version = self.container.version()).entered();
            match reducer {
                Reducer::Total(f) => f(&current, &event),
                Reducer::Fallible(f) => f(&current, &event).map_err(Error::Reducer)?,
            }
        };
        self.container.publish(next);
        Ok(event)
    }

    /// Replace the state directly and notify subscribers.
    pub fn set(&self, state: S) {
        self.container.publish(state);
    }

    /// Mutate a copy of the state and publish it.
    pub fn update(&self, f: impl FnOnce(&mut S)) {
        self.container.update(f);
    }

    /// The underlying container.
    #[must_use]
    pub fn container(&self) -> &StateContainer<S> {
        &self.container
    }

    /// Dispose the underlying container. Idempotent.
    pub fn dispose(&self) {
        self.container.dispose();
    }

    /// Whether the store has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.container.is_disposed()
    }
}

impl<S: Clone + 'static, E> Observable for Store<S, E> {
    type Item = S;

    fn subscribe(&self, observer: Observer<S>) -> Result<Subscription> {
        self.container.subscribe(observer)
    }
}
