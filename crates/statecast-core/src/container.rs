#![forbid(unsafe_code)]

//! Replay-latest state cell.
//!
//! # Design
//!
//! [`StateContainer<T>`] wraps the current value, a version counter, and the
//! observer [`Registry`] in shared, reference-counted storage
//! (`Rc<RefCell<..>>`). Every `publish` stores the value and pushes it to a
//! snapshot of the registry in registration order. There is no distinctness
//! check: equal values are published like any other.
//!
//! # Invariants
//!
//! 1. A value is present at all times; there is no empty state.
//! 2. `version` increments by exactly 1 per accepted `publish`.
//! 3. A new subscriber is invoked once with the current value before
//!    `subscribe` returns.
//! 4. The `RefCell` is never borrowed while an observer runs, so observers may
//!    publish, subscribe, or dispose re-entrantly.
//! 5. The `RefCell` is never borrowed while an observer is dropped, so an
//!    observer may own subscriptions to the container it observes.
//!
//! # Failure Modes
//!
//! - **Subscribe after dispose**: fails with [`Error::Disposed`].
//! - **Publish after dispose**: silently ignored; the value is not updated.
//! - **Re-entrant publish**: the nested push completes (with its own snapshot)
//!   before the outer push moves on to its next observer, so observers see
//!   values in program order rather than breadth-first.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use tracing::{debug, trace};

use crate::error::{Error, Result};
use crate::observable::{Observable, Observer, Registry};
use crate::subscription::Subscription;

struct ContainerInner<T> {
    value: T,
    version: u64,
    registry: Registry<T>,
    disposed: bool,
}

/// A shared value cell that replays its latest value to new subscribers and
/// broadcasts every update.
///
/// Cloning a `StateContainer` creates a new handle to the **same** cell.
pub struct StateContainer<T> {
    inner: Rc<RefCell<ContainerInner<T>>>,
}

impl<T> Clone for StateContainer<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for StateContainer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("StateContainer")
            .field("value", &inner.value)
            .field("version", &inner.version)
            .field("subscriber_count", &inner.registry.len())
            .field("disposed", &inner.disposed)
            .finish()
    }
}

impl<T: Clone + Default + 'static> Default for StateContainer<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Clone + 'static> StateContainer<T> {
    /// Create a container holding `value`. Version starts at 0.
    #[must_use]
    pub fn new(value: T) -> Self {
        Self {
            inner: Rc::new(RefCell::new(ContainerInner {
                value,
                version: 0,
                registry: Registry::new(),
                disposed: false,
            })),
        }
    }

    /// Clone of the current value.
    #[must_use]
    pub fn get(&self) -> T {
        self.inner.borrow().value.clone()
    }

    /// Borrow the current value without cloning.
    ///
    /// `f` must not publish to this container.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> R {
        f(&self.inner.borrow().value)
    }

    /// Replace the value and notify every registered observer.
    pub fn publish(&self, value: T) {
        let (version, snapshot) = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                trace!("publish ignored: container disposed");
                return;
            }
            inner.value = value.clone();
            inner.version += 1;
            (inner.version, inner.registry.snapshot())
        };
        trace!(version, observers = snapshot.len(), "publishing state");
        snapshot.deliver(&value);
    }

    /// Same as [`publish`](Self::publish).
    pub fn set(&self, value: T) {
        self.publish(value);
    }

    /// Mutate a copy of the current value, then publish it.
    pub fn update(&self, f: impl FnOnce(&mut T)) {
        let mut next = self.get();
        f(&mut next);
        self.publish(next);
    }

    /// Number of accepted publishes so far.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.inner.borrow().version
    }

    /// Number of currently registered observers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.inner.borrow().registry.len()
    }

    /// Whether `dispose()` has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.borrow().disposed
    }

    /// Detach every observer and reject future subscriptions. Idempotent.
    pub fn dispose(&self) {
        let (detached, version) = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return;
            }
            inner.disposed = true;
            (inner.registry.clear(), inner.version)
        };
        debug!(detached = detached.len(), version, "state container disposed");
        drop(detached);
    }
}

impl<T: Clone + 'static> Observable for StateContainer<T> {
    type Item = T;

    fn subscribe(&self, observer: Observer<T>) -> Result<Subscription> {
        let (id, current) = {
            let mut inner = self.inner.borrow_mut();
            if inner.disposed {
                return Err(Error::Disposed);
            }
            let id = inner.registry.insert(observer.clone());
            (id, inner.value.clone())
        };

        let weak = Rc::downgrade(&self.inner);
        let status = Rc::downgrade(&self.inner);
        let subscription = Subscription::with_source_status(
            move || {
                if let Some(inner) = weak.upgrade() {
                    let removed = inner.borrow_mut().registry.remove(id);
                    drop(removed);
                }
            },
            move || {
                status
                    .upgrade()
                    .is_none_or(|inner| inner.try_borrow().is_ok_and(|inner| inner.disposed))
            },
        );

        trace!(observer = id, "replaying current value");
        observer.notify(&current);
        Ok(subscription)
    }
}
