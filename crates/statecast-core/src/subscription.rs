#![forbid(unsafe_code)]

//! Disposable subscription handles.
//!
//! A [`Subscription`] owns the teardown for exactly one registration (or a
//! group of child subscriptions). Teardown runs at most once: the first
//! [`dispose`](Subscription::dispose) or the drop of the handle, whichever
//! comes first.
//!
//! # Invariants
//!
//! 1. Teardown executes at most once; later `dispose()` calls are no-ops.
//! 2. `dispose()` never panics on its own account and never returns an error.
//! 3. Dropping a live `Subscription` disposes it.
//! 4. [`detach`](Subscription::detach) consumes the handle without running
//!    teardown; the registration then lives as long as its owner.
//! 5. [`is_source_closed`](Subscription::is_source_closed) turns true once the
//!    source behind the registration can no longer deliver, even while the
//!    handle itself is still live.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

type Teardown = Box<dyn FnOnce()>;
type SourceStatus = Box<dyn Fn() -> bool>;

/// RAII handle for one observer registration.
///
/// Dropping the handle unsubscribes. Bind it (`let _sub = ...`) to keep the
/// observer registered.
#[must_use = "dropping a Subscription unsubscribes immediately"]
pub struct Subscription {
    teardown: Cell<Option<Teardown>>,
    disposed: Cell<bool>,
    source_closed: Option<SourceStatus>,
}

impl Subscription {
    /// Create a subscription that runs `teardown` on first disposal.
    pub fn from_fn(teardown: impl FnOnce() + 'static) -> Self {
        Self {
            teardown: Cell::new(Some(Box::new(teardown))),
            disposed: Cell::new(false),
            source_closed: None,
        }
    }

    /// Like [`from_fn`](Self::from_fn), with `is_closed` reporting whether the
    /// source has shut down underneath this registration.
    pub fn with_source_status(
        teardown: impl FnOnce() + 'static,
        is_closed: impl Fn() -> bool + 'static,
    ) -> Self {
        Self {
            teardown: Cell::new(Some(Box::new(teardown))),
            disposed: Cell::new(false),
            source_closed: Some(Box::new(is_closed)),
        }
    }

    /// A subscription with nothing to tear down.
    pub fn empty() -> Self {
        Self {
            teardown: Cell::new(None),
            disposed: Cell::new(false),
            source_closed: None,
        }
    }

    /// Combine several subscriptions into one handle.
    ///
    /// Children are disposed in the order given. The merged source counts as
    /// closed as soon as any child's source is.
    pub fn merge(children: impl IntoIterator<Item = Subscription>) -> Self {
        let children: Rc<Vec<Subscription>> = Rc::new(children.into_iter().collect());
        let status = Rc::clone(&children);
        Self::with_source_status(
            move || {
                for child in children.iter() {
                    child.dispose();
                }
            },
            move || status.iter().any(Subscription::is_source_closed),
        )
    }

    /// Unregister the observer. Idempotent.
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }

    /// Whether `dispose()` has run (explicitly or via drop of a merged parent).
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Whether the source this handle is registered with has been disposed.
    ///
    /// Always false for handles built without a status check.
    #[must_use]
    pub fn is_source_closed(&self) -> bool {
        self.source_closed.as_ref().is_some_and(|is_closed| is_closed())
    }

    /// Give up the handle without unsubscribing.
    ///
    /// The registration stays until its owner is disposed.
    pub fn detach(self) {
        drop(self.teardown.take());
        self.disposed.set(true);
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("disposed", &self.disposed.get())
            .finish_non_exhaustive()
    }
}
