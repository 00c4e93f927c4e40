#![forbid(unsafe_code)]

//! The push-based notification capability and its observer registry.
//!
//! # Design
//!
//! [`Observable`] has a single required operation, `subscribe`, implemented
//! by the state container, the store, and every operator stage. Observers are
//! shared single-callback handles ([`Observer<T>`]).
//!
//! [`Registry<T>`] is the ordered observer list each source owns. Pushes go
//! through a [`Snapshot`] taken before any callback runs, so observers that
//! register or unregister during a push cannot disturb it:
//!
//! - an observer added mid-push is not in the snapshot and first hears the
//!   next push;
//! - an observer removed mid-push has its liveness flag cleared and is skipped
//!   when the snapshot reaches it.
//!
//! # Invariants
//!
//! 1. Notification order is registration order.
//! 2. An [`ObserverId`] is never reused within one registry.
//! 3. Once `remove(id)` returns, no snapshot (old or new) delivers to `id`.
//! 4. The registry never drops an observer itself; `remove` and `clear` hand
//!    them back so the owner drops them outside its `RefCell` borrow.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

use crate::error::Result;
use crate::subscription::Subscription;

/// Identity token for one registration within a [`Registry`].
pub type ObserverId = u64;

/// A shared `on_next` callback.
///
/// Cloning an `Observer` yields another handle to the same callback.
pub struct Observer<T> {
    callback: Rc<dyn Fn(&T)>,
}

impl<T> Observer<T> {
    /// Wrap a closure as an observer.
    pub fn new(callback: impl Fn(&T) + 'static) -> Self {
        Self {
            callback: Rc::new(callback),
        }
    }

    /// Deliver one value.
    #[inline]
    pub fn notify(&self, value: &T) {
        (self.callback)(value);
    }
}

impl<T> Clone for Observer<T> {
    fn clone(&self) -> Self {
        Self {
            callback: Rc::clone(&self.callback),
        }
    }
}

impl<T> fmt::Debug for Observer<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Observer").finish_non_exhaustive()
    }
}

/// A source that pushes values to registered observers until they dispose.
pub trait Observable {
    /// Type of the pushed values.
    type Item;

    /// Register `observer`. The returned handle unregisters it on disposal.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Disposed`](crate::Error::Disposed) when the source (or
    /// the container at the root of an operator chain) has been disposed.
    fn subscribe(&self, observer: Observer<Self::Item>) -> Result<Subscription>;

    /// Register a closure as an observer.
    ///
    /// # Errors
    ///
    /// Same as [`subscribe`](Observable::subscribe).
    fn observe<F>(&self, callback: F) -> Result<Subscription>
    where
        F: Fn(&Self::Item) + 'static,
        Self: Sized,
    {
        self.subscribe(Observer::new(callback))
    }
}

impl<O: Observable + ?Sized> Observable for Rc<O> {
    type Item = O::Item;

    fn subscribe(&self, observer: Observer<Self::Item>) -> Result<Subscription> {
        (**self).subscribe(observer)
    }
}

impl<O: Observable + ?Sized> Observable for &O {
    type Item = O::Item;

    fn subscribe(&self, observer: Observer<Self::Item>) -> Result<Subscription> {
        (**self).subscribe(observer)
    }
}

struct Entry<T> {
    id: ObserverId,
    observer: Observer<T>,
    live: Rc<Cell<bool>>,
}

/// Ordered set of observers owned by exactly one source.
pub struct Registry<T> {
    entries: Vec<Entry<T>>,
    next_id: ObserverId,
}

impl<T> Default for Registry<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Registry<T> {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
            next_id: 1,
        }
    }

    /// Append an observer; it will be notified after every earlier one.
    pub fn insert(&mut self, observer: Observer<T>) -> ObserverId {
        let id = self.next_id;
        self.next_id += 1;
        self.entries.push(Entry {
            id,
            observer,
            live: Rc::new(Cell::new(true)),
        });
        id
    }

    /// Remove an observer and hand it back, or `None` if `id` was not
    /// registered.
    ///
    /// Owners keep the returned observer until their own borrow is released:
    /// its callback may own subscriptions whose teardown re-enters the owner.
    #[must_use = "drop the removed observer after releasing the owner's borrow"]
    pub fn remove(&mut self, id: ObserverId) -> Option<Observer<T>> {
        let index = self.entries.iter().position(|entry| entry.id == id)?;
        let entry = self.entries.remove(index);
        entry.live.set(false);
        Some(entry.observer)
    }

    /// Remove every observer, including from snapshots already taken.
    ///
    /// The drained observers are returned for the same reason as in
    /// [`remove`](Self::remove).
    #[must_use = "drop the drained observers after releasing the owner's borrow"]
    pub fn clear(&mut self) -> Vec<Observer<T>> {
        self.entries
            .drain(..)
            .map(|entry| {
                entry.live.set(false);
                entry.observer
            })
            .collect()
    }

    /// Capture the current delivery set.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot<T> {
        Snapshot {
            targets: self
                .entries
                .iter()
                .map(|entry| (Rc::clone(&entry.live), entry.observer.clone()))
                .collect(),
        }
    }

    /// Whether `id` is still registered.
    #[must_use]
    pub fn contains(&self, id: ObserverId) -> bool {
        self.entries.iter().any(|entry| entry.id == id)
    }

    /// Number of registered observers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no observer is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> fmt::Debug for Registry<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("len", &self.entries.len())
            .field("next_id", &self.next_id)
            .finish()
    }
}

/// The delivery set of one push, frozen at the moment it was taken.
pub struct Snapshot<T> {
    targets: Vec<(Rc<Cell<bool>>, Observer<T>)>,
}

impl<T> Snapshot<T> {
    /// Push `value` to every observer in the snapshot that is still live.
    ///
    /// Returns the number of observers actually notified.
    pub fn deliver(&self, value: &T) -> usize {
        let mut delivered = 0;
        for (live, observer) in &self.targets {
            if live.get() {
                observer.notify(value);
                delivered += 1;
            }
        }
        delivered
    }

    /// Number of observers captured.
    #[must_use]
    pub fn len(&self) -> usize {
        self.targets.len()
    }

    /// Whether the snapshot captured nobody.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.targets.is_empty()
    }
}
