#![forbid(unsafe_code)]

//! Shared node behind every operator.
//!
//! # Design
//!
//! A [`Derived<T>`] is a handle to a stage: a downstream observer
//! [`Registry`], a connect function, and the current upstream connection.
//!
//! ```text
//!   upstream ──observer(emitter)──▶ stage ──snapshot──▶ downstream observers
//!                                     │
//!                     Idle ──first subscribe──▶ Connecting ──▶ Live(sub)
//!                       ▲                            │            │
//!                       └──── last unsubscribe ◀─────┴── complete ┴─▶ Completed
//! ```
//!
//! The connect function runs on the first downstream subscription and returns
//! the upstream [`Subscription`]. It receives an [`Emitter`] for pushing
//! transformed values downstream; per-connection operator state (counters,
//! accumulators, buffers) lives in the closures it creates, so a reconnect
//! starts fresh.
//!
//! # Invariants
//!
//! 1. At most one upstream connection exists per stage.
//! 2. When the downstream registry becomes empty the upstream subscription is
//!    disposed in the same call.
//! 3. After [`Emitter::complete`] nothing more is forwarded on that
//!    connection, and the upstream subscription is disposed.
//! 4. Emitters from an earlier connection are inert (epoch check).
//! 5. The stage `RefCell` is never borrowed while user code or upstream
//!    teardown runs, nor while a removed observer is dropped.
//! 6. A live connection whose root source has been disposed is reset on the
//!    next subscribe, which then fails the same way a fresh connect would.

use std::cell::RefCell;
use std::fmt;
use std::mem;
use std::rc::{Rc, Weak};

use statecast_core::{Observable, Observer, ObserverId, Registry, Result, Subscription};
use tracing::debug;

type ConnectFn<T> = Box<dyn Fn(&Emitter<T>) -> Result<Subscription>>;
type GreetFn<T> = Box<dyn Fn(&Observer<T>)>;

enum Connection {
    Idle,
    Connecting,
    Live(Subscription),
    Completed,
}

impl Connection {
    fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Live(_) => "live",
            Self::Completed => "completed",
        }
    }
}

struct StageState<T> {
    registry: Registry<T>,
    connection: Connection,
    epoch: u64,
}

struct Stage<T> {
    name: &'static str,
    state: RefCell<StageState<T>>,
    connect: ConnectFn<T>,
    greet: Option<GreetFn<T>>,
}

impl<T: 'static> Stage<T> {
    fn subscribe(self: &Rc<Self>, observer: Observer<T>) -> Result<Subscription> {
        self.drop_closed_upstream();

        let (id, connect_epoch) = {
            let mut state = self.state.borrow_mut();
            let id = state.registry.insert(observer.clone());
            let connect_epoch = if matches!(state.connection, Connection::Idle) {
                state.epoch += 1;
                state.connection = Connection::Connecting;
                Some(state.epoch)
            } else {
                None
            };
            (id, connect_epoch)
        };

        let stage = Rc::clone(self);
        let status = Rc::downgrade(self);
        let subscription = Subscription::with_source_status(
            move || stage.detach(id),
            move || status.upgrade().is_none_or(|stage| stage.source_closed()),
        );

        if let Some(greet) = &self.greet {
            greet(&observer);
        }

        if let Some(epoch) = connect_epoch {
            debug!(operator = self.name, "connecting upstream");
            let emitter = Emitter {
                stage: Rc::downgrade(self),
                epoch,
            };
            match (self.connect)(&emitter) {
                Ok(upstream) => self.install(epoch, upstream),
                Err(err) => {
                    let removed = {
                        let mut state = self.state.borrow_mut();
                        if state.epoch == epoch {
                            state.connection = Connection::Idle;
                        }
                        state.registry.remove(id)
                    };
                    drop(removed);
                    subscription.detach();
                    return Err(err);
                }
            }
        }

        Ok(subscription)
    }

    /// Whether the live upstream reports that its root source was disposed.
    fn source_closed(&self) -> bool {
        self.state
            .try_borrow()
            .is_ok_and(|state| match &state.connection {
                Connection::Live(upstream) => upstream.is_source_closed(),
                _ => false,
            })
    }

    /// Forget a live connection whose source has shut down, so the next
    /// subscriber reconnects and sees the failure.
    fn drop_closed_upstream(&self) {
        let closed = {
            let mut state = self.state.borrow_mut();
            match &state.connection {
                Connection::Live(upstream) if upstream.is_source_closed() => {}
                _ => return,
            }
            state.epoch += 1;
            mem::replace(&mut state.connection, Connection::Idle)
        };
        debug!(operator = self.name, "upstream source disposed, resetting connection");
        drop(closed);
    }

    /// Store the upstream handle unless the connection ended while connecting.
    fn install(&self, epoch: u64, upstream: Subscription) {
        let stale = {
            let mut state = self.state.borrow_mut();
            if state.epoch == epoch && matches!(state.connection, Connection::Connecting) {
                state.connection = Connection::Live(upstream);
                None
            } else {
                Some(upstream)
            }
        };
        if let Some(upstream) = stale {
            debug!(operator = self.name, "connection ended during connect");
            upstream.dispose();
        }
    }

    fn detach(&self, id: ObserverId) {
        let (removed, upstream) = {
            let mut state = self.state.borrow_mut();
            let removed = state.registry.remove(id);
            let upstream = if removed.is_some() && state.registry.is_empty() {
                state.epoch += 1;
                mem::replace(&mut state.connection, Connection::Idle)
            } else {
                Connection::Idle
            };
            (removed, upstream)
        };
        drop(removed);
        if let Connection::Live(upstream) = upstream {
            debug!(operator = self.name, "last subscriber gone, disconnecting upstream");
            upstream.dispose();
        }
    }
}

/// Handle used by an operator's upstream callbacks to push downstream.
pub struct Emitter<T> {
    stage: Weak<Stage<T>>,
    epoch: u64,
}

impl<T> Clone for Emitter<T> {
    fn clone(&self) -> Self {
        Self {
            stage: Weak::clone(&self.stage),
            epoch: self.epoch,
        }
    }
}

impl<T> fmt::Debug for Emitter<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Emitter")
            .field("epoch", &self.epoch)
            .field("attached", &(self.stage.strong_count() > 0))
            .finish()
    }
}

impl<T: 'static> Emitter<T> {
    /// Forward `value` to the stage's current observers.
    pub fn emit(&self, value: &T) {
        let Some(stage) = self.stage.upgrade() else {
            return;
        };
        let snapshot = {
            let state = stage.state.borrow();
            if state.epoch != self.epoch || matches!(state.connection, Connection::Completed) {
                return;
            }
            state.registry.snapshot()
        };
        snapshot.deliver(value);
    }

    /// End this connection: stop forwarding and dispose upstream.
    pub fn complete(&self) {
        let Some(stage) = self.stage.upgrade() else {
            return;
        };
        let previous = {
            let mut state = stage.state.borrow_mut();
            if state.epoch != self.epoch || matches!(state.connection, Connection::Idle) {
                return;
            }
            mem::replace(&mut state.connection, Connection::Completed)
        };
        debug!(operator = stage.name, "stage completed");
        if let Connection::Live(upstream) = previous {
            upstream.dispose();
        }
    }

    /// Whether emitted values can still reach observers.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.stage.upgrade().is_some_and(|stage| {
            let state = stage.state.borrow();
            state.epoch == self.epoch
                && matches!(
                    state.connection,
                    Connection::Connecting | Connection::Live(_)
                )
        })
    }
}

/// An observable produced by an operator.
///
/// Cloning a `Derived` shares the same stage, so clones share one upstream
/// connection and one downstream registry.
pub struct Derived<T> {
    stage: Rc<Stage<T>>,
}

impl<T> Clone for Derived<T> {
    fn clone(&self) -> Self {
        Self {
            stage: Rc::clone(&self.stage),
        }
    }
}

impl<T> fmt::Debug for Derived<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.stage.state.borrow();
        f.debug_struct("Derived")
            .field("operator", &self.stage.name)
            .field("connection", &state.connection.label())
            .field("subscriber_count", &state.registry.len())
            .finish()
    }
}

impl<T: 'static> Derived<T> {
    /// Build an operator stage from a connect function.
    ///
    /// `connect` runs on the first downstream subscription and must return
    /// the upstream subscription it created.
    pub fn new(
        name: &'static str,
        connect: impl Fn(&Emitter<T>) -> Result<Subscription> + 'static,
    ) -> Self {
        Self::build(name, Box::new(connect), None)
    }

    /// Like [`Derived::new`], additionally calling `greet` with every new
    /// observer before any upstream value can reach it.
    pub fn with_greeting(
        name: &'static str,
        connect: impl Fn(&Emitter<T>) -> Result<Subscription> + 'static,
        greet: impl Fn(&Observer<T>) + 'static,
    ) -> Self {
        Self::build(name, Box::new(connect), Some(Box::new(greet)))
    }

    fn build(name: &'static str, connect: ConnectFn<T>, greet: Option<GreetFn<T>>) -> Self {
        Self {
            stage: Rc::new(Stage {
                name,
                state: RefCell::new(StageState {
                    registry: Registry::new(),
                    connection: Connection::Idle,
                    epoch: 0,
                }),
                connect,
                greet,
            }),
        }
    }

    /// Operator name, for diagnostics.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.stage.name
    }

    /// Number of downstream observers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.stage.state.borrow().registry.len()
    }

    /// Whether the stage currently holds an upstream subscription.
    #[must_use]
    pub fn is_connected(&self) -> bool {
        matches!(
            self.stage.state.borrow().connection,
            Connection::Connecting | Connection::Live(_)
        )
    }
}

impl<T: 'static> Observable for Derived<T> {
    type Item = T;

    fn subscribe(&self, observer: Observer<T>) -> Result<Subscription> {
        self.stage.subscribe(observer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use statecast_core::{Error, StateContainer};
    use std::cell::Cell;

    fn passthrough(source: StateContainer<i32>, connects: Rc<Cell<u32>>) -> Derived<i32> {
        Derived::new("passthrough", move |emitter| {
            connects.set(connects.get() + 1);
            let emitter = emitter.clone();
            source.observe(move |v| emitter.emit(v))
        })
    }

    #[test]
    fn connects_lazily_and_once() {
        let source = StateContainer::new(0);
        let connects = Rc::new(Cell::new(0));
        let derived = passthrough(source.clone(), Rc::clone(&connects));
        assert!(!derived.is_connected());
        assert_eq!(source.subscriber_count(), 0);

        let _a = derived.observe(|_| {}).unwrap();
        let _b = derived.observe(|_| {}).unwrap();
        assert!(derived.is_connected());
        assert_eq!(connects.get(), 1);
        assert_eq!(source.subscriber_count(), 1);
        assert_eq!(derived.subscriber_count(), 2);
    }

    #[test]
    fn last_unsubscribe_disconnects() {
        let source = StateContainer::new(0);
        let connects = Rc::new(Cell::new(0));
        let derived = passthrough(source.clone(), Rc::clone(&connects));

        let a = derived.observe(|_| {}).unwrap();
        let b = derived.observe(|_| {}).unwrap();
        a.dispose();
        assert_eq!(source.subscriber_count(), 1);
        b.dispose();
        assert_eq!(source.subscriber_count(), 0);
        assert!(!derived.is_connected());

        let _c = derived.observe(|_| {}).unwrap();
        assert_eq!(connects.get(), 2);
    }

    #[test]
    fn subscription_keeps_stage_alive() {
        let source = StateContainer::new(0);
        let seen = Rc::new(Cell::new(-1));
        let seen_clone = Rc::clone(&seen);
        let sub = passthrough(source.clone(), Rc::new(Cell::new(0)))
            .observe(move |v| seen_clone.set(*v))
            .unwrap();

        source.publish(5);
        assert_eq!(seen.get(), 5);
        drop(sub);
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn connect_failure_rolls_back() {
        let source = StateContainer::new(0);
        source.dispose();
        let derived = passthrough(source, Rc::new(Cell::new(0)));

        assert!(matches!(derived.observe(|_| {}), Err(Error::Disposed)));
        assert_eq!(derived.subscriber_count(), 0);
        assert!(!derived.is_connected());
    }

    #[test]
    fn disposing_root_while_connected_fails_new_subscribers() {
        let source = StateContainer::new(0);
        let connects = Rc::new(Cell::new(0));
        let derived = passthrough(source.clone(), Rc::clone(&connects));
        let first = derived.observe(|_| {}).unwrap();
        assert!(derived.is_connected());

        source.dispose();
        assert!(first.is_source_closed());
        assert!(matches!(derived.observe(|_| {}), Err(Error::Disposed)));
        assert_eq!(connects.get(), 2);
        assert_eq!(derived.subscriber_count(), 1);
        assert!(!derived.is_connected());

        first.dispose();
        assert_eq!(derived.subscriber_count(), 0);
    }

    #[test]
    fn observer_owning_stage_subscription_detaches_cleanly() {
        let source = StateContainer::new(0);
        let derived = passthrough(source.clone(), Rc::new(Cell::new(0)));
        let inner = derived.observe(|_| {}).unwrap();
        let outer = derived
            .observe(move |_| {
                let _ = inner.is_disposed();
            })
            .unwrap();
        assert_eq!(derived.subscriber_count(), 2);

        outer.dispose();
        assert_eq!(derived.subscriber_count(), 0);
        assert!(!derived.is_connected());
        assert_eq!(source.subscriber_count(), 0);
    }

    #[test]
    fn complete_during_connect_releases_upstream() {
        let source = StateContainer::new(0);
        let upstream = source.clone();
        let derived = Derived::new("first", move |emitter: &Emitter<i32>| {
            let emitter = emitter.clone();
            upstream.observe(move |v| {
                emitter.emit(v);
                emitter.complete();
            })
        });

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        let _sub = derived
            .observe(move |v| seen_clone.borrow_mut().push(*v))
            .unwrap();
        source.publish(1);

        assert_eq!(*seen.borrow(), vec![0]);
        assert_eq!(source.subscriber_count(), 0);
        assert!(!derived.is_connected());
    }

    #[test]
    fn stale_emitter_is_inert() {
        let source = StateContainer::new(0);
        let captured: Rc<RefCell<Option<Emitter<i32>>>> = Rc::new(RefCell::new(None));
        let captured_clone = Rc::clone(&captured);
        let upstream = source.clone();
        let derived = Derived::new("capture", move |emitter: &Emitter<i32>| {
            *captured_clone.borrow_mut() = Some(emitter.clone());
            let emitter = emitter.clone();
            upstream.observe(move |v| emitter.emit(v))
        });

        let first = derived.observe(|_| {}).unwrap();
        let old = captured.borrow_mut().take().unwrap();
        assert!(old.is_active());
        first.dispose();
        assert!(!old.is_active());

        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        let _second = derived
            .observe(move |v| seen_clone.borrow_mut().push(*v))
            .unwrap();
        old.emit(&99);
        assert_eq!(*seen.borrow(), vec![0]);
    }

    #[test]
    fn greeting_precedes_upstream_replay() {
        let source = StateContainer::new(1);
        let upstream = source.clone();
        let derived = Derived::with_greeting(
            "greet",
            move |emitter: &Emitter<i32>| {
                let emitter = emitter.clone();
                upstream.observe(move |v| emitter.emit(v))
            },
            |observer| observer.notify(&-1),
        );
        let seen = Rc::new(RefCell::new(Vec::new()));
        let seen_clone = Rc::clone(&seen);
        let _sub = derived
            .observe(move |v| seen_clone.borrow_mut().push(*v))
            .unwrap();
        assert_eq!(*seen.borrow(), vec![-1, 1]);
    }

    #[test]
    fn debug_format() {
        let derived = passthrough(StateContainer::new(0), Rc::new(Cell::new(0)));
        let dbg = format!("{derived:?}");
        assert!(dbg.contains("passthrough"));
        assert!(dbg.contains("idle"));
    }
}
