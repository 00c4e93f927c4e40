#![forbid(unsafe_code)]

//! Single-threaded reactive state for Rust.
//!
//! A [`StateContainer`] holds one current value and pushes every change to
//! its observers, replaying the current value to each newcomer. A [`Store`]
//! adds a reducer so state changes can be driven by events. Operators from
//! [`ops`] derive filtered, transformed, grouped, sampled, or combined views
//! without touching the underlying state.
//!
//! ```
//! use statecast::prelude::*;
//!
//! #[derive(Debug)]
//! enum Event {
//!     Add(i32),
//!     Reset,
//! }
//!
//! let store = Store::new(
//!     |total: &i32, event: &Event| match event {
//!         Event::Add(n) => total + n,
//!         Event::Reset => 0,
//!     },
//!     0,
//! );
//!
//! let seen = std::rc::Rc::new(std::cell::RefCell::new(Vec::new()));
//! let sink = seen.clone();
//! let _sub = store
//!     .clone()
//!     .filter(|total| total % 2 == 0)
//!     .observe(move |total| sink.borrow_mut().push(*total))?;
//!
//! store.dispatch(Event::Add(2))?;
//! store.dispatch(Event::Add(1))?;
//! store.dispatch(Event::Reset)?;
//! assert_eq!(*seen.borrow(), vec![0, 2, 0]);
//! # Ok::<(), statecast::Error>(())
//! ```
//!
//! Everything here is `!Send`: a container, its observers, and every stage
//! derived from it live on one thread. Time-based operators get their ticks
//! from a [`Scheduler`](ops::Scheduler) that runs callbacks on that thread.

pub use statecast_ops as ops;

pub use statecast_core::{
    Error, Observable, Observer, ReducerError, Result, StateContainer, Store, Subscription,
};
pub use statecast_ops::{
    Derived, ManualScheduler, ObservableExt, Scheduler, TimerConfig, TimerScheduler,
};

/// The types and traits most programs need.
pub mod prelude {
    pub use statecast_core::{Error, Observable, StateContainer, Store, Subscription};
    pub use statecast_ops::{Derived, ManualScheduler, ObservableExt, Scheduler, TimerScheduler};
}
