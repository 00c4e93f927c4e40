#![forbid(unsafe_code)]

//! Core: replay-latest state cell, reducer store, and subscriptions.
//!
//! # Role in statecast
//! `statecast-core` owns the single mutable "current value" and the rules for
//! broadcasting it. Operator stages (`statecast-ops`) and the facade
//! (`statecast`) build on the [`Observable`] capability defined here.
//!
//! # Primary responsibilities
//! - **[`StateContainer`]**: current value + ordered observers; replays on
//!   subscribe, publishes synchronously in registration order.
//! - **[`Store`]**: container + optional reducer; `dispatch` reduces and
//!   republishes.
//! - **[`Subscription`]**: idempotent, RAII disposal handle.
//! - **[`Registry`]**: snapshot-based delivery that tolerates re-entrant
//!   registration and disposal.
//! - **[`Error`]**: configuration, reducer, disposed-use, operator, and
//!   scheduler failures.
//!
//! # Architecture
//!
//! Everything is single-threaded (`Rc<RefCell<..>>`), with no locks on the
//! push path. `RefCell` borrows are released before any observer runs.

pub mod container;
pub mod error;
pub mod observable;
pub mod store;
pub mod subscription;

pub use container::StateContainer;
pub use error::{Error, ReducerError, Result};
pub use observable::{Observable, Observer, ObserverId, Registry, Snapshot};
pub use store::Store;
pub use subscription::Subscription;
