#![forbid(unsafe_code)]

//! Operators: derived reactive views over a state container or store.
//!
//! # Role in statecast
//! Every operator takes an [`Observable`](statecast_core::Observable) and
//! returns a [`Derived`] stage that is itself observable, so views compose
//! into chains. Stages connect upstream lazily on their first subscriber and
//! disconnect when the last one leaves.
//!
//! # Operators
//! - [`transform`]: `filter`, `map`, `tap`, `start_with`
//! - [`count`]: `skip`, `take`
//! - [`fold`]: `distinct_until_changed`, `scan`
//! - [`window`]: `buffer`, `sample`
//! - [`combine`]: `combine_latest`, `merge`
//!
//! [`ObservableExt`] exposes all of them as chaining methods.
//!
//! # Time
//! `sample` takes a [`Scheduler`]. Use [`ManualScheduler`] for deterministic
//! virtual time and [`TimerScheduler`] for wall-clock ticks pumped on the
//! owning thread.

pub mod combine;
pub mod count;
pub mod ext;
pub mod fold;
pub mod scheduler;
pub mod stage;
pub mod transform;
pub mod window;

pub use combine::{combine_latest, merge};
pub use count::{skip, take};
pub use ext::ObservableExt;
pub use fold::{distinct_until_changed, scan};
pub use scheduler::{ManualScheduler, Scheduler, Task, TimerConfig, TimerScheduler};
pub use stage::{Derived, Emitter};
pub use transform::{filter, map, start_with, tap};
pub use window::{buffer, sample};
