#![forbid(unsafe_code)]

//! Periodic tick sources for time-based operators.
//!
//! Tick callbacks always run on the thread that owns the pipeline. A
//! [`ManualScheduler`] fires them when the test advances its virtual clock;
//! a [`TimerScheduler`] fires them when the owner pumps it.

mod manual;
mod timer;

use std::time::Duration;

use statecast_core::{Result, Subscription};

pub use manual::ManualScheduler;
pub use timer::{DEFAULT_MIN_INTERVAL, DEFAULT_TICK_CAPACITY, TimerConfig, TimerScheduler};

/// Callback run once per tick.
pub type Task = Box<dyn FnMut()>;

/// Capability to run a task repeatedly.
pub trait Scheduler {
    /// Run `task` every `interval` until the returned subscription is
    /// disposed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Scheduler`](statecast_core::Error::Scheduler) when the
    /// underlying timer cannot be started.
    fn schedule_periodic(&self, interval: Duration, task: Task) -> Result<Subscription>;
}

impl<S: Scheduler + ?Sized> Scheduler for &S {
    fn schedule_periodic(&self, interval: Duration, task: Task) -> Result<Subscription> {
        (**self).schedule_periodic(interval, task)
    }
}

impl<S: Scheduler + ?Sized> Scheduler for std::rc::Rc<S> {
    fn schedule_periodic(&self, interval: Duration, task: Task) -> Result<Subscription> {
        (**self).schedule_periodic(interval, task)
    }
}
