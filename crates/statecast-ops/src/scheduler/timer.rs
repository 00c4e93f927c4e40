#![forbid(unsafe_code)]

//! Wall-clock scheduler backed by timer threads.
//!
//! # Design
//!
//! Each periodic task gets a timer thread that only keeps time: when a tick
//! falls due it sends the task id over a bounded channel shared by all tasks
//! of one scheduler. The callbacks themselves stay on the owning thread and
//! run when the owner pumps with [`TimerScheduler::run_pending`] or
//! [`TimerScheduler::run_for`].
//!
//! # Coalescing
//!
//! If the owner falls behind and the channel is full, further ticks are
//! dropped until it drains. A slow owner therefore sees fewer ticks, never a
//! backlog.
//!
//! # Shutdown
//!
//! Disposing a task's subscription stops and joins its thread. Dropping the
//! last scheduler handle stops and joins every remaining thread.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, SyncSender, TrySendError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use statecast_core::{Error, Result, Subscription};
use tracing::{debug, trace};
use web_time::Instant;

use super::{Scheduler, Task};

/// Default bound on queued, not yet pumped ticks.
pub const DEFAULT_TICK_CAPACITY: usize = 64;

/// Default lower bound for periodic intervals.
pub const DEFAULT_MIN_INTERVAL: Duration = Duration::from_millis(1);

/// Configuration for [`TimerScheduler`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerConfig {
    /// Prefix for timer thread names; the task id is appended.
    pub thread_name: String,
    /// Capacity of the tick channel. Zero is treated as one.
    pub tick_capacity: usize,
    /// Intervals shorter than this are raised to it.
    pub min_interval: Duration,
}

impl Default for TimerConfig {
    fn default() -> Self {
        Self {
            thread_name: "statecast-timer".into(),
            tick_capacity: DEFAULT_TICK_CAPACITY,
            min_interval: DEFAULT_MIN_INTERVAL,
        }
    }
}

impl TimerConfig {
    /// Set the thread name prefix.
    #[must_use]
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.thread_name = name.into();
        self
    }

    /// Set the tick channel capacity.
    #[must_use]
    pub fn with_tick_capacity(mut self, capacity: usize) -> Self {
        self.tick_capacity = capacity;
        self
    }

    /// Set the minimum interval.
    #[must_use]
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Defaults overridden by `STATECAST_TIMER_CAPACITY` and
    /// `STATECAST_TIMER_MIN_INTERVAL_MS`.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_env_with(|key| std::env::var(key).ok())
    }

    /// Like [`TimerConfig::from_env`] with an injectable lookup.
    ///
    /// Unparseable values are ignored.
    #[must_use]
    pub fn from_env_with<F>(get_env: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(capacity) = get_env("STATECAST_TIMER_CAPACITY")
            .and_then(|value| value.trim().parse::<usize>().ok())
        {
            config.tick_capacity = capacity;
        }
        if let Some(ms) = get_env("STATECAST_TIMER_MIN_INTERVAL_MS")
            .and_then(|value| value.trim().parse::<u64>().ok())
        {
            config.min_interval = Duration::from_millis(ms);
        }
        config
    }
}

struct Worker {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn shutdown(mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            let _ = handle.join();
        }
    }
}

struct TimerTask {
    id: u64,
    /// `None` while the callback is running.
    task: Option<Task>,
    worker: Worker,
}

struct TimerState {
    next_id: u64,
    tasks: Vec<TimerTask>,
}

struct TimerInner {
    config: TimerConfig,
    sender: SyncSender<u64>,
    receiver: Receiver<u64>,
    state: RefCell<TimerState>,
}

impl TimerInner {
    fn cancel(&self, id: u64) {
        let removed = {
            let mut state = self.state.borrow_mut();
            state
                .tasks
                .iter()
                .position(|t| t.id == id)
                .map(|index| state.tasks.remove(index))
        };
        if let Some(task) = removed {
            task.worker.shutdown();
            debug!(task = id, "timer thread stopped");
        }
    }

    fn run_tick(&self, id: u64) -> bool {
        let taken = {
            let mut state = self.state.borrow_mut();
            state
                .tasks
                .iter_mut()
                .find(|t| t.id == id)
                .and_then(|t| t.task.take())
        };
        let Some(mut task) = taken else {
            return false;
        };
        task();
        let mut state = self.state.borrow_mut();
        if let Some(entry) = state.tasks.iter_mut().find(|t| t.id == id) {
            entry.task = Some(task);
        } else {
            drop(state);
            drop(task);
        }
        true
    }
}

impl Drop for TimerInner {
    fn drop(&mut self) {
        let tasks = std::mem::take(&mut self.state.get_mut().tasks);
        for task in tasks {
            task.worker.shutdown();
        }
    }
}

/// Scheduler whose ticks come from real time.
///
/// The handle is `!Send`: tick callbacks run only on the thread that created
/// it, inside [`run_pending`](Self::run_pending) or [`run_for`](Self::run_for).
/// Clones share the same tick queue.
#[derive(Clone)]
pub struct TimerScheduler {
    inner: Rc<TimerInner>,
}

impl fmt::Debug for TimerScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerScheduler")
            .field("config", &self.inner.config)
            .field("active_tasks", &self.active_tasks())
            .finish()
    }
}

impl Default for TimerScheduler {
    fn default() -> Self {
        Self::new(TimerConfig::default())
    }
}

impl TimerScheduler {
    /// Create a scheduler with `config`.
    #[must_use]
    pub fn new(config: TimerConfig) -> Self {
        let (sender, receiver) = mpsc::sync_channel(config.tick_capacity.max(1));
        Self {
            inner: Rc::new(TimerInner {
                config,
                sender,
                receiver,
                state: RefCell::new(TimerState {
                    next_id: 0,
                    tasks: Vec::new(),
                }),
            }),
        }
    }

    /// Configuration in effect.
    #[must_use]
    pub fn config(&self) -> &TimerConfig {
        &self.inner.config
    }

    /// Number of running timer threads.
    #[must_use]
    pub fn active_tasks(&self) -> usize {
        self.inner.state.borrow().tasks.len()
    }

    /// Run every tick already queued, without waiting.
    ///
    /// Returns the number of callbacks run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        while let Ok(id) = self.inner.receiver.try_recv() {
            if self.inner.run_tick(id) {
                ran += 1;
            }
        }
        ran
    }

    /// Run ticks as they arrive until `duration` has elapsed.
    ///
    /// Returns the number of callbacks run.
    pub fn run_for(&self, duration: Duration) -> usize {
        let deadline = Instant::now() + duration;
        let mut ran = 0;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            match self.inner.receiver.recv_timeout(remaining) {
                Ok(id) => {
                    if self.inner.run_tick(id) {
                        ran += 1;
                    }
                }
                Err(RecvTimeoutError::Timeout | RecvTimeoutError::Disconnected) => break,
            }
        }
        ran + self.run_pending()
    }
}

fn timer_loop(id: u64, interval: Duration, stop: &AtomicBool, sender: &SyncSender<u64>) {
    let mut next = Instant::now() + interval;
    while !stop.load(Ordering::Acquire) {
        let now = Instant::now();
        if now < next {
            thread::park_timeout(next - now);
            continue;
        }
        next += interval;
        if next <= now {
            next = now + interval;
        }
        match sender.try_send(id) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => trace!(task = id, "tick coalesced"),
            Err(TrySendError::Disconnected(_)) => break,
        }
    }
}

impl Scheduler for TimerScheduler {
    fn schedule_periodic(&self, interval: Duration, task: Task) -> Result<Subscription> {
        let interval = interval.max(self.inner.config.min_interval);
        if interval.is_zero() {
            return Err(Error::Scheduler("periodic interval must be non-zero".into()));
        }

        let id = {
            let mut state = self.inner.state.borrow_mut();
            state.next_id += 1;
            state.next_id
        };
        let stop = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop);
        let sender = self.inner.sender.clone();
        let handle = thread::Builder::new()
            .name(format!("{}-{id}", self.inner.config.thread_name))
            .spawn(move || timer_loop(id, interval, &thread_stop, &sender))
            .map_err(|err| Error::Scheduler(format!("failed to spawn timer thread: {err}")))?;
        debug!(task = id, ?interval, "timer thread started");

        self.inner.state.borrow_mut().tasks.push(TimerTask {
            id,
            task: Some(task),
            worker: Worker {
                stop,
                handle: Some(handle),
            },
        });

        let weak: Weak<TimerInner> = Rc::downgrade(&self.inner);
        Ok(Subscription::from_fn(move || {
            if let Some(inner) = weak.upgrade() {
                inner.cancel(id);
            }
        }))
    }
}
