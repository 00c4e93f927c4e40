#![forbid(unsafe_code)]

//! Deterministic virtual-clock scheduler.
//!
//! Nothing happens until [`ManualScheduler::advance`] is called; ticks then
//! fire in due-time order (registration order breaks ties), each on the
//! calling thread.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::Duration;

use statecast_core::{Error, Result, Subscription};
use tracing::trace;

use super::{Scheduler, Task};

struct Periodic {
    id: u64,
    interval: Duration,
    due: Duration,
    /// `None` while the task is running.
    task: Option<Task>,
}

#[derive(Default)]
struct ManualState {
    now: Duration,
    next_id: u64,
    tasks: Vec<Periodic>,
}

impl ManualState {
    fn next_due(&self, until: Duration) -> Option<usize> {
        self.tasks
            .iter()
            .enumerate()
            .filter(|(_, p)| p.task.is_some() && p.due <= until)
            .min_by_key(|(_, p)| (p.due, p.id))
            .map(|(index, _)| index)
    }
}

/// Scheduler driven by an explicit virtual clock.
///
/// Clones share the same clock and task list.
#[derive(Clone, Default)]
pub struct ManualScheduler {
    state: Rc<RefCell<ManualState>>,
}

impl fmt::Debug for ManualScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.borrow();
        f.debug_struct("ManualScheduler")
            .field("now", &state.now)
            .field("pending_tasks", &state.tasks.len())
            .finish()
    }
}

impl ManualScheduler {
    /// Create a scheduler with its clock at zero.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Virtual time elapsed since creation.
    #[must_use]
    pub fn now(&self) -> Duration {
        self.state.borrow().now
    }

    /// Number of scheduled (not cancelled) tasks.
    #[must_use]
    pub fn pending_tasks(&self) -> usize {
        self.state.borrow().tasks.len()
    }

    /// Move the clock forward by `by`, firing every tick that falls due.
    ///
    /// Returns the number of ticks fired.
    pub fn advance(&self, by: Duration) -> usize {
        let target = self.state.borrow().now + by;
        let mut fired = 0;
        loop {
            let (id, mut task) = {
                let mut state = self.state.borrow_mut();
                let Some(index) = state.next_due(target) else {
                    break;
                };
                let due = state.tasks[index].due;
                state.now = state.now.max(due);
                let periodic = &mut state.tasks[index];
                periodic.due += periodic.interval;
                match periodic.task.take() {
                    Some(task) => (periodic.id, task),
                    None => continue,
                }
            };

            trace!(task = id, "manual tick");
            task();
            fired += 1;

            let mut state = self.state.borrow_mut();
            if let Some(periodic) = state.tasks.iter_mut().find(|p| p.id == id) {
                periodic.task = Some(task);
            } else {
                drop(state);
                drop(task);
            }
        }
        let mut state = self.state.borrow_mut();
        state.now = state.now.max(target);
        fired
    }

    fn cancel(state: &Weak<RefCell<ManualState>>, id: u64) {
        let Some(state) = state.upgrade() else {
            return;
        };
        let removed = {
            let mut state = state.borrow_mut();
            state
                .tasks
                .iter()
                .position(|p| p.id == id)
                .map(|index| state.tasks.remove(index))
        };
        drop(removed);
    }
}

impl Scheduler for ManualScheduler {
    fn schedule_periodic(&self, interval: Duration, task: Task) -> Result<Subscription> {
        if interval.is_zero() {
            return Err(Error::Scheduler("periodic interval must be non-zero".into()));
        }
        let id = {
            let mut state = self.state.borrow_mut();
            state.next_id += 1;
            let id = state.next_id;
            let due = state.now + interval;
            state.tasks.push(Periodic {
                id,
                interval,
                due,
                task: Some(task),
            });
            id
        };
        let weak = Rc::downgrade(&self.state);
        Ok(Subscription::from_fn(move || Self::cancel(&weak, id)))
    }
}
