//! Deferred runner coalescing repeated schedule requests.

use super::{TimeoutTimer, TimerDriverHandle};
use crate::dispose::{Disposable, DisposableBase};
use crate::error::Result;
use crate::types::DisposableId;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

type Runner = Box<dyn FnMut() + Send>;

struct SchedulerInner {
    runner: Mutex<Runner>,
    delay: Duration,
    timer: TimeoutTimer,
}

/// Runs a fixed closure once after a delay, however often it is scheduled in
/// between; each `schedule` restarts the delay.
///
/// The scheduler owns its timer through a [`DisposableBase`], so disposing
/// the scheduler cancels any pending run. The runner must not call
/// [`flush`](Self::flush) on its own scheduler.
#[derive(Clone)]
pub struct RunOnceScheduler {
    base: DisposableBase,
    inner: Arc<SchedulerInner>,
}

impl std::fmt::Debug for RunOnceScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunOnceScheduler")
            .field("id", &self.base.id())
            .field("delay", &self.inner.delay)
            .field("scheduled", &self.is_scheduled())
            .finish()
    }
}

impl RunOnceScheduler {
    /// Creates a scheduler running `runner` `delay` after the latest
    /// [`schedule`](Self::schedule).
    #[track_caller]
    pub fn new(runner: impl FnMut() + Send + 'static, delay: Duration, timers: TimerDriverHandle) -> Self {
        let base = DisposableBase::new();
        let timer = base.register(TimeoutTimer::new(timers));
        Self {
            base,
            inner: Arc::new(SchedulerInner {
                runner: Mutex::new(Box::new(runner)),
                delay,
                timer,
            }),
        }
    }

    /// Returns the default delay.
    #[must_use]
    pub fn delay(&self) -> Duration {
        self.inner.delay
    }

    /// (Re)schedules a run after the default delay.
    ///
    /// # Panics
    ///
    /// Panics if the scheduler is disposed.
    #[track_caller]
    pub fn schedule(&self) {
        self.schedule_with(self.inner.delay);
    }

    /// (Re)schedules a run after `delay`.
    ///
    /// # Panics
    ///
    /// Panics if the scheduler is disposed.
    #[track_caller]
    pub fn schedule_with(&self, delay: Duration) {
        let weak = Arc::downgrade(&self.inner);
        self.inner.timer.cancel_and_set(move || run(&weak), delay);
    }

    /// Cancels a pending run.
    pub fn cancel(&self) {
        self.inner.timer.cancel();
    }

    /// Returns true while a run is pending.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.inner.timer.is_scheduled()
    }

    /// Runs now if a run is pending; otherwise does nothing.
    pub fn flush(&self) {
        if self.is_scheduled() {
            self.inner.timer.cancel();
            let mut runner = self.inner.runner.lock();
            (*runner)();
        }
    }

    /// Cancels a pending run and disposes the scheduler.
    pub fn dispose(&self) -> Result<()> {
        self.base.dispose()
    }

    /// Returns true once [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.base.is_disposed()
    }
}

fn run(inner: &Weak<SchedulerInner>) {
    if let Some(inner) = inner.upgrade() {
        let mut runner = inner.runner.lock();
        (*runner)();
    }
}

impl Disposable for RunOnceScheduler {
    fn dispose(&self) -> Result<()> {
        Self::dispose(self)
    }

    fn id(&self) -> DisposableId {
        self.base.id()
    }

    fn mark_owned(&self) {
        Disposable::mark_owned(&self.base);
    }
}
