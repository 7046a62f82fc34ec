//! Single-shot timer wrapper with cancel/set semantics.

use super::{TimerDriverHandle, TimerHandle};
use crate::dispose::Disposable;
use crate::error::Result;
use crate::leak::{LeakTracker, Tracked};
use crate::tracing_compat::trace;
use crate::types::DisposableId;
use parking_lot::Mutex;
use std::sync::{Arc, Weak};
use std::time::Duration;

#[derive(Default)]
struct TimeoutState {
    // Generation of the pending callback. A fired callback only clears the
    // slot if it is still the one recorded here.
    pending: Option<(TimerHandle, u64)>,
    generation: u64,
    disposed: bool,
}

struct TimeoutInner {
    tracked: Tracked,
    timers: TimerDriverHandle,
    state: Mutex<TimeoutState>,
}

/// Runs at most one callback after a delay.
///
/// Disposing cancels the pending callback and turns the timer off for good;
/// scheduling on a disposed timer is a bug and panics. Once every handle is
/// dropped a pending callback no longer runs.
///
/// ```
/// use disposables::time::{TimeoutTimer, TimerDriverHandle, VirtualClock};
/// use std::sync::atomic::{AtomicUsize, Ordering};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(VirtualClock::new());
/// let timers = TimerDriverHandle::with_virtual_clock(clock.clone());
/// let timer = TimeoutTimer::new(timers.clone());
/// let hits = Arc::new(AtomicUsize::new(0));
///
/// let h = hits.clone();
/// timer.set_if_not_set(move || { h.fetch_add(1, Ordering::SeqCst); }, Duration::from_millis(10));
/// let h = hits.clone();
/// timer.set_if_not_set(move || { h.fetch_add(10, Ordering::SeqCst); }, Duration::from_millis(10));
///
/// clock.advance_by(Duration::from_millis(10));
/// timers.process_timers();
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct TimeoutTimer {
    inner: Arc<TimeoutInner>,
}

impl std::fmt::Debug for TimeoutTimer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("TimeoutTimer")
            .field("id", &self.inner.tracked.id())
            .field("scheduled", &state.pending.is_some())
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl TimeoutTimer {
    /// Creates an idle timer scheduling on `timers`.
    #[track_caller]
    #[must_use]
    pub fn new(timers: TimerDriverHandle) -> Self {
        Self::build(timers, None)
    }

    /// Creates an idle timer tracked by `tracker`.
    #[track_caller]
    #[must_use]
    pub fn with_tracker(timers: TimerDriverHandle, tracker: &LeakTracker) -> Self {
        Self::build(timers, Some(tracker))
    }

    #[track_caller]
    fn build(timers: TimerDriverHandle, tracker: Option<&LeakTracker>) -> Self {
        Self {
            inner: Arc::new(TimeoutInner {
                tracked: Tracked::new("TimeoutTimer", tracker),
                timers,
                state: Mutex::new(TimeoutState::default()),
            }),
        }
    }

    /// Cancels the pending callback, if any.
    pub fn cancel(&self) {
        let mut state = self.inner.state.lock();
        if let Some((handle, _)) = state.pending.take() {
            self.inner.timers.cancel(&handle);
        }
    }

    /// Cancels the pending callback and schedules `f` after `delay`.
    ///
    /// # Panics
    ///
    /// Panics if the timer is disposed.
    #[track_caller]
    pub fn cancel_and_set(&self, f: impl FnOnce() + Send + 'static, delay: Duration) {
        let mut state = self.inner.state.lock();
        assert!(!state.disposed, "cannot schedule on a disposed TimeoutTimer");
        if let Some((handle, _)) = state.pending.take() {
            self.inner.timers.cancel(&handle);
        }
        self.schedule_locked(&mut state, Box::new(f), delay);
    }

    /// Schedules `f` after `delay` unless a callback is already pending.
    ///
    /// # Panics
    ///
    /// Panics if the timer is disposed.
    #[track_caller]
    pub fn set_if_not_set(&self, f: impl FnOnce() + Send + 'static, delay: Duration) {
        let mut state = self.inner.state.lock();
        assert!(!state.disposed, "cannot schedule on a disposed TimeoutTimer");
        if state.pending.is_some() {
            return;
        }
        self.schedule_locked(&mut state, Box::new(f), delay);
    }

    fn schedule_locked(
        &self,
        state: &mut TimeoutState,
        f: Box<dyn FnOnce() + Send>,
        delay: Duration,
    ) {
        state.generation += 1;
        let generation = state.generation;
        let weak = Arc::downgrade(&self.inner);
        let handle = self
            .inner
            .timers
            .schedule_after(delay, Box::new(move || fire(&weak, generation, f)));
        state.pending = Some((handle, generation));
        trace!(timer = %self.inner.tracked.id(), generation, "timeout scheduled");
    }

    /// Returns true while a callback is pending.
    #[must_use]
    pub fn is_scheduled(&self) -> bool {
        self.inner.state.lock().pending.is_some()
    }

    /// Returns true once [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Cancels the pending callback and disables scheduling. Idempotent.
    pub fn dispose(&self) -> Result<()> {
        {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return Ok(());
            }
            state.disposed = true;
            if let Some((handle, _)) = state.pending.take() {
                self.inner.timers.cancel(&handle);
            }
        }
        self.inner.tracked.resolve();
        Ok(())
    }
}

fn fire(inner: &Weak<TimeoutInner>, generation: u64, f: Box<dyn FnOnce() + Send>) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    {
        let mut state = inner.state.lock();
        match state.pending {
            Some((_, current)) if current == generation => state.pending = None,
            _ => return,
        }
    }
    f();
}

impl Disposable for TimeoutTimer {
    fn dispose(&self) -> Result<()> {
        Self::dispose(self)
    }

    fn id(&self) -> DisposableId {
        self.inner.tracked.id()
    }

    fn mark_owned(&self) {
        self.inner.tracked.mark_owned();
    }
}
