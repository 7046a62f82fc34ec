//! Timer driver: the host scheduling facility for deferred callbacks.
//!
//! The driver owns a deadline-ordered queue of one-shot callbacks and a time
//! source. It never runs anything on its own; whoever drives it (a
//! [`TimerThread`](super::TimerThread) in production, the test itself under
//! virtual time) calls [`TimerDriver::process_timers`] to fire everything
//! whose deadline has passed.

use crate::types::Time;
use parking_lot::Mutex;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Callback fired once when its deadline passes.
pub type TimerCallback = Box<dyn FnOnce() + Send + 'static>;

/// Time source abstraction for getting the current time.
///
/// This trait allows the timer driver to work with both wall clock time
/// (production) and virtual time (deterministic tests).
pub trait TimeSource: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Time;
}

/// Wall clock time source for production use.
///
/// The epoch is the instant when this source was created.
#[derive(Debug)]
pub struct WallClock {
    epoch: std::time::Instant,
}

impl WallClock {
    /// Creates a new wall clock time source.
    #[must_use]
    pub fn new() -> Self {
        Self {
            epoch: std::time::Instant::now(),
        }
    }
}

impl Default for WallClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for WallClock {
    fn now(&self) -> Time {
        let nanos = u64::try_from(self.epoch.elapsed().as_nanos()).unwrap_or(u64::MAX);
        Time::from_nanos(nanos)
    }
}

/// Virtual time source for tests.
///
/// Time only advances when explicitly told to do so.
///
/// # Example
///
/// ```
/// use disposables::time::{TimeSource, VirtualClock};
/// use disposables::types::Time;
///
/// let clock = VirtualClock::new();
/// assert_eq!(clock.now(), Time::ZERO);
///
/// clock.advance(1_000_000_000); // 1 second
/// assert_eq!(clock.now(), Time::from_secs(1));
/// ```
#[derive(Debug)]
pub struct VirtualClock {
    now: AtomicU64,
}

impl VirtualClock {
    /// Creates a new virtual clock starting at time zero.
    #[must_use]
    pub fn new() -> Self {
        Self {
            now: AtomicU64::new(0),
        }
    }

    /// Creates a virtual clock starting at the given time.
    #[must_use]
    pub fn starting_at(time: Time) -> Self {
        Self {
            now: AtomicU64::new(time.as_nanos()),
        }
    }

    /// Advances time by the given number of nanoseconds, saturating at the
    /// end of the timeline.
    pub fn advance(&self, nanos: u64) {
        let _ = self
            .now
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |now| {
                Some(now.saturating_add(nanos))
            });
    }

    /// Advances time by a duration.
    pub fn advance_by(&self, duration: std::time::Duration) {
        self.advance(u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX));
    }

    /// Advances time to the given absolute time.
    ///
    /// If the target time is in the past, this is a no-op.
    pub fn advance_to(&self, time: Time) {
        self.now.fetch_max(time.as_nanos(), Ordering::AcqRel);
    }
}

impl Default for VirtualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for VirtualClock {
    fn now(&self) -> Time {
        Time::from_nanos(self.now.load(Ordering::Acquire))
    }
}

/// Handle to a scheduled callback, used to cancel it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TimerHandle {
    id: u64,
}

impl TimerHandle {
    /// Returns the timer's sequence number.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }
}

const COMPACT_MIN_HEAP: usize = 64;

/// Deadline queue. Cancellation removes the callback; the stale heap entry
/// is skipped when it surfaces.
#[derive(Default)]
struct TimerQueue {
    next_id: u64,
    heap: BinaryHeap<Reverse<(Time, u64)>>,
    callbacks: HashMap<u64, TimerCallback>,
}

impl TimerQueue {
    fn schedule(&mut self, deadline: Time, callback: TimerCallback) -> TimerHandle {
        let id = self.next_id;
        self.next_id += 1;
        self.heap.push(Reverse((deadline, id)));
        self.callbacks.insert(id, callback);
        TimerHandle { id }
    }

    fn cancel(&mut self, handle: &TimerHandle) -> bool {
        let removed = self.callbacks.remove(&handle.id).is_some();
        if removed {
            self.compact();
        }
        removed
    }

    /// Drops stale heap entries once they outnumber the live ones.
    fn compact(&mut self) {
        let live = self.callbacks.len();
        if self.heap.len() <= COMPACT_MIN_HEAP || self.heap.len() <= live * 2 {
            return;
        }
        let callbacks = &self.callbacks;
        self.heap.retain(|Reverse((_, id))| callbacks.contains_key(id));
    }

    fn next_deadline(&mut self) -> Option<Time> {
        while let Some(Reverse((deadline, id))) = self.heap.peek().copied() {
            if self.callbacks.contains_key(&id) {
                return Some(deadline);
            }
            self.heap.pop();
        }
        None
    }

    /// Pops expired callbacks in deadline order (ties in scheduling order).
    fn collect_expired(&mut self, now: Time) -> Vec<TimerCallback> {
        let mut expired = Vec::new();
        while let Some(Reverse((deadline, id))) = self.heap.peek().copied() {
            if deadline > now {
                break;
            }
            self.heap.pop();
            if let Some(callback) = self.callbacks.remove(&id) {
                expired.push(callback);
            }
        }
        expired
    }

    fn len(&self) -> usize {
        self.callbacks.len()
    }

    fn clear(&mut self) {
        self.heap.clear();
        self.callbacks.clear();
    }
}

/// Timer driver that manages scheduled callbacks and fires them.
///
/// # Thread Safety
///
/// The driver is thread-safe and can be shared. Callbacks always run with the
/// driver's lock released, so they may schedule or cancel timers themselves.
///
/// # Example
///
/// ```
/// use disposables::time::{TimerDriver, VirtualClock};
/// use disposables::types::Time;
/// use std::sync::atomic::{AtomicBool, Ordering};
/// use std::sync::Arc;
///
/// let clock = Arc::new(VirtualClock::new());
/// let driver = TimerDriver::with_clock(clock.clone());
/// let fired = Arc::new(AtomicBool::new(false));
/// let flag = fired.clone();
/// driver.schedule(Time::from_millis(10), Box::new(move || flag.store(true, Ordering::SeqCst)));
///
/// clock.advance_to(Time::from_millis(10));
/// assert_eq!(driver.process_timers(), 1);
/// assert!(fired.load(Ordering::SeqCst));
/// ```
pub struct TimerDriver<T: TimeSource = VirtualClock> {
    clock: Arc<T>,
    queue: Mutex<TimerQueue>,
}

impl<T: TimeSource + std::fmt::Debug> std::fmt::Debug for TimerDriver<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerDriver")
            .field("clock", &self.clock)
            .field("pending", &self.pending_count())
            .finish()
    }
}

impl<T: TimeSource> TimerDriver<T> {
    /// Creates a new timer driver with the given time source.
    #[must_use]
    pub fn with_clock(clock: Arc<T>) -> Self {
        Self {
            clock,
            queue: Mutex::new(TimerQueue::default()),
        }
    }

    /// Returns the current time from the underlying clock.
    #[must_use]
    pub fn now(&self) -> Time {
        self.clock.now()
    }

    /// Schedules `callback` to fire once at or after `deadline`.
    pub fn schedule(&self, deadline: Time, callback: TimerCallback) -> TimerHandle {
        self.queue.lock().schedule(deadline, callback)
    }

    /// Cancels a scheduled callback.
    ///
    /// Returns true if the timer was pending and is now cancelled.
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        self.queue.lock().cancel(handle)
    }

    /// Returns the next deadline that will fire, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Time> {
        self.queue.lock().next_deadline()
    }

    /// Fires all expired callbacks.
    ///
    /// Returns the number of callbacks fired.
    pub fn process_timers(&self) -> usize {
        let now = self.clock.now();
        // Run outside the lock: callbacks commonly reschedule.
        let expired = self.queue.lock().collect_expired(now);
        let fired = expired.len();
        for callback in expired {
            callback();
        }
        fired
    }

    /// Returns the number of pending timers.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.queue.lock().len()
    }

    /// Returns true if there are no pending timers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pending_count() == 0
    }

    /// Drops all pending timers without firing them.
    pub fn clear(&self) {
        self.queue.lock().clear();
    }
}

impl TimerDriver<VirtualClock> {
    /// Creates a new timer driver with a virtual clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(VirtualClock::new()))
    }
}

impl Default for TimerDriver<VirtualClock> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// TimerDriverHandle - Shared handle for timer driver access
// =============================================================================

/// Trait abstracting timer driver operations for use with trait objects.
pub trait TimerDriverApi: Send + Sync {
    /// Returns the current time.
    fn now(&self) -> Time;

    /// Schedules a callback at the given deadline.
    fn schedule(&self, deadline: Time, callback: TimerCallback) -> TimerHandle;

    /// Cancels a scheduled callback.
    fn cancel(&self, handle: &TimerHandle) -> bool;

    /// Returns the next deadline that will fire.
    fn next_deadline(&self) -> Option<Time>;

    /// Fires expired callbacks.
    fn process_timers(&self) -> usize;

    /// Returns the number of pending timers.
    fn pending_count(&self) -> usize;
}

impl<T: TimeSource + 'static> TimerDriverApi for TimerDriver<T> {
    fn now(&self) -> Time {
        Self::now(self)
    }

    fn schedule(&self, deadline: Time, callback: TimerCallback) -> TimerHandle {
        Self::schedule(self, deadline, callback)
    }

    fn cancel(&self, handle: &TimerHandle) -> bool {
        Self::cancel(self, handle)
    }

    fn next_deadline(&self) -> Option<Time> {
        Self::next_deadline(self)
    }

    fn process_timers(&self) -> usize {
        Self::process_timers(self)
    }

    fn pending_count(&self) -> usize {
        Self::pending_count(self)
    }
}

/// Shared handle to a timer driver.
///
/// Cloneable, type-erased access to a driver over either a wall clock or a
/// virtual clock. Every timer-consuming component takes one of these.
#[derive(Clone)]
pub struct TimerDriverHandle {
    inner: Arc<dyn TimerDriverApi>,
}

impl std::fmt::Debug for TimerDriverHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TimerDriverHandle")
            .field("pending_count", &self.inner.pending_count())
            .finish()
    }
}

impl TimerDriverHandle {
    /// Creates a new handle wrapping the given timer driver.
    pub fn new<T: TimeSource + 'static>(driver: Arc<TimerDriver<T>>) -> Self {
        Self { inner: driver }
    }

    /// Creates a handle over a wall clock driver.
    #[must_use]
    pub fn with_wall_clock() -> Self {
        Self::new(Arc::new(TimerDriver::with_clock(Arc::new(WallClock::new()))))
    }

    /// Creates a handle over a virtual clock driver.
    #[must_use]
    pub fn with_virtual_clock(clock: Arc<VirtualClock>) -> Self {
        Self::new(Arc::new(TimerDriver::with_clock(clock)))
    }

    /// Returns the current time from the timer driver.
    #[must_use]
    pub fn now(&self) -> Time {
        self.inner.now()
    }

    /// Schedules a callback at an absolute deadline.
    pub fn schedule(&self, deadline: Time, callback: TimerCallback) -> TimerHandle {
        self.inner.schedule(deadline, callback)
    }

    /// Schedules a callback `delay` from now.
    pub fn schedule_after(
        &self,
        delay: std::time::Duration,
        callback: TimerCallback,
    ) -> TimerHandle {
        self.inner.schedule(self.inner.now() + delay, callback)
    }

    /// Cancels a scheduled callback.
    ///
    /// Returns true if the timer was pending and is now cancelled.
    pub fn cancel(&self, handle: &TimerHandle) -> bool {
        self.inner.cancel(handle)
    }

    /// Returns the next deadline that will fire, if any.
    #[must_use]
    pub fn next_deadline(&self) -> Option<Time> {
        self.inner.next_deadline()
    }

    /// Fires all expired callbacks.
    ///
    /// Returns the number of callbacks fired.
    pub fn process_timers(&self) -> usize {
        self.inner.process_timers()
    }

    /// Returns the number of pending timers.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.inner.pending_count()
    }

    /// Returns true if no timers are pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.pending_count() == 0
    }
}
