//! Timer facility: deferred callbacks over wall or virtual time.
//!
//! - [`TimerDriver`]: a deadline queue of one-shot callbacks over a
//!   [`TimeSource`]
//! - [`TimerDriverHandle`]: the cloneable handle every timer consumer takes
//! - [`TimerThread`]: a background pump for wall-clock drivers
//! - [`TimeoutTimer`] and [`RunOnceScheduler`]: disposable wrappers built on
//!   the driver
//!
//! # Virtual vs Wall Time
//!
//! Nothing here reads the system clock directly. Production code pairs a
//! [`WallClock`] driver with a [`TimerThread`]; tests pair a [`VirtualClock`]
//! driver with explicit `advance` and `process_timers` calls, which makes
//! every timing behaviour deterministic.
//!
//! # Example
//!
//! ```
//! use disposables::time::{TimerDriverHandle, VirtualClock};
//! use std::sync::atomic::{AtomicBool, Ordering};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let clock = Arc::new(VirtualClock::new());
//! let timers = TimerDriverHandle::with_virtual_clock(clock.clone());
//! let fired = Arc::new(AtomicBool::new(false));
//! let flag = fired.clone();
//! timers.schedule_after(Duration::from_secs(1), Box::new(move || flag.store(true, Ordering::SeqCst)));
//!
//! clock.advance_by(Duration::from_secs(1));
//! timers.process_timers();
//! assert!(fired.load(Ordering::SeqCst));
//! ```

mod driver;
mod run_once;
mod timeout_timer;
mod timer_thread;

pub use driver::{
    TimeSource, TimerCallback, TimerDriver, TimerDriverApi, TimerDriverHandle, TimerHandle,
    VirtualClock, WallClock,
};
pub use run_once::RunOnceScheduler;
pub use timeout_timer::TimeoutTimer;
pub use timer_thread::{TimerThread, TIMER_THREAD_NAME};
