//! Background thread pumping a wall-clock timer driver.

use super::TimerDriverHandle;
use crate::tracing_compat::debug;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Name given to the pump thread.
pub const TIMER_THREAD_NAME: &str = "disposables-timer";

/// Periodically fires expired timers of a [`TimerDriverHandle`].
///
/// Dropping the thread handle stops the loop at its next tick. It is never
/// joined on drop, so a pending check can not hold up process exit.
#[derive(Debug)]
pub struct TimerThread {
    running: Arc<AtomicBool>,
    tick: Duration,
}

impl TimerThread {
    /// Spawns the pump, waking every `tick`.
    pub fn spawn(timers: TimerDriverHandle, tick: Duration) -> std::io::Result<Self> {
        let running = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&running);

        thread::Builder::new()
            .name(TIMER_THREAD_NAME.to_string())
            .spawn(move || pump(&timers, tick, &flag))?;

        debug!(tick_ms = u64::try_from(tick.as_millis()).unwrap_or(u64::MAX), "timer thread started");
        Ok(Self { running, tick })
    }

    /// Returns the tick interval.
    #[must_use]
    pub fn tick(&self) -> Duration {
        self.tick
    }

    /// Returns true until [`stop`](Self::stop) is called.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Asks the pump to exit after its current tick.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

impl Drop for TimerThread {
    fn drop(&mut self) {
        self.stop();
    }
}

fn pump(timers: &TimerDriverHandle, tick: Duration, running: &AtomicBool) {
    while running.load(Ordering::Acquire) {
        timers.process_timers();
        thread::sleep(tick);
    }
    debug!("timer thread exiting");
}
