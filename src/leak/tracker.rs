//! The leak tracker: one delayed check per tracked disposable.

use super::report::{LeakReport, LeakReporter};
use crate::time::{TimerDriverHandle, TimerHandle};
use crate::tracing_compat::{error, trace, warn};
use crate::types::{DisposableId, Time};
use parking_lot::Mutex;
use std::backtrace::Backtrace;
use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, Location};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

/// Default delay between creation and the leak check.
pub const DEFAULT_CHECK_DELAY: Duration = Duration::from_secs(3);

/// Configuration for the leak tracker.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakTrackingConfig {
    /// Whether tracking is active (default: false).
    pub enabled: bool,
    /// Delay after creation before an unreleased disposable is reported
    /// (default: 3s).
    pub check_delay: Duration,
    /// Capture a full backtrace at creation (default: false). The call site
    /// is always recorded.
    pub capture_backtrace: bool,
}

impl Default for LeakTrackingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            check_delay: DEFAULT_CHECK_DELAY,
            capture_backtrace: false,
        }
    }
}

impl LeakTrackingConfig {
    /// Turns tracking on or off.
    #[must_use]
    pub fn enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Sets the check delay.
    #[must_use]
    pub fn check_delay(mut self, delay: Duration) -> Self {
        self.check_delay = delay;
        self
    }

    /// Enables or disables backtrace capture.
    #[must_use]
    pub fn capture_backtrace(mut self, capture: bool) -> Self {
        self.capture_backtrace = capture;
        self
    }
}

struct TrackedEntry {
    type_name: &'static str,
    location: &'static Location<'static>,
    created_at: Time,
    backtrace: Option<Arc<Backtrace>>,
    check: TimerHandle,
}

struct TrackerInner {
    config: LeakTrackingConfig,
    timers: TimerDriverHandle,
    entries: Mutex<HashMap<DisposableId, TrackedEntry>>,
    reporter: Mutex<Option<Arc<dyn LeakReporter>>>,
    reported: AtomicU64,
}

/// Tracks disposables from creation until release and reports those still
/// unreleased after [`LeakTrackingConfig::check_delay`].
///
/// Each tracked disposable gets exactly one check. Whatever the outcome the
/// entry is gone afterwards, so the tracker never accumulates state. The
/// check runs on the timer facility and only touches the tracker's own
/// table; it never fails, and a disabled tracker does nothing at all.
///
/// # Example
///
/// ```
/// use disposables::leak::{LeakLog, LeakTracker, LeakTrackingConfig};
/// use disposables::time::{TimerDriverHandle, VirtualClock};
/// use disposables::FnDisposable;
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let clock = Arc::new(VirtualClock::new());
/// let timers = TimerDriverHandle::with_virtual_clock(clock.clone());
/// let log = LeakLog::new();
/// let tracker = LeakTracker::new(LeakTrackingConfig::default().enabled(true), timers.clone())
///     .with_reporter(log.clone());
///
/// let _forgotten = FnDisposable::with_tracker(&tracker, || {});
/// clock.advance_by(Duration::from_secs(3));
/// timers.process_timers();
/// assert_eq!(log.len(), 1);
/// ```
#[derive(Clone)]
pub struct LeakTracker {
    inner: Arc<TrackerInner>,
}

impl std::fmt::Debug for LeakTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeakTracker")
            .field("config", &self.inner.config)
            .field("tracked", &self.tracked_count())
            .field("reported", &self.reported_count())
            .finish()
    }
}

impl LeakTracker {
    /// Creates a tracker scheduling its checks on `timers`.
    #[must_use]
    pub fn new(config: LeakTrackingConfig, timers: TimerDriverHandle) -> Self {
        Self {
            inner: Arc::new(TrackerInner {
                config,
                timers,
                entries: Mutex::new(HashMap::new()),
                reporter: Mutex::new(None),
                reported: AtomicU64::new(0),
            }),
        }
    }

    /// Forwards every report to `reporter` as well as the log.
    #[must_use]
    pub fn with_reporter(self, reporter: impl LeakReporter + 'static) -> Self {
        *self.inner.reporter.lock() = Some(Arc::new(reporter));
        self
    }

    /// Returns the configuration.
    #[must_use]
    pub fn config(&self) -> &LeakTrackingConfig {
        &self.inner.config
    }

    /// Returns true if tracking is active.
    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.inner.config.enabled
    }

    /// Starts tracking `id` and schedules its check.
    ///
    /// No-op when disabled or when `id` is already tracked.
    pub fn track(&self, id: DisposableId, type_name: &'static str, location: &'static Location<'static>) {
        if !self.is_enabled() || id.is_none() {
            return;
        }
        let backtrace = self
            .inner
            .config
            .capture_backtrace
            .then(|| Arc::new(Backtrace::force_capture()));

        let mut entries = self.inner.entries.lock();
        if entries.contains_key(&id) {
            return;
        }
        let created_at = self.inner.timers.now();
        let weak = Arc::downgrade(&self.inner);
        // Scheduling under the table lock: a zero-delay check running on the
        // pump thread must find the entry.
        let check = self.inner.timers.schedule(
            created_at + self.inner.config.check_delay,
            Box::new(move || run_check(&weak, id)),
        );
        entries.insert(
            id,
            TrackedEntry {
                type_name,
                location,
                created_at,
                backtrace,
                check,
            },
        );
        trace!(id = %id, type_name, "tracking disposable");
    }

    /// Records that `id` was released.
    pub fn mark_disposed(&self, id: DisposableId) {
        self.forget(id);
    }

    /// Records that `id` was handed to an owner; the owner is tracked in its
    /// place.
    pub fn mark_owned(&self, id: DisposableId) {
        self.forget(id);
    }

    /// Exempts `id` from leak reports. Use for disposables that live for the
    /// whole process.
    pub fn mark_as_singleton(&self, id: DisposableId) {
        self.forget(id);
    }

    /// Returns true if `id` still awaits its check.
    #[must_use]
    pub fn is_tracked(&self, id: DisposableId) -> bool {
        self.inner.entries.lock().contains_key(&id)
    }

    /// Number of disposables awaiting their check.
    #[must_use]
    pub fn tracked_count(&self) -> usize {
        self.inner.entries.lock().len()
    }

    /// Number of leak reports emitted so far.
    #[must_use]
    pub fn reported_count(&self) -> u64 {
        self.inner.reported.load(Ordering::Relaxed)
    }

    fn forget(&self, id: DisposableId) {
        let mut entries = self.inner.entries.lock();
        if let Some(entry) = entries.remove(&id) {
            self.inner.timers.cancel(&entry.check);
            trace!(id = %id, "disposable no longer tracked");
        }
    }
}

fn run_check(inner: &Weak<TrackerInner>, id: DisposableId) {
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let Some(entry) = inner.entries.lock().remove(&id) else {
        return;
    };

    let report = LeakReport {
        id,
        type_name: entry.type_name,
        location: entry.location,
        created_at: entry.created_at,
        detected_at: inner.timers.now(),
        backtrace: entry.backtrace,
    };
    inner.reported.fetch_add(1, Ordering::Relaxed);
    warn!(
        id = %report.id,
        type_name = report.type_name,
        created_at = %report.location,
        age_ms = u64::try_from(report.age().as_millis()).unwrap_or(u64::MAX),
        "{report}"
    );

    let reporter = inner.reporter.lock().clone();
    if let Some(reporter) = reporter {
        let delivered = std::panic::catch_unwind(AssertUnwindSafe(|| reporter.report(&report)));
        if delivered.is_err() {
            error!(id = %report.id, "leak reporter panicked; report dropped");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::leak::LeakLog;
    use crate::test_utils::{init_test_logging, tracking_fixture, virtual_timers, TEST_CHECK_DELAY};

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    #[test]
    fn unreleased_disposable_is_reported_once() {
        init_test("unreleased_disposable_is_reported_once");
        let (clock, timers, tracker, log) = tracking_fixture();
        let id = DisposableId::next();
        tracker.track(id, "Probe", Location::caller());
        assert!(tracker.is_tracked(id));

        clock.advance_by(TEST_CHECK_DELAY - Duration::from_millis(1));
        assert_eq!(timers.process_timers(), 0);
        assert!(log.is_empty());

        clock.advance_by(Duration::from_millis(1));
        assert_eq!(timers.process_timers(), 1);
        let reports = log.reports();
        crate::assert_with_log!(reports.len() == 1, "one report", 1, reports.len());
        assert_eq!(reports[0].id, id);
        assert_eq!(reports[0].type_name, "Probe");
        assert_eq!(reports[0].age(), TEST_CHECK_DELAY);
        assert!(!tracker.is_tracked(id), "entry discarded after its check");
        assert_eq!(tracker.reported_count(), 1);

        clock.advance_by(TEST_CHECK_DELAY * 10);
        assert_eq!(timers.process_timers(), 0, "single shot");
        crate::test_complete!("unreleased_disposable_is_reported_once");
    }

    #[test]
    fn disposed_before_delay_is_not_reported() {
        init_test("disposed_before_delay_is_not_reported");
        let (clock, timers, tracker, log) = tracking_fixture();
        let id = DisposableId::next();
        tracker.track(id, "Probe", Location::caller());
        assert_eq!(timers.pending_count(), 1);

        tracker.mark_disposed(id);
        assert_eq!(timers.pending_count(), 0, "check cancelled");
        tracker.mark_disposed(id);

        clock.advance_by(TEST_CHECK_DELAY);
        assert_eq!(timers.process_timers(), 0);
        assert!(log.is_empty());
        assert_eq!(tracker.tracked_count(), 0);
        crate::test_complete!("disposed_before_delay_is_not_reported");
    }

    #[test]
    fn owned_and_singleton_are_exempt() {
        let (clock, timers, tracker, log) = tracking_fixture();
        let owned = DisposableId::next();
        let singleton = DisposableId::next();
        tracker.track(owned, "Owned", Location::caller());
        tracker.track(singleton, "Singleton", Location::caller());
        tracker.mark_owned(owned);
        tracker.mark_as_singleton(singleton);

        clock.advance_by(TEST_CHECK_DELAY);
        timers.process_timers();
        assert!(log.is_empty());
    }

    #[test]
    fn disabled_tracker_is_inert() {
        init_test("disabled_tracker_is_inert");
        let (clock, timers) = virtual_timers();
        let log = LeakLog::new();
        let tracker = LeakTracker::new(LeakTrackingConfig::default(), timers.clone())
            .with_reporter(log.clone());
        assert!(!tracker.is_enabled());

        tracker.track(DisposableId::next(), "Probe", Location::caller());
        assert_eq!(tracker.tracked_count(), 0);
        assert_eq!(timers.pending_count(), 0);

        clock.advance_by(TEST_CHECK_DELAY);
        timers.process_timers();
        assert!(log.is_empty());
        crate::test_complete!("disabled_tracker_is_inert");
    }

    #[test]
    fn duplicate_track_keeps_first_entry() {
        let (_clock, timers, tracker, _log) = tracking_fixture();
        let id = DisposableId::next();
        tracker.track(id, "First", Location::caller());
        tracker.track(id, "Second", Location::caller());
        assert_eq!(tracker.tracked_count(), 1);
        assert_eq!(timers.pending_count(), 1);
    }

    #[test]
    fn none_id_is_never_tracked() {
        let (_clock, _timers, tracker, _log) = tracking_fixture();
        tracker.track(DisposableId::NONE, "NoopDisposable", Location::caller());
        assert_eq!(tracker.tracked_count(), 0);
    }

    struct PanickingReporter;

    impl LeakReporter for PanickingReporter {
        fn report(&self, _report: &LeakReport) {
            panic!("reporter failure");
        }
    }

    #[test]
    fn panicking_reporter_is_contained() {
        init_test("panicking_reporter_is_contained");
        let (clock, timers) = virtual_timers();
        let tracker = LeakTracker::new(
            LeakTrackingConfig::default().enabled(true).check_delay(TEST_CHECK_DELAY),
            timers.clone(),
        )
        .with_reporter(PanickingReporter);
        tracker.track(DisposableId::next(), "Probe", Location::caller());

        clock.advance_by(TEST_CHECK_DELAY);
        assert_eq!(timers.process_timers(), 1);
        assert_eq!(tracker.reported_count(), 1);
        assert_eq!(tracker.tracked_count(), 0);
        crate::test_complete!("panicking_reporter_is_contained");
    }

    #[test]
    fn backtrace_captured_when_configured() {
        let (clock, timers) = virtual_timers();
        let log = LeakLog::new();
        let tracker = LeakTracker::new(
            LeakTrackingConfig::default()
                .enabled(true)
                .check_delay(TEST_CHECK_DELAY)
                .capture_backtrace(true),
            timers.clone(),
        )
        .with_reporter(log.clone());
        tracker.track(DisposableId::next(), "Probe", Location::caller());

        clock.advance_by(TEST_CHECK_DELAY);
        timers.process_timers();
        let reports = log.reports();
        assert_eq!(reports.len(), 1);
        assert!(reports[0].backtrace.is_some());
    }

    #[test]
    fn dropped_tracker_checks_are_harmless() {
        let (clock, timers) = virtual_timers();
        let tracker = LeakTracker::new(
            LeakTrackingConfig::default().enabled(true).check_delay(TEST_CHECK_DELAY),
            timers.clone(),
        );
        tracker.track(DisposableId::next(), "Probe", Location::caller());
        drop(tracker);

        clock.advance_by(TEST_CHECK_DELAY);
        assert_eq!(timers.process_timers(), 1);
    }
}
