//! Function combinators adapting closures and collections into disposables.

use super::Disposable;
use crate::error::{collect_failures, Result};
use crate::leak::{LeakTracker, Tracked};
use crate::types::DisposableId;
use parking_lot::Mutex;
use std::sync::Arc;

type Teardown = Box<dyn FnOnce() -> Result<()> + Send>;

struct FnInner {
    tracked: Tracked,
    teardown: Mutex<Option<Teardown>>,
}

/// A disposable running a closure on first release.
///
/// Clones share the closure: whichever clone is released first runs it, every
/// later release is a no-op.
#[derive(Clone)]
pub struct FnDisposable {
    inner: Arc<FnInner>,
}

impl std::fmt::Debug for FnDisposable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnDisposable")
            .field("id", &self.id())
            .field("disposed", &self.is_disposed())
            .finish()
    }
}

impl FnDisposable {
    /// Wraps an infallible teardown.
    #[track_caller]
    #[must_use]
    pub fn new(f: impl FnOnce() + Send + 'static) -> Self {
        Self::build(
            Box::new(move || {
                f();
                Ok(())
            }),
            None,
        )
    }

    /// Wraps a teardown that may fail; its error is returned by the first
    /// release.
    #[track_caller]
    #[must_use]
    pub fn fallible(f: impl FnOnce() -> Result<()> + Send + 'static) -> Self {
        Self::build(Box::new(f), None)
    }

    /// Wraps an infallible teardown, tracked by `tracker`.
    #[track_caller]
    #[must_use]
    pub fn with_tracker(tracker: &LeakTracker, f: impl FnOnce() + Send + 'static) -> Self {
        Self::build(
            Box::new(move || {
                f();
                Ok(())
            }),
            Some(tracker),
        )
    }

    #[track_caller]
    fn build(teardown: Teardown, tracker: Option<&LeakTracker>) -> Self {
        Self {
            inner: Arc::new(FnInner {
                tracked: Tracked::new("FnDisposable", tracker),
                teardown: Mutex::new(Some(teardown)),
            }),
        }
    }

    /// Returns true once the closure has been taken for release.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.teardown.lock().is_none()
    }

    /// Exempts this disposable from leak reports.
    pub fn mark_as_singleton(&self) {
        self.inner.tracked.mark_as_singleton();
    }
}

impl Disposable for FnDisposable {
    fn dispose(&self) -> Result<()> {
        let Some(teardown) = self.inner.teardown.lock().take() else {
            return Ok(());
        };
        self.inner.tracked.resolve();
        teardown()
    }

    fn id(&self) -> DisposableId {
        self.inner.tracked.id()
    }

    fn mark_owned(&self) {
        self.inner.tracked.mark_owned();
    }
}

/// Wraps `f` into a disposable that runs it exactly once.
///
/// ```
/// use disposables::{to_disposable, Disposable};
///
/// let unit = to_disposable(|| println!("released"));
/// unit.dispose().unwrap();
/// unit.dispose().unwrap(); // no second print
/// ```
#[track_caller]
#[must_use]
pub fn to_disposable(f: impl FnOnce() + Send + 'static) -> FnDisposable {
    FnDisposable::new(f)
}

/// Wraps a fallible `f` into a disposable that runs it exactly once.
#[track_caller]
#[must_use]
pub fn try_to_disposable(f: impl FnOnce() -> Result<()> + Send + 'static) -> FnDisposable {
    FnDisposable::fallible(f)
}

/// Combines `units` into one disposable releasing all of them.
///
/// The inputs become owned by the combination. Every input is released even
/// when earlier ones fail; failures aggregate as in [`dispose_all`].
#[track_caller]
#[must_use]
pub fn combined_disposable<I>(units: I) -> FnDisposable
where
    I: IntoIterator,
    I::Item: Disposable + 'static,
{
    let units: Vec<Box<dyn Disposable>> = units
        .into_iter()
        .map(|unit| {
            unit.mark_owned();
            Box::new(unit) as Box<dyn Disposable>
        })
        .collect();
    FnDisposable::fallible(move || dispose_all(units))
}

/// Releases `unit` if present. `None` is a no-op.
pub fn dispose<D: Disposable + ?Sized>(unit: Option<&D>) -> Result<()> {
    unit.map_or(Ok(()), |unit| unit.dispose())
}

/// Releases every unit in iteration order, regardless of failures.
///
/// No failure yields `Ok(())`; exactly one failure is returned unchanged;
/// several are wrapped into one
/// [`MultipleReleaseFailures`](crate::ErrorKind::MultipleReleaseFailures)
/// error listing them in order.
pub fn dispose_all<I>(units: I) -> Result<()>
where
    I: IntoIterator,
    I::Item: Disposable,
{
    let failures = units
        .into_iter()
        .filter_map(|unit| unit.dispose().err())
        .collect();
    collect_failures(failures)
}

/// Releases every unit like [`dispose_all`] and hands back the drained
/// vector.
///
/// ```
/// use disposables::{dispose_vec, to_disposable};
///
/// let drained = dispose_vec(vec![to_disposable(|| {}), to_disposable(|| {})]).unwrap();
/// assert!(drained.is_empty());
/// ```
pub fn dispose_vec<D: Disposable>(mut units: Vec<D>) -> Result<Vec<D>> {
    dispose_all(units.drain(..))?;
    Ok(units)
}

/// A disposable whose release does nothing.
///
/// Use as a placeholder where a disposable is structurally required.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NoopDisposable;

impl Disposable for NoopDisposable {
    fn dispose(&self) -> Result<()> {
        Ok(())
    }

    fn id(&self) -> DisposableId {
        DisposableId::NONE
    }
}

/// The shared no-op disposable.
pub const NONE: NoopDisposable = NoopDisposable;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, ErrorKind};
    use crate::test_utils::{init_test_logging, tracking_fixture, TEST_CHECK_DELAY};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn init_test(name: &str) {
        init_test_logging();
        crate::test_phase!(name);
    }

    fn counting(counter: &Arc<AtomicUsize>) -> FnDisposable {
        let counter = Arc::clone(counter);
        to_disposable(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    fn failing(message: &'static str) -> FnDisposable {
        try_to_disposable(move || Err(Error::release_failed(message)))
    }

    fn recording(order: &Arc<Mutex<Vec<&'static str>>>, label: &'static str) -> FnDisposable {
        let order = Arc::clone(order);
        to_disposable(move || order.lock().push(label))
    }

    #[test]
    fn to_disposable_runs_once() {
        init_test("to_disposable_runs_once");
        let counter = Arc::new(AtomicUsize::new(0));
        let unit = counting(&counter);
        assert!(!unit.is_disposed());

        unit.dispose().expect("first release");
        unit.dispose().expect("second release");
        unit.clone().dispose().expect("clone release");

        crate::assert_with_log!(
            counter.load(Ordering::SeqCst) == 1,
            "teardown runs once",
            1,
            counter.load(Ordering::SeqCst)
        );
        assert!(unit.is_disposed());
        crate::test_complete!("to_disposable_runs_once");
    }

    #[test]
    fn try_to_disposable_reports_first_failure_only() {
        let unit = failing("boom");
        let err = unit.dispose().expect_err("teardown fails");
        assert_eq!(err.message(), Some("boom"));
        assert!(unit.dispose().is_ok(), "second release is inert");
    }

    #[test]
    fn clones_share_identity() {
        let unit = to_disposable(|| {});
        assert_eq!(unit.id(), unit.clone().id());
        assert_ne!(unit.id(), to_disposable(|| {}).id());
    }

    #[test]
    fn dispose_none_is_noop() {
        assert!(dispose::<FnDisposable>(None).is_ok());
        let counter = Arc::new(AtomicUsize::new(0));
        let unit = counting(&counter);
        dispose(Some(&unit)).expect("release");
        dispose(Some(&unit)).expect("release again");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispose_all_releases_in_order_despite_failures() {
        init_test("dispose_all_releases_in_order_despite_failures");
        let order = Arc::new(Mutex::new(Vec::new()));
        let result = dispose_all([
            recording(&order, "a"),
            failing("b failed"),
            recording(&order, "c"),
        ]);
        let err = result.expect_err("one failure");
        assert_eq!(err.kind(), ErrorKind::ReleaseFailed);
        assert_eq!(err.message(), Some("b failed"));
        assert_eq!(*order.lock(), ["a", "c"]);
        crate::test_complete!("dispose_all_releases_in_order_despite_failures");
    }

    #[test]
    fn dispose_all_aggregates_multiple_failures() {
        let counter = Arc::new(AtomicUsize::new(0));
        let err = dispose_all([failing("first"), counting(&counter), failing("second")])
            .expect_err("two failures");
        assert_eq!(err.kind(), ErrorKind::MultipleReleaseFailures);
        let messages: Vec<_> = err.errors().iter().filter_map(Error::message).collect();
        assert_eq!(messages, ["first", "second"]);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn dispose_vec_returns_drained_vector_in_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let units = vec![
            recording(&order, "a"),
            recording(&order, "b"),
            recording(&order, "c"),
        ];
        let drained = dispose_vec(units).expect("no failures");
        assert!(drained.is_empty());
        assert_eq!(*order.lock(), ["a", "b", "c"]);
    }

    #[test]
    fn combined_releases_all_inputs_once() {
        init_test("combined_releases_all_inputs_once");
        let counter = Arc::new(AtomicUsize::new(0));
        let combined = combined_disposable([
            counting(&counter),
            failing("middle"),
            counting(&counter),
        ]);

        let err = combined.dispose().expect_err("middle fails");
        assert_eq!(err.message(), Some("middle"));
        assert_eq!(counter.load(Ordering::SeqCst), 2);

        combined.dispose().expect("inert after first release");
        assert_eq!(counter.load(Ordering::SeqCst), 2);
        crate::test_complete!("combined_releases_all_inputs_once");
    }

    #[test]
    fn combined_inputs_are_no_longer_tracked() {
        let (clock, timers, tracker, log) = tracking_fixture();
        let a = FnDisposable::with_tracker(&tracker, || {});
        let b = FnDisposable::with_tracker(&tracker, || {});
        assert_eq!(tracker.tracked_count(), 2);

        let combined = combined_disposable([a, b]);
        assert_eq!(tracker.tracked_count(), 0);

        clock.advance_by(TEST_CHECK_DELAY);
        timers.process_timers();
        assert!(log.is_empty());
        combined.dispose().expect("release");
    }

    #[test]
    fn tracked_closure_released_in_time_is_not_reported() {
        let (clock, timers, tracker, log) = tracking_fixture();
        let unit = FnDisposable::with_tracker(&tracker, || {});
        let forgotten = FnDisposable::with_tracker(&tracker, || {});
        unit.dispose().expect("release");

        clock.advance_by(TEST_CHECK_DELAY);
        timers.process_timers();
        let reports = log.reports();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].id, forgotten.id());
        assert_eq!(reports[0].type_name, "FnDisposable");
    }

    #[test]
    fn singleton_is_never_reported() {
        let (clock, timers, tracker, log) = tracking_fixture();
        let unit = FnDisposable::with_tracker(&tracker, || {});
        unit.mark_as_singleton();
        clock.advance_by(TEST_CHECK_DELAY);
        timers.process_timers();
        assert!(log.is_empty());
    }

    #[test]
    fn noop_is_inert() {
        assert!(NONE.dispose().is_ok());
        assert!(NONE.id().is_none());
        assert_eq!(NONE, NoopDisposable);
    }

    #[test]
    fn boxed_and_arc_units_forward() {
        let counter = Arc::new(AtomicUsize::new(0));
        let unit = counting(&counter);
        let boxed: Box<dyn Disposable> = Box::new(unit.clone());
        let shared: Arc<dyn Disposable> = Arc::new(unit.clone());
        assert_eq!(boxed.id(), unit.id());
        boxed.dispose().expect("boxed");
        shared.dispose().expect("arc");
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
