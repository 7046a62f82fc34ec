//! Leak reports and report sinks.

use crate::types::{DisposableId, Time};
use parking_lot::Mutex;
use std::backtrace::Backtrace;
use std::fmt;
use std::panic::Location;
use std::sync::Arc;

/// A disposable that was still unreleased when its check fired.
#[derive(Debug, Clone)]
pub struct LeakReport {
    /// Identity of the suspected leak.
    pub id: DisposableId,
    /// Concrete type that was tracked (e.g. `"DisposableStore"`).
    pub type_name: &'static str,
    /// Call site that created the disposable.
    pub location: &'static Location<'static>,
    /// When the disposable was created.
    pub created_at: Time,
    /// When the check fired.
    pub detected_at: Time,
    /// Creation backtrace, when capture is enabled.
    pub backtrace: Option<Arc<Backtrace>>,
}

impl LeakReport {
    /// Returns how long the disposable had been alive when reported.
    #[must_use]
    pub fn age(&self) -> std::time::Duration {
        self.detected_at.duration_since(self.created_at)
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "potentially leaked disposable: {} {} created at {}:{}:{} and not released after {:?}",
            self.type_name,
            self.id,
            self.location.file(),
            self.location.line(),
            self.location.column(),
            self.age(),
        )?;
        if let Some(backtrace) = &self.backtrace {
            write!(f, "\n{backtrace}")?;
        }
        Ok(())
    }
}

/// Receives leak reports in addition to the log.
///
/// Implementations run on whatever thread processes timers. A panicking
/// reporter is contained by the tracker.
pub trait LeakReporter: Send + Sync {
    /// Called once per suspected leak.
    fn report(&self, report: &LeakReport);
}

/// Collecting reporter, cloneable so a test or diagnostics page can keep a
/// view on what the tracker found.
#[derive(Debug, Clone, Default)]
pub struct LeakLog {
    reports: Arc<Mutex<Vec<LeakReport>>>,
}

impl LeakLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of all reports so far.
    #[must_use]
    pub fn reports(&self) -> Vec<LeakReport> {
        self.reports.lock().clone()
    }

    /// Returns the number of reports so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.reports.lock().len()
    }

    /// Returns true if nothing was reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.reports.lock().is_empty()
    }

    /// Removes and returns all reports.
    pub fn take(&self) -> Vec<LeakReport> {
        std::mem::take(&mut *self.reports.lock())
    }
}

impl LeakReporter for LeakLog {
    fn report(&self, report: &LeakReport) {
        self.reports.lock().push(report.clone());
    }
}
