//! Leak tracking for disposables.
//!
//! A disposable that is neither released nor handed to an owner within the
//! configured delay after creation is reported as a suspected leak. Tracking
//! is off unless a tracker is passed explicitly or installed globally, and
//! costs nothing while off.
//!
//! # Lifecycle of a tracked disposable
//!
//! ```text
//! created ──track──► pending check ──dispose / adopt / singleton──► forgotten
//!                          │
//!                          └── delay elapses ──► LeakReport (warn! + reporter)
//! ```
//!
//! Each disposable is checked at most once. Reports are diagnostics only;
//! nothing is ever released on the user's behalf.

mod global;
mod report;
mod tracked;
mod tracker;

pub use global::{global, install, install_from_config, InstallError};
pub use report::{LeakLog, LeakReport, LeakReporter};
pub(crate) use tracked::Tracked;
pub use tracker::{LeakTracker, LeakTrackingConfig, DEFAULT_CHECK_DELAY};
