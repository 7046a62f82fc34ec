//! Disposables: deterministic, idempotent release of owned resources.
//!
//! # Overview
//!
//! Anything that acquires a resource needing explicit release (a timer, a
//! subscription, an open handle, a registered callback) wraps the teardown
//! in a [`Disposable`] and registers it with an owner. The owner guarantees
//! every registered unit is released exactly once, keeps going when some
//! releases fail, and reports all failures together.
//!
//! # Core Guarantees
//!
//! - **Idempotent release**: every disposable in this crate ignores a second `dispose`
//! - **Exactly-once cascade**: disposing an owner releases each member once, depth-first
//! - **No silent drops**: registering into a disposed owner releases the unit on the spot
//! - **Aggregate failures**: one failure comes back unchanged, several as one error
//! - **Self-containment rejected**: registering an owner into itself panics
//! - **Opt-in leak tracking**: units unreleased after a delay are reported, never released
//!
//! # Module Structure
//!
//! - [`dispose`]: The [`Disposable`] trait, combinators and owning containers
//! - [`leak`]: Leak tracking and reporting
//! - [`time`]: Timer facility, [`TimeoutTimer`](time::TimeoutTimer) and
//!   [`RunOnceScheduler`](time::RunOnceScheduler)
//! - [`config`]: Environment and file configuration
//! - [`error`]: Error types
//! - [`types`]: Identifiers and time points
//! - [`tracing_compat`]: Logging macros that compile away without `tracing-integration`
//!
//! # Example
//!
//! ```
//! use disposables::{to_disposable, DisposableStore};
//!
//! let store = DisposableStore::new();
//! let subscription = store.add(to_disposable(|| println!("unsubscribed")));
//! let inner = store.add(DisposableStore::new());
//! inner.add(to_disposable(|| println!("closed")));
//!
//! store.dispose().expect("nothing fails");
//! assert!(inner.is_disposed());
//! assert!(subscription.is_disposed());
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_const_for_fn)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::doc_markdown)]

pub mod config;
pub mod dispose;
pub mod error;
pub mod leak;
pub mod time;
pub mod tracing_compat;
pub mod types;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-exports for convenient access to core types
pub use config::{ConfigError, DisposeConfig};
pub use dispose::{
    combined_disposable, dispose, dispose_all, dispose_vec, to_disposable, try_to_disposable,
    Disposable, DisposableBase, DisposableMap, DisposableStore, FnDisposable, MutableDisposable,
    NoopDisposable, NONE,
};
pub use error::{Error, ErrorKind, Result, ResultExt};
pub use leak::{LeakLog, LeakReport, LeakReporter, LeakTracker, LeakTrackingConfig};
pub use types::{DisposableId, Time};
