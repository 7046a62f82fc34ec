//! Tracing compatibility layer for structured diagnostics.
//!
//! This module provides a unified interface for logging that works whether or
//! not the `tracing-integration` feature is enabled:
//!
//! - **With feature enabled** (the default): Re-exports from the `tracing`
//!   crate.
//! - **Without feature**: No-op macros that compile to nothing.
//!
//! Leak reports and post-disposal registration warnings flow through here.
//! Building with `default-features = false` silences them; attach a
//! [`LeakReporter`](crate::leak::LeakReporter) to keep leak reports visible.
//!
//! # Usage
//!
//! ```rust,ignore
//! use disposables::tracing_compat::{debug, warn};
//!
//! warn!(id = %id, "registering into a disposed store");
//! debug!(members = 3, "store cleared");
//! ```

#[cfg(feature = "tracing-integration")]
pub use tracing::{debug, error, info, trace, warn};

#[cfg(not(feature = "tracing-integration"))]
mod noop {
    //! No-op implementations when tracing is disabled.

    /// No-op trace-level logging macro.
    #[macro_export]
    macro_rules! trace {
        ($($arg:tt)*) => {};
    }

    /// No-op debug-level logging macro.
    #[macro_export]
    macro_rules! debug {
        ($($arg:tt)*) => {};
    }

    /// No-op info-level logging macro.
    #[macro_export]
    macro_rules! info {
        ($($arg:tt)*) => {};
    }

    /// No-op warn-level logging macro.
    #[macro_export]
    macro_rules! warn {
        ($($arg:tt)*) => {};
    }

    /// No-op error-level logging macro.
    #[macro_export]
    macro_rules! error {
        ($($arg:tt)*) => {};
    }

    pub use crate::{debug, error, info, trace, warn};
}

#[cfg(not(feature = "tracing-integration"))]
pub use noop::*;
