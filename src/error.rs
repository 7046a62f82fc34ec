//! Error types and error handling strategy.
//!
//! Disposal distinguishes three classes of failure:
//!
//! - **Release failures**: a unit's own teardown reported an error. These are
//!   returned synchronously to whoever called `dispose`/`clear`.
//! - **Aggregated release failures**: more than one unit failed during one
//!   aggregate release. They are collected into a single [`Error`] of kind
//!   [`ErrorKind::MultipleReleaseFailures`] carrying the ordered list.
//! - **Programming errors**: registering a container into itself, scheduling
//!   on a disposed timer. These panic at the call site and never surface as
//!   an `Error`.
//!
//! Leak diagnostics are log-only and never produce an error.

use core::fmt;
use std::sync::Arc;

/// The kind of error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A unit's teardown logic failed.
    ReleaseFailed,
    /// Several units failed during one aggregate release.
    MultipleReleaseFailures,
}

impl ErrorKind {
    /// Returns true if this kind wraps a list of underlying errors.
    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        matches!(self, Self::MultipleReleaseFailures)
    }
}

/// The main error type for disposal operations.
#[derive(Debug, Clone)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    source: Option<Arc<dyn std::error::Error + Send + Sync>>,
    errors: Vec<Error>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub const fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            source: None,
            errors: Vec::new(),
        }
    }

    /// Creates a release failure with a description.
    #[must_use]
    pub fn release_failed(detail: impl Into<String>) -> Self {
        Self::new(ErrorKind::ReleaseFailed).with_message(detail)
    }

    /// Combines several release failures into one error.
    ///
    /// The order of `errors` is preserved.
    #[must_use]
    pub fn aggregate(errors: Vec<Self>) -> Self {
        let message = format!("{} disposables failed to release", errors.len());
        Self {
            kind: ErrorKind::MultipleReleaseFailures,
            message: Some(message),
            source: None,
            errors,
        }
    }

    /// Returns the error kind.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns true if this error aggregates several failures.
    #[must_use]
    pub const fn is_aggregate(&self) -> bool {
        self.kind.is_aggregate()
    }

    /// Returns the aggregated failures, empty for non-aggregate errors.
    #[must_use]
    pub fn errors(&self) -> &[Self] {
        &self.errors
    }

    /// Adds a message description to the error.
    #[must_use]
    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Adds a source error to the chain.
    #[must_use]
    pub fn with_source(mut self, source: impl std::error::Error + Send + Sync + 'static) -> Self {
        self.source = Some(Arc::new(source));
        self
    }

    /// Returns the error message, if any.
    #[must_use]
    pub fn message(&self) -> Option<&str> {
        self.message.as_deref()
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(msg) = &self.message {
            write!(f, ": {msg}")?;
        }
        for (index, inner) in self.errors.iter().enumerate() {
            write!(f, "\n  [{index}] {inner}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as _)
    }
}

/// Reduces the failures of one aggregate release to a single result.
///
/// No failures is `Ok`, exactly one is returned unchanged, more than one is
/// wrapped by [`Error::aggregate`].
pub(crate) fn collect_failures(mut errors: Vec<Error>) -> Result<()> {
    if errors.len() > 1 {
        return Err(Error::aggregate(errors));
    }
    errors.pop().map_or(Ok(()), Err)
}

/// Extension trait for adding context to Results.
#[allow(clippy::result_large_err)]
pub trait ResultExt<T> {
    /// Attach a context message on error.
    fn context(self, msg: impl Into<String>) -> Result<T>;
    /// Attach context message computed lazily on error.
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for core::result::Result<T, E> {
    fn context(self, msg: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.into().with_message(msg))
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| e.into().with_message(f()))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Self::new(ErrorKind::ReleaseFailed)
            .with_message(e.to_string())
            .with_source(e)
    }
}

/// A specialized Result type for disposal operations.
#[allow(clippy::result_large_err)]
pub type Result<T> = core::result::Result<T, Error>;
