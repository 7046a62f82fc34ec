//! A slot owning at most one disposable.

use super::{release_orphan, Disposable};
use crate::error::Result;
use crate::leak::{LeakTracker, Tracked};
use crate::types::DisposableId;
use parking_lot::Mutex;
use std::sync::Arc;

struct SlotState<T> {
    value: Option<T>,
    disposed: bool,
}

struct SlotInner<T> {
    tracked: Tracked,
    state: Mutex<SlotState<T>>,
}

/// Holds at most one disposable, releasing the previous occupant whenever a
/// new one is set.
///
/// After [`dispose`](Self::dispose) the slot stays empty; setting a value
/// releases it immediately with a warning.
pub struct MutableDisposable<T> {
    inner: Arc<SlotInner<T>>,
}

impl<T> Clone for MutableDisposable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> std::fmt::Debug for MutableDisposable<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MutableDisposable")
            .field("id", &self.inner.tracked.id())
            .field("occupied", &state.value.is_some())
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl<T: Disposable + 'static> Default for MutableDisposable<T> {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Disposable + 'static> MutableDisposable<T> {
    /// Creates an empty slot.
    #[track_caller]
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates an empty slot tracked by `tracker`.
    #[track_caller]
    #[must_use]
    pub fn with_tracker(tracker: &LeakTracker) -> Self {
        Self::build(Some(tracker))
    }

    #[track_caller]
    fn build(tracker: Option<&LeakTracker>) -> Self {
        Self {
            inner: Arc::new(SlotInner {
                tracked: Tracked::new("MutableDisposable", tracker),
                state: Mutex::new(SlotState {
                    value: None,
                    disposed: false,
                }),
            }),
        }
    }

    /// Replaces the occupant, releasing the previous one.
    ///
    /// Setting the current occupant again does nothing. The returned error is
    /// the previous occupant's release failure.
    ///
    /// # Panics
    ///
    /// Panics if `value` is this slot.
    #[track_caller]
    pub fn set(&self, value: Option<T>) -> Result<()> {
        if let Some(value) = &value {
            assert!(
                value.id() != self.inner.tracked.id(),
                "cannot store a mutable disposable into itself"
            );
            value.mark_owned();
        }

        let mut state = self.inner.state.lock();
        if state.disposed {
            drop(state);
            if let Some(value) = value {
                release_orphan("MutableDisposable", self.inner.tracked.id(), &value);
            }
            return Ok(());
        }
        let same = match (&state.value, &value) {
            (Some(current), Some(next)) => !next.id().is_none() && current.id() == next.id(),
            _ => false,
        };
        if same {
            return Ok(());
        }
        let previous = std::mem::replace(&mut state.value, value);
        drop(state);
        previous.map_or(Ok(()), |previous| previous.dispose())
    }

    /// Releases the occupant and leaves the slot empty.
    pub fn clear(&self) -> Result<()> {
        let previous = self.inner.state.lock().value.take();
        previous.map_or(Ok(()), |previous| previous.dispose())
    }

    /// Empties the slot without releasing the occupant, handing it back.
    #[must_use = "the removed occupant is no longer released by the slot"]
    pub fn clear_and_leak(&self) -> Option<T> {
        self.inner.state.lock().value.take()
    }

    /// Returns true if the slot holds a value.
    #[must_use]
    pub fn is_set(&self) -> bool {
        self.inner.state.lock().value.is_some()
    }

    /// Returns true once [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Releases the occupant and disables the slot.
    pub fn dispose(&self) -> Result<()> {
        let previous = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return Ok(());
            }
            state.disposed = true;
            state.value.take()
        };
        self.inner.tracked.resolve();
        previous.map_or(Ok(()), |previous| previous.dispose())
    }
}

impl<T: Disposable + Clone + 'static> MutableDisposable<T> {
    /// Returns a handle to the occupant.
    #[must_use]
    pub fn value(&self) -> Option<T> {
        self.inner.state.lock().value.clone()
    }
}

impl<T: Disposable + 'static> Disposable for MutableDisposable<T> {
    fn dispose(&self) -> Result<()> {
        Self::dispose(self)
    }

    fn id(&self) -> DisposableId {
        self.inner.tracked.id()
    }

    fn mark_owned(&self) {
        self.inner.tracked.mark_owned();
    }
}
