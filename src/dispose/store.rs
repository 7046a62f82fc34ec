//! The ownership container.

use super::{release_orphan, Disposable, NoopDisposable};
use crate::error::{collect_failures, Result};
use crate::leak::{LeakTracker, Tracked};
use crate::tracing_compat::{debug, trace};
use crate::types::DisposableId;
use parking_lot::Mutex;
use std::any::TypeId;
use std::collections::BTreeMap;
use std::sync::Arc;

#[derive(Default)]
struct StoreState {
    disposed: bool,
    members: BTreeMap<DisposableId, Box<dyn Disposable>>,
}

struct StoreInner {
    tracked: Tracked,
    state: Mutex<StoreState>,
}

/// A set of disposables released together.
///
/// Membership is keyed by [`DisposableId`], so adding a unit twice keeps one
/// entry. A unit reporting [`DisposableId::NONE`] has no identity to collapse
/// on and is kept as a separate member each time, except the inert
/// [`NONE`](super::NONE) placeholder, which is never stored.
///
/// [`clear`](Self::clear) releases the members and leaves the store
/// usable; [`dispose`](Self::dispose) does the same and then refuses to hold
/// anything again: later registrations are released on the spot with a
/// warning.
///
/// The store is a handle. Clones share membership and identity.
///
/// # Locking
///
/// Members are always released with the store's lock released, so a member's
/// teardown may register into, clear or dispose the store that owns it.
#[derive(Clone)]
pub struct DisposableStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for DisposableStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("DisposableStore")
            .field("id", &self.id())
            .field("disposed", &state.disposed)
            .field("members", &state.members.len())
            .finish()
    }
}

impl Default for DisposableStore {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl DisposableStore {
    /// Creates an empty store, tracked by the global tracker if one is
    /// installed.
    #[track_caller]
    #[must_use]
    pub fn new() -> Self {
        Self::tracked_as("DisposableStore", None)
    }

    /// Creates an empty store tracked by `tracker`.
    #[track_caller]
    #[must_use]
    pub fn with_tracker(tracker: &LeakTracker) -> Self {
        Self::tracked_as("DisposableStore", Some(tracker))
    }

    #[track_caller]
    pub(crate) fn tracked_as(type_name: &'static str, tracker: Option<&LeakTracker>) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                tracked: Tracked::new(type_name, tracker),
                state: Mutex::new(StoreState::default()),
            }),
        }
    }

    /// Returns the store's identity.
    #[must_use]
    pub fn id(&self) -> DisposableId {
        self.inner.tracked.id()
    }

    /// Registers a handle to `unit` and returns `unit`.
    ///
    /// # Panics
    ///
    /// Panics if `unit` is this store (or a clone of it).
    #[track_caller]
    pub fn add<D: Disposable + Clone + 'static>(&self, unit: D) -> D {
        self.insert(unit.clone());
        unit
    }

    /// Registers `unit` by move and returns its identity.
    ///
    /// # Panics
    ///
    /// Panics if `unit` is this store (or a clone of it).
    #[track_caller]
    pub fn adopt<D: Disposable + 'static>(&self, unit: D) -> DisposableId {
        let id = unit.id();
        self.insert(unit);
        id
    }

    #[track_caller]
    fn insert<D: Disposable + 'static>(&self, unit: D) {
        let id = unit.id();
        assert!(
            id != self.id(),
            "cannot register a disposable store into itself ({id})"
        );
        if TypeId::of::<D>() == TypeId::of::<NoopDisposable>() {
            return;
        }
        unit.mark_owned();

        let mut state = self.inner.state.lock();
        if state.disposed {
            drop(state);
            release_orphan("DisposableStore", self.id(), &unit);
            return;
        }
        // Units without an identity can not collapse; each gets its own slot.
        let key = if id.is_none() { DisposableId::next() } else { id };
        let boxed: Box<dyn Disposable> = Box::new(unit);
        state.members.entry(key).or_insert(boxed);
        trace!(store = %self.id(), unit = %key, members = state.members.len(), "registered");
    }

    /// Removes the member `id` and releases it. Unknown ids are ignored.
    pub fn delete(&self, id: DisposableId) -> Result<()> {
        let removed = self.inner.state.lock().members.remove(&id);
        removed.map_or(Ok(()), |unit| unit.dispose())
    }

    /// Removes the member `id` without releasing it.
    ///
    /// The caller becomes responsible for the returned unit.
    #[must_use = "the removed unit is no longer released by the store"]
    pub fn delete_and_leak(&self, id: DisposableId) -> Option<Box<dyn Disposable>> {
        self.inner.state.lock().members.remove(&id)
    }

    /// Releases every member and empties the store. The store stays usable.
    ///
    /// Members are released in identity order. Every member is visited even
    /// when some fail; see [`dispose_all`](super::dispose_all) for how
    /// failures are reported.
    pub fn clear(&self) -> Result<()> {
        let members = std::mem::take(&mut self.inner.state.lock().members);
        self.release(members)
    }

    /// Releases every member and marks the store disposed.
    ///
    /// Only the first call does anything.
    pub fn dispose(&self) -> Result<()> {
        let members = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return Ok(());
            }
            state.disposed = true;
            std::mem::take(&mut state.members)
        };
        self.inner.tracked.resolve();
        debug!(store = %self.id(), members = members.len(), "disposing store");
        self.release(members)
    }

    fn release(&self, members: BTreeMap<DisposableId, Box<dyn Disposable>>) -> Result<()> {
        if members.is_empty() {
            return Ok(());
        }
        let failures: Vec<_> = members
            .into_values()
            .filter_map(|unit| unit.dispose().err())
            .collect();
        if !failures.is_empty() {
            debug!(store = %self.id(), failures = failures.len(), "members failed to release");
        }
        collect_failures(failures)
    }

    /// Returns true once [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Number of members.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().members.len()
    }

    /// Returns true if the store holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().members.is_empty()
    }

    /// Returns true if `id` is a member.
    #[must_use]
    pub fn contains(&self, id: DisposableId) -> bool {
        self.inner.state.lock().members.contains_key(&id)
    }

    /// Exempts this store from leak reports.
    pub fn mark_as_singleton(&self) {
        self.inner.tracked.mark_as_singleton();
    }
}

impl Disposable for DisposableStore {
    fn dispose(&self) -> Result<()> {
        Self::dispose(self)
    }

    fn id(&self) -> DisposableId {
        Self::id(self)
    }

    fn mark_owned(&self) {
        self.inner.tracked.mark_owned();
    }
}
