//! The owning base composed into higher-level objects.

use super::{Disposable, DisposableStore, NoopDisposable};
use crate::error::Result;
use crate::leak::LeakTracker;
use crate::types::DisposableId;

/// A private [`DisposableStore`] tying the lifetime of everything an object
/// acquires to the object itself.
///
/// Compose it as a private field and forward `dispose`; keeping the field
/// private keeps [`register`](Self::register) internal to the composing type.
///
/// ```
/// use disposables::{to_disposable, Disposable, DisposableBase, DisposableId, Result};
///
/// struct Watcher {
///     base: DisposableBase,
/// }
///
/// impl Watcher {
///     fn new() -> Self {
///         let base = DisposableBase::new();
///         base.register(to_disposable(|| println!("unsubscribed")));
///         Self { base }
///     }
/// }
///
/// impl Disposable for Watcher {
///     fn dispose(&self) -> Result<()> {
///         self.base.dispose()
///     }
///
///     fn id(&self) -> DisposableId {
///         self.base.id()
///     }
/// }
///
/// let watcher = Watcher::new();
/// watcher.dispose().unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct DisposableBase {
    store: DisposableStore,
}

impl Default for DisposableBase {
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl DisposableBase {
    /// The shared no-op disposable.
    pub const NONE: NoopDisposable = NoopDisposable;

    /// Creates a base with an empty store.
    #[track_caller]
    #[must_use]
    pub fn new() -> Self {
        Self {
            store: DisposableStore::tracked_as("DisposableBase", None),
        }
    }

    /// Creates a base tracked by `tracker`.
    #[track_caller]
    #[must_use]
    pub fn with_tracker(tracker: &LeakTracker) -> Self {
        Self {
            store: DisposableStore::tracked_as("DisposableBase", Some(tracker)),
        }
    }

    /// Returns the identity shared by the base and the object composing it.
    #[must_use]
    pub fn id(&self) -> DisposableId {
        self.store.id()
    }

    /// Registers `unit` for release with this object and returns it.
    ///
    /// # Panics
    ///
    /// Panics if `unit` is the object owning this base.
    #[track_caller]
    pub fn register<D: Disposable + Clone + 'static>(&self, unit: D) -> D {
        self.check_not_self(&unit);
        self.store.add(unit)
    }

    /// Registers `unit` by move.
    ///
    /// # Panics
    ///
    /// Panics if `unit` is the object owning this base.
    #[track_caller]
    pub fn adopt<D: Disposable + 'static>(&self, unit: D) -> DisposableId {
        self.check_not_self(&unit);
        self.store.adopt(unit)
    }

    #[track_caller]
    fn check_not_self(&self, unit: &dyn Disposable) {
        assert!(
            unit.id() != self.id(),
            "cannot register a disposable into itself ({})",
            self.id()
        );
    }

    /// Releases everything registered. Only the first call does anything.
    pub fn dispose(&self) -> Result<()> {
        self.store.dispose()
    }

    /// Returns true once [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.store.is_disposed()
    }

    /// Exempts the owning object from leak reports.
    pub fn mark_as_singleton(&self) {
        self.store.mark_as_singleton();
    }
}

impl Disposable for DisposableBase {
    fn dispose(&self) -> Result<()> {
        Self::dispose(self)
    }

    fn id(&self) -> DisposableId {
        Self::id(self)
    }

    fn mark_owned(&self) {
        Disposable::mark_owned(&self.store);
    }
}
