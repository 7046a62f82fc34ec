//! The disposal model: units that release exactly once, and the containers
//! that own them.
//!
//! # Overview
//!
//! Anything that acquires a resource needing explicit release wraps its
//! teardown in a [`Disposable`] and hands it to an owner:
//!
//! - [`DisposableStore`]: an unordered set of units with aggregate release
//! - [`DisposableBase`]: a private store composed into a higher-level object
//! - [`MutableDisposable`]: a slot holding at most one unit
//! - [`DisposableMap`]: units keyed by caller-chosen keys
//!
//! Releasing an owner cascades depth-first through everything it owns.
//!
//! # Identity
//!
//! Every unit carries a [`DisposableId`]. Handles such as [`FnDisposable`] or
//! [`DisposableStore`] are cheap clones of one shared unit and report the same
//! id, so registering a clone of a store into that store is caught, and
//! registering the same unit twice collapses to one entry.
//!
//! # Failure
//!
//! Release failures never stop an aggregate release. Every member is visited;
//! one failure comes back unchanged, several come back as one
//! [`ErrorKind::MultipleReleaseFailures`](crate::ErrorKind) error listing
//! them in release order.
//!
//! # Example
//!
//! ```
//! use disposables::{to_disposable, DisposableStore};
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//!
//! let released = Arc::new(AtomicUsize::new(0));
//! let store = DisposableStore::new();
//! for _ in 0..3 {
//!     let released = Arc::clone(&released);
//!     store.add(to_disposable(move || {
//!         released.fetch_add(1, Ordering::SeqCst);
//!     }));
//! }
//!
//! store.dispose().unwrap();
//! store.dispose().unwrap();
//! assert_eq!(released.load(Ordering::SeqCst), 3);
//! assert!(store.is_disposed());
//! ```

mod base;
mod functions;
mod map;
mod mutable;
mod store;

pub use base::DisposableBase;
pub use functions::{
    combined_disposable, dispose, dispose_all, dispose_vec, to_disposable, try_to_disposable,
    FnDisposable, NoopDisposable, NONE,
};
pub use map::DisposableMap;
pub use mutable::MutableDisposable;
pub use store::DisposableStore;

use crate::error::Result;
use crate::types::DisposableId;
use std::sync::Arc;

/// A unit that can be released.
///
/// Implementations must be idempotent: a second `dispose` has no observable
/// effect and returns `Ok(())`.
pub trait Disposable: Send + Sync {
    /// Releases the unit.
    fn dispose(&self) -> Result<()>;

    /// Returns the unit's identity.
    ///
    /// Implementations allocate it once with [`DisposableId::next`] and
    /// return the same value from every clone of a handle.
    /// [`DisposableId::NONE`] is reserved for the inert placeholder; a unit
    /// reporting it is still released, but owners can not tell two such
    /// units apart.
    fn id(&self) -> DisposableId;

    /// Called when an owner takes the unit. Tracked units stop being leak
    /// candidates on their own.
    fn mark_owned(&self) {}
}

impl<D: Disposable + ?Sized> Disposable for &D {
    fn dispose(&self) -> Result<()> {
        (**self).dispose()
    }

    fn id(&self) -> DisposableId {
        (**self).id()
    }

    fn mark_owned(&self) {
        (**self).mark_owned();
    }
}

impl<D: Disposable + ?Sized> Disposable for Box<D> {
    fn dispose(&self) -> Result<()> {
        (**self).dispose()
    }

    fn id(&self) -> DisposableId {
        (**self).id()
    }

    fn mark_owned(&self) {
        (**self).mark_owned();
    }
}

impl<D: Disposable + ?Sized> Disposable for Arc<D> {
    fn dispose(&self) -> Result<()> {
        (**self).dispose()
    }

    fn id(&self) -> DisposableId {
        (**self).id()
    }

    fn mark_owned(&self) {
        (**self).mark_owned();
    }
}

/// Releases `value` in response to a misuse that would otherwise drop it.
///
/// The caller gets nothing back, so a failure is logged rather than returned.
#[cfg_attr(not(feature = "tracing-integration"), allow(unused_variables))]
pub(crate) fn release_orphan(owner: &'static str, owner_id: DisposableId, value: &dyn Disposable) {
    crate::tracing_compat::warn!(
        owner,
        owner_id = %owner_id,
        unit = %value.id(),
        "registering into a disposed {owner}; releasing the unit immediately"
    );
    if let Err(err) = value.dispose() {
        crate::tracing_compat::error!(
            owner,
            unit = %value.id(),
            error = %err,
            "releasing a unit registered after disposal failed"
        );
    }
}
