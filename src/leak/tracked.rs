//! Per-disposable tracking state embedded in every tracked type.

use super::{global, LeakTracker};
use crate::types::DisposableId;
use std::panic::Location;

/// Identity plus the tracker that watches it.
///
/// Created through `#[track_caller]` constructors so the report points at the
/// user's call site, not at library internals.
#[derive(Debug)]
pub(crate) struct Tracked {
    id: DisposableId,
    tracker: Option<LeakTracker>,
}

impl Tracked {
    /// Allocates an id and registers it with `tracker`, falling back to the
    /// installed global tracker.
    #[track_caller]
    pub(crate) fn new(type_name: &'static str, tracker: Option<&LeakTracker>) -> Self {
        let id = DisposableId::next();
        let tracker = tracker
            .cloned()
            .or_else(|| global().cloned())
            .filter(LeakTracker::is_enabled);
        if let Some(tracker) = &tracker {
            tracker.track(id, type_name, Location::caller());
        }
        Self { id, tracker }
    }

    pub(crate) fn id(&self) -> DisposableId {
        self.id
    }

    /// The disposable was released.
    pub(crate) fn resolve(&self) {
        if let Some(tracker) = &self.tracker {
            tracker.mark_disposed(self.id);
        }
    }

    /// The disposable was handed to an owner.
    pub(crate) fn mark_owned(&self) {
        if let Some(tracker) = &self.tracker {
            tracker.mark_owned(self.id);
        }
    }

    pub(crate) fn mark_as_singleton(&self) {
        if let Some(tracker) = &self.tracker {
            tracker.mark_as_singleton(self.id);
        }
    }
}
