//! Disposables keyed by caller-chosen keys.

use super::{release_orphan, Disposable};
use crate::error::{collect_failures, Result};
use crate::leak::{LeakTracker, Tracked};
use crate::types::DisposableId;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::Arc;

struct MapState<K, V> {
    disposed: bool,
    entries: HashMap<K, V>,
}

struct MapInner<K, V> {
    tracked: Tracked,
    state: Mutex<MapState<K, V>>,
}

/// Owns one disposable per key.
///
/// Setting a key releases the value it replaces. Like
/// [`DisposableStore`](super::DisposableStore), releases happen with the
/// lock released and values set after disposal are released on the spot.
pub struct DisposableMap<K, V> {
    inner: Arc<MapInner<K, V>>,
}

impl<K, V> Clone for DisposableMap<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> std::fmt::Debug for DisposableMap<K, V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("DisposableMap")
            .field("id", &self.inner.tracked.id())
            .field("len", &state.entries.len())
            .field("disposed", &state.disposed)
            .finish()
    }
}

impl<K, V> Default for DisposableMap<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Disposable + 'static,
{
    #[track_caller]
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> DisposableMap<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Disposable + 'static,
{
    /// Creates an empty map.
    #[track_caller]
    #[must_use]
    pub fn new() -> Self {
        Self::build(None)
    }

    /// Creates an empty map tracked by `tracker`.
    #[track_caller]
    #[must_use]
    pub fn with_tracker(tracker: &LeakTracker) -> Self {
        Self::build(Some(tracker))
    }

    #[track_caller]
    fn build(tracker: Option<&LeakTracker>) -> Self {
        Self {
            inner: Arc::new(MapInner {
                tracked: Tracked::new("DisposableMap", tracker),
                state: Mutex::new(MapState {
                    disposed: false,
                    entries: HashMap::new(),
                }),
            }),
        }
    }

    /// Stores `value` under `key`, releasing any different value it replaces.
    ///
    /// # Panics
    ///
    /// Panics if `value` is this map.
    #[track_caller]
    pub fn set(&self, key: K, value: V) -> Result<()> {
        assert!(
            value.id() != self.inner.tracked.id(),
            "cannot store a disposable map into itself"
        );
        value.mark_owned();

        let mut state = self.inner.state.lock();
        if state.disposed {
            drop(state);
            release_orphan("DisposableMap", self.inner.tracked.id(), &value);
            return Ok(());
        }
        let id = value.id();
        let replaced = state.entries.insert(key, value);
        drop(state);
        match replaced {
            Some(old) if old.id() != id || id.is_none() => old.dispose(),
            _ => Ok(()),
        }
    }

    /// Removes `key` and releases its value.
    pub fn delete_and_dispose(&self, key: &K) -> Result<()> {
        let removed = self.inner.state.lock().entries.remove(key);
        removed.map_or(Ok(()), |value| value.dispose())
    }

    /// Removes `key` without releasing its value.
    #[must_use = "the removed value is no longer released by the map"]
    pub fn delete_and_leak(&self, key: &K) -> Option<V> {
        self.inner.state.lock().entries.remove(key)
    }

    /// Releases every value and empties the map. The map stays usable.
    pub fn clear_and_dispose_all(&self) -> Result<()> {
        let entries = std::mem::take(&mut self.inner.state.lock().entries);
        release_values(entries)
    }

    /// Empties the map without releasing anything.
    #[must_use = "the removed values are no longer released by the map"]
    pub fn clear_and_leak(&self) -> HashMap<K, V> {
        std::mem::take(&mut self.inner.state.lock().entries)
    }

    /// Returns true if `key` has a value.
    #[must_use]
    pub fn contains_key(&self, key: &K) -> bool {
        self.inner.state.lock().entries.contains_key(key)
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.state.lock().entries.len()
    }

    /// Returns true if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.state.lock().entries.is_empty()
    }

    /// Returns true once [`dispose`](Self::dispose) has been called.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.inner.state.lock().disposed
    }

    /// Releases every value and disables the map.
    pub fn dispose(&self) -> Result<()> {
        let entries = {
            let mut state = self.inner.state.lock();
            if state.disposed {
                return Ok(());
            }
            state.disposed = true;
            std::mem::take(&mut state.entries)
        };
        self.inner.tracked.resolve();
        release_values(entries)
    }
}

impl<K, V> DisposableMap<K, V>
where
    K: Eq + Hash + Clone + Send + Sync + 'static,
    V: Disposable + Clone + 'static,
{
    /// Returns a handle to the value under `key`.
    #[must_use]
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.state.lock().entries.get(key).cloned()
    }

    /// Returns the current keys.
    #[must_use]
    pub fn keys(&self) -> Vec<K> {
        self.inner.state.lock().entries.keys().cloned().collect()
    }
}

fn release_values<K, V: Disposable>(entries: HashMap<K, V>) -> Result<()> {
    let failures = entries
        .into_values()
        .filter_map(|value| value.dispose().err())
        .collect();
    collect_failures(failures)
}

impl<K, V> Disposable for DisposableMap<K, V>
where
    K: Eq + Hash + Send + Sync + 'static,
    V: Disposable + 'static,
{
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
