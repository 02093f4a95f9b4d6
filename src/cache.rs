//! Process-lifetime model cache.
//!
//! Models are expensive to load, so each key is constructed at most once and
//! then shared.  Construction is serialised per key: concurrent first
//! requests for the same key wait for a single load, while other keys load
//! in parallel.  A failed load leaves the slot empty so the next caller
//! retries.  Entries are never evicted.

use std::{
    collections::HashMap,
    hash::Hash,
    sync::{Arc, Mutex},
};

use anyhow::Result;
use once_cell::sync::OnceCell;

type Slot<M> = Arc<OnceCell<Arc<M>>>;

pub struct ModelCache<K, M: ?Sized> {
    slots: Mutex<HashMap<K, Slot<M>>>,
}

impl<K, M> ModelCache<K, M>
where
    K: Eq + Hash + Clone,
    M: ?Sized,
{
    pub fn new() -> Self {
        Self { slots: Mutex::new(HashMap::new()) }
    }

    fn slot(&self, key: &K) -> Slot<M> {
        let mut slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.entry(key.clone()).or_default().clone()
    }

    /// Return the cached model for `key`, running `load` if there is none.
    ///
    /// Only the map lookup holds the cache-wide lock; `load` runs under the
    /// per-key cell so a slow load does not block other keys.
    pub fn get_or_load<F>(&self, key: &K, load: F) -> Result<Arc<M>>
    where
        F: FnOnce() -> Result<Arc<M>>,
    {
        self.slot(key).get_or_try_init(load).cloned()
    }

    /// The cached model for `key`, without loading.
    pub fn get(&self, key: &K) -> Option<Arc<M>> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots.get(key).and_then(|cell| cell.get().cloned())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    /// Keys with a loaded model.
    pub fn keys(&self) -> Vec<K> {
        let slots = self.slots.lock().unwrap_or_else(|p| p.into_inner());
        slots
            .iter()
            .filter(|(_, cell)| cell.get().is_some())
            .map(|(k, _)| k.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.keys().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, M> Default for ModelCache<K, M>
where
    K: Eq + Hash + Clone,
    M: ?Sized,
{
    fn default() -> Self {
        Self::new()
    }
}
