//! Compute-once cache keyed by analysis period
//!
//! Each key maps to a shared `OnceCell`. The first caller for a key runs the computation
//! while later callers for the same key block on the cell and receive the same value. A
//! failed computation leaves the cell empty so the next caller retries.

use crate::error::AnalyticsResult;
use dashmap::DashMap;
use once_cell::sync::OnceCell;
use std::hash::Hash;
use std::sync::Arc;

/// Concurrent get-or-compute map
pub struct PeriodCache<K, V> {
    entries: DashMap<K, Arc<OnceCell<V>>>,
}

impl<K, V> PeriodCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Return the cached value for `key`, computing it at most once.
    ///
    /// The boolean is `true` when this call ran `compute`.
    pub fn get_or_try_compute<F>(&self, key: &K, compute: F) -> AnalyticsResult<(V, bool)>
    where
        F: FnOnce() -> AnalyticsResult<V>,
    {
        // Clone the cell out so the shard lock is released before computing.
        let cell = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .value()
            .clone();

        let mut computed = false;
        let value = cell.get_or_try_init(|| {
            computed = true;
            compute()
        })?;

        Ok((value.clone(), computed))
    }

    /// Cached value for `key` without computing
    pub fn get(&self, key: &K) -> Option<V> {
        self.entries
            .get(key)
            .and_then(|cell| cell.value().get().cloned())
    }

    /// Number of populated entries
    pub fn len(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.value().get().is_some())
            .count()
    }

    /// Whether no entry is populated
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<K, V> Default for PeriodCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}
