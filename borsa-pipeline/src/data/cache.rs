//! Per-cycle cache for fetched bars and derived frames.
//!
//! Entries are keyed by (key, cycle). Starting a new cycle drops every entry
//! from earlier cycles, so nothing fetched for one batch leaks into the next.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

/// Identifier of one scheduler cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CycleId(pub u64);

impl fmt::Display for CycleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "cycle-{}", self.0)
    }
}

/// Cache scoped to the current cycle.
pub struct CycleCache<V> {
    entries: RwLock<HashMap<(String, CycleId), V>>,
    current: AtomicU64,
}

impl<V: Clone> CycleCache<V> {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            current: AtomicU64::new(0),
        }
    }

    /// Start a new cycle and invalidate everything cached before it.
    pub fn begin_cycle(&self) -> CycleId {
        let id = CycleId(self.current.fetch_add(1, Ordering::SeqCst) + 1);
        if let Ok(mut entries) = self.entries.write() {
            entries.retain(|(_, cycle), _| *cycle >= id);
        }
        id
    }

    /// The most recently started cycle.
    pub fn current_cycle(&self) -> CycleId {
        CycleId(self.current.load(Ordering::SeqCst))
    }

    /// Cached value for `key` in `cycle`.
    pub fn get(&self, cycle: CycleId, key: &str) -> Option<V> {
        let entries = self.entries.read().ok()?;
        entries.get(&(key.to_string(), cycle)).cloned()
    }

    /// Cache a value. Writes for a cycle that is no longer current are ignored.
    pub fn insert(&self, cycle: CycleId, key: impl Into<String>, value: V) {
        if cycle != self.current_cycle() {
            return;
        }
        if let Ok(mut entries) = self.entries.write() {
            entries.insert((key.into(), cycle), value);
        }
    }

    /// Number of live entries.
    pub fn len(&self) -> usize {
        self.entries.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V: Clone> Default for CycleCache<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hit_within_cycle() {
        let cache = CycleCache::new();
        let cycle = cache.begin_cycle();
        cache.insert(cycle, "THYAO:1d", vec![1.0, 2.0]);
        assert_eq!(cache.get(cycle, "THYAO:1d"), Some(vec![1.0, 2.0]));
        assert_eq!(cache.get(cycle, "ASELS:1d"), None);
    }

    #[test]
    fn test_new_cycle_invalidates() {
        let cache = CycleCache::new();
        let first = cache.begin_cycle();
        cache.insert(first, "THYAO:1d", 1u32);
        let second = cache.begin_cycle();
        assert_ne!(first, second);
        assert!(cache.is_empty());
        assert_eq!(cache.get(second, "THYAO:1d"), None);
    }

    #[test]
    fn test_stale_insert_ignored() {
        let cache = CycleCache::new();
        let first = cache.begin_cycle();
        let _second = cache.begin_cycle();
        cache.insert(first, "THYAO:1d", 1u32);
        assert_eq!(cache.len(), 0);
    }
}
