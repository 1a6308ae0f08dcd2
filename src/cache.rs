//! Per-principal cache of effective permission sets.
//!
//! Invalidation is synchronous. Every invalidation bumps a generation
//! counter; a set computed under an older generation is never inserted, so
//! a lookup racing with an administrative change cannot resurrect stale
//! grants or denials.

use std::collections::HashMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::permission::Permissions;

/// Default number of principals kept.
pub const DEFAULT_CAPACITY: usize = 10_000;

struct Inner {
    generation: u64,
    entries: HashMap<String, Arc<Permissions>>,
}

/// Bounded map from principal id to effective set.
///
/// A poisoned lock is recovered rather than treated as a miss: entries are
/// only ever replaced whole, so the map is consistent at any panic point.
pub struct Cache {
    inner: RwLock<Inner>,
    capacity: usize,
}

impl Cache {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_CAPACITY)
    }

    /// Cache holding at most `capacity` principals.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            inner: RwLock::new(Inner {
                generation: 0,
                entries: HashMap::new(),
            }),
            capacity,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        self.inner.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        self.inner.write().unwrap_or_else(|e| e.into_inner())
    }

    /// Current generation. Capture it before reading the store.
    pub fn generation(&self) -> u64 {
        self.read().generation
    }

    pub fn get(&self, principal_id: &str) -> Option<Arc<Permissions>> {
        self.read().entries.get(principal_id).cloned()
    }

    /// Insert a set computed at `generation`. Returns false if it was discarded.
    ///
    /// When full, an arbitrary other entry is evicted; it is simply
    /// recomputed on its next lookup.
    pub fn insert(&self, principal_id: &str, permissions: Arc<Permissions>, generation: u64) -> bool {
        let mut inner = self.write();
        if inner.generation != generation || self.capacity == 0 {
            return false;
        }
        if inner.entries.len() >= self.capacity && !inner.entries.contains_key(principal_id) {
            let victim = inner.entries.keys().next().cloned();
            if let Some(victim) = victim {
                inner.entries.remove(&victim);
            }
        }
        inner.entries.insert(principal_id.to_string(), permissions);
        true
    }

    pub fn invalidate(&self, principal_id: &str) {
        let mut inner = self.write();
        inner.generation = inner.generation.wrapping_add(1);
        inner.entries.remove(principal_id);
    }

    pub fn clear(&self) {
        let mut inner = self.write();
        inner.generation = inner.generation.wrapping_add(1);
        inner.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Cache {
    fn default() -> Self {
        Self::new()
    }
}
