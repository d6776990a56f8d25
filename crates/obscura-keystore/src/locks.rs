//! Per-identifier mutual exclusion
//!
//! Stores are linearizable per call, but some operations span several calls
//! (check-then-generate in encrypt, delete-then-flag in revoke). `KeyLocks`
//! serializes those sequences for one identifier while leaving other
//! identifiers fully concurrent.

use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;

use obscura_core::KeyIdentifier;

/// Table of per-identifier locks
///
/// Entries are created on demand and dropped once no caller holds or waits
/// on them, so the table only grows with the number of identifiers in use.
#[derive(Default)]
pub struct KeyLocks {
    locks: DashMap<KeyIdentifier, Arc<Mutex<()>>>,
}

impl KeyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `id`
    pub fn with_lock<T>(&self, id: &KeyIdentifier, f: impl FnOnce() -> T) -> T {
        let lock = self.locks.entry(id.clone()).or_default().clone();

        let result = {
            let _guard = lock.lock();
            f()
        };

        drop(lock);
        // Only our map entry is left: nobody holds or waits on it
        self.locks
            .remove_if(id, |_, lock| Arc::strong_count(lock) == 1);

        result
    }

    /// Number of identifiers currently tracked
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}
