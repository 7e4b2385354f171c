// Copyright (C) 2024-2025 Stacks Open Internet Foundation
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program.  If not, see <http://www.gnu.org/licenses/>.

use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use hashbrown::HashMap;

/// Shared, grow-only cache with get-or-fetch semantics.
///
/// Values are never evicted or replaced with a different value: every key maps to
/// data that is immutable once resolved, so two threads racing to fill the same key
/// will both store an equivalent value. The lock is never held while fetching.
pub struct FetchCache<K, V> {
    entries: RwLock<HashMap<K, V>>,
}

impl<K: Eq + std::hash::Hash + Clone, V: Clone> Default for FetchCache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K: Eq + std::hash::Hash + Clone, V: Clone> FetchCache<K, V> {
    /// Create a new, empty cache
    pub fn new() -> Self {
        FetchCache {
            entries: RwLock::new(HashMap::new()),
        }
    }

    // A panicking writer cannot leave a half-written entry behind, so a poisoned
    // lock still guards consistent data.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<K, V>> {
        match self.entries.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<K, V>> {
        match self.entries.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Get the cached value for the given key
    pub fn get(&self, key: &K) -> Option<V> {
        self.read().get(key).cloned()
    }

    /// Store a value for the given key
    pub fn insert(&self, key: K, value: V) {
        self.write().insert(key, value);
    }

    /// Return the cached value for `key`, or run `fetch` and cache its result.
    /// A failed fetch caches nothing and its error is returned as-is.
    pub fn get_or_fetch<E, F>(&self, key: &K, fetch: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = fetch()?;
        self.insert(key.clone(), value.clone());
        Ok(value)
    }

    /// Number of cached entries
    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
