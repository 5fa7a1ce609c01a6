// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The resident asset cache.

use cairn_core::asset::{AssetKey, ErasedAsset, LoadHandle};
use parking_lot::Mutex;
use std::collections::HashMap;

struct CacheEntry {
    asset: ErasedAsset,
    handle: LoadHandle,
}

/// The outcome of [`CacheStore::put`].
#[derive(Debug)]
pub enum Registration {
    /// The asset is now resident under its key.
    Inserted,
    /// Another asset was already resident under the key. The cache kept it; the
    /// rejected handle is returned so the caller can release it.
    AlreadyPresent {
        /// The asset that stays resident.
        resident: ErasedAsset,
        /// The handle of the asset that was not inserted.
        rejected: LoadHandle,
    },
    /// The cache was evicted since the given epoch. Nothing was inserted.
    Stale {
        /// The handle of the asset that was not inserted.
        rejected: LoadHandle,
    },
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<AssetKey, CacheEntry>,
    epoch: u64,
}

/// A central, in-memory cache mapping each [`AssetKey`] to its loaded asset and
/// the [`LoadHandle`] that keeps it alive.
///
/// The asset and its handle are always inserted and removed together under the
/// store's own lock, so no caller ever needs external synchronization. No
/// operation performs I/O while holding the lock.
///
/// Every removal starts a new eviction epoch. A fetch that captured an older
/// epoch cannot register its result through [`put_at`](Self::put_at).
#[derive(Default)]
pub struct CacheStore {
    state: Mutex<CacheState>,
}

impl CacheStore {
    /// Creates a new, empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the asset resident under `key`.
    pub fn get(&self, key: &AssetKey) -> Option<ErasedAsset> {
        self.state
            .lock()
            .entries
            .get(key)
            .map(|entry| entry.asset.clone())
    }

    /// Checks if an asset is resident under `key`.
    pub fn contains(&self, key: &AssetKey) -> bool {
        self.state.lock().entries.contains_key(key)
    }

    /// The current eviction epoch.
    pub fn epoch(&self) -> u64 {
        self.state.lock().epoch
    }

    /// Registers an asset and its handle under `key`.
    ///
    /// A second put for a key that is already resident is ignored; the later
    /// handle comes back in [`Registration::AlreadyPresent`] so it is not leaked.
    pub fn put(&self, key: AssetKey, asset: ErasedAsset, handle: LoadHandle) -> Registration {
        let mut state = self.state.lock();
        Self::insert(&mut state, key, asset, handle)
    }

    /// Like [`put`](Self::put), but only while the cache is still in `epoch`.
    ///
    /// An asset fetched before an eviction comes back as [`Registration::Stale`].
    pub fn put_at(
        &self,
        epoch: u64,
        key: AssetKey,
        asset: ErasedAsset,
        handle: LoadHandle,
    ) -> Registration {
        let mut state = self.state.lock();
        if state.epoch != epoch {
            return Registration::Stale { rejected: handle };
        }
        Self::insert(&mut state, key, asset, handle)
    }

    fn insert(
        state: &mut CacheState,
        key: AssetKey,
        asset: ErasedAsset,
        handle: LoadHandle,
    ) -> Registration {
        if let Some(existing) = state.entries.get(&key) {
            return Registration::AlreadyPresent {
                resident: existing.asset.clone(),
                rejected: handle,
            };
        }
        state.entries.insert(key, CacheEntry { asset, handle });
        Registration::Inserted
    }

    /// Removes the asset under `key`, returning its handle.
    pub fn remove(&self, key: &AssetKey) -> Option<LoadHandle> {
        self.state
            .lock()
            .entries
            .remove(key)
            .map(|entry| entry.handle)
    }

    /// Removes every asset and starts a new epoch, returning all handles.
    pub fn remove_all(&self) -> Vec<LoadHandle> {
        let mut state = self.state.lock();
        state.epoch += 1;
        state
            .entries
            .drain()
            .map(|(_, entry)| entry.handle)
            .collect()
    }

    /// Removes every asset whose key matches `predicate` and starts a new
    /// epoch, returning the removed handles.
    pub fn remove_where(&self, mut predicate: impl FnMut(&AssetKey) -> bool) -> Vec<LoadHandle> {
        let mut state = self.state.lock();
        state.epoch += 1;
        let doomed: Vec<AssetKey> = state
            .entries
            .keys()
            .filter(|k| predicate(k))
            .cloned()
            .collect();
        doomed
            .into_iter()
            .filter_map(|key| state.entries.remove(&key))
            .map(|entry| entry.handle)
            .collect()
    }

    /// The keys of every resident asset.
    pub fn keys(&self) -> Vec<AssetKey> {
        self.state.lock().entries.keys().cloned().collect()
    }

    /// The number of resident assets.
    pub fn len(&self) -> usize {
        self.state.lock().entries.len()
    }

    /// Checks if nothing is resident.
    pub fn is_empty(&self) -> bool {
        self.state.lock().entries.is_empty()
    }
}
