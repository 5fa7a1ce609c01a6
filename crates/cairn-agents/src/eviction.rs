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

//! Bulk eviction of resident assets.

use crate::preload::PreloadGate;
use cairn_core::{
    asset::{Label, LoadHandle},
    provider::{ContentProvider, InvalidationScope},
    CancellationToken,
};
use cairn_data::CacheStore;
use cairn_lanes::{AssetMetrics, LabelLoadLane};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Evicts assets from the cache and hands their handles back to the provider.
///
/// Evictions are serialized with each other. Each one asks the provider to
/// invalidate first; if that fails nothing local is touched. The local part
/// then runs in one label registry critical section. Label records, in-flight
/// work, cache entries and the preload flag change together. Both the label
/// generation and the cache epoch move on, so loads started before can neither
/// record a label outcome nor register an asset.
pub struct EvictionManager {
    provider: Arc<dyn ContentProvider>,
    cache: Arc<CacheStore>,
    labels: LabelLoadLane,
    preload: Arc<PreloadGate>,
    metrics: AssetMetrics,
    serial: Mutex<()>,
}

impl EvictionManager {
    /// Creates a manager over the agent's shared state.
    pub fn new(
        provider: Arc<dyn ContentProvider>,
        cache: Arc<CacheStore>,
        labels: LabelLoadLane,
        preload: Arc<PreloadGate>,
        metrics: AssetMetrics,
    ) -> Self {
        Self {
            provider,
            cache,
            labels,
            preload,
            metrics,
            serial: Mutex::new(()),
        }
    }

    /// Evicts every resident asset and forgets every label.
    ///
    /// Returns `false` if cancelled or if the provider refused to invalidate.
    pub async fn unload_all(&self, token: &CancellationToken) -> bool {
        let Some(_serial) = token.run_until_cancelled(self.serial.lock()).await else {
            return false;
        };
        if token.is_cancelled() {
            return false;
        }
        if let Err(e) = self.provider.invalidate(&InvalidationScope::All).await {
            log::warn!("Unload of all assets abandoned: {e}");
            return false;
        }

        let handles = {
            let mut book = self.labels.labels().lock();
            book.clear();
            self.labels.clear_in_flight();
            self.preload.reset();
            self.labels
                .single()
                .retire_in_flight(|| self.cache.remove_all())
        };
        self.release(handles);
        true
    }

    /// Evicts every resident asset not tracked under `keep`, and forgets every
    /// other label.
    ///
    /// Returns `false` if cancelled or if the provider refused to invalidate.
    pub async fn unload_all_except_label(&self, keep: &Label, token: &CancellationToken) -> bool {
        let Some(_serial) = token.run_until_cancelled(self.serial.lock()).await else {
            return false;
        };
        if token.is_cancelled() {
            return false;
        }

        let kept = self.labels.labels().lock().tracked_keys(keep);
        let scope = InvalidationScope::Retain(kept);
        if let Err(e) = self.provider.invalidate(&scope).await {
            log::warn!("Unload of assets outside '{keep}' abandoned: {e}");
            return false;
        }

        let handles = {
            let mut book = self.labels.labels().lock();
            let retained = book.retain_only(keep);
            self.labels.clear_in_flight();
            if self.preload.label() != keep {
                self.preload.reset();
            }
            self.labels
                .single()
                .retire_in_flight(|| self.cache.remove_where(|key| !retained.contains(key)))
        };
        self.release(handles);
        true
    }

    fn release(&self, handles: Vec<LoadHandle>) {
        let count = handles.len();
        for handle in handles {
            self.provider.release(handle);
        }
        AssetMetrics::bump(&self.metrics.evicted, count as u64);
        self.metrics.set_resident(self.cache.len());
        log::info!("Evicted {count} asset(s)");
    }
}
