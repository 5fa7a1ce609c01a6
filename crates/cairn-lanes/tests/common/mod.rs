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

//! Test doubles shared by the lane integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cairn_core::{
    asset::{Asset, AssetKey, AssetKind, ErasedAsset, FetchedAsset, LoadHandle, ResourceLocation},
    catalog::Catalog,
    provider::{ContentProvider, InvalidationScope, ResourceLocator},
    ProviderError,
};
use cairn_data::{CacheStore, LabelRegistry};
use cairn_lanes::{AssetMetrics, CatalogLocator, LabelLoadLane, RetryPolicy, SingleLoadLane};
use cairn_telemetry::MetricsRegistry;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Debug, PartialEq)]
pub struct Sprite {
    pub name: String,
}

impl Asset for Sprite {
    const KIND: AssetKind = AssetKind::SPRITE;
}

#[derive(Debug)]
pub struct Table;

impl Asset for Table {
    const KIND: AssetKind = AssetKind::DATA;
}

/// A provider that fabricates sprites, counts fetches and fails on demand.
#[derive(Default)]
pub struct FakeProvider {
    delay: Duration,
    fetches: AtomicUsize,
    per_key: Mutex<HashMap<AssetKey, usize>>,
    failures_left: Mutex<HashMap<AssetKey, usize>>,
    broken: Mutex<HashSet<AssetKey>>,
    live: Mutex<HashSet<u64>>,
    next_id: AtomicU64,
}

impl FakeProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every fetch takes `delay` before answering.
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    /// The next `times` fetches of `key` fail.
    pub fn fail_times(&self, key: &str, times: usize) {
        self.failures_left.lock().insert(AssetKey::new(key), times);
    }

    /// Every fetch of `key` fails until [`heal`](Self::heal).
    pub fn break_key(&self, key: &str) {
        self.broken.lock().insert(AssetKey::new(key));
    }

    pub fn heal(&self, key: &str) {
        self.broken.lock().remove(&AssetKey::new(key));
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn fetches_of(&self, key: &str) -> usize {
        self.per_key
            .lock()
            .get(&AssetKey::new(key))
            .copied()
            .unwrap_or(0)
    }

    pub fn live_handles(&self) -> usize {
        self.live.lock().len()
    }

    fn should_fail(&self, key: &AssetKey) -> bool {
        if self.broken.lock().contains(key) {
            return true;
        }
        let mut failures = self.failures_left.lock();
        match failures.get_mut(key) {
            Some(left) if *left > 0 => {
                *left -= 1;
                true
            }
            _ => false,
        }
    }
}

#[async_trait]
impl ContentProvider for FakeProvider {
    async fn fetch(
        &self,
        location: &ResourceLocation,
    ) -> Result<Option<FetchedAsset>, ProviderError> {
        let key = location.primary_key.clone();
        self.fetches.fetch_add(1, Ordering::SeqCst);
        *self.per_key.lock().entry(key.clone()).or_default() += 1;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        if self.should_fail(&key) {
            return Err(ProviderError::new(format!("'{key}' is unavailable")));
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.live.lock().insert(id);
        Ok(Some(FetchedAsset {
            asset: ErasedAsset::new(Sprite {
                name: key.to_string(),
            }),
            handle: LoadHandle::new(id, key),
        }))
    }

    fn release(&self, handle: LoadHandle) {
        self.live.lock().remove(&handle.id());
    }

    async fn invalidate(&self, _scope: &InvalidationScope) -> Result<(), ProviderError> {
        Ok(())
    }
}

/// A sprite location tagged with `labels`.
pub fn sprite(key: &str, labels: &[&str]) -> ResourceLocation {
    labels
        .iter()
        .fold(ResourceLocation::new(key, AssetKind::SPRITE), |location, label| {
            location.with_label(*label)
        })
}

pub struct Fixture {
    pub provider: Arc<FakeProvider>,
    pub cache: Arc<CacheStore>,
    pub labels: Arc<LabelRegistry>,
    pub metrics: MetricsRegistry,
    pub single: SingleLoadLane,
    pub label: LabelLoadLane,
}

pub fn fixture(locations: Vec<ResourceLocation>, provider: FakeProvider) -> Fixture {
    cairn_telemetry::logging::init_test_logging();
    let provider = Arc::new(provider);
    let locator: Arc<dyn ResourceLocator> =
        Arc::new(CatalogLocator::new(Catalog::new("test", locations)));
    let cache = Arc::new(CacheStore::new());
    let labels = Arc::new(LabelRegistry::new());
    let metrics = MetricsRegistry::new();
    let single = SingleLoadLane::new(
        locator.clone(),
        provider.clone(),
        cache.clone(),
        RetryPolicy::default(),
        AssetMetrics::new(&metrics).expect("metrics"),
    );
    let label = LabelLoadLane::new(single.clone(), locator, labels.clone());
    Fixture {
        provider,
        cache,
        labels,
        metrics,
        single,
        label,
    }
}
