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

//! Test doubles for the agent integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cairn_agents::{AgentConfig, AssetAgent, Collaborators, DisplayRegistry};
use cairn_core::{
    asset::{Asset, AssetKey, AssetKind, ErasedAsset, FetchedAsset, LoadHandle, ResourceLocation},
    catalog::Catalog,
    progress::{LabelProgress, ProgressFn},
    provider::{CatalogFetcher, ContentProvider, InvalidationScope},
    ProviderError,
};
use cairn_lanes::CatalogLocator;
use cairn_telemetry::MetricsRegistry;
use parking_lot::Mutex;
use std::{
    collections::{HashMap, HashSet},
    sync::{
        atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

#[derive(Debug)]
pub struct Sprite {
    pub name: String,
    /// The internal id of the location it was fetched from.
    pub source: String,
}

impl Asset for Sprite {
    const KIND: AssetKind = AssetKind::SPRITE;
}

#[derive(Default)]
pub struct FakeProvider {
    delay: Duration,
    fetches: AtomicUsize,
    live: Mutex<HashMap<u64, AssetKey>>,
    next_id: AtomicU64,
    refuse_invalidation: AtomicBool,
    scopes: Mutex<Vec<InvalidationScope>>,
}

impl FakeProvider {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_delay(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            ..Self::default()
        })
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    pub fn live_handles(&self) -> usize {
        self.live.lock().len()
    }

    pub fn live_keys(&self) -> HashSet<AssetKey> {
        self.live.lock().values().cloned().collect()
    }

    pub fn refuse_invalidation(&self, refuse: bool) {
        self.refuse_invalidation.store(refuse, Ordering::SeqCst);
    }

    pub fn last_scope(&self) -> Option<InvalidationScope> {
        self.scopes.lock().last().cloned()
    }
}

#[async_trait]
impl ContentProvider for FakeProvider {
    async fn fetch(
        &self,
        location: &ResourceLocation,
    ) -> Result<Option<FetchedAsset>, ProviderError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let key = location.primary_key.clone();
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        self.live.lock().insert(id, key.clone());
        Ok(Some(FetchedAsset {
            asset: ErasedAsset::new(Sprite {
                name: key.to_string(),
                source: location.internal_id.clone(),
            }),
            handle: LoadHandle::new(id, key),
        }))
    }

    fn release(&self, handle: LoadHandle) {
        self.live.lock().remove(&handle.id());
    }

    async fn invalidate(&self, scope: &InvalidationScope) -> Result<(), ProviderError> {
        self.scopes.lock().push(scope.clone());
        if self.refuse_invalidation.load(Ordering::SeqCst) {
            return Err(ProviderError::new("content store is busy"));
        }
        Ok(())
    }
}

/// Serves catalog bytes by URL.
#[derive(Default)]
pub struct FakeFetcher {
    published: Mutex<HashMap<String, Vec<u8>>>,
    requests: Mutex<Vec<String>>,
}

impl FakeFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn publish(&self, url: &str, bytes: Vec<u8>) {
        self.published.lock().insert(url.to_string(), bytes);
    }

    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl CatalogFetcher for FakeFetcher {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ProviderError> {
        self.requests.lock().push(url.to_string());
        self.published
            .lock()
            .get(url)
            .cloned()
            .ok_or_else(|| ProviderError::new(format!("404 for {url}")))
    }
}

pub fn sprite(key: &str, labels: &[&str]) -> ResourceLocation {
    labels
        .iter()
        .fold(ResourceLocation::new(key, AssetKind::SPRITE), |location, label| {
            location.with_label(*label)
        })
}

/// Five preload sprites, three in label "A", two in label "B".
pub fn game_catalog() -> Catalog {
    let mut locations: Vec<ResourceLocation> = (1..=5)
        .map(|i| sprite(&format!("boot/{i}"), &["Preload"]))
        .collect();
    locations.extend((1..=3).map(|i| sprite(&format!("a/{i}"), &["A"])));
    locations.extend((1..=2).map(|i| sprite(&format!("b/{i}"), &["B"])));
    Catalog::new("1.0", locations)
}

pub struct Harness {
    pub agent: Arc<AssetAgent>,
    pub provider: Arc<FakeProvider>,
    pub fetcher: Arc<FakeFetcher>,
}

pub fn harness_with(catalog: Catalog, provider: Arc<FakeProvider>, config: AgentConfig) -> Harness {
    cairn_telemetry::logging::init_test_logging();
    let fetcher = FakeFetcher::new();
    let agent = AssetAgent::init(
        config,
        Collaborators {
            locator: Arc::new(CatalogLocator::new(catalog)),
            provider: provider.clone(),
            catalog_fetcher: fetcher.clone(),
        },
        DisplayRegistry::new(),
        MetricsRegistry::new(),
    )
    .expect("agent init");
    Harness {
        agent,
        provider,
        fetcher,
    }
}

pub fn harness() -> Harness {
    harness_with(game_catalog(), FakeProvider::new(), AgentConfig::default())
}

pub fn recorder() -> (ProgressFn, Arc<Mutex<Vec<LabelProgress>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    let callback: ProgressFn = Arc::new(move |p: &LabelProgress| sink.lock().push(p.clone()));
    (callback, seen)
}
