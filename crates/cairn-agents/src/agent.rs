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

//! The AssetAgent is the public surface of the loading layer.

use std::sync::Arc;

use anyhow::{Context, Result};
use cairn_core::{
    asset::{Asset, AssetHandle, AssetKey, AssetKind, Label},
    progress::{LabelLoadReport, ProgressFn},
    provider::{CatalogFetcher, ContentProvider, ResourceLocator},
    CancellationToken, LoadError, LoadResult,
};
use cairn_data::{CacheStore, LabelRegistry, LabelStatus};
use cairn_lanes::{AssetMetrics, LabelLoadLane, SingleLoadLane};
use cairn_telemetry::MetricsRegistry;

use crate::{
    catalog::CatalogManager,
    config::AgentConfig,
    display::{DisplayObject, DisplayRegistry, Prefab},
    eviction::EvictionManager,
    preload::PreloadGate,
};

/// The external services the agent loads through.
pub struct Collaborators {
    /// Turns keys and labels into locations.
    pub locator: Arc<dyn ResourceLocator>,
    /// Fetches assets and owns their handles.
    pub provider: Arc<dyn ContentProvider>,
    /// Downloads remote catalogs.
    pub catalog_fetcher: Arc<dyn CatalogFetcher>,
}

/// The AssetAgent owns the asset cache and drives every loading pipeline.
///
/// It is created once with [`AssetAgent::init`] and shared by `Arc`. Every
/// operation is safe to call concurrently.
pub struct AssetAgent {
    config: AgentConfig,
    metrics: MetricsRegistry,
    cache: Arc<CacheStore>,
    single: SingleLoadLane,
    labels: LabelLoadLane,
    preload: Arc<PreloadGate>,
    eviction: EvictionManager,
    catalogs: CatalogManager,
    displays: DisplayRegistry,
}

impl AssetAgent {
    /// Creates the agent. `displays` should already hold every display factory.
    pub fn init(
        config: AgentConfig,
        collaborators: Collaborators,
        displays: DisplayRegistry,
        metrics: MetricsRegistry,
    ) -> Result<Arc<Self>> {
        config.validate().context("Invalid asset agent configuration")?;
        let asset_metrics =
            AssetMetrics::new(&metrics).context("Failed to register asset metrics")?;

        let Collaborators {
            locator,
            provider,
            catalog_fetcher,
        } = collaborators;

        let cache = Arc::new(CacheStore::new());
        let single = SingleLoadLane::new(
            locator.clone(),
            provider.clone(),
            cache.clone(),
            config.retry_policy(),
            asset_metrics.clone(),
        );
        let labels = LabelLoadLane::new(
            single.clone(),
            locator.clone(),
            Arc::new(LabelRegistry::new()),
        );
        let preload = Arc::new(PreloadGate::new(config.preload_label()));
        let eviction = EvictionManager::new(
            provider,
            cache.clone(),
            labels.clone(),
            preload.clone(),
            asset_metrics,
        );
        let catalogs = CatalogManager::new(
            catalog_fetcher,
            locator,
            config.catalog_base_url.clone(),
            config.platform(),
        );

        log::info!(
            "AssetAgent initialized (preload label '{}', {} attempt(s) per fetch)",
            config.preload_label,
            config.max_attempts
        );
        Ok(Arc::new(Self {
            config,
            metrics,
            cache,
            single,
            labels,
            preload,
            eviction,
            catalogs,
            displays,
        }))
    }

    /// Evicts everything. The agent stays usable, but callers are expected to
    /// drop it afterwards.
    pub async fn shutdown(&self) -> bool {
        log::info!("AssetAgent shutting down");
        self.eviction.unload_all(&CancellationToken::new()).await
    }

    /// Loads `key` and blocks the current thread until it is available.
    ///
    /// Resident assets are returned without blocking. Otherwise the load runs
    /// on a private single-threaded runtime, so this must not be called from
    /// async code: it fails with [`LoadError::Blocking`] there.
    /// Prefer [`load_async`](Self::load_async).
    pub fn load_blocking<A: Asset>(&self, key: &AssetKey) -> LoadResult<AssetHandle<A>> {
        if let Some(hit) = self.single.cached::<A>(key) {
            return hit;
        }
        if tokio::runtime::Handle::try_current().is_ok() {
            log::error!("load_blocking('{key}') called from within an async runtime");
            return Err(LoadError::Blocking(key.clone()));
        }

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .map_err(|e| LoadError::LoadFailed {
                key: key.clone(),
                attempts: 0,
                reason: format!("failed to start a blocking runtime: {e}"),
            })?;
        runtime.block_on(self.single.load::<A>(key, &CancellationToken::new()))
    }

    /// Loads `key`, from the cache when resident.
    pub async fn load_async<A: Asset>(
        &self,
        key: &AssetKey,
        token: &CancellationToken,
    ) -> LoadResult<AssetHandle<A>> {
        self.single.load::<A>(key, token).await
    }

    /// Loads the prefab under `key` and builds its display object.
    ///
    /// Load failures and unknown templates are logged and yield `None`.
    pub async fn instantiate(
        &self,
        key: &AssetKey,
        token: &CancellationToken,
    ) -> Option<Box<dyn DisplayObject>> {
        match self.single.load::<Prefab>(key, token).await {
            Ok(prefab) => self.displays.instantiate(&prefab),
            Err(e) => {
                log::warn!("Cannot instantiate '{key}': {e}");
                None
            }
        }
    }

    /// Tears down an object built by [`instantiate`](Self::instantiate).
    pub fn destroy(&self, object: Option<Box<dyn DisplayObject>>) {
        self.displays.destroy(object);
    }

    /// Loads every asset of `kind` tagged with `label`.
    pub async fn load_label(
        &self,
        label: &Label,
        kind: &AssetKind,
        progress: ProgressFn,
        token: &CancellationToken,
    ) -> LoadResult<LabelLoadReport> {
        self.labels.load_label(label, kind, progress, token).await
    }

    /// Loads the preload label once; later calls return immediately.
    pub async fn ensure_preloaded(
        &self,
        progress: ProgressFn,
        token: &CancellationToken,
    ) -> LoadResult<LabelLoadReport> {
        self.preload.ensure(&self.labels, progress, token).await
    }

    /// Returns `true` once the preload label has been fully loaded.
    pub fn is_preloaded(&self) -> bool {
        self.preload.is_done()
    }

    /// Returns `true` if every item of `label` is loaded.
    pub fn is_label_loaded(&self, label: &Label) -> bool {
        self.labels.labels().is_loaded(label)
    }

    /// The recorded status of `label`.
    pub fn label_status(&self, label: &Label) -> LabelStatus {
        self.labels.labels().status(label)
    }

    /// Evicts every resident asset.
    pub async fn unload_all(&self, token: &CancellationToken) -> bool {
        self.eviction.unload_all(token).await
    }

    /// Evicts every resident asset not tracked under `label`.
    pub async fn unload_all_except_label(&self, label: &Label, token: &CancellationToken) -> bool {
        self.eviction.unload_all_except_label(label, token).await
    }

    /// Swaps to the remote catalog of `version` and evicts everything.
    pub async fn load_catalog(&self, version: &str, token: &CancellationToken) -> bool {
        self.catalogs
            .load_catalog(version, &self.eviction, token)
            .await
    }

    /// The number of locations tagged with `label`, without loading them.
    pub async fn label_item_count(
        &self,
        label: &Label,
        token: &CancellationToken,
    ) -> LoadResult<usize> {
        self.labels.item_count(label, token).await
    }

    /// The number of resident assets.
    pub fn cached_count(&self) -> usize {
        self.cache.len()
    }

    /// Returns `true` if an asset is resident under `key`.
    pub fn is_cached(&self, key: &AssetKey) -> bool {
        self.cache.contains(key)
    }

    /// The metrics registry the agent records into.
    pub fn metrics(&self) -> &MetricsRegistry {
        &self.metrics
    }

    /// The configuration the agent was created with.
    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    /// The display registry used by [`instantiate`](Self::instantiate).
    pub fn displays(&self) -> &DisplayRegistry {
        &self.displays
    }
}
