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

//! Cache-first loading of one key, with retry and in-flight deduplication.

use crate::{
    inflight::{InFlightTable, Joined},
    metrics::AssetMetrics,
    retry::RetryPolicy,
};
use cairn_core::{
    asset::{Asset, AssetHandle, AssetKey, AssetKind, ErasedAsset, FetchedAsset, ResourceLocation},
    provider::{ContentProvider, ResourceLocator},
    CancellationToken, LoadError, LoadResult,
};
use cairn_data::{CacheStore, Registration};
use cairn_telemetry::ScopedMetricTimer;
use std::sync::Arc;

type SharedLoads = InFlightTable<AssetKey, LoadResult<ErasedAsset>>;

/// Where a fetch attempt gets its location from.
#[derive(Clone)]
enum Target {
    /// Resolve the key through the locator on every attempt.
    Resolve(AssetKind),
    /// Already resolved, as part of a label load.
    Located(ResourceLocation),
}

/// The single-key loading pipeline.
///
/// 1. A resident asset is returned immediately.
/// 2. Otherwise the caller joins the fetch in flight for the key, or starts one.
/// 3. A fetch resolves the key, fetches the asset, and registers it in the
///    cache before any waiter sees it. Failures are retried per [`RetryPolicy`].
/// 4. A fetch that straddles an eviction releases its handle and ends with
///    [`LoadError::Cancelled`] instead of registering.
#[derive(Clone)]
pub struct SingleLoadLane {
    locator: Arc<dyn ResourceLocator>,
    provider: Arc<dyn ContentProvider>,
    cache: Arc<CacheStore>,
    in_flight: Arc<SharedLoads>,
    retry: RetryPolicy,
    metrics: AssetMetrics,
}

impl SingleLoadLane {
    /// Creates a lane over the given collaborators.
    pub fn new(
        locator: Arc<dyn ResourceLocator>,
        provider: Arc<dyn ContentProvider>,
        cache: Arc<CacheStore>,
        retry: RetryPolicy,
        metrics: AssetMetrics,
    ) -> Self {
        Self {
            locator,
            provider,
            cache,
            in_flight: Arc::new(SharedLoads::new()),
            retry,
            metrics,
        }
    }

    /// The cache this lane registers into.
    pub fn cache(&self) -> &Arc<CacheStore> {
        &self.cache
    }

    /// The number of keys with a fetch in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Runs `evict` and retires every fetch in flight, as one step.
    ///
    /// Retired fetches are cancelled and can no longer be joined, so a later
    /// load starts over against the current catalog. `evict` must start a new
    /// cache epoch (e.g. [`CacheStore::remove_all`]) so a fetch finishing in
    /// between cannot register its result.
    pub fn retire_in_flight<R>(&self, evict: impl FnOnce() -> R) -> R {
        self.in_flight.retire(evict)
    }

    /// Returns the resident asset under `key` if it is an `A`.
    pub fn cached<A: Asset>(&self, key: &AssetKey) -> Option<LoadResult<AssetHandle<A>>> {
        let hit = self.cache.get(key)?;
        AssetMetrics::bump(&self.metrics.cache_hits, 1);
        log::debug!("Cache hit for '{key}'");
        Some(Self::typed(key, hit))
    }

    /// Loads the asset of type `A` stored under `key`.
    pub async fn load<A: Asset>(
        &self,
        key: &AssetKey,
        token: &CancellationToken,
    ) -> LoadResult<AssetHandle<A>> {
        let erased = self.load_erased(key, &A::KIND, token).await?;
        Self::typed(key, erased)
    }

    /// Loads the asset stored under `key` whose kind satisfies `kind`.
    pub async fn load_erased(
        &self,
        key: &AssetKey,
        kind: &AssetKind,
        token: &CancellationToken,
    ) -> LoadResult<ErasedAsset> {
        self.load_target(key.clone(), Target::Resolve(kind.clone()), token)
            .await
    }

    /// Loads an already-resolved location, sharing any fetch in flight for its key.
    pub async fn load_location(
        &self,
        location: &ResourceLocation,
        token: &CancellationToken,
    ) -> LoadResult<ErasedAsset> {
        self.load_target(
            location.primary_key.clone(),
            Target::Located(location.clone()),
            token,
        )
        .await
    }

    fn typed<A: Asset>(key: &AssetKey, erased: ErasedAsset) -> LoadResult<AssetHandle<A>> {
        erased.downcast::<A>().ok_or_else(|| LoadError::TypeMismatch {
            key: key.clone(),
            found: erased.kind().clone(),
        })
    }

    async fn load_target(
        &self,
        key: AssetKey,
        target: Target,
        token: &CancellationToken,
    ) -> LoadResult<ErasedAsset> {
        if token.is_cancelled() {
            return Err(LoadError::Cancelled);
        }

        let lane = self.clone();
        let task_key = key.clone();
        let joined = self.in_flight.join_or_start(
            key.clone(),
            || self.cache.get(&key).map(Ok),
            || (),
            move |ctx| {
                let epoch = lane.cache.epoch();
                async move {
                    let result = lane
                        .fetch_with_retry(&task_key, &target, epoch, &ctx.token)
                        .await;
                    lane.in_flight.finish(&task_key, ctx.id);
                    result
                }
            },
        );

        match joined {
            Joined::Ready(hit) => {
                AssetMetrics::bump(&self.metrics.cache_hits, 1);
                log::debug!("Cache hit for '{key}'");
                hit
            }
            Joined::Waiting(waiter) => {
                if !waiter.started() {
                    log::debug!("Joining the fetch in flight for '{key}'");
                }
                waiter.wait(token).await.unwrap_or(Err(LoadError::Cancelled))
            }
        }
    }

    async fn fetch_with_retry(
        &self,
        key: &AssetKey,
        target: &Target,
        epoch: u64,
        token: &CancellationToken,
    ) -> LoadResult<ErasedAsset> {
        let mut attempt = 0;
        let last_error = loop {
            attempt += 1;
            if token.is_cancelled() {
                return Err(LoadError::Cancelled);
            }

            let error = match token
                .run_until_cancelled(self.attempt(key, target, attempt))
                .await
            {
                None => return Err(LoadError::Cancelled),
                Some(Ok(fetched)) => return self.register(key, fetched, epoch, token),
                Some(Err(error)) => error,
            };

            AssetMetrics::bump(&self.metrics.fetch_failures, 1);
            match self.retry.delay_after(attempt) {
                Some(delay) => {
                    log::warn!(
                        "Attempt {attempt}/{} for '{key}' failed: {error}. Retrying in {delay:?}",
                        self.retry.max_attempts
                    );
                    if token
                        .run_until_cancelled(tokio::time::sleep(delay))
                        .await
                        .is_none()
                    {
                        return Err(LoadError::Cancelled);
                    }
                }
                None => break error,
            }
        };

        let error = match last_error {
            not_found @ LoadError::NotFound { .. } => not_found,
            LoadError::LoadFailed { reason, .. } => LoadError::LoadFailed {
                key: key.clone(),
                attempts: attempt,
                reason,
            },
            other => LoadError::LoadFailed {
                key: key.clone(),
                attempts: attempt,
                reason: other.to_string(),
            },
        };
        log::warn!("Giving up on '{key}': {error}");
        Err(error)
    }

    /// One resolve-and-fetch attempt.
    async fn attempt(
        &self,
        key: &AssetKey,
        target: &Target,
        attempt: u32,
    ) -> LoadResult<FetchedAsset> {
        let location = match target {
            Target::Located(location) => location.clone(),
            Target::Resolve(kind) => {
                let mut locations = self
                    .locator
                    .resolve_key(key, kind)
                    .await
                    .map_err(|e| LoadError::LoadFailed {
                        key: key.clone(),
                        attempts: attempt,
                        reason: format!("location resolution failed: {e}"),
                    })?;
                if locations.is_empty() {
                    return Err(LoadError::NotFound {
                        key: key.clone(),
                        kind: kind.clone(),
                    });
                }
                locations.swap_remove(0)
            }
        };

        AssetMetrics::bump(&self.metrics.fetch_attempts, 1);
        let _timer = ScopedMetricTimer::new(&self.metrics.fetch_time_ms);
        match self.provider.fetch(&location).await {
            Ok(Some(fetched)) => Ok(fetched),
            Ok(None) => Err(LoadError::EmptyResult { key: key.clone() }),
            Err(e) => Err(LoadError::LoadFailed {
                key: key.clone(),
                attempts: attempt,
                reason: e.to_string(),
            }),
        }
    }

    fn register(
        &self,
        key: &AssetKey,
        fetched: FetchedAsset,
        epoch: u64,
        token: &CancellationToken,
    ) -> LoadResult<ErasedAsset> {
        if token.is_cancelled() {
            self.provider.release(fetched.handle);
            return Err(LoadError::Cancelled);
        }

        match self
            .cache
            .put_at(epoch, key.clone(), fetched.asset.clone(), fetched.handle)
        {
            Registration::Inserted => {
                log::debug!("Registered '{key}' in the cache");
                self.metrics.set_resident(self.cache.len());
                Ok(fetched.asset)
            }
            Registration::AlreadyPresent { resident, rejected } => {
                self.provider.release(rejected);
                Ok(resident)
            }
            Registration::Stale { rejected } => {
                log::debug!("Dropping '{key}': the cache was evicted while it was fetched");
                self.provider.release(rejected);
                Err(LoadError::Cancelled)
            }
        }
    }
}
