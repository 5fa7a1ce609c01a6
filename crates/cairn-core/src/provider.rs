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

//! The collaborator seams of the loading pipelines.
//!
//! The loaders know nothing about where assets actually live. They talk to:
//! - a [`ResourceLocator`], which turns keys and labels into [`ResourceLocation`]s,
//! - a [`ContentProvider`], which fetches the asset at a location and takes
//!   its [`LoadHandle`] back when the asset is evicted,
//! - a [`CatalogFetcher`], which downloads versioned catalog manifests.
//!
//! All three are `async` because every one of them may suspend on I/O.

use crate::asset::{AssetKey, AssetKind, FetchedAsset, Label, LoadHandle, ResourceLocation};
use crate::catalog::Catalog;
use crate::error::ProviderError;
use async_trait::async_trait;
use std::collections::HashSet;

/// Resolves keys and labels to resource locations.
#[async_trait]
pub trait ResourceLocator: Send + Sync {
    /// Returns every location stored under `key` whose kind satisfies `kind`.
    async fn resolve_key(
        &self,
        key: &AssetKey,
        kind: &AssetKind,
    ) -> Result<Vec<ResourceLocation>, ProviderError>;

    /// Returns every location tagged with `label` whose kind satisfies `kind`.
    async fn resolve_label(
        &self,
        label: &Label,
        kind: &AssetKind,
    ) -> Result<Vec<ResourceLocation>, ProviderError>;

    /// Replaces the locator's view of the content with a freshly loaded catalog.
    fn apply_catalog(&self, catalog: Catalog);
}

/// What a bulk invalidation is allowed to reclaim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidationScope {
    /// Everything the provider holds.
    All,
    /// Everything except the assets under these keys.
    Retain(HashSet<AssetKey>),
}

impl InvalidationScope {
    /// Returns `true` if the asset under `key` may be reclaimed.
    pub fn covers(&self, key: &AssetKey) -> bool {
        match self {
            InvalidationScope::All => true,
            InvalidationScope::Retain(kept) => !kept.contains(key),
        }
    }
}

/// Fetches asset data and owns the resources behind each loaded asset.
#[async_trait]
pub trait ContentProvider: Send + Sync {
    /// Fetches and decodes the asset at `location`.
    ///
    /// Returns `Ok(None)` when the location exists but holds nothing usable.
    /// A returned [`LoadHandle`] must eventually come back through
    /// [`release`](Self::release).
    async fn fetch(
        &self,
        location: &ResourceLocation,
    ) -> Result<Option<FetchedAsset>, ProviderError>;

    /// Frees the resources behind one fetched asset.
    fn release(&self, handle: LoadHandle);

    /// Prepares the provider for a bulk reclamation of everything `scope` covers.
    ///
    /// Called before any local bookkeeping is touched: when it fails, eviction
    /// is abandoned and the cache is left as it was.
    async fn invalidate(&self, scope: &InvalidationScope) -> Result<(), ProviderError>;
}

/// Downloads catalog manifests.
#[async_trait]
pub trait CatalogFetcher: Send + Sync {
    /// Returns the raw manifest bytes published at `url`.
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, ProviderError>;
}
