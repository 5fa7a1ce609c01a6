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

//! Remote catalog swaps.

use crate::eviction::EvictionManager;
use cairn_core::{
    catalog::Catalog,
    platform::Platform,
    provider::{CatalogFetcher, ResourceLocator},
    CancellationToken, LoadError, LoadResult,
};
use std::sync::Arc;

/// Downloads versioned catalogs and installs them into the locator.
pub struct CatalogManager {
    fetcher: Arc<dyn CatalogFetcher>,
    locator: Arc<dyn ResourceLocator>,
    base_url: String,
    platform: Option<Platform>,
}

impl CatalogManager {
    /// Creates a manager fetching from under `base_url` for `platform`.
    pub fn new(
        fetcher: Arc<dyn CatalogFetcher>,
        locator: Arc<dyn ResourceLocator>,
        base_url: impl Into<String>,
        platform: Option<Platform>,
    ) -> Self {
        Self {
            fetcher,
            locator,
            base_url: base_url.into(),
            platform,
        }
    }

    /// The URL the catalog of `version` is published at:
    /// `{base}/{version}/{platform}/catalog_{version}.bin`.
    pub fn catalog_url(&self, version: &str) -> LoadResult<String> {
        let platform = self.platform.ok_or_else(|| {
            LoadError::ConfigurationError(
                "no remote catalogs are published for this build target".to_string(),
            )
        })?;
        Ok(format!(
            "{}/{version}/{platform}/catalog_{version}.bin",
            self.base_url.trim_end_matches('/')
        ))
    }

    /// Fetches, decodes and installs the catalog of `version`, then evicts every
    /// resident asset so no binding from the previous catalog survives.
    ///
    /// Returns the eviction's outcome. Any failure before the install returns
    /// `false` and leaves the current catalog and cache untouched.
    pub async fn load_catalog(
        &self,
        version: &str,
        eviction: &EvictionManager,
        token: &CancellationToken,
    ) -> bool {
        let url = match self.catalog_url(version) {
            Ok(url) => url,
            Err(e) => {
                log::error!("Cannot load catalog '{version}': {e}");
                return false;
            }
        };

        let bytes = match token.run_until_cancelled(self.fetcher.fetch(&url)).await {
            None => return false,
            Some(Ok(bytes)) => bytes,
            Some(Err(e)) => {
                log::warn!("Failed to fetch catalog from {url}: {e}");
                return false;
            }
        };
        let catalog = match Catalog::from_bytes(&bytes) {
            Ok(catalog) => catalog,
            Err(e) => {
                log::warn!("Failed to decode catalog from {url}: {e}");
                return false;
            }
        };
        if token.is_cancelled() {
            return false;
        }

        log::info!("Installing catalog '{version}' from {url}");
        self.locator.apply_catalog(catalog);
        // The swap is committed; the reset must run even if the caller cancels now.
        eviction.unload_all(&CancellationToken::new()).await
    }
}
