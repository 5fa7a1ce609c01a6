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

//! The catalog-backed [`ResourceLocator`].

use async_trait::async_trait;
use cairn_core::{
    asset::{AssetKey, AssetKind, Label, ResourceLocation},
    catalog::Catalog,
    provider::ResourceLocator,
    ProviderError,
};
use parking_lot::RwLock;

/// Resolves keys and labels against the currently installed [`Catalog`].
///
/// Lookups take a read lock for the duration of one index query; installing a
/// catalog swaps it in one write.
#[derive(Debug, Default)]
pub struct CatalogLocator {
    catalog: RwLock<Catalog>,
}

impl CatalogLocator {
    /// Creates a locator serving `catalog`.
    pub fn new(catalog: Catalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
        }
    }

    /// The version of the installed catalog.
    pub fn version(&self) -> String {
        self.catalog.read().version().to_string()
    }

    /// The number of locations in the installed catalog.
    pub fn location_count(&self) -> usize {
        self.catalog.read().locations().len()
    }
}

#[async_trait]
impl ResourceLocator for CatalogLocator {
    async fn resolve_key(
        &self,
        key: &AssetKey,
        kind: &AssetKind,
    ) -> Result<Vec<ResourceLocation>, ProviderError> {
        Ok(self.catalog.read().locations_for_key(key, kind))
    }

    async fn resolve_label(
        &self,
        label: &Label,
        kind: &AssetKind,
    ) -> Result<Vec<ResourceLocation>, ProviderError> {
        Ok(self.catalog.read().locations_for_label(label, kind))
    }

    fn apply_catalog(&self, catalog: Catalog) {
        let mut current = self.catalog.write();
        log::info!(
            "Installing catalog '{}' ({} locations), replacing '{}'",
            catalog.version(),
            catalog.locations().len(),
            current.version()
        );
        *current = catalog;
    }
}
