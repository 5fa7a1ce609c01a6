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

//! The catalog: a versioned manifest mapping asset keys and labels to locations.
//!
//! A [`Catalog`] is decoded from the binary manifest (`catalog_<version>.bin`)
//! and kept in memory with two indices, so that both key and label queries are
//! O(1) on average. It is the primary source of truth for resolving where an
//! asset lives.

use crate::asset::{AssetKey, AssetKind, Label, ResourceLocation};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

/// An error raised while encoding or decoding a catalog manifest.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The manifest bytes are not a valid encoded catalog.
    #[error("invalid catalog manifest: {0}")]
    Decode(#[from] bincode::error::DecodeError),
    /// The catalog could not be encoded.
    #[error("failed to encode catalog manifest: {0}")]
    Encode(#[from] bincode::error::EncodeError),
}

/// The on-disk form of a catalog.
#[derive(Serialize, Deserialize)]
struct CatalogManifest {
    version: String,
    locations: Vec<ResourceLocation>,
}

/// The runtime representation of a catalog manifest.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    version: String,
    locations: Vec<ResourceLocation>,
    /// Indices into `locations`, by primary key.
    by_key: HashMap<AssetKey, Vec<usize>>,
    /// Indices into `locations`, by label.
    by_label: HashMap<Label, Vec<usize>>,
}

impl Catalog {
    /// Builds a catalog from a list of locations.
    pub fn new(version: impl Into<String>, locations: Vec<ResourceLocation>) -> Self {
        let mut by_key: HashMap<AssetKey, Vec<usize>> = HashMap::new();
        let mut by_label: HashMap<Label, Vec<usize>> = HashMap::new();
        for (index, location) in locations.iter().enumerate() {
            by_key
                .entry(location.primary_key.clone())
                .or_default()
                .push(index);
            for label in &location.labels {
                by_label.entry(label.clone()).or_default().push(index);
            }
        }

        Self {
            version: version.into(),
            locations,
            by_key,
            by_label,
        }
    }

    /// Decodes a catalog from its binary manifest.
    ///
    /// # Errors
    /// Returns [`CatalogError::Decode`] if the bytes are not a bincode-encoded manifest.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CatalogError> {
        let config = bincode::config::standard();
        let (manifest, _): (CatalogManifest, _) =
            bincode::serde::decode_from_slice(bytes, config)?;
        Ok(Self::new(manifest.version, manifest.locations))
    }

    /// Encodes the catalog into its binary manifest.
    pub fn to_bytes(&self) -> Result<Vec<u8>, CatalogError> {
        let manifest = CatalogManifest {
            version: self.version.clone(),
            locations: self.locations.clone(),
        };
        Ok(bincode::serde::encode_to_vec(
            &manifest,
            bincode::config::standard(),
        )?)
    }

    /// The version string the manifest was built for.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Every location in the catalog.
    pub fn locations(&self) -> &[ResourceLocation] {
        &self.locations
    }

    /// The locations stored under `key` whose kind satisfies `kind`.
    pub fn locations_for_key(&self, key: &AssetKey, kind: &AssetKind) -> Vec<ResourceLocation> {
        self.select(self.by_key.get(key), kind)
    }

    /// The locations tagged with `label` whose kind satisfies `kind`.
    pub fn locations_for_label(&self, label: &Label, kind: &AssetKind) -> Vec<ResourceLocation> {
        self.select(self.by_label.get(label), kind)
    }

    fn select(&self, indices: Option<&Vec<usize>>, kind: &AssetKind) -> Vec<ResourceLocation> {
        indices
            .into_iter()
            .flatten()
            .map(|&i| &self.locations[i])
            .filter(|location| kind.accepts(&location.kind))
            .cloned()
            .collect()
    }
}
