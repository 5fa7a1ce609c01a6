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

use super::{AssetKey, AssetKind, Label};
use serde::{Deserialize, Serialize};

/// Where the bytes of an asset live inside a packed data file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackedSource {
    /// Byte offset of the asset from the start of the pack.
    pub offset: u64,
    /// Length of the asset in bytes.
    pub size: u64,
}

/// Serializable description of one addressable asset.
///
/// This is the "identity card" the catalog keeps for each asset: enough for a
/// locator to answer key and label queries, and for a provider to fetch the
/// data, without touching the asset itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceLocation {
    /// The key the asset is cached under.
    pub primary_key: AssetKey,

    /// The provider-specific address of the asset (a path, URL or bundle entry).
    pub internal_id: String,

    /// The declared type of the asset.
    pub kind: AssetKind,

    /// The labels this asset is tagged with.
    pub labels: Vec<Label>,

    /// Location inside the packed data file, when the asset is packed.
    pub packed: Option<PackedSource>,
}

impl ResourceLocation {
    /// Creates an unpacked, unlabelled location whose internal id equals its key.
    pub fn new(primary_key: impl Into<AssetKey>, kind: AssetKind) -> Self {
        let primary_key = primary_key.into();
        Self {
            internal_id: primary_key.to_string(),
            primary_key,
            kind,
            labels: Vec::new(),
            packed: None,
        }
    }

    /// Tags the location with a label.
    pub fn with_label(mut self, label: impl Into<Label>) -> Self {
        self.labels.push(label.into());
        self
    }

    /// Records where the asset lives inside the pack.
    pub fn with_packed(mut self, offset: u64, size: u64) -> Self {
        self.packed = Some(PackedSource { offset, size });
        self
    }

    /// Returns `true` if the location carries `label`.
    pub fn has_label(&self, label: &Label) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}
