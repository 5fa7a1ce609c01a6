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

//! Provides the foundational traits and primitive types for Cairn's asset system.
//!
//! This module defines the "common language" for all asset-related operations.
//! It contains the core contracts that other crates implement or use, but it has
//! no knowledge of how assets are fetched or stored.
//!
//! The key components are:
//! - The [`Asset`] trait: a marker for all types that can be treated as assets.
//! - [`AssetKey`] and [`Label`]: the string identifiers used to request assets.
//! - [`AssetKind`]: the declared type used to filter resource locations.

mod handle;
mod location;

pub use handle::*;
pub use location::*;

use serde::{Deserialize, Serialize};
use std::{borrow::Cow, fmt, sync::Arc};

/// A marker trait for types that can be managed by the asset system.
///
/// The supertraits enforce critical safety guarantees:
/// - `Send` + `Sync`: the asset can be shared between concurrently running loads.
/// - `'static`: the asset can be stored in the cache for as long as it is resident.
///
/// # Examples
///
/// ```
/// use cairn_core::asset::{Asset, AssetKind};
///
/// struct Texture {
///     // ... fields
/// }
///
/// impl Asset for Texture {
///     const KIND: AssetKind = AssetKind::TEXTURE;
/// }
/// ```
pub trait Asset: Send + Sync + 'static {
    /// The kind of resource location this type is loaded from.
    const KIND: AssetKind;
}

/// The declared type of an asset, used to filter resource locations.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssetKind(Cow<'static, str>);

impl AssetKind {
    /// Matches every location regardless of its kind.
    pub const ANY: AssetKind = AssetKind::new("*");
    /// Plain data objects (configuration tables, text, raw bytes).
    pub const DATA: AssetKind = AssetKind::new("data");
    /// Images uploaded as textures.
    pub const TEXTURE: AssetKind = AssetKind::new("texture");
    /// Images sliced for direct display.
    pub const SPRITE: AssetKind = AssetKind::new("sprite");
    /// Templates from which live display objects are instantiated.
    pub const PREFAB: AssetKind = AssetKind::new("prefab");

    /// Creates a kind from a static name.
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Creates a kind from a runtime name (e.g. read from a catalog).
    pub fn custom(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Returns the kind's name.
    pub fn name(&self) -> &str {
        &self.0
    }

    /// Returns `true` if a location of kind `other` satisfies a request for `self`.
    pub fn accepts(&self, other: &AssetKind) -> bool {
        *self == Self::ANY || self == other
    }
}

impl fmt::Display for AssetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Arc<str>);

        impl $name {
            /// Creates a new identifier.
            pub fn new(value: impl AsRef<str>) -> Self {
                Self(Arc::from(value.as_ref()))
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(Arc::from(value))
            }
        }

        impl std::borrow::Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }
    };
}

string_id! {
    /// A stable, case-sensitive identifier for a logical asset.
    ///
    /// The key is the primary key of the cache: at most one asset is resident per key.
    AssetKey
}

string_id! {
    /// A tag grouping many resource locations for bulk loading.
    Label
}
