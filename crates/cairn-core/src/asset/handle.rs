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

use super::{Asset, AssetKey, AssetKind};
use std::{any::Any, fmt, ops::Deref, sync::Arc};

/// A thread-safe, reference-counted handle to a loaded asset.
///
/// This acts as a smart pointer, providing shared ownership of an asset's data.
/// Cloning a handle is cheap, as it only increments the reference count
/// and does not duplicate the underlying asset data.
#[derive(Debug)]
pub struct AssetHandle<T: Asset>(Arc<T>);

impl<T: Asset> AssetHandle<T> {
    /// Creates a new `AssetHandle` that takes ownership of the asset data.
    pub fn new(asset: T) -> Self {
        Self(Arc::new(asset))
    }

    /// Returns `true` if both handles point at the same loaded instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Returns the shared pointer behind this handle.
    pub fn into_arc(self) -> Arc<T> {
        self.0
    }
}

impl<T: Asset> Clone for AssetHandle<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl<T: Asset> Deref for AssetHandle<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

/// A type-erased loaded asset, as stored in the cache.
///
/// The cache is keyed by [`AssetKey`] alone, so it keeps assets of every kind
/// side by side. Callers recover the concrete type with [`ErasedAsset::downcast`].
#[derive(Clone)]
pub struct ErasedAsset {
    kind: AssetKind,
    value: Arc<dyn Any + Send + Sync>,
}

impl ErasedAsset {
    /// Erases a typed asset.
    pub fn new<A: Asset>(asset: A) -> Self {
        Self {
            kind: A::KIND,
            value: Arc::new(asset),
        }
    }

    /// Wraps an already shared asset of the given kind.
    pub fn from_arc(kind: AssetKind, value: Arc<dyn Any + Send + Sync>) -> Self {
        Self { kind, value }
    }

    /// The kind of the location this asset was fetched from.
    pub fn kind(&self) -> &AssetKind {
        &self.kind
    }

    /// Recovers a typed handle, or `None` if the asset is of another type.
    pub fn downcast<A: Asset>(&self) -> Option<AssetHandle<A>> {
        self.value.clone().downcast::<A>().ok().map(AssetHandle)
    }

    /// Returns `true` if both erased assets point at the same loaded instance.
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.value, &other.value)
    }
}

impl fmt::Debug for ErasedAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErasedAsset")
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// The release token for one resident asset.
///
/// A `LoadHandle` is issued by a [`ContentProvider`](crate::provider::ContentProvider)
/// for every successful fetch and must be handed back to it exactly once. It is
/// deliberately not `Clone`: the cache keeps the only copy for as long as the
/// asset is resident.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct LoadHandle {
    id: u64,
    key: AssetKey,
}

impl LoadHandle {
    /// Creates a handle for the fetch identified by `id`.
    pub fn new(id: u64, key: AssetKey) -> Self {
        Self { id, key }
    }

    /// The provider-assigned identifier of this fetch.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// The key of the asset this handle keeps alive.
    pub fn key(&self) -> &AssetKey {
        &self.key
    }
}

/// The product of one successful fetch: the asset and its release token.
#[derive(Debug)]
pub struct FetchedAsset {
    /// The decoded asset.
    pub asset: ErasedAsset,
    /// The token that frees the asset's backing resources.
    pub handle: LoadHandle,
}
