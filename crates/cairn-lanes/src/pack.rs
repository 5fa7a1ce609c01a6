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

//! The pack-file [`ContentProvider`].
//!
//! A pack is one flat file holding the bytes of many assets back to back. The
//! catalog records, for every location, the `offset` and `size` of its bytes.

use crate::decoder::DecoderRegistry;
use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use cairn_core::{
    asset::{AssetKey, FetchedAsset, LoadHandle, PackedSource, ResourceLocation},
    provider::{ContentProvider, InvalidationScope},
    ProviderError,
};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    fs::File,
    io::{Read, Seek, SeekFrom},
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

/// Reads asset bytes from a pack file and decodes them.
///
/// Every successful fetch hands out a fresh [`LoadHandle`]; the provider keeps
/// a record of each live handle until it is released.
pub struct PackContentProvider {
    pack_path: PathBuf,
    decoders: Arc<DecoderRegistry>,
    live: Mutex<HashMap<u64, AssetKey>>,
    next_handle: AtomicU64,
}

impl PackContentProvider {
    /// Creates a provider reading from the pack at `pack_path`.
    ///
    /// The file is opened on each fetch, so a pack replaced on disk is picked
    /// up by the next load.
    pub fn new(pack_path: impl Into<PathBuf>, decoders: DecoderRegistry) -> Self {
        Self {
            pack_path: pack_path.into(),
            decoders: Arc::new(decoders),
            live: Mutex::new(HashMap::new()),
            next_handle: AtomicU64::new(1),
        }
    }

    /// The number of handles fetched and not yet released.
    pub fn live_handles(&self) -> usize {
        self.live.lock().len()
    }

    fn read_bytes(pack_path: &Path, source: PackedSource) -> Result<Vec<u8>> {
        let mut pack_file = File::open(pack_path)
            .with_context(|| format!("Failed to open pack file {}", pack_path.display()))?;
        let pack_len = pack_file
            .metadata()
            .context("Failed to read pack file metadata")?
            .len();
        match source.offset.checked_add(source.size) {
            Some(end) if end <= pack_len => {}
            _ => bail!(
                "Asset range {}+{} lies outside the {pack_len}-byte pack file",
                source.offset,
                source.size
            ),
        }
        let size = usize::try_from(source.size).context("Asset too large for this platform")?;
        let mut buffer = vec![0; size];
        pack_file
            .seek(SeekFrom::Start(source.offset))
            .context("Failed to seek to asset location in pack file")?;
        pack_file
            .read_exact(&mut buffer)
            .context("Failed to read asset bytes from pack file")?;
        Ok(buffer)
    }

    fn check_readable(pack_path: &Path) -> Result<()> {
        let metadata = std::fs::metadata(pack_path)
            .with_context(|| format!("Pack file {} is unavailable", pack_path.display()))?;
        if !metadata.is_file() {
            bail!("{} is not a pack file", pack_path.display());
        }
        Ok(())
    }

    async fn fetch_inner(&self, location: &ResourceLocation) -> Result<Option<FetchedAsset>> {
        let Some(source) = location.packed else {
            bail!(
                "Location '{}' of '{}' has no packed source",
                location.internal_id,
                location.primary_key
            );
        };

        let pack_path = self.pack_path.clone();
        let bytes = tokio::task::spawn_blocking(move || Self::read_bytes(&pack_path, source))
            .await
            .context("Pack read task failed")??;
        if bytes.is_empty() {
            return Ok(None);
        }

        let decoders = self.decoders.clone();
        let kind = location.kind.clone();
        let asset = tokio::task::spawn_blocking(move || decoders.decode(&kind, &bytes))
            .await
            .context("Decode task failed")?
            .with_context(|| format!("Failed to decode '{}'", location.primary_key))?;

        let id = self.next_handle.fetch_add(1, Ordering::Relaxed);
        self.live.lock().insert(id, location.primary_key.clone());
        log::debug!("Fetched '{}' from pack (handle {id})", location.primary_key);
        Ok(Some(FetchedAsset {
            asset,
            handle: LoadHandle::new(id, location.primary_key.clone()),
        }))
    }
}

#[async_trait]
impl ContentProvider for PackContentProvider {
    async fn fetch(
        &self,
        location: &ResourceLocation,
    ) -> Result<Option<FetchedAsset>, ProviderError> {
        self.fetch_inner(location)
            .await
            .map_err(|e| ProviderError::new(format!("{e:#}")))
    }

    fn release(&self, handle: LoadHandle) {
        if self.live.lock().remove(&handle.id()).is_none() {
            log::warn!(
                "Released unknown handle {} for '{}'",
                handle.id(),
                handle.key()
            );
        }
    }

    /// Refuses when the pack can no longer be read: evicting now would leave
    /// nothing to reload from, so the resident assets are kept instead.
    async fn invalidate(&self, scope: &InvalidationScope) -> Result<(), ProviderError> {
        let pack_path = self.pack_path.clone();
        tokio::task::spawn_blocking(move || Self::check_readable(&pack_path))
            .await
            .map_err(|e| ProviderError::new(format!("Pack check task failed: {e}")))?
            .map_err(|e| ProviderError::new(format!("{e:#}")))?;

        let live = self.live.lock();
        let covered = live.values().filter(|key| scope.covers(key)).count();
        log::debug!(
            "Pack invalidation covers {covered} of {} live handle(s)",
            live.len()
        );
        Ok(())
    }
}
