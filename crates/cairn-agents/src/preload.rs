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

//! The one-shot preload of the preload label.

use cairn_core::{
    asset::{AssetKind, Label},
    progress::{LabelLoadReport, LabelProgress, ProgressFn},
    CancellationToken, LoadError, LoadResult,
};
use cairn_lanes::LabelLoadLane;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Mutex;

/// Remembers whether the preload label has been fully loaded.
///
/// The flag is read without locking on the fast path. The slow path holds an
/// async mutex across check, load and set, so two first callers never both
/// start a preload and no caller sees the flag before the load finished. The
/// flag is written only under the label registry lock, which eviction also
/// holds when it resets it.
pub struct PreloadGate {
    label: Label,
    done: AtomicBool,
    serial: Mutex<()>,
}

impl PreloadGate {
    /// Creates a gate for `label`.
    pub fn new(label: Label) -> Self {
        Self {
            label,
            done: AtomicBool::new(false),
            serial: Mutex::new(()),
        }
    }

    /// The preload label.
    pub fn label(&self) -> &Label {
        &self.label
    }

    /// Returns `true` once every preload item has been loaded.
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Clears the flag. Must be called with the label registry locked.
    pub fn reset(&self) {
        self.done.store(false, Ordering::Release);
    }

    /// Loads the preload label through `lane` unless that already happened.
    pub async fn ensure(
        &self,
        lane: &LabelLoadLane,
        progress: ProgressFn,
        token: &CancellationToken,
    ) -> LoadResult<LabelLoadReport> {
        if self.is_done() {
            (*progress)(&LabelProgress::idle());
            return Ok(LabelLoadReport::already_loaded(self.label.clone()));
        }

        let _serial = token
            .run_until_cancelled(self.serial.lock())
            .await
            .ok_or(LoadError::Cancelled)?;
        if self.is_done() {
            (*progress)(&LabelProgress::idle());
            return Ok(LabelLoadReport::already_loaded(self.label.clone()));
        }

        let report = lane
            .load_label(&self.label, &AssetKind::ANY, progress, token)
            .await?;
        if report.is_complete() {
            let book = lane.labels().lock();
            if book.is_loaded(&self.label) {
                self.done.store(true, Ordering::Release);
                log::info!("Preload of '{}' complete", self.label);
            }
        }
        Ok(report)
    }
}
