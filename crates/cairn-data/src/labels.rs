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

//! Per-label bookkeeping: which labels are loaded, and which keys each one owns.
//!
//! Every check-then-act sequence on labels happens while holding the
//! [`LabelRegistry`] lock, through the [`LabelBook`] it guards. The book also
//! carries a generation counter bumped by every eviction: a bulk load that
//! started under an older generation cannot record its outcome, so a load
//! straddling an eviction never marks its label as loaded.

use cairn_core::asset::{AssetKey, Label};
use parking_lot::{Mutex, MutexGuard};
use std::collections::{HashMap, HashSet};

/// What is known about a label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelStatus {
    /// The label was never loaded, or was evicted.
    NotLoaded,
    /// Every item of the label is resident.
    Loaded,
    /// The bulk load finished but some items failed.
    Partial {
        /// Keys that could not be fetched.
        failed: Vec<AssetKey>,
    },
}

/// The label state guarded by [`LabelRegistry`].
#[derive(Debug, Default)]
pub struct LabelBook {
    status: HashMap<Label, LabelStatus>,
    tracked: HashMap<Label, HashSet<AssetKey>>,
    generation: u64,
}

impl LabelBook {
    /// The current eviction generation.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// The status of `label`.
    pub fn status(&self, label: &Label) -> LabelStatus {
        self.status
            .get(label)
            .cloned()
            .unwrap_or(LabelStatus::NotLoaded)
    }

    /// Returns `true` if every item of `label` was loaded.
    pub fn is_loaded(&self, label: &Label) -> bool {
        matches!(self.status.get(label), Some(LabelStatus::Loaded))
    }

    /// The keys recorded under `label`.
    pub fn tracked_keys(&self, label: &Label) -> HashSet<AssetKey> {
        self.tracked.get(label).cloned().unwrap_or_default()
    }

    /// Every label with a recorded outcome.
    pub fn labels(&self) -> Vec<Label> {
        self.status.keys().cloned().collect()
    }

    /// Records the outcome of a bulk load started under `generation`.
    ///
    /// Returns `false`, leaving the book untouched, if an eviction happened since.
    pub fn record_outcome(
        &mut self,
        label: &Label,
        generation: u64,
        resident: impl IntoIterator<Item = AssetKey>,
        failed: Vec<AssetKey>,
    ) -> bool {
        if generation != self.generation {
            log::debug!(
                "Dropping outcome of label '{label}': evicted while loading (generation {generation} != {})",
                self.generation
            );
            return false;
        }

        self.tracked
            .entry(label.clone())
            .or_default()
            .extend(resident);
        let status = if failed.is_empty() {
            LabelStatus::Loaded
        } else {
            LabelStatus::Partial { failed }
        };
        self.status.insert(label.clone(), status);
        true
    }

    /// Forgets every label and starts a new generation.
    pub fn clear(&mut self) {
        self.status.clear();
        self.tracked.clear();
        self.generation += 1;
    }

    /// Forgets every label except `keep`, starts a new generation, and returns
    /// the keys tracked under `keep`.
    pub fn retain_only(&mut self, keep: &Label) -> HashSet<AssetKey> {
        self.status.retain(|label, _| label == keep);
        self.tracked.retain(|label, _| label == keep);
        self.generation += 1;
        self.tracked_keys(keep)
    }
}

/// The synchronized label registry.
#[derive(Debug, Default)]
pub struct LabelRegistry {
    book: Mutex<LabelBook>,
}

impl LabelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enters the label critical section.
    ///
    /// The guard must not be held across an `.await`.
    pub fn lock(&self) -> MutexGuard<'_, LabelBook> {
        self.book.lock()
    }

    /// Returns `true` if every item of `label` was loaded.
    pub fn is_loaded(&self, label: &Label) -> bool {
        self.book.lock().is_loaded(label)
    }

    /// The status of `label`.
    pub fn status(&self, label: &Label) -> LabelStatus {
        self.book.lock().status(label)
    }
}
