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

//! Progress reporting and outcome types for bulk label loads.

use crate::asset::{AssetKey, Label};
use std::sync::Arc;

/// One progress update of a bulk label load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelProgress {
    /// The item that just completed, or `None` for the no-op update sent when
    /// the label was already loaded.
    pub key: Option<AssetKey>,
    /// Number of items done so far, including items that were already resident.
    pub completed: usize,
    /// Number of items the label resolved to.
    pub total: usize,
}

impl LabelProgress {
    /// The empty update reported when there is nothing to do.
    pub fn idle() -> Self {
        Self {
            key: None,
            completed: 0,
            total: 0,
        }
    }

    /// Fraction of the load that is done, in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f32 / self.total as f32
        }
    }
}

/// A progress callback. Shared because every caller joined to a load is notified.
pub type ProgressFn = Arc<dyn Fn(&LabelProgress) + Send + Sync>;

/// Returns a progress callback that ignores every update.
pub fn no_progress() -> ProgressFn {
    Arc::new(|_| {})
}

/// The outcome of a bulk label load.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabelLoadReport {
    /// The label that was loaded.
    pub label: Label,
    /// Number of locations the label resolved to.
    pub total: usize,
    /// Number of items that are resident at the end of the load.
    pub completed: usize,
    /// Keys whose fetch failed. Empty when the load is complete.
    pub failed: Vec<AssetKey>,
    /// `true` if the label was already loaded and nothing was done.
    pub already_loaded: bool,
}

impl LabelLoadReport {
    /// The report returned for a label that was already loaded.
    pub fn already_loaded(label: Label) -> Self {
        Self {
            label,
            total: 0,
            completed: 0,
            failed: Vec::new(),
            already_loaded: true,
        }
    }

    /// Returns `true` if every item of the label is resident.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}
