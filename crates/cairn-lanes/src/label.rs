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

//! Bulk loading of every asset tagged with a label.
//!
//! Concurrent loads of one label share a single task. The label registry lock
//! guards the "already loaded?" check and the join-or-start step together, and
//! the task unpublishes itself in the same critical section that records its
//! outcome. Lock order is label registry, then in-flight table, then cache.

use crate::{
    inflight::{InFlightTable, Joined, TaskContext},
    single::SingleLoadLane,
};
use cairn_core::{
    asset::{AssetKey, AssetKind, Label, ResourceLocation},
    progress::{LabelLoadReport, LabelProgress, ProgressFn},
    provider::ResourceLocator,
    CancellationToken, LoadError, LoadResult,
};
use cairn_data::LabelRegistry;
use futures::stream::{FuturesUnordered, StreamExt};
use parking_lot::Mutex;
use std::{collections::HashSet, sync::Arc};

type SharedLabelLoads = InFlightTable<Label, LoadResult<LabelLoadReport>, ProgressFanout>;

#[derive(Default)]
struct FanoutState {
    history: Vec<LabelProgress>,
    listeners: Vec<(u64, ProgressFn)>,
    next_id: u64,
}

/// Delivers the progress of one shared label task to every joined caller.
///
/// A caller subscribing late first receives every update already emitted, so
/// all callers observe the same sequence.
#[derive(Default)]
pub struct ProgressFanout {
    state: Mutex<FanoutState>,
}

impl ProgressFanout {
    /// Replays past updates to `listener`, then registers it for the next ones.
    pub fn subscribe(&self, listener: ProgressFn) -> u64 {
        let mut state = self.state.lock();
        for update in &state.history {
            (*listener)(update);
        }
        let id = state.next_id;
        state.next_id += 1;
        state.listeners.push((id, listener));
        id
    }

    /// Stops delivering updates to the listener registered as `id`.
    pub fn unsubscribe(&self, id: u64) {
        self.state.lock().listeners.retain(|(other, _)| *other != id);
    }

    /// Sends `update` to every listener.
    pub fn emit(&self, update: LabelProgress) {
        let mut state = self.state.lock();
        for (_, listener) in &state.listeners {
            (**listener)(&update);
        }
        state.history.push(update);
    }
}

/// The label loading pipeline.
#[derive(Clone)]
pub struct LabelLoadLane {
    single: SingleLoadLane,
    locator: Arc<dyn ResourceLocator>,
    labels: Arc<LabelRegistry>,
    in_flight: Arc<SharedLabelLoads>,
}

impl LabelLoadLane {
    /// Creates a lane fetching items through `single`.
    pub fn new(
        single: SingleLoadLane,
        locator: Arc<dyn ResourceLocator>,
        labels: Arc<LabelRegistry>,
    ) -> Self {
        Self {
            single,
            locator,
            labels,
            in_flight: Arc::new(SharedLabelLoads::new()),
        }
    }

    /// The single-key lane items are fetched through.
    pub fn single(&self) -> &SingleLoadLane {
        &self.single
    }

    /// The label registry this lane records outcomes into.
    pub fn labels(&self) -> &Arc<LabelRegistry> {
        &self.labels
    }

    /// Unpublishes every label task. Must be called with the label registry locked.
    pub fn clear_in_flight(&self) {
        self.in_flight.clear();
    }

    /// The number of labels with a load in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.len()
    }

    /// Loads every location tagged with `label` whose kind satisfies `kind`.
    ///
    /// `progress` is called once per completed item. If the label is already
    /// loaded it is called exactly once, with [`LabelProgress::idle`].
    ///
    /// Per-item failures do not fail the call: they are listed in the report.
    pub async fn load_label(
        &self,
        label: &Label,
        kind: &AssetKind,
        progress: ProgressFn,
        token: &CancellationToken,
    ) -> LoadResult<LabelLoadReport> {
        if token.is_cancelled() {
            return Err(LoadError::Cancelled);
        }

        let joined = {
            let book = self.labels.lock();
            if book.is_loaded(label) {
                drop(book);
                log::debug!("Label '{label}' already loaded");
                (*progress)(&LabelProgress::idle());
                return Ok(LabelLoadReport::already_loaded(label.clone()));
            }

            let generation = book.generation();
            let lane = self.clone();
            let task_label = label.clone();
            let kind = kind.clone();
            self.in_flight.join_or_start(
                label.clone(),
                || None,
                ProgressFanout::default,
                move |ctx| async move { lane.run(task_label, kind, generation, ctx).await },
            )
        };

        let waiter = match joined {
            Joined::Ready(report) => return report,
            Joined::Waiting(waiter) => waiter,
        };
        if !waiter.started() {
            log::debug!("Joining the load in flight for label '{label}'");
        }

        let fanout = waiter.state().clone();
        let subscription = fanout.subscribe(progress);
        let outcome = waiter.wait(token).await;
        fanout.unsubscribe(subscription);
        outcome.unwrap_or(Err(LoadError::Cancelled))
    }

    /// The number of locations tagged with `label`, without loading them.
    pub async fn item_count(&self, label: &Label, token: &CancellationToken) -> LoadResult<usize> {
        let resolved = token
            .run_until_cancelled(self.locator.resolve_label(label, &AssetKind::ANY))
            .await
            .ok_or(LoadError::Cancelled)?;
        resolved
            .map(|locations| unique_by_key(locations).len())
            .map_err(|e| label_failure(label, e.to_string()))
    }

    async fn run(
        &self,
        label: Label,
        kind: AssetKind,
        generation: u64,
        ctx: TaskContext<ProgressFanout>,
    ) -> LoadResult<LabelLoadReport> {
        let result = self.run_body(&label, &kind, generation, &ctx).await;
        if result.is_err() {
            let _book = self.labels.lock();
            self.in_flight.finish(&label, ctx.id);
        }
        result
    }

    async fn run_body(
        &self,
        label: &Label,
        kind: &AssetKind,
        generation: u64,
        ctx: &TaskContext<ProgressFanout>,
    ) -> LoadResult<LabelLoadReport> {
        let token = &ctx.token;
        let locations = token
            .run_until_cancelled(self.locator.resolve_label(label, kind))
            .await
            .ok_or(LoadError::Cancelled)?
            .map_err(|e| label_failure(label, e.to_string()))?;
        let locations = unique_by_key(locations);
        let total = locations.len();
        log::info!("Loading label '{label}': {total} item(s)");

        let mut completed = 0;
        let mut resident = Vec::with_capacity(total);
        let mut pending = Vec::new();
        for location in locations {
            if self.single.cache().contains(&location.primary_key) {
                completed += 1;
                resident.push(location.primary_key.clone());
                ctx.state.emit(LabelProgress {
                    key: Some(location.primary_key),
                    completed,
                    total,
                });
            } else {
                pending.push(location);
            }
        }

        let mut fetches: FuturesUnordered<_> = pending
            .into_iter()
            .map(|location| {
                let single = self.single.clone();
                let token = token.clone();
                async move {
                    let result = single.load_location(&location, &token).await;
                    (location.primary_key, result)
                }
            })
            .collect();

        let mut failed = Vec::new();
        let mut cancelled = false;
        while let Some((key, result)) = fetches.next().await {
            match result {
                Ok(_) => {
                    completed += 1;
                    resident.push(key.clone());
                    ctx.state.emit(LabelProgress {
                        key: Some(key),
                        completed,
                        total,
                    });
                }
                Err(LoadError::Cancelled) => cancelled = true,
                Err(e) => {
                    log::warn!("Label '{label}': item '{key}' failed: {e}");
                    failed.push(key);
                }
            }
        }
        if cancelled || token.is_cancelled() {
            log::debug!("Load of label '{label}' cancelled after {completed}/{total} item(s)");
            return Err(LoadError::Cancelled);
        }

        let report = LabelLoadReport {
            label: label.clone(),
            total,
            completed,
            failed: failed.clone(),
            already_loaded: false,
        };

        let mut book = self.labels.lock();
        book.record_outcome(label, generation, resident, failed);
        self.in_flight.finish(label, ctx.id);
        drop(book);

        if report.is_complete() {
            log::info!("Label '{label}' loaded ({total} item(s))");
        } else {
            log::warn!(
                "Label '{label}' partially loaded: {} of {total} item(s) failed",
                report.failed.len()
            );
        }
        Ok(report)
    }
}

/// Drops locations whose key was already seen, keeping the first one.
fn unique_by_key(locations: Vec<ResourceLocation>) -> Vec<ResourceLocation> {
    let mut seen: HashSet<AssetKey> = HashSet::with_capacity(locations.len());
    locations
        .into_iter()
        .filter(|location| seen.insert(location.primary_key.clone()))
        .collect()
}

fn label_failure(label: &Label, reason: String) -> LoadError {
    LoadError::LoadFailed {
        key: AssetKey::new(label.as_str()),
        attempts: 1,
        reason: format!("label resolution failed: {reason}"),
    }
}
