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

//! Deduplication of concurrent work by key.
//!
//! An [`InFlightTable`] maps a key to the one shared task currently producing
//! its value. The first caller creates and publishes the task; later callers
//! find it and await the same [`Shared`] future. Each caller holds a [`Waiter`]
//! while it waits. When the last waiter goes away before the task finished, the
//! task is cancelled and unpublished, so a later caller starts fresh.

use cairn_core::CancellationToken;
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

struct InFlightTask<T, S> {
    id: u64,
    future: Shared<BoxFuture<'static, T>>,
    state: Arc<S>,
    token: CancellationToken,
    waiters: usize,
}

/// What a task body receives when it is started.
pub struct TaskContext<S> {
    /// Identifies this task in its table; pass it back to [`InFlightTable::finish`].
    pub id: u64,
    /// Cancelled once every waiter has gone away.
    pub token: CancellationToken,
    /// State shared between the task and its waiters.
    pub state: Arc<S>,
}

/// The result of [`InFlightTable::join_or_start`].
pub enum Joined<K, T, S>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    /// The precheck produced a value; no task was joined.
    Ready(T),
    /// The caller is now waiting on a shared task.
    Waiting(Waiter<K, T, S>),
}

/// A table of shared in-flight tasks, at most one per key.
pub struct InFlightTable<K, T, S = ()> {
    tasks: Mutex<HashMap<K, InFlightTask<T, S>>>,
    next_id: AtomicU64,
}

impl<K, T, S> Default for InFlightTable<K, T, S> {
    fn default() -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }
}

impl<K, T, S> InFlightTable<K, T, S>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Joins the task in flight for `key`, or starts one.
    ///
    /// Runs atomically under the table lock, in this order:
    /// 1. `precheck` (e.g. a cache lookup): if it yields a value, return it;
    /// 2. if a task is in flight for `key`, join it;
    /// 3. otherwise build the task with `start` and publish it.
    ///
    /// `start` only builds the future; it is polled by the waiters.
    pub fn join_or_start<F, Fut>(
        self: &Arc<Self>,
        key: K,
        precheck: impl FnOnce() -> Option<T>,
        init_state: impl FnOnce() -> S,
        start: F,
    ) -> Joined<K, T, S>
    where
        F: FnOnce(TaskContext<S>) -> Fut,
        Fut: Future<Output = T> + Send + 'static,
    {
        let mut tasks = self.tasks.lock();

        if let Some(ready) = precheck() {
            return Joined::Ready(ready);
        }

        if let Some(task) = tasks.get_mut(&key) {
            task.waiters += 1;
            return Joined::Waiting(Waiter {
                future: task.future.clone(),
                state: task.state.clone(),
                started: false,
                id: task.id,
                key,
                table: self.clone(),
            });
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();
        let state = Arc::new(init_state());
        let future = start(TaskContext {
            id,
            token: token.clone(),
            state: state.clone(),
        })
        .boxed()
        .shared();

        tasks.insert(
            key.clone(),
            InFlightTask {
                id,
                future: future.clone(),
                state: state.clone(),
                token,
                waiters: 1,
            },
        );

        Joined::Waiting(Waiter {
            future,
            state,
            started: true,
            id,
            key,
            table: self.clone(),
        })
    }

    /// Unpublishes task `id` for `key`. Called by the task body as its last step.
    ///
    /// Does nothing if the entry was already replaced or cleared.
    pub fn finish(&self, key: &K, id: u64) {
        let mut tasks = self.tasks.lock();
        if tasks.get(key).is_some_and(|task| task.id == id) {
            tasks.remove(key);
        }
    }

    /// Unpublishes every task. Running tasks still complete for their current waiters.
    pub fn clear(&self) {
        self.tasks.lock().clear();
    }

    /// Runs `during` under the table lock, then cancels and unpublishes every
    /// task. Nothing can join or start a task between the two steps.
    pub fn retire<R>(&self, during: impl FnOnce() -> R) -> R {
        let mut tasks = self.tasks.lock();
        let out = during();
        for (_, task) in tasks.drain() {
            task.token.cancel();
        }
        out
    }

    /// Returns `true` if a task is in flight for `key`.
    pub fn contains(&self, key: &K) -> bool {
        self.tasks.lock().contains_key(key)
    }

    /// The number of tasks in flight.
    pub fn len(&self) -> usize {
        self.tasks.lock().len()
    }

    /// Returns `true` if nothing is in flight.
    pub fn is_empty(&self) -> bool {
        self.tasks.lock().is_empty()
    }

    fn leave(&self, key: &K, id: u64) {
        let mut tasks = self.tasks.lock();
        let Some(task) = tasks.get_mut(key) else {
            return;
        };
        if task.id != id {
            return;
        }
        task.waiters -= 1;
        if task.waiters == 0 {
            if let Some(task) = tasks.remove(key) {
                task.token.cancel();
            }
        }
    }
}

/// A caller's interest in a shared task. Dropping it withdraws the interest.
pub struct Waiter<K, T, S>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    future: Shared<BoxFuture<'static, T>>,
    state: Arc<S>,
    started: bool,
    id: u64,
    key: K,
    table: Arc<InFlightTable<K, T, S>>,
}

impl<K, T, S> Waiter<K, T, S>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    /// The state shared with the task.
    pub fn state(&self) -> &Arc<S> {
        &self.state
    }

    /// Returns `true` if this caller created the task.
    pub fn started(&self) -> bool {
        self.started
    }

    /// Awaits the task's output, or `None` if `token` is cancelled first.
    pub async fn wait(self, token: &CancellationToken) -> Option<T> {
        token.run_until_cancelled(self.future.clone()).await
    }
}

impl<K, T, S> Drop for Waiter<K, T, S>
where
    K: Eq + Hash + Clone + Send + 'static,
    T: Clone + Send + Sync + 'static,
    S: Send + Sync + 'static,
{
    fn drop(&mut self) {
        self.table.leave(&self.key, self.id);
    }
}
